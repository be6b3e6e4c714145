//! Body resolution.
//!
//! Turns a selected response into the bytes put on the wire. Stored
//! image files are normalized to JPEG regardless of their original
//! encoding, so heterogeneous fixtures all leave in one wire format.

use crate::config::{BodySource, ResponseDefinition};
use crate::error::MockError;
use regex::Regex;
use std::io::Cursor;

/// Materialize the body of a response.
///
/// Inline bodies are returned verbatim with no I/O. File-backed bodies
/// are re-read in full on every request; when the declared content type
/// names an image, the stored bytes are decoded in their native format
/// and re-encoded as JPEG.
pub fn resolve(response: &ResponseDefinition) -> Result<Vec<u8>, MockError> {
    match response.body_source() {
        BodySource::Inline(text) => Ok(text.as_bytes().to_vec()),
        BodySource::FileBacked(path) => {
            let bytes = std::fs::read(path).map_err(|source| MockError::BodyFile {
                path: path.to_path_buf(),
                source,
            })?;
            if is_image_content_type(&response.content_type) {
                transcode_to_jpeg(&bytes)
            } else {
                Ok(bytes)
            }
        }
    }
}

/// Whether a content type names an image format: the literal prefix
/// `image/` followed by word characters. Evaluated fresh per response.
pub fn is_image_content_type(content_type: &str) -> bool {
    Regex::new(r"^image/\w+")
        .map(|pattern| pattern.is_match(content_type))
        .unwrap_or(false)
}

fn transcode_to_jpeg(bytes: &[u8]) -> Result<Vec<u8>, MockError> {
    let decoded = image::load_from_memory(bytes)?;
    let mut out = Cursor::new(Vec::new());
    // JPEG carries no alpha channel; flatten before encoding
    decoded
        .into_rgb8()
        .write_to(&mut out, image::ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}
