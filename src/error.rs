//! Request-time error taxonomy.

use axum::http::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced while answering a single request.
///
/// None of these terminate the server: the handler degrades every
/// variant to an HTTP error response for that one request.
#[derive(Debug, Error)]
pub enum MockError {
    /// No configured conversation fits the request. An expected outcome,
    /// not a fault.
    #[error("no configured conversation matches the request")]
    NoMatch,

    /// A file-backed body could not be read.
    #[error("failed to read body file {path}: {source}")]
    BodyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored image could not be decoded or re-encoded as JPEG.
    #[error("failed to transcode image body: {0}")]
    ImageTranscode(#[from] image::ImageError),
}

impl MockError {
    /// Status the handler answers with for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            MockError::NoMatch => StatusCode::NOT_FOUND,
            MockError::BodyFile { .. } | MockError::ImageTranscode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
