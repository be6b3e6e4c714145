//! mock-responder
//!
//! A declarative HTTP mock server: describe the requests you expect and
//! the canned responses to return, and it answers live traffic by
//! selecting the single best-matching rule.
//!
//! # Features
//!
//! - **Request matching**: per-resource rules keyed by method, path
//!   parameters and query parameters
//! - **Deterministic disambiguation**: declaration order is significant,
//!   the first matching conversation wins
//! - **Response rotation**: cycle round-robin through alternative
//!   responses, or pick by presence of request parameters
//! - **Inline and file-backed bodies**: literal text in the config, or
//!   files re-read per request
//! - **Image normalization**: stored images are re-encoded to JPEG on
//!   the way out, whatever their original format
//!
//! # Example Configuration
//!
//! ```yaml
//! port: 8080
//! resources:
//!   - path: /users/{id}
//!     methods:
//!       - verb: get
//!         conversations:
//!           - request:
//!               path-params: { id: "7" }
//!             responses:
//!               - content-type: application/json
//!                 status: 200
//!                 body: '{"name":"ana"}'
//! ```

pub mod body;
pub mod config;
pub mod error;
pub mod matcher;
pub mod rotation;
pub mod server;

pub use config::ServerConfig;
pub use error::MockError;
pub use server::{build_router, run};
