//! fakehttp core: JSON mock handlers for exercising HTTP clients in tests.
//!
//! A [`JsonHandler`] stands in for one endpoint: it checks the path against a
//! glob pattern, checks the method and content type, decodes the JSON body,
//! calls the configured response function and writes its result as JSON.
//! A [`MultipleHandler`] routes requests across several of them, first match
//! wins. [`TestServer`] puts either one behind a real HTTP/1.1 listener.

pub mod handler;
pub mod into_handler_error;
pub mod pattern;
pub mod query;
pub mod router;
pub mod server;
pub mod writer;

pub use handler::{ErrResponseFn, ErrorResponse, Handler, JsonHandler, ResponseFn, Route};
pub use into_handler_error::IntoHandlerError;
pub use pattern::{match_pattern, PatternError};
pub use query::{parse_query, QueryParams};
pub use router::MultipleHandler;
pub use server::TestServer;
pub use writer::{Recorder, ResponseWriter};

use thiserror::Error;

/// Media type required for request bodies and set on every JSON response.
pub const APPLICATION_JSON: &str = "application/json";

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("unmatch path: want {want}, got {got}")]
    PathMismatch { want: String, got: String },
    #[error("unmatch method: want {want}, got {got}")]
    MethodMismatch { want: String, got: String },
    #[error("invalid Content-Type: want application/json, got {0}")]
    InvalidContentType(String),
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
    #[error("EOF")]
    EmptyBody,
    #[error("{0}")]
    Response(String),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("not found")]
    NotFound,
    #[error("encode response: {0}")]
    Encode(String),
}

impl HandlerError {
    /// Convenience for response functions: `Err(HandlerError::msg("no such user"))`.
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Response(message.into())
    }
}
