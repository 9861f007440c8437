//! Error conversion for response functions.
//!
//! A response function returning `Err` produces a 400 whose `Message` is the
//! error text, so any std error can be surfaced to the client as-is.

use crate::HandlerError;

/// Turn a foreign error into [`HandlerError::Response`], keeping its message:
///
/// ```ignore
/// let id: u64 = params[0].parse().map_err(IntoHandlerError::into_handler_error)?;
/// ```
pub trait IntoHandlerError {
    fn into_handler_error(self) -> HandlerError;
}

impl<E: std::error::Error + Send + Sync + 'static> IntoHandlerError for E {
    fn into_handler_error(self) -> HandlerError {
        HandlerError::Response(self.to_string())
    }
}
