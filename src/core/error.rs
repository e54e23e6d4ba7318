//! Request-side error types.

use std::fmt;

/// Errors raised while reading a request body.
#[derive(Debug)]
pub enum RequestError {
    /// The client disconnected before the body was complete.
    Disconnected,

    /// The body is not valid JSON for the requested type.
    Json(serde_json::Error),

    /// `blocking_body` was called on a request built outside a runtime.
    NoRuntime,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Disconnected => write!(f, "client disconnected before body was complete"),
            RequestError::Json(e) => write!(f, "invalid JSON body: {}", e),
            RequestError::NoRuntime => write!(f, "no async runtime available to read the body"),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(e: serde_json::Error) -> Self {
        RequestError::Json(e)
    }
}
