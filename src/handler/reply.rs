//! Handler return values and their normalization into responses.

use serde::Serialize;
use serde_json::Value;

use super::HandlerError;
use crate::core::Response;

/// What a handler produced.
#[derive(Debug)]
pub enum Reply {
    /// Sent as-is.
    Response(Response),
    /// Mapping or sequence, sent as JSON with status 200.
    Structured(Value),
    /// Anything else, sent as its text with status 200.
    Other(String),
}

impl Reply {
    /// Reply with a serde model.
    pub fn model<T: Serialize + ?Sized>(value: &T) -> Result<Self, HandlerError> {
        Ok(Reply::Structured(serde_json::to_value(value)?))
    }

    /// Turn this reply into a wire response.
    pub fn into_response(self) -> Response {
        match self {
            Reply::Response(res) => res,
            Reply::Structured(value) => match Response::json(&value) {
                Ok(res) => res,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode structured reply");
                    Response::internal_error()
                }
            },
            Reply::Other(text) => Response::text(text),
        }
    }
}

impl From<Response> for Reply {
    fn from(res: Response) -> Self {
        Reply::Response(res)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(_) | Value::Array(_) => Reply::Structured(value),
            Value::String(s) => Reply::Other(s),
            other => Reply::Other(other.to_string()),
        }
    }
}

impl From<String> for Reply {
    fn from(s: String) -> Self {
        Reply::Other(s)
    }
}

impl From<&str> for Reply {
    fn from(s: &str) -> Self {
        Reply::Other(s.to_string())
    }
}

macro_rules! reply_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Reply {
                fn from(v: $ty) -> Self {
                    Reply::Other(v.to_string())
                }
            }
        )*
    };
}

reply_from_display!(i32, i64, u32, u64, usize, f64, bool);
