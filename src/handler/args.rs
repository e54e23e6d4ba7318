//! Call arguments assembled by the dispatcher.

use std::fmt;

use crate::core::Request;
use crate::routing::{FromParam, ParamError, ParamValue, PathParams};

/// Failure extracting an argument. Surfaces as a handler failure.
#[derive(Debug)]
pub enum ArgError {
    /// The handler asked for a parameter that was not passed.
    Missing(String),
    /// The parameter exists but has the wrong type.
    Invalid { name: String, source: ParamError },
    /// The handler asked for the request without declaring it.
    NoRequest,
}

impl fmt::Display for ArgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgError::Missing(name) => write!(f, "missing argument '{}'", name),
            ArgError::Invalid { name, source } => {
                write!(f, "invalid argument '{}': {}", name, source)
            }
            ArgError::NoRequest => write!(f, "request object was not passed to this handler"),
        }
    }
}

impl std::error::Error for ArgError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArgError::Invalid { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Arguments for one handler call: the accepted path parameters plus,
/// when declared, the request under the reserved `request` name.
#[derive(Debug, Default)]
pub struct Args {
    params: PathParams,
    request: Option<Request>,
}

impl Args {
    pub fn new(params: PathParams, request: Option<Request>) -> Self {
        Self { params, request }
    }

    /// Typed path parameter.
    pub fn param<T: FromParam>(&self, name: &str) -> Result<T, ArgError> {
        let value = self
            .params
            .get(name)
            .ok_or_else(|| ArgError::Missing(name.to_string()))?;
        T::from_param(value).map_err(|source| ArgError::Invalid {
            name: name.to_string(),
            source,
        })
    }

    /// Raw converted value of a path parameter.
    #[inline]
    pub fn raw(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    #[inline]
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn request(&self) -> Result<&Request, ArgError> {
        self.request.as_ref().ok_or(ArgError::NoRequest)
    }

    /// Move the request out, e.g. to hold it across an `await`.
    pub fn take_request(&mut self) -> Result<Request, ArgError> {
        self.request.take().ok_or(ArgError::NoRequest)
    }
}
