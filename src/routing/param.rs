//! Typed extraction of converted path parameters.

use std::fmt;

use uuid::Uuid;

use super::ParamValue;

/// Failure converting a [`ParamValue`] into a handler's argument type.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamError {
    pub expected: &'static str,
    pub found: ParamValue,
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {}, found {} value '{}'",
            self.expected,
            self.found.type_name(),
            self.found
        )
    }
}

impl std::error::Error for ParamError {}

/// Types a path parameter can be extracted as.
pub trait FromParam: Sized {
    fn from_param(value: &ParamValue) -> Result<Self, ParamError>;
}

fn mismatch<T>(expected: &'static str, value: &ParamValue) -> Result<T, ParamError> {
    Err(ParamError {
        expected,
        found: value.clone(),
    })
}

impl FromParam for ParamValue {
    fn from_param(value: &ParamValue) -> Result<Self, ParamError> {
        Ok(value.clone())
    }
}

impl FromParam for String {
    fn from_param(value: &ParamValue) -> Result<Self, ParamError> {
        match value {
            ParamValue::Str(s) => Ok(s.clone()),
            other => mismatch("str", other),
        }
    }
}

impl FromParam for i64 {
    fn from_param(value: &ParamValue) -> Result<Self, ParamError> {
        match value {
            ParamValue::Int(i) => Ok(*i),
            other => mismatch("int", other),
        }
    }
}

impl FromParam for i32 {
    fn from_param(value: &ParamValue) -> Result<Self, ParamError> {
        match value {
            ParamValue::Int(i) => i32::try_from(*i).or_else(|_| mismatch("i32", value)),
            other => mismatch("int", other),
        }
    }
}

impl FromParam for u64 {
    fn from_param(value: &ParamValue) -> Result<Self, ParamError> {
        match value {
            ParamValue::Int(i) => u64::try_from(*i).or_else(|_| mismatch("u64", value)),
            other => mismatch("int", other),
        }
    }
}

impl FromParam for f64 {
    fn from_param(value: &ParamValue) -> Result<Self, ParamError> {
        match value {
            ParamValue::Float(x) => Ok(*x),
            // int lexemes are valid floats
            ParamValue::Int(i) => Ok(*i as f64),
            other => mismatch("float", other),
        }
    }
}

impl FromParam for Uuid {
    fn from_param(value: &ParamValue) -> Result<Self, ParamError> {
        match value {
            ParamValue::Str(s) => Uuid::parse_str(s).or_else(|_| mismatch("uuid", value)),
            other => mismatch("uuid", other),
        }
    }
}
