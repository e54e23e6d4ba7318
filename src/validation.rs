//! Strict-mode handler signature validation.
//!
//! Evaluated once per registration when strict mode is on. The rules live in
//! [`RULES`] and run in order; the first violation rejects the handler and
//! the route is never added.

use std::collections::HashSet;
use std::fmt;

use crate::handler::{Param, Signature, TypeDesc};
use crate::routing::placeholder_names;

/// A strict-mode violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureError {
    pub handler: String,
    pub method: String,
    pub path: String,
    /// Rule identifier, e.g. `missing-return`.
    pub code: &'static str,
    /// The offending declaration, when there is one.
    pub current: Option<String>,
    pub problem: String,
    pub fix: String,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "strict-mode violation in handler '{}' [{} {}]",
            self.handler, self.method, self.path
        )?;
        if let Some(current) = &self.current {
            writeln!(f, "  Current: {}", current)?;
        }
        writeln!(f, "  Problem: {}", self.problem)?;
        write!(f, "  Fix:     {}", self.fix)
    }
}

impl std::error::Error for SignatureError {}

/// What a rule sees.
pub struct RuleInput<'a> {
    pub signature: &'a Signature,
    pub path_params: &'a HashSet<String>,
}

/// A rule's finding, before it is attached to a handler and route.
#[derive(Debug)]
pub struct Violation {
    pub current: Option<String>,
    pub problem: String,
    pub fix: String,
}

type Check = fn(&RuleInput<'_>) -> Option<Violation>;
type ParamCheck = fn(&RuleInput<'_>, &Param) -> Option<Violation>;

/// Rules about the declared return type, evaluated in order.
pub const RULES: &[(&str, Check)] = &[
    ("missing-return", missing_return),
    ("unstructured-return", unstructured_return),
];

/// Rules applied to each parameter in declaration order; all of them run
/// on one parameter before the next is looked at.
pub const PARAM_RULES: &[(&str, ParamCheck)] = &[
    ("untyped-param", untyped_param),
    ("non-model-param", non_model_param),
];

/// Check a handler against [`RULES`], then every parameter against
/// [`PARAM_RULES`].
pub fn validate(
    handler: &str,
    method: &str,
    path: &str,
    signature: &Signature,
) -> Result<(), SignatureError> {
    let path_params = placeholder_names(path);
    let input = RuleInput {
        signature,
        path_params: &path_params,
    };
    let reject = |code: &'static str, v: Violation| SignatureError {
        handler: handler.to_string(),
        method: method.to_ascii_uppercase(),
        path: path.to_string(),
        code,
        current: v.current,
        problem: v.problem,
        fix: v.fix,
    };

    for &(code, check) in RULES {
        if let Some(v) = check(&input) {
            return Err(reject(code, v));
        }
    }
    for param in plain_params(&input) {
        for &(code, check) in PARAM_RULES {
            if let Some(v) = check(&input, param) {
                return Err(reject(code, v));
            }
        }
    }
    Ok(())
}

fn missing_return(input: &RuleInput<'_>) -> Option<Violation> {
    if input.signature.returns.is_some() {
        return None;
    }
    Some(Violation {
        current: None,
        problem: "Missing return type annotation.".to_string(),
        fix: "Declare a return type with .returns(TypeDesc::response()) or .returns(TypeDesc::model::<T>()).".to_string(),
    })
}

fn unstructured_return(input: &RuleInput<'_>) -> Option<Violation> {
    let ret = input.signature.returns.as_ref()?;
    if ret.is_response() || ret.is_model() {
        return None;
    }
    Some(Violation {
        current: Some(format!("-> {}", ret)),
        problem: "Return type must be a Response type or a structured model; primitives such as dict, list, str and int are rejected.".to_string(),
        fix: "Return a Response, or a serde model declared with TypeDesc::model::<T>().".to_string(),
    })
}

/// Declared parameters other than `request`.
fn plain_params<'a>(input: &'a RuleInput<'_>) -> impl Iterator<Item = &'a Param> {
    input
        .signature
        .params
        .iter()
        .filter(|p| p.name != Signature::REQUEST_PARAM)
}

fn untyped_param(_input: &RuleInput<'_>, param: &Param) -> Option<Violation> {
    if param.ty.is_some() {
        return None;
    }
    Some(Violation {
        current: Some(param.name.clone()),
        problem: format!("Parameter '{}' has no type annotation.", param.name),
        fix: format!(
            "Declare it with .param(\"{0}\", TypeDesc::Int) or .param(\"{0}\", TypeDesc::model::<T>()).",
            param.name
        ),
    })
}

fn non_model_param(input: &RuleInput<'_>, param: &Param) -> Option<Violation> {
    if input.path_params.contains(&param.name) {
        return None;
    }
    let ty = param.ty.as_ref().filter(|ty| !ty.is_model())?;

    Some(Violation {
        current: Some(format!("{}: {}", param.name, ty)),
        problem: format!(
            "Non-path parameter '{}' must be a structured model; primitives such as dict, list, str and int are rejected.",
            param.name
        ),
        fix: format!(
            "Group the fields of '{}' into a serde model and declare it with TypeDesc::model::<T>().",
            param.name
        ),
    })
}
