//! Path template compilation.
//!
//! A template such as `/users/{id:int}/files/{rest:path}` compiles into an
//! anchored regex plus one converter per placeholder.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Placeholder syntax: `{name}` or `{name:type}`.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(\w+)(?::(\w+))?\}").expect("placeholder regex is valid")
});

/// A converted path parameter.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl ParamValue {
    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Str(_) => "str",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{}", x),
        }
    }
}

/// Converts a matched lexeme. `None` means the path does not match.
pub type Converter = fn(&str) -> Option<ParamValue>;

fn convert_str(s: &str) -> Option<ParamValue> {
    Some(ParamValue::Str(s.to_string()))
}

fn convert_int(s: &str) -> Option<ParamValue> {
    s.parse().ok().map(ParamValue::Int)
}

fn convert_float(s: &str) -> Option<ParamValue> {
    s.parse().ok().map(ParamValue::Float)
}

/// Built-in parameter types: (token, lexical form, converter).
const PARAM_TYPES: &[(&str, &str, Converter)] = &[
    ("str", r"[^/]+", convert_str),
    ("int", r"-?[0-9]+", convert_int),
    ("float", r"-?[0-9]+(?:\.[0-9]+)?", convert_float),
    (
        "uuid",
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        convert_str,
    ),
    ("path", r".+", convert_str),
];

fn lookup_type(token: &str) -> Option<(&'static str, Converter)> {
    PARAM_TYPES
        .iter()
        .find(|(name, _, _)| *name == token)
        .map(|(_, regex, conv)| (*regex, *conv))
}

/// Template compilation failure. Raised at registration, never per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadPattern {
    /// `{name:type}` with a type token that is not built in.
    UnknownType { template: String, token: String },
    /// The same placeholder name appears twice.
    DuplicateParam { template: String, name: String },
    /// The generated matcher failed to compile.
    Invalid { template: String, message: String },
}

impl fmt::Display for BadPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BadPattern::UnknownType { template, token } => write!(
                f,
                "unknown path parameter type: '{}' in '{}' (expected one of: str, int, float, uuid, path)",
                token, template
            ),
            BadPattern::DuplicateParam { template, name } => {
                write!(f, "duplicate path parameter '{}' in '{}'", name, template)
            }
            BadPattern::Invalid { template, message } => {
                write!(f, "invalid path template '{}': {}", template, message)
            }
        }
    }
}

impl std::error::Error for BadPattern {}

/// Immutable matcher for one template.
#[derive(Clone, Debug)]
pub struct CompiledPattern {
    regex: Regex,
    /// Converter per capture group, in group order.
    params: Vec<(String, Converter)>,
}

impl CompiledPattern {
    /// Compile a template.
    pub fn compile(template: &str) -> Result<Self, BadPattern> {
        let mut source = String::with_capacity(template.len() + 16);
        let mut params: Vec<(String, Converter)> = Vec::new();
        let mut seen = HashSet::new();
        let mut last_end = 0;

        source.push('^');
        for caps in PLACEHOLDER.captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            source.push_str(&regex::escape(&template[last_end..whole.start()]));

            let name = &caps[1];
            let token = caps.get(2).map_or("str", |m| m.as_str());
            let (lexeme, converter) =
                lookup_type(token).ok_or_else(|| BadPattern::UnknownType {
                    template: template.to_string(),
                    token: token.to_string(),
                })?;

            if !seen.insert(name.to_string()) {
                return Err(BadPattern::DuplicateParam {
                    template: template.to_string(),
                    name: name.to_string(),
                });
            }

            source.push('(');
            source.push_str(lexeme);
            source.push(')');
            params.push((name.to_string(), converter));
            last_end = whole.end();
        }
        source.push_str(&regex::escape(&template[last_end..]));
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| BadPattern::Invalid {
            template: template.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self { regex, params })
    }

    /// Match a concrete path, returning converted parameters.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, ParamValue)>> {
        let caps = self.regex.captures(path)?;
        let mut values = Vec::with_capacity(self.params.len());
        for (i, (name, convert)) in self.params.iter().enumerate() {
            let raw = caps.get(i + 1)?.as_str();
            values.push((name.clone(), convert(raw)?));
        }
        Some(values)
    }

    /// Placeholder names in template order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(name, _)| name.as_str())
    }
}

/// Placeholder names of a template, without compiling it.
pub fn placeholder_names(template: &str) -> HashSet<String> {
    PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}
