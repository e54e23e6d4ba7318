//! Author-supplied type descriptors for handler parameters and return values.

use std::fmt;

/// Declared type of a parameter or return value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDesc {
    Str,
    Int,
    Float,
    Bool,
    Bytes,
    /// Raw mapping (e.g. `serde_json::Map`, `HashMap`).
    Map,
    /// Raw sequence.
    List,
    Uuid,
    Any,
    /// The request object.
    Request,
    /// A response-family type, by name.
    Response(String),
    /// A structured, model-shaped type, by name.
    Model(String),
}

impl TypeDesc {
    /// Descriptor for a serde model type, named after the Rust type.
    ///
    /// Only user-defined types become [`TypeDesc::Model`]. Standard
    /// collections, strings, numbers and `serde_json::Value` map to the
    /// matching primitive descriptor, and `Box`, `Option`, `Arc` and `Rc`
    /// are looked through.
    pub fn model<T: ?Sized>() -> Self {
        describe(std::any::type_name::<T>())
    }

    /// Descriptor for [`crate::core::Response`].
    pub fn response() -> Self {
        TypeDesc::Response("Response".to_string())
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        matches!(self, TypeDesc::Response(_))
    }

    #[inline]
    pub fn is_model(&self) -> bool {
        matches!(self, TypeDesc::Model(_))
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Str => f.write_str("str"),
            TypeDesc::Int => f.write_str("int"),
            TypeDesc::Float => f.write_str("float"),
            TypeDesc::Bool => f.write_str("bool"),
            TypeDesc::Bytes => f.write_str("bytes"),
            TypeDesc::Map => f.write_str("dict"),
            TypeDesc::List => f.write_str("list"),
            TypeDesc::Uuid => f.write_str("UUID"),
            TypeDesc::Any => f.write_str("Any"),
            TypeDesc::Request => f.write_str("Request"),
            TypeDesc::Response(name) | TypeDesc::Model(name) => f.write_str(name),
        }
    }
}

/// Descriptor for a full type name as produced by `std::any::type_name`.
fn describe(full: &str) -> TypeDesc {
    let full = full.trim().trim_start_matches('&').trim_start_matches("mut ").trim();
    if full.starts_with('[') {
        return TypeDesc::List;
    }
    if full.starts_with('(') {
        return if full == "()" { TypeDesc::Any } else { TypeDesc::List };
    }

    let (base, generics) = match full.find('<') {
        Some(i) => (&full[..i], full[i + 1..].strip_suffix('>').unwrap_or(&full[i + 1..])),
        None => (full, ""),
    };
    let name = base.rsplit("::").next().unwrap_or(base);

    match name {
        "Box" | "Option" | "Arc" | "Rc" if !generics.is_empty() => describe(generics),
        "HashMap" | "BTreeMap" | "IndexMap" => TypeDesc::Map,
        "Map" if base.starts_with("serde_json::") => TypeDesc::Map,
        "Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" | "BinaryHeap" => TypeDesc::List,
        "String" | "str" | "Cow" => TypeDesc::Str,
        "Value" if base.starts_with("serde_json::") => TypeDesc::Any,
        "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64" | "u128"
        | "usize" => TypeDesc::Int,
        "f32" | "f64" => TypeDesc::Float,
        "bool" => TypeDesc::Bool,
        "Bytes" if base.starts_with("bytes::") => TypeDesc::Bytes,
        "Uuid" if base.starts_with("uuid::") => TypeDesc::Uuid,
        "Response" if base.starts_with("blazeapi::") => TypeDesc::response(),
        "Request" if base.starts_with("blazeapi::") => TypeDesc::Request,
        _ => TypeDesc::Model(name.to_string()),
    }
}

/// One declared parameter. `ty` is `None` when the author left it untyped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeDesc>,
}

/// Declared shape of a handler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub returns: Option<TypeDesc>,
}

impl Signature {
    pub const REQUEST_PARAM: &'static str = "request";

    /// Whether a parameter literally named `request` is declared.
    pub fn wants_request(&self) -> bool {
        self.params.iter().any(|p| p.name == Self::REQUEST_PARAM)
    }

    /// Declared parameter names, excluding `request`.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .map(|p| p.name.as_str())
            .filter(|name| *name != Self::REQUEST_PARAM)
    }

    pub(crate) fn push(&mut self, name: &str, ty: Option<TypeDesc>) {
        match self.params.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.ty = ty,
            None => self.params.push(Param {
                name: name.to_string(),
                ty,
            }),
        }
    }
}
