//! Request routing with typed path parameters.
//!
//! Routes are kept in declaration order and matched first-match-wins:
//!
//! ```rust,ignore
//! use blazeapi::routing::Router;
//!
//! let mut router = Router::new();
//! router.add_route("GET", "/users/{id:int}", "get_user")?;
//! let found = router.lookup("get", "/users/42").unwrap();
//! assert_eq!(*found.route.handler(), "get_user");
//! ```

mod param;
mod pattern;

pub use param::{FromParam, ParamError};
pub use pattern::{placeholder_names, BadPattern, CompiledPattern, Converter, ParamValue};

use std::collections::HashMap;
use std::fmt;

/// Converted path parameters of one match.
pub type PathParams = HashMap<String, ParamValue>;

/// One (method, template, handler) triple.
#[derive(Clone)]
pub struct Route<H> {
    method: String,
    path: String,
    pattern: CompiledPattern,
    handler: H,
}

impl<H> Route<H> {
    /// Compile a route. The method is stored upper-cased.
    pub fn new(method: &str, path: &str, handler: H) -> Result<Self, BadPattern> {
        Ok(Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            pattern: CompiledPattern::compile(path)?,
            handler,
        })
    }

    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The template as registered.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    #[inline]
    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    /// Converted parameters if `path` matches this route's template.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        self.pattern
            .matches(path)
            .map(|values| values.into_iter().collect())
    }
}

impl<H> fmt::Debug for Route<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Route({:?}, {:?})", self.method, self.path)
    }
}

/// A successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
    pub route: &'a Route<H>,
    pub params: PathParams,
}

/// Ordered, append-only collection of routes.
#[derive(Clone)]
pub struct Router<H> {
    routes: Vec<Route<H>>,
}

impl<H> Router<H> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Compile and append a route.
    pub fn add_route(&mut self, method: &str, path: &str, handler: H) -> Result<&Route<H>, BadPattern> {
        let route = Route::new(method, path, handler)?;
        self.routes.push(route);
        Ok(&self.routes[self.routes.len() - 1])
    }

    /// First route in registration order matching `method` and `path`.
    ///
    /// Method comparison is case-insensitive. No match is not an error.
    pub fn lookup(&self, method: &str, path: &str) -> Option<RouteMatch<'_, H>> {
        self.routes
            .iter()
            .filter(|route| route.method.eq_ignore_ascii_case(method))
            .find_map(|route| route.matches(path).map(|params| RouteMatch { route, params }))
    }

    pub fn routes(&self) -> &[Route<H>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for Router<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.routes.iter()).finish()
    }
}
