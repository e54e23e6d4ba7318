//! Core types for HTTP request/response handling.
//!
//! - [`Request`] - the per-exchange request view handed to handlers
//! - [`Response`] - HTTP response abstraction with builder pattern
//! - [`RequestError`] - body read failures
//!
//! # Example
//!
//! ```rust,ignore
//! use blazeapi::core::{Request, Response};
//!
//! async fn echo(req: &Request) -> Result<Response, blazeapi::core::RequestError> {
//!     let body = req.body().await?;
//!     Ok(Response::ok(body).with_header("x-echo", "1"))
//! }
//! ```

mod error;
mod query;
mod request;
mod response;

pub use error::RequestError;
pub use query::{form_decode, parse_query_string};
pub use request::Request;
pub use response::{Body, Response, ResponseBuilder};
