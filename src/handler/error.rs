//! Handler failure type.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt::{self, Write as _};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Any failure raised by handler code.
///
/// Every `std::error::Error` converts into it, so handlers can use `?` freely.
/// A backtrace is captured at conversion time (subject to `RUST_BACKTRACE`).
///
/// `HandlerError` deliberately does not implement `std::error::Error`
/// itself; that keeps the blanket `From` impl coherent.
pub struct HandlerError {
    inner: BoxError,
    backtrace: Backtrace,
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

impl HandlerError {
    /// Failure from a plain message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::from_boxed(Box::new(Message(message.to_string())))
    }

    fn from_boxed(inner: BoxError) -> Self {
        Self {
            inner,
            backtrace: Backtrace::capture(),
        }
    }

    /// Failure from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::msg(format!("handler panicked: {}", message))
    }

    #[inline]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// The error and its sources, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &(dyn StdError + 'static)> {
        let first: &(dyn StdError + 'static) = self.inner.as_ref();
        std::iter::successors(Some(first), |&err| err.source())
    }

    /// Try to view the underlying error as `E`.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Formatted failure trace: message, cause chain, then the backtrace
    /// when one was captured.
    pub fn trace(&self) -> String {
        let mut out = String::new();
        let mut chain = self.chain();
        if let Some(top) = chain.next() {
            let _ = write!(out, "{}", top);
        }
        let causes: Vec<_> = chain.collect();
        if !causes.is_empty() {
            out.push_str("\n\nCaused by:");
            for (i, cause) in causes.iter().enumerate() {
                let _ = write!(out, "\n    {}: {}", i, cause);
            }
        }
        if self.backtrace.status() == BacktraceStatus::Captured {
            let _ = write!(out, "\n\nStack backtrace:\n{}", self.backtrace);
        }
        out
    }
}

impl<E> From<E> for HandlerError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::from_boxed(Box::new(err))
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.trace())
    }
}
