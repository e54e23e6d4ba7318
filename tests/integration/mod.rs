//! Integration tests for blazeapi
//!
//! Most tests drive the application in process through `TestClient`;
//! `server` binds an ephemeral port and talks HTTP with reqwest.

mod concurrency;
mod dispatch;
mod helpers;
mod middleware;
mod server;
mod strict;
