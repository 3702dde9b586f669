//! Read-only HTTP front end for Matryoshka containers.
//!
//! Every request path is taken as an inner path. `GET` streams the entry's
//! bytes with a `Content-Length` header, `HEAD` sends the headers alone and
//! unknown paths get 404. The container is read on blocking threads and
//! never modified.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{ServerConfig, DEFAULT_READ_AHEAD};
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use server::MatryoshkaServer;
