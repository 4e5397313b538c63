//! A self-contained development server.
//!
//! Requests under the provider's base URL are answered by the provider;
//! everything else is served from a root directory, with `*.py` files and
//! the `cgi-bin`/`htbin` directories executed as CGI scripts.

pub mod cgi;
pub mod directory;
pub mod error;
pub mod options;
pub mod provider;
pub mod responder;
pub mod server;

pub use directory::DirectoryResponder;
pub use error::{Result, SimpleError};
pub use options::{
    DEFAULT_BIND, DEFAULT_INTERPRETER, DEFAULT_PORT, DEFAULT_PREFIX, INTERPRETER_ENV, ServeOptions,
    default_interpreter,
};
pub use provider::ProviderResponder;
pub use responder::{Body, NOT_FOUND_BODY, RequestInfo, Responder};
pub use server::{RequestHandler, serve, serve_nunja, serve_until};
