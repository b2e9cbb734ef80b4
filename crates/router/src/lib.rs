//! A request lifecycle kernel for HTTP applications
//!
//! This crate turns declarative route files into a compiled route table, caches that table (and
//! the merged application config) on disk, and dispatches requests through per-route middleware
//! pipelines. It does not own a socket: the host server hands over an `http::Request` and sends
//! back the returned `http::Response`.
//!
//! The main pieces are:
//! - [`pattern`]: compiles `/users/{id}` style patterns and builds URLs from them
//! - [`route`]: route definitions, groups and route files
//! - [`cache`]: fingerprinted route caches and the debug/production staleness policy
//! - [`config`]: layered TOML configuration and its cache
//! - [`router`]: first-match-wins dispatch with 404/405 fallbacks
//! - [`middleware`]: onion-style middleware composed around the route handler
//! - [`kernel`]: the boot sequence tying it all together

mod body;
mod handler;
mod request;

pub mod cache;
pub mod config;
pub mod error;
pub mod kernel;
pub mod logging;
pub mod middleware;
pub mod pattern;
pub mod registry;
pub mod route;
pub mod router;

pub use body::Response;
pub use body::ResponseBody;
pub use cache::RuntimeMode;
pub use error::BoxError;
pub use handler::FnHandler;
pub use handler::HandlerResult;
pub use handler::RequestHandler;
pub use handler::handler_fn;
pub use kernel::Kernel;
pub use middleware::Middleware;
pub use middleware::Next;
pub use request::MatchedRoute;
pub use request::PathParams;
pub use request::Request;
pub use router::Router;
