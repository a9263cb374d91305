//! Convention-based route discovery for axum.
//!
//! A project's routes directory is scanned once at startup; directory names
//! become path segments and files named after modules supply the route
//! builders, controllers, filters and handlers that compose the final router.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod modules;
pub mod observability;
pub mod routing;

pub use config::ServerConfig;
pub use error::{Result, RouteError};
pub use http::HttpServer;
pub use lifecycle::{mount_routes, Project, Shutdown};
pub use modules::{Endpoint, ErrorResponder, Filter, Filters, Module, ModuleRegistry, ModuleResolver, Verb};
pub use routing::{Node, RouterComposer};
