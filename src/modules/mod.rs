//! Module values and module resolution.
//!
//! # Data Flow
//! ```text
//! routes/users/index.rs (file on disk)
//!     → ModuleId { key: "users/index", path }
//!     → ModuleResolver::contains (probe while scanning)
//!     → ModuleResolver::load (on require)
//!     → Module (route builder, controller, filter, error responder, endpoint)
//! ```
//!
//! # Design Decisions
//! - Files on disk only mark where a module lives; the values themselves come
//!   from a resolver, typically a registry populated at compile time
//! - The handler "arity" convention is carried by the `Module` variant

pub mod handler;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use axum::handler::Handler;
use axum::response::Response;
use axum::Router;

use crate::error::Result;
use crate::routing::RouterComposer;

pub use handler::{Endpoint, ErrorResponder, Filter, Filters, Verb};
pub use registry::{ExtensionResolver, ModuleId, ModuleRegistry, ModuleResolver};

/// Builds one level of the nested routing tree.
pub type RoutesFn<S> = Arc<dyn Fn(&mut RouterComposer<'_, S>) -> Result<()> + Send + Sync>;

/// Fills a fresh router; receives the collected filters alongside.
pub type ControllerFn<S> = Arc<dyn Fn(Router<S>, &Filters) -> Router<S> + Send + Sync>;

/// The value a module name resolves to.
pub enum Module<S> {
    /// Route builder, arity 1.
    Routes(RoutesFn<S>),
    /// Controller taking a router and the filters, arity 2.
    Controller(ControllerFn<S>),
    /// Request filter, arity 3.
    Filter(Filter),
    /// Error-handling signature, arity 4.
    ErrorResponder(ErrorResponder),
    /// Plain request handler.
    Endpoint(Endpoint<S>),
}

impl<S> Module<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn routes<F>(build: F) -> Self
    where
        F: Fn(&mut RouterComposer<'_, S>) -> Result<()> + Send + Sync + 'static,
    {
        Module::Routes(Arc::new(build))
    }

    pub fn controller<F>(controller: F) -> Self
    where
        F: Fn(Router<S>, &Filters) -> Router<S> + Send + Sync + 'static,
    {
        Module::Controller(Arc::new(controller))
    }

    pub fn endpoint<H, T>(handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        Module::Endpoint(Endpoint::new(handler))
    }

    pub fn error_responder<F>(respond: F) -> Self
    where
        F: Fn(Response) -> Response + Send + Sync + 'static,
    {
        Module::ErrorResponder(ErrorResponder::new(respond))
    }
}

impl<S> Module<S> {
    /// Declared parameter count of the function behind the module; `None` for
    /// endpoints.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Module::Routes(_) => Some(1),
            Module::Controller(_) => Some(2),
            Module::Filter(_) => Some(3),
            Module::ErrorResponder(_) => Some(4),
            Module::Endpoint(_) => None,
        }
    }

    /// Mountable as a controller (arity below 3).
    pub fn is_controller(&self) -> bool {
        self.arity().is_some_and(|arity| arity < 3)
    }

    /// Collectable as a filter (arity exactly 3).
    pub fn is_filter(&self) -> bool {
        self.arity() == Some(3)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Module::Routes(_) => "route builder",
            Module::Controller(_) => "controller",
            Module::Filter(_) => "filter",
            Module::ErrorResponder(_) => "error responder",
            Module::Endpoint(_) => "endpoint",
        }
    }
}

impl<S> Clone for Module<S> {
    fn clone(&self) -> Self {
        match self {
            Module::Routes(build) => Module::Routes(Arc::clone(build)),
            Module::Controller(controller) => Module::Controller(Arc::clone(controller)),
            Module::Filter(filter) => Module::Filter(filter.clone()),
            Module::ErrorResponder(respond) => Module::ErrorResponder(respond.clone()),
            Module::Endpoint(endpoint) => Module::Endpoint(endpoint.clone()),
        }
    }
}

impl<S> fmt::Debug for Module<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Module").field(&self.kind()).finish()
    }
}

impl<S> From<Filter> for Module<S> {
    fn from(filter: Filter) -> Self {
        Module::Filter(filter)
    }
}

impl<S> From<ErrorResponder> for Module<S> {
    fn from(respond: ErrorResponder) -> Self {
        Module::ErrorResponder(respond)
    }
}

impl<S> From<Endpoint<S>> for Module<S> {
    fn from(endpoint: Endpoint<S>) -> Self {
        Module::Endpoint(endpoint)
    }
}
