//! Type-erased handler values a module name can resolve to.
//!
//! # Responsibilities
//! - Carry request handlers independently of the HTTP method they end up on
//! - Carry request filters (middleware) and error responders
//! - Turn them into axum method routers and layers at registration time
//!
//! # Design Decisions
//! - Everything is `Arc`-backed so module values clone cheaply out of a registry
//! - Filters run as `axum::middleware::from_fn` layers
//! - Error responders are filters that only touch 4xx/5xx responses

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::extract::Request;
use axum::handler::Handler;
use axum::middleware::{from_fn, Next};
use axum::response::Response;
use axum::routing::{self, MethodRouter};
use axum::Router;
use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;

/// HTTP verbs accepted by the routing DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
    /// Catch-all, matches every method.
    All,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
            Verb::Patch => "PATCH",
            Verb::Head => "HEAD",
            Verb::Options => "OPTIONS",
            Verb::Trace => "TRACE",
            Verb::All => "ALL",
        }
    }

    /// Two registrations on the same path collide when their verbs overlap.
    pub fn overlaps(self, other: Verb) -> bool {
        self == other || self == Verb::All || other == Verb::All
    }

    fn method_router<H, T, S>(self, handler: H) -> MethodRouter<S>
    where
        H: Handler<T, S>,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        match self {
            Verb::Get => routing::get(handler),
            Verb::Post => routing::post(handler),
            Verb::Put => routing::put(handler),
            Verb::Delete => routing::delete(handler),
            Verb::Patch => routing::patch(handler),
            Verb::Head => routing::head(handler),
            Verb::Options => routing::options(handler),
            Verb::Trace => routing::trace(handler),
            Verb::All => routing::any(handler),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request handler not yet bound to a method.
pub struct Endpoint<S> {
    make: Arc<dyn Fn(Verb) -> MethodRouter<S> + Send + Sync>,
}

impl<S> Endpoint<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Wrap any axum handler.
    pub fn new<H, T>(handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        Self {
            make: Arc::new(move |verb| verb.method_router(handler.clone())),
        }
    }

    pub(crate) fn method_router(&self, verb: Verb) -> MethodRouter<S> {
        (self.make)(verb)
    }
}

impl<S> Clone for Endpoint<S> {
    fn clone(&self) -> Self {
        Self {
            make: Arc::clone(&self.make),
        }
    }
}

impl<S> fmt::Debug for Endpoint<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint").finish_non_exhaustive()
    }
}

type FilterFn = dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync;

/// Request middleware: sees the request, decides whether and how to call the rest
/// of the chain.
#[derive(Clone)]
pub struct Filter {
    run: Arc<FilterFn>,
}

impl Filter {
    pub fn new<F, Fut>(filter: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self {
            run: Arc::new(move |request, next| filter(request, next).boxed()),
        }
    }

    /// Restrict the filter to requests at `prefix` or below it. Other requests
    /// pass straight through.
    pub fn scoped(self, prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/').to_owned();
        if prefix.is_empty() {
            return self;
        }

        let inner = self.run;
        Self {
            run: Arc::new(move |request, next| {
                if is_under(request.uri().path(), &prefix) {
                    inner(request, next)
                } else {
                    next.run(request).boxed()
                }
            }),
        }
    }

    /// Layer the filter over every route of `router`.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let run = Arc::clone(&self.run);
        router.layer(from_fn(move |request: Request, next: Next| run(request, next)))
    }

    /// Layer the filter over a single method router.
    pub fn apply_to_route<S>(&self, route: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let run = Arc::clone(&self.run);
        route.layer(from_fn(move |request: Request, next: Next| run(request, next)))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").finish_non_exhaustive()
    }
}

fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Rewrites responses carrying a client or server error status.
#[derive(Clone)]
pub struct ErrorResponder {
    respond: Arc<dyn Fn(Response) -> Response + Send + Sync>,
}

impl ErrorResponder {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(Response) -> Response + Send + Sync + 'static,
    {
        Self {
            respond: Arc::new(respond),
        }
    }

    pub fn into_filter(self) -> Filter {
        let respond = self.respond;
        Filter::new(move |request: Request, next: Next| {
            let respond = Arc::clone(&respond);
            async move {
                let response = next.run(request).await;
                let status = response.status();
                if status.is_client_error() || status.is_server_error() {
                    respond(response)
                } else {
                    response
                }
            }
        })
    }
}

impl fmt::Debug for ErrorResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorResponder").finish_non_exhaustive()
    }
}

/// Named filters handed to controllers as an auxiliary argument.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    entries: BTreeMap<String, Filter>,
}

impl Filters {
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Returns the filter previously registered under `name`, if any.
    pub fn insert(&mut self, name: impl Into<String>, filter: Filter) -> Option<Filter> {
        self.entries.insert(name.into(), filter)
    }

    pub fn get(&self, name: &str) -> Option<&Filter> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_overlap() {
        assert!(Verb::Get.overlaps(Verb::Get));
        assert!(Verb::All.overlaps(Verb::Post));
        assert!(Verb::Delete.overlaps(Verb::All));
        assert!(!Verb::Get.overlaps(Verb::Post));
    }

    #[test]
    fn test_prefix_scope() {
        assert!(is_under("/admin", "/admin"));
        assert!(is_under("/admin/users", "/admin"));
        assert!(!is_under("/administrator", "/admin"));
        assert!(!is_under("/", "/admin"));
    }

    #[test]
    fn test_filters_override() {
        let mut filters = Filters::new();
        let pass = || Filter::new(|request: Request, next: Next| next.run(request));

        assert!(filters.insert("auth", pass()).is_none());
        assert!(filters.insert("auth", pass()).is_some());
        assert_eq!(filters.len(), 1);
        assert_eq!(filters.names().collect::<Vec<_>>(), vec!["auth"]);
    }
}
