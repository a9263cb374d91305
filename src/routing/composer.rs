//! Nested routing DSL.
//!
//! # Responsibilities
//! - Register handlers per verb at paths relative to one directory level
//! - Resolve handler names against the directory node the level is bound to
//! - Compose child levels and mount their routers under the route name
//!
//! # Design Decisions
//! - A route builder receives the child composer as an explicit argument
//! - Mounting happens when `route` returns; there is no separate phase
//! - Conflicting registrations fail with a validation error instead of
//!   reaching the router, which would panic
//! - A controller's routes are opaque, so its whole mount path is reserved
//! - Middleware is applied when a level is mounted, first registration outermost
//! - Composers borrow their nodes, so destroying the FileTree is left to its owner

use std::collections::BTreeMap;
use std::fmt;

use axum::Router;

use crate::error::{Result, RouteError};
use crate::modules::{Filter, Filters, Module, Verb};
use crate::routing::args::{Arg, Args};
use crate::routing::node::{Node, INDEX};
use crate::routing::table::{
    catch_rejection, join_paths, mount_path_for, validate_name, validate_path, RouteEntry, RouteTable,
};

static NO_FILTERS: Filters = Filters::new();

/// One level of the nested routing DSL.
pub struct RouterComposer<'n, S> {
    node: &'n Node<S>,
    filters: &'n Filters,
    name: String,
    /// Absolute mount path of this level.
    mount_path: String,
    children: BTreeMap<String, RouterComposer<'n, S>>,
    router: Option<Router<S>>,
    table: RouteTable,
    mounts: Vec<String>,
    middleware: Vec<Filter>,
    destroyed: bool,
}

enum Builder<S> {
    Routes(crate::modules::RoutesFn<S>),
    Controller(crate::modules::ControllerFn<S>),
}

impl<'n, S> RouterComposer<'n, S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Root composer bound to `node`, without filters.
    pub fn new(node: &'n Node<S>) -> Result<Self> {
        Self::with_filters(node, &NO_FILTERS)
    }

    /// Root composer bound to `node`; `filters` are visible at every level.
    pub fn with_filters(node: &'n Node<S>, filters: &'n Filters) -> Result<Self> {
        Self::rooted_at(node, filters, "/")
    }

    pub(crate) fn rooted_at(node: &'n Node<S>, filters: &'n Filters, mount_path: &str) -> Result<Self> {
        if node.is_destroyed() {
            return Err(RouteError::IllegalState(
                "can not compose routes over a destroyed node",
            ));
        }
        Ok(Self::build(node, filters, "/", mount_path.to_owned()))
    }

    fn build(node: &'n Node<S>, filters: &'n Filters, name: &str, mount_path: String) -> Self {
        Self {
            node,
            filters,
            name: name.to_owned(),
            mount_path,
            children: BTreeMap::new(),
            router: Some(Router::new()),
            table: RouteTable::new(),
            mounts: Vec::new(),
            middleware: Vec::new(),
            destroyed: false,
        }
    }

    /// Register a GET handler.
    pub fn get(&mut self, path: &str, args: impl Into<Args<S>>) -> Result<&mut Self> {
        self.register(Verb::Get, path, args)
    }

    pub fn post(&mut self, path: &str, args: impl Into<Args<S>>) -> Result<&mut Self> {
        self.register(Verb::Post, path, args)
    }

    pub fn put(&mut self, path: &str, args: impl Into<Args<S>>) -> Result<&mut Self> {
        self.register(Verb::Put, path, args)
    }

    pub fn delete(&mut self, path: &str, args: impl Into<Args<S>>) -> Result<&mut Self> {
        self.register(Verb::Delete, path, args)
    }

    pub fn patch(&mut self, path: &str, args: impl Into<Args<S>>) -> Result<&mut Self> {
        self.register(Verb::Patch, path, args)
    }

    pub fn head(&mut self, path: &str, args: impl Into<Args<S>>) -> Result<&mut Self> {
        self.register(Verb::Head, path, args)
    }

    pub fn options(&mut self, path: &str, args: impl Into<Args<S>>) -> Result<&mut Self> {
        self.register(Verb::Options, path, args)
    }

    pub fn trace(&mut self, path: &str, args: impl Into<Args<S>>) -> Result<&mut Self> {
        self.register(Verb::Trace, path, args)
    }

    /// Register a handler for every method.
    pub fn all(&mut self, path: &str, args: impl Into<Args<S>>) -> Result<&mut Self> {
        self.register(Verb::All, path, args)
    }

    /// Register a handler for `verb` at `path`.
    ///
    /// The last argument must resolve to an endpoint. Earlier arguments must
    /// resolve to filters or error responders and wrap that endpoint only, the
    /// first one outermost.
    pub fn register(&mut self, verb: Verb, path: &str, args: impl Into<Args<S>>) -> Result<&mut Self> {
        self.ensure_alive()?;
        validate_path(path)?;

        let mut modules = self.resolve_args(args.into())?;
        let endpoint = match modules.pop() {
            Some(Module::Endpoint(endpoint)) => endpoint,
            Some(other) => {
                return Err(RouteError::validation(format!(
                    "last handler of {verb} '{path}' must be an endpoint, found a {}",
                    other.kind()
                )))
            }
            None => {
                return Err(RouteError::validation(format!(
                    "{verb} '{path}' needs at least one handler"
                )))
            }
        };

        let mut method_router = endpoint.method_router(verb);
        for module in modules.into_iter().rev() {
            method_router = into_filter(module, path)?.apply_to_route(method_router);
        }

        let entry = RouteEntry::new(verb, path);
        self.table.check(&entry, &self.mount_path)?;

        tracing::debug!(mount_path = %self.mount_path, route = %entry, "Assigning route");

        self.update_router(&entry, |router| router.route(path, method_router))?;
        self.table.insert(entry);
        Ok(self)
    }

    /// Apply filters or error responders to every route of this level.
    pub fn middleware(&mut self, args: impl Into<Args<S>>) -> Result<&mut Self> {
        self.middleware_at("/", args)
    }

    /// Apply filters or error responders to requests at `path` or below it.
    pub fn middleware_at(&mut self, path: &str, args: impl Into<Args<S>>) -> Result<&mut Self> {
        self.ensure_alive()?;
        validate_path(path)?;

        let modules = self.resolve_args(args.into())?;
        if modules.is_empty() {
            return Err(RouteError::validation(format!(
                "middleware at '{path}' needs at least one filter"
            )));
        }

        for module in modules {
            let filter = into_filter(module, path)?.scoped(path);
            tracing::debug!(mount_path = %self.mount_path, path, "Assigning middleware");
            self.middleware.push(filter);
        }

        Ok(self)
    }

    /// Compose the child level `name`.
    ///
    /// `/` binds the child to this level's directory. Any other name binds it to
    /// the child directory of that name; when `handler` is a module name and no
    /// such directory exists, the directory named like the handler is tried
    /// next. The handler then builds the child, whose router is mounted at
    /// `/name`.
    pub fn route(&mut self, name: &str, handler: impl Into<Arg<S>>) -> Result<&RouterComposer<'n, S>> {
        self.ensure_alive()?;
        validate_name(name)?;

        if self.children.contains_key(name) {
            return Err(RouteError::validation(format!(
                "route '{name}' is already composed in '{}'",
                self.mount_path
            )));
        }

        let (node, module) = match handler.into() {
            Arg::Named(handler_name) => {
                let module = self.node.require(&handler_name)?;
                let node = match self.lookup_node(name)? {
                    Some(node) => node,
                    None => self
                        .lookup_node(&handler_name)?
                        .ok_or_else(|| self.missing_node(name))?,
                };
                (node, module)
            }
            Arg::Module(module) => {
                let node = self.lookup_node(name)?.ok_or_else(|| self.missing_node(name))?;
                (node, module)
            }
        };

        let builder = match module {
            Module::Routes(build) => Builder::Routes(build),
            Module::Controller(controller) => Builder::Controller(controller),
            other => {
                return Err(RouteError::validation(format!(
                    "handler of route '{name}' must be a route builder or a controller, found a {}",
                    other.kind()
                )))
            }
        };

        let path = mount_path_for(name);
        let mut child = Self::build(node, self.filters, name, join_paths(&self.mount_path, &path));

        tracing::debug!(name, mount_path = %child.mount_path, "Creating child router composer");

        match builder {
            Builder::Routes(build) => build(&mut child)?,
            Builder::Controller(controller) => {
                let router = child.take_raw_router()?;
                child.router = Some(controller(router, self.filters));
                child.table.claim("/");
            }
        }

        self.mount(&path, &mut child)?;
        self.children.insert(name.to_owned(), child);

        match self.children.get(name) {
            Some(child) => Ok(child),
            None => Err(RouteError::IllegalState("composed child vanished")),
        }
    }

    /// Shorthand for `route("/", handler)`.
    pub fn route_index(&mut self, handler: impl Into<Arg<S>>) -> Result<&RouterComposer<'n, S>> {
        self.route("/", handler)
    }

    /// Finish this level: apply its middleware and hand out the router.
    pub fn take_router(&mut self) -> Result<Router<S>> {
        self.ensure_alive()?;
        let mut router = self.take_raw_router()?;

        for filter in self.middleware.drain(..).rev() {
            router = filter.apply(router);
        }

        Ok(router)
    }

    /// Tear down this level and every child level below it, children first.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        for child in self.children.values_mut() {
            child.destroy();
        }

        tracing::debug!(mount_path = %self.mount_path, "Destroying router composer");

        self.children.clear();
        self.router = None;
        self.table.clear();
        self.mounts.clear();
        self.middleware.clear();
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    pub fn node(&self) -> Result<&'n Node<S>> {
        self.ensure_alive()?;
        Ok(self.node)
    }

    /// Filters collected at startup.
    pub fn filters(&self) -> &'n Filters {
        self.filters
    }

    /// Routes registered at this level and below, relative to this level.
    pub fn routes(&self) -> Result<&[RouteEntry]> {
        self.ensure_alive()?;
        Ok(self.table.entries())
    }

    pub fn child(&self, name: &str) -> Result<&RouterComposer<'n, S>> {
        self.ensure_alive()?;
        self.children.get(name).ok_or_else(|| RouteError::NotFound {
            searched: "child route",
            name: name.to_owned(),
            location: self.mount_path.clone(),
        })
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            return Err(RouteError::IllegalState("router composer has been destroyed"));
        }
        Ok(())
    }

    fn take_raw_router(&mut self) -> Result<Router<S>> {
        self.router
            .take()
            .ok_or(RouteError::IllegalState("router has already been handed out"))
    }

    fn resolve_args(&self, args: Args<S>) -> Result<Vec<Module<S>>> {
        args.into_iter()
            .map(|arg| match arg {
                Arg::Named(name) => self.node.require(&name),
                Arg::Module(module) => Ok(module),
            })
            .collect()
    }

    fn lookup_node(&self, name: &str) -> Result<Option<&'n Node<S>>> {
        let node: &'n Node<S> = self.node;

        if name == "/" || name == INDEX {
            return Ok(Some(node));
        }

        let key = name.trim_start_matches('/');
        if node.has(key)? {
            node.get(key).map(Some)
        } else {
            Ok(None)
        }
    }

    fn missing_node(&self, name: &str) -> RouteError {
        RouteError::NotFound {
            searched: "child node",
            name: name.to_owned(),
            location: self
                .node
                .location()
                .map(|location| location.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Apply `update` to this level's router. If the router panics, the
    /// previous router is kept and the panic becomes a validation error.
    fn update_router(
        &mut self,
        context: impl fmt::Display,
        update: impl FnOnce(Router<S>) -> Router<S>,
    ) -> Result<()> {
        let router = self.take_raw_router()?;
        let unchanged = router.clone();
        match catch_rejection(context, move || update(router)) {
            Ok(router) => {
                self.router = Some(router);
                Ok(())
            }
            Err(e) => {
                self.router = Some(unchanged);
                Err(e)
            }
        }
    }

    fn mount(&mut self, path: &str, child: &mut RouterComposer<'n, S>) -> Result<()> {
        if path != "/" && self.mounts.iter().any(|mounted| mounted == path) {
            return Err(RouteError::validation(format!(
                "a router is already mounted at '{path}' in '{}'",
                self.mount_path
            )));
        }

        let nested: Vec<RouteEntry> = child
            .table
            .entries()
            .iter()
            .map(|entry| entry.nested_under(path))
            .collect();
        for entry in &nested {
            self.table.check(entry, &self.mount_path)?;
        }

        // A controller merged at this level claims no prefix; the router
        // itself reports its collisions.
        let claims: Vec<String> = child
            .table
            .claimed()
            .iter()
            .map(|prefix| join_paths(path, prefix))
            .filter(|prefix| prefix != "/")
            .collect();
        for prefix in &claims {
            self.table.check_claim(prefix, &self.mount_path)?;
        }

        let child_router = child.take_router()?;

        tracing::debug!(parent = %self.mount_path, path, "Mounting child router");

        let context = format!("mounting '{path}' in '{}'", self.mount_path);
        self.update_router(context, |router| {
            if path == "/" {
                router.merge(child_router)
            } else {
                router.nest(path, child_router)
            }
        })?;

        for entry in nested {
            self.table.insert(entry);
        }
        for prefix in claims {
            self.table.claim(prefix);
        }
        if path != "/" {
            self.mounts.push(path.to_owned());
        }

        Ok(())
    }
}

fn into_filter<S>(module: Module<S>, path: &str) -> Result<Filter> {
    match module {
        Module::Filter(filter) => Ok(filter),
        Module::ErrorResponder(respond) => Ok(respond.into_filter()),
        other => Err(RouteError::validation(format!(
            "middleware for '{path}' must be a filter or an error responder, found a {}",
            other.kind()
        ))),
    }
}

impl<S> fmt::Debug for RouterComposer<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterComposer")
            .field("name", &self.name)
            .field("mount_path", &self.mount_path)
            .field("routes", &self.table.entries())
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
