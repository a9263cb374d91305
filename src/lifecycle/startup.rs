//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve the routes and filters directories from configuration
//! - Scan both trees and collect filters
//! - Locate the root router module and compose the routing tree
//! - Mount the composed router into the host application
//! - Release all discovery bookkeeping afterwards
//!
//! # Design Decisions
//! - Fail fast: any discovery error is fatal and nothing is mounted
//! - Module keys carry the configured directory (`routes/users/index`,
//!   `filters/auth`), so both trees can share one resolver
//! - Runs once, synchronously, before the server accepts traffic

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;

use crate::config::{DiscoveryMode, ServerConfig};
use crate::error::{Result, RouteError};
use crate::modules::{Filters, Module, ModuleResolver};
use crate::routing::{collect_filters, mount_controllers, Node, RouterComposer};

/// Module names tried, in order, for the root router.
pub const ROOT_ROUTERS: [&str; 2] = ["index", "router"];

/// The project whose conventional directories are scanned.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn routes_location(&self, config: &ServerConfig) -> PathBuf {
        self.root.join(&config.routes.location)
    }

    pub fn filters_location(&self, config: &ServerConfig) -> PathBuf {
        self.root.join(&config.filters.location)
    }
}

/// Scan the project's routes directory and mount the composed router at the
/// root of `app`.
pub fn mount_routes<S>(
    project: &Project,
    config: &ServerConfig,
    app: Router<S>,
    resolver: Arc<dyn ModuleResolver<S>>,
) -> Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    let location = project.routes_location(config);

    tracing::info!(
        location = %location.display(),
        mode = ?config.routes.mode,
        "Scanning for routers and route mappings"
    );

    let mut filters_node = if config.filters.enabled {
        let mut node = Node::new(project.filters_location(config), Arc::clone(&resolver))
            .with_key_prefix(&config.filters.location);
        node.traverse()?;
        Some(node)
    } else {
        None
    };

    let filters = match &filters_node {
        Some(node) => collect_filters(node)?,
        None => Filters::new(),
    };

    let mut node = Node::new(location, resolver).with_key_prefix(&config.routes.location);
    node.traverse()?;

    let router = match config.routes.mode {
        DiscoveryMode::Nested => compose_nested(&node, &filters)?,
        DiscoveryMode::Flat => mount_controllers(&node, &filters)?,
    };

    node.destroy();
    if let Some(filters_node) = filters_node.as_mut() {
        filters_node.destroy();
    }

    Ok(app.merge(router))
}

/// Name of the root router module in `node`.
pub fn root_router_name<S>(node: &Node<S>) -> Result<&'static str> {
    for name in ROOT_ROUTERS {
        if node.has_file(name)? {
            return Ok(name);
        }
    }

    Err(RouteError::Configuration(format!(
        "can not find a router in '{}'; the router must be named either 'index' or 'router' and export a route builder",
        node.location()?.display()
    )))
}

fn compose_nested<S>(node: &Node<S>, filters: &Filters) -> Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    let handler: Module<S> = node.require(root_router_name(node)?)?;

    let mut root = RouterComposer::with_filters(node, filters)?;
    root.route_index(handler)?;

    let routes = root.routes()?;
    for route in routes {
        tracing::debug!(route = %route, "Registered route");
    }
    tracing::info!(routes = routes.len(), "Composed router tree");

    let router = root.take_router()?;
    root.destroy();
    Ok(router)
}
