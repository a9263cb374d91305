//! Flat controller and filter discovery.
//!
//! # Responsibilities
//! - Collect arity-3 modules of a filters tree, keyed by file base name
//! - Mount every arity < 3 module of a routes tree at the path spelled by its
//!   directories and base name
//!
//! # Design Decisions
//! - `index` files mount at their directory's path
//! - Modules of any other arity are skipped, not rejected
//! - Route builders record their routes and are checked against each other
//! - Controllers share their prefix with the files next to them, so they
//!   reserve nothing; a collision with an opaque controller is reported by the
//!   router and surfaces as a validation error
//! - Files are visited in name order before child directories, so results do
//!   not depend on directory listing order

use axum::Router;

use crate::error::{Result, RouteError};
use crate::modules::{Filters, Module};
use crate::routing::composer::RouterComposer;
use crate::routing::table::{catch_rejection, RouteTable};
use crate::routing::node::{Node, INDEX};

/// Collect every filter module below `node`.
pub fn collect_filters<S>(node: &Node<S>) -> Result<Filters> {
    let mut filters = Filters::new();
    gather_filters(node, &mut filters)?;
    Ok(filters)
}

fn gather_filters<S>(node: &Node<S>, filters: &mut Filters) -> Result<()> {
    for name in node.file_names()? {
        match node.require(&name)? {
            Module::Filter(filter) => {
                tracing::debug!(filter = %name, "Loaded filter");
                if filters.insert(name.clone(), filter).is_some() {
                    tracing::warn!(filter = %name, location = %node.location()?.display(), "Filter overrides one with the same name");
                }
            }
            other => {
                tracing::debug!(file = %name, kind = other.kind(), "Skipping non-filter module");
            }
        }
    }

    for name in node.child_names()? {
        gather_filters(node.get(&name)?, filters)?;
    }

    Ok(())
}

/// Mount every controller below `node` into one router.
pub fn mount_controllers<S>(node: &Node<S>, filters: &Filters) -> Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    let mut mounted = Vec::new();
    let mut ancestors = Vec::new();
    let mut table = RouteTable::new();
    mount_level(node, filters, &mut ancestors, &mut mounted, &mut table, Router::new())
}

fn mount_level<S>(
    node: &Node<S>,
    filters: &Filters,
    ancestors: &mut Vec<String>,
    mounted: &mut Vec<String>,
    table: &mut RouteTable,
    mut app: Router<S>,
) -> Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    for name in node.file_names()? {
        let module = node.require(&name)?;
        if !module.is_controller() {
            tracing::debug!(file = %name, kind = module.kind(), "Skipping module that is not a controller");
            continue;
        }

        let mount_path = controller_mount_path(ancestors, &name);
        if mounted.contains(&mount_path) {
            return Err(RouteError::validation(format!(
                "more than one controller maps to '{mount_path}'"
            )));
        }

        let router = match module {
            Module::Controller(controller) => controller(Router::new(), filters),
            Module::Routes(build) => {
                let mut composer = RouterComposer::rooted_at(node, filters, &mount_path)?;
                build(&mut composer)?;
                for entry in composer.routes()? {
                    let entry = entry.nested_under(&mount_path);
                    table.check(&entry, "/")?;
                    table.insert(entry);
                }
                let router = composer.take_router()?;
                composer.destroy();
                router
            }
            _ => continue,
        };

        tracing::debug!(mount_path = %mount_path, "Mounting router");

        app = catch_rejection(format!("mounting '{mount_path}'"), || {
            if mount_path == "/" {
                app.merge(router)
            } else {
                app.nest(&mount_path, router)
            }
        })?;
        mounted.push(mount_path);
    }

    for name in node.child_names()? {
        ancestors.push(name.clone());
        app = mount_level(node.get(&name)?, filters, ancestors, mounted, table, app)?;
        ancestors.pop();
    }

    Ok(app)
}

fn controller_mount_path(ancestors: &[String], name: &str) -> String {
    let mut segments: Vec<&str> = ancestors.iter().map(String::as_str).collect();
    if name != INDEX {
        segments.push(name);
    }
    format!("/{}", segments.join("/"))
}
