//! Route discovery and composition subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (once, single threaded):
//!     routes directory
//!     → node.rs (eager depth-first scan into a Node tree)
//!     → composer.rs (root route builder composes nested routers)
//!       or discovery.rs (flat controller mounting)
//!     → composed axum Router
//!     → bookkeeping destroyed, router kept by the host application
//! ```
//!
//! # Design Decisions
//! - Every filesystem and module resolution error surfaces at startup
//! - Nothing is resolved lazily per request
//! - Ownership is a strict tree; teardown is one post-order cascade

pub mod args;
pub mod composer;
pub mod discovery;
pub mod node;
pub mod table;

pub use args::{Arg, Args};
pub use composer::RouterComposer;
pub use discovery::{collect_filters, mount_controllers};
pub use node::{Node, NodeSummary, INDEX};
pub use table::RouteEntry;
