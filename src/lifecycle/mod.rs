//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Scan routes and filters → Compose routers → Mount into app
//!
//! Shutdown (shutdown.rs):
//!     Trigger or Ctrl+C → Stop accepting → Drain connections → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then discovery, then listeners
//! - Discovery bookkeeping is released before traffic is served

pub mod shutdown;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{mount_routes, root_router_name, Project, ROOT_ROUTERS};
