//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery and the host server produce:
//!     → logging.rs (structured log events)
//!
//! Consumers:
//!     → stdout, in pretty or compact format
//! ```
//!
//! # Design Decisions
//! - Scan diagnostics (skipped entries, mounts) log at debug
//! - The startup summary logs at info
//! - Request ID flows through every request span

pub mod logging;

pub use logging::init_logging;
