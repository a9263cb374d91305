//! HTTP hosting subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (trace, request ID, timeout)
//!     → composed Router (discovered at startup)
//!     → Send to client
//! ```

pub mod server;

pub use server::HttpServer;
