//! Error types for route discovery and composition.
//!
//! Every variant is fatal to the build: errors propagate out of the startup
//! phase and abort it. Entries skipped while scanning are not errors and never
//! show up here.

use thiserror::Error;

/// Errors raised while scanning a routes tree or composing routers.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Malformed DSL arguments, or a scan location that is not a directory.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A named child directory, file or module is missing.
    #[error("no {searched} named '{name}' can be found in {location}")]
    NotFound {
        searched: &'static str,
        name: String,
        location: String,
    },

    /// The routing root does not follow the required layout.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation was attempted on a destroyed node or composer.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
}

impl RouteError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        RouteError::Validation(message.into())
    }

    pub(crate) fn not_found(
        searched: &'static str,
        name: impl Into<String>,
        location: &std::path::Path,
    ) -> Self {
        RouteError::NotFound {
            searched,
            name: name.into(),
            location: location.display().to_string(),
        }
    }
}

pub type Result<T, E = RouteError> = std::result::Result<T, E>;
