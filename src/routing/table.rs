//! Route table bookkeeping and path helpers.
//!
//! # Responsibilities
//! - Record what each DSL level registered, with nested paths prefixed
//! - Record the prefixes owned by controllers, whose routes are opaque
//! - Detect registrations the router would reject at runtime
//! - Validate and join route paths
//!
//! # Design Decisions
//! - Parameter names do not distinguish paths: `/{a}` and `/{b}` collide
//! - Verbs collide when equal or when either is the catch-all
//! - Nothing may be registered at or below a controller's prefix
//! - Whatever slips past these checks and still makes the router panic is
//!   reported as a validation error by [`catch_rejection`]

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;

use crate::error::{Result, RouteError};
use crate::modules::Verb;

/// One registered route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub verb: Verb,
    pub path: String,
}

impl RouteEntry {
    pub fn new(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
        }
    }

    /// The same route as seen from a router mounting this one at `prefix`.
    pub fn nested_under(&self, prefix: &str) -> Self {
        Self {
            verb: self.verb,
            path: join_paths(prefix, &self.path),
        }
    }

    pub fn conflicts_with(&self, other: &RouteEntry) -> bool {
        self.verb.overlaps(other.verb) && path_shape(&self.path) == path_shape(&other.path)
    }
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.path)
    }
}

/// Routes registered at one level and below it, plus the prefixes served by
/// controllers mounted there.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    claimed: Vec<String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Prefixes owned by controllers.
    pub fn claimed(&self) -> &[String] {
        &self.claimed
    }

    /// Fails when `entry` overlaps a registered route or lies under a
    /// controller prefix. `location` names the level in the error.
    pub fn check(&self, entry: &RouteEntry, location: &str) -> Result<()> {
        if let Some(existing) = self.entries.iter().find(|existing| existing.conflicts_with(entry)) {
            return Err(RouteError::validation(format!(
                "route '{entry}' in '{location}' overlaps with '{existing}'"
            )));
        }

        if let Some(prefix) = self.claimed.iter().find(|prefix| is_at_or_below(&entry.path, prefix)) {
            return Err(RouteError::validation(format!(
                "route '{entry}' in '{location}' lies under '{prefix}', which a controller serves"
            )));
        }

        Ok(())
    }

    /// Fails when a controller mounted at `prefix` would shadow a registered
    /// route or overlap another controller.
    pub fn check_claim(&self, prefix: &str, location: &str) -> Result<()> {
        if let Some(existing) = self.entries.iter().find(|entry| is_at_or_below(&entry.path, prefix)) {
            return Err(RouteError::validation(format!(
                "controller at '{prefix}' in '{location}' would shadow route '{existing}'"
            )));
        }

        if let Some(other) = self
            .claimed
            .iter()
            .find(|other| is_at_or_below(prefix, other) || is_at_or_below(other, prefix))
        {
            return Err(RouteError::validation(format!(
                "controller at '{prefix}' in '{location}' overlaps with the controller at '{other}'"
            )));
        }

        Ok(())
    }

    pub fn insert(&mut self, entry: RouteEntry) {
        self.entries.push(entry);
    }

    pub fn claim(&mut self, prefix: impl Into<String>) {
        self.claimed.push(prefix.into());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.claimed.clear();
    }
}

/// Run a router mutation, turning a panic raised by the router into a
/// validation error.
pub(crate) fn catch_rejection<T>(context: impl fmt::Display, mutate: impl FnOnce() -> T) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(mutate)).map_err(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|reason| (*reason).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "the router rejected it".to_owned());
        RouteError::validation(format!("{context}: {reason}"))
    })
}

/// Path of a mount point derived from a route name.
pub fn mount_path_for(name: &str) -> String {
    if name.starts_with('/') {
        name.to_owned()
    } else {
        format!("/{name}")
    }
}

/// Join a mount prefix with a path registered below it.
pub fn join_paths(prefix: &str, path: &str) -> String {
    if prefix == "/" {
        path.to_owned()
    } else if path == "/" {
        prefix.to_owned()
    } else {
        format!("{prefix}{path}")
    }
}

/// Reject paths axum would panic on.
///
/// A segment holds static text optionally followed by one `{name}` capture;
/// `{*name}` captures the rest and must close the path. `{{` and `}}` are
/// literal braces.
pub fn validate_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(RouteError::validation(format!(
            "path '{path}' must start with '/'"
        )));
    }

    let segments: Vec<&str> = path.split('/').collect();
    for (i, segment) in segments.iter().enumerate() {
        check_segment(path, segment, i + 1 == segments.len())?;
    }

    Ok(())
}

fn check_segment(path: &str, segment: &str, last: bool) -> Result<()> {
    let invalid = |reason: String| RouteError::validation(format!("path '{path}' {reason}"));

    if let Some(rest) = segment.strip_prefix(':') {
        return Err(invalid(format!(
            "uses ':' captures in '{segment}', write '{{{rest}}}' instead"
        )));
    }
    if segment.starts_with('*') {
        return Err(invalid(format!(
            "uses a bare wildcard in '{segment}', write '{{{segment}}}' instead"
        )));
    }

    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1)) {
            (b'{', Some(b'{')) | (b'}', Some(b'}')) => i += 2,
            (b'}', _) => return Err(invalid(format!("has an unmatched '}}' in '{segment}'"))),
            (b'{', _) => {
                let Some(len) = segment[i + 1..].find('}') else {
                    return Err(invalid(format!("has an unclosed '{{' in '{segment}'")));
                };

                let name = &segment[i + 1..i + 1 + len];
                let catch_all = name.starts_with('*');
                let bare = name.trim_start_matches('*');
                if bare.is_empty() || bare.contains(['{', '*']) {
                    return Err(invalid(format!("has a capture without a valid name in '{segment}'")));
                }

                i += len + 2;
                if i != bytes.len() {
                    return Err(invalid(format!(
                        "allows one capture per segment, closing the segment, in '{segment}'"
                    )));
                }
                if catch_all && !last {
                    return Err(invalid(format!("may only end with a '{{*{bare}}}' capture")));
                }
            }
            _ => i += 1,
        }
    }

    Ok(())
}

/// Reject route names that can not become a mount path.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RouteError::validation("route name must not be empty"));
    }

    if name != "/" && name.ends_with('/') {
        return Err(RouteError::validation(format!(
            "route name '{name}' must not end with '/'"
        )));
    }

    if name.contains('*') {
        return Err(RouteError::validation(format!(
            "route name '{name}' must not contain a wildcard"
        )));
    }

    validate_path(&mount_path_for(name))
}

/// Whether `path` equals `prefix` or lies below it.
fn is_at_or_below(path: &str, prefix: &str) -> bool {
    let path = path_shape(path);
    let prefix = path_shape(prefix);
    prefix == "/" || path == prefix || path.starts_with(&format!("{prefix}/"))
}

fn path_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with("{*") {
                "{*}"
            } else if segment.starts_with('{') && segment.ends_with('}') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/", "/users"), "/users");
        assert_eq!(join_paths("/users", "/"), "/users");
        assert_eq!(join_paths("/users", "/{id}"), "/users/{id}");
        assert_eq!(join_paths("/", "/"), "/");
    }

    #[test]
    fn test_mount_path_for() {
        assert_eq!(mount_path_for("users"), "/users");
        assert_eq!(mount_path_for("/users"), "/users");
        assert_eq!(mount_path_for("/"), "/");
    }

    #[test]
    fn test_conflicts() {
        let get = RouteEntry::new(Verb::Get, "/users/{id}");

        assert!(get.conflicts_with(&RouteEntry::new(Verb::Get, "/users/{name}")));
        assert!(get.conflicts_with(&RouteEntry::new(Verb::All, "/users/{id}")));
        assert!(!get.conflicts_with(&RouteEntry::new(Verb::Post, "/users/{id}")));
        assert!(!get.conflicts_with(&RouteEntry::new(Verb::Get, "/users/me")));
    }

    #[test]
    fn test_path_validation() {
        assert!(validate_path("/").is_ok());
        assert!(validate_path("/users/{id}").is_ok());
        assert!(matches!(validate_path("users"), Err(RouteError::Validation(_))));
        assert!(matches!(validate_path("/users/:id"), Err(RouteError::Validation(_))));
    }

    #[test]
    fn test_malformed_captures_are_rejected() {
        assert!(validate_path("/files/{*rest}").is_ok());
        assert!(validate_path("/v{version}").is_ok());
        assert!(validate_path("/literal/{{braces}}").is_ok());

        for path in ["/{", "/{}", "/{*}", "/{*rest}/x", "/a}", "/{a}{b}", "/{id}.json", "/*rest", "/{a{b}"] {
            assert!(
                matches!(validate_path(path), Err(RouteError::Validation(_))),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn test_controller_prefixes() {
        let mut table = RouteTable::new();
        table.insert(RouteEntry::new(Verb::Get, "/users"));
        table.claim("/reports");

        assert!(table.check_claim("/users", "/").is_err());
        assert!(table.check_claim("/reports/daily", "/").is_err());
        assert!(table.check_claim("/admin", "/").is_ok());
        assert!(table.check(&RouteEntry::new(Verb::Get, "/reports"), "/").is_err());
        assert!(table.check(&RouteEntry::new(Verb::Post, "/reports/{id}"), "/").is_err());
        assert!(table.check(&RouteEntry::new(Verb::Get, "/reportsx"), "/").is_ok());
    }

    #[test]
    fn test_router_panic_becomes_validation_error() {
        let result = catch_rejection("GET /x", || -> () { panic!("Overlapping method route") });
        match result {
            Err(RouteError::Validation(message)) => assert!(message.contains("Overlapping method route")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(catch_rejection("GET /x", || 7).unwrap(), 7);
    }

    #[test]
    fn test_name_validation() {
        assert!(validate_name("/").is_ok());
        assert!(validate_name("users").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("users/").is_err());
        assert!(validate_name("files*").is_err());
        assert!(validate_name("{").is_err());
        assert!(validate_name("a}").is_err());
        assert!(validate_name("{id}").is_ok());
    }
}
