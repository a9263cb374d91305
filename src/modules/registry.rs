//! Module resolution.
//!
//! # Responsibilities
//! - Identify resolvable files by a root-relative key
//! - Probe whether a file is a module (scan time)
//! - Load the module value (require time)
//!
//! # Design Decisions
//! - Resolution is an injected capability, the scanner never loads code itself
//! - Keys use `/` separators and carry no extension: `users/index`

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::handler::Handler;
use axum::response::Response;
use axum::Router;

use crate::error::Result;
use crate::modules::{Filter, Filters, Module};
use crate::routing::RouterComposer;

/// Identity of a resolvable file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId {
    key: String,
    path: PathBuf,
}

impl ModuleId {
    pub fn new(key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            key: normalize_key(&key.into()),
            path: path.into(),
        }
    }

    /// Root-relative key, extension stripped.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// File on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

pub(crate) fn join_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}/{name}")
    }
}

pub(crate) fn normalize_key(key: &str) -> String {
    let key = key.replace('\\', "/");
    let key = key.strip_prefix("./").unwrap_or(&key);
    key.trim_matches('/').to_owned()
}

/// Resolves module ids to module values.
pub trait ModuleResolver<S>: Send + Sync {
    /// Whether the file is a loadable module.
    fn contains(&self, id: &ModuleId) -> bool {
        self.load(id).is_some()
    }

    fn load(&self, id: &ModuleId) -> Option<Module<S>>;
}

/// Static module table populated by the application.
pub struct ModuleRegistry<S> {
    modules: HashMap<String, Module<S>>,
}

impl<S> ModuleRegistry<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Register a module under `key`, replacing any previous one.
    pub fn insert(&mut self, key: impl AsRef<str>, module: Module<S>) -> Option<Module<S>> {
        self.modules.insert(normalize_key(key.as_ref()), module)
    }

    pub fn with(mut self, key: impl AsRef<str>, module: Module<S>) -> Self {
        self.insert(key, module);
        self
    }

    pub fn routes<F>(self, key: impl AsRef<str>, build: F) -> Self
    where
        F: Fn(&mut RouterComposer<'_, S>) -> Result<()> + Send + Sync + 'static,
    {
        self.with(key, Module::routes(build))
    }

    pub fn controller<F>(self, key: impl AsRef<str>, controller: F) -> Self
    where
        F: Fn(Router<S>, &Filters) -> Router<S> + Send + Sync + 'static,
    {
        self.with(key, Module::controller(controller))
    }

    pub fn filter(self, key: impl AsRef<str>, filter: Filter) -> Self {
        self.with(key, Module::Filter(filter))
    }

    pub fn error_responder<F>(self, key: impl AsRef<str>, respond: F) -> Self
    where
        F: Fn(Response) -> Response + Send + Sync + 'static,
    {
        self.with(key, Module::error_responder(respond))
    }

    pub fn endpoint<H, T>(self, key: impl AsRef<str>, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.with(key, Module::endpoint(handler))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn into_resolver(self) -> Arc<dyn ModuleResolver<S>> {
        Arc::new(self)
    }
}

impl<S> Default for ModuleRegistry<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ModuleResolver<S> for ModuleRegistry<S> {
    fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id.key())
    }

    fn load(&self, id: &ModuleId) -> Option<Module<S>> {
        self.modules.get(id.key()).cloned()
    }
}

/// Probe-only resolver: files with one of the given extensions count as
/// modules, but none can be loaded. Useful to inspect a tree's layout.
pub struct ExtensionResolver<S> {
    extensions: Vec<String>,
    _state: PhantomData<fn() -> S>,
}

impl<S> ExtensionResolver<S> {
    pub fn new<I>(extensions: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_owned())
                .collect(),
            _state: PhantomData,
        }
    }
}

impl<S> ModuleResolver<S> for ExtensionResolver<S> {
    fn contains(&self, id: &ModuleId) -> bool {
        id.path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|known| known == ext))
    }

    fn load(&self, _id: &ModuleId) -> Option<Module<S>> {
        None
    }
}
