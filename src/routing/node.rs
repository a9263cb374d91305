//! In-memory mirror of a routes directory.
//!
//! # Responsibilities
//! - Scan a directory eagerly and depth-first into a tree of nodes
//! - Record loadable, non-hidden files by base name
//! - Resolve module names against files first, child directories second
//!
//! # Design Decisions
//! - Parents own children; the parent link is only the parent's location
//! - Vanished or unreadable entries are skipped, never fatal
//! - A location that exists but is not a directory is a validation error
//! - After `destroy` every operation fails with an illegal-state error

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Result, RouteError};
use crate::modules::registry::{join_key, normalize_key};
use crate::modules::{Module, ModuleId, ModuleResolver};

/// Module name looked up when none is given.
pub const INDEX: &str = "index";

/// One scanned directory.
pub struct Node<S> {
    location: PathBuf,
    parent: Option<PathBuf>,
    /// Module key prefix of this directory relative to the scan root.
    prefix: String,
    children: HashMap<String, Node<S>>,
    files: HashMap<String, ModuleId>,
    resolver: Arc<dyn ModuleResolver<S>>,
    destroyed: bool,
}

impl<S> Node<S> {
    /// Create a root node. Nothing is read until [`Node::traverse`].
    pub fn new(location: impl Into<PathBuf>, resolver: Arc<dyn ModuleResolver<S>>) -> Self {
        Self {
            location: location.into(),
            parent: None,
            prefix: String::new(),
            children: HashMap::new(),
            files: HashMap::new(),
            resolver,
            destroyed: false,
        }
    }

    /// Prefix every module key found below this node, so trees scanned from
    /// different directories do not share keys: `routes` turns `users/index`
    /// into `routes/users/index`.
    pub fn with_key_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.prefix = normalize_key(prefix.as_ref());
        self
    }

    /// Scan the location, materializing the whole subtree before returning.
    ///
    /// A missing or unreadable location leaves the node empty. Rescanning
    /// replaces whatever was found before.
    pub fn traverse(&mut self) -> Result<()> {
        self.ensure_alive("can not traverse through a destroyed node")?;
        let mut ancestors = Vec::new();
        self.scan(&mut ancestors)
    }

    /// Child directory node registered under `name`.
    pub fn get(&self, name: &str) -> Result<&Node<S>> {
        self.ensure_alive("can not look up a child of a destroyed node")?;
        self.children
            .get(name)
            .ok_or_else(|| RouteError::not_found("child node", name, &self.location))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Node<S>> {
        self.ensure_alive("can not look up a child of a destroyed node")?;
        let location = &self.location;
        self.children
            .get_mut(name)
            .ok_or_else(|| RouteError::not_found("child node", name, location))
    }

    /// Whether a child directory named `name` exists.
    pub fn has(&self, name: &str) -> Result<bool> {
        self.ensure_alive("can not look up a child of a destroyed node")?;
        Ok(self.children.contains_key(name))
    }

    /// Whether a loadable file with base name `name` exists.
    pub fn has_file(&self, name: &str) -> Result<bool> {
        self.ensure_alive("can not look up a file of a destroyed node")?;
        Ok(self.files.contains_key(name))
    }

    /// Resolve `name`: a same-level file wins, otherwise the `index` module of
    /// the child directory `name`.
    pub fn require(&self, name: &str) -> Result<Module<S>> {
        self.ensure_alive("can not require from a destroyed node")?;

        if let Some(id) = self.files.get(name) {
            return self
                .resolver
                .load(id)
                .ok_or_else(|| RouteError::not_found("loadable module", id.key(), id.path()));
        }

        if let Some(child) = self.children.get(name) {
            return child.require_index();
        }

        Err(RouteError::not_found(
            "file or child node",
            name,
            &self.location,
        ))
    }

    /// Same as `require("index")`.
    pub fn require_index(&self) -> Result<Module<S>> {
        self.require(INDEX)
    }

    /// Tear down the subtree, children first. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        for child in self.children.values_mut() {
            child.destroy();
        }

        self.children.clear();
        self.files.clear();
        self.location = PathBuf::new();
        self.parent = None;
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn location(&self) -> Result<&Path> {
        self.ensure_alive("a destroyed node has no location")?;
        Ok(&self.location)
    }

    /// Location of the owning node, `None` at the root.
    pub fn parent_location(&self) -> Result<Option<&Path>> {
        self.ensure_alive("a destroyed node has no parent")?;
        Ok(self.parent.as_deref())
    }

    /// Base names of the loadable files, sorted.
    pub fn file_names(&self) -> Result<Vec<String>> {
        self.ensure_alive("a destroyed node has no files")?;
        let mut names: Vec<String> = self.files.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Names of the child directories, sorted.
    pub fn child_names(&self) -> Result<Vec<String>> {
        self.ensure_alive("a destroyed node has no children")?;
        let mut names: Vec<String> = self.children.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn files(&self) -> Result<impl Iterator<Item = (&str, &ModuleId)>> {
        self.ensure_alive("a destroyed node has no files")?;
        Ok(self.files.iter().map(|(name, id)| (name.as_str(), id)))
    }

    pub fn children(&self) -> Result<impl Iterator<Item = (&str, &Node<S>)>> {
        self.ensure_alive("a destroyed node has no children")?;
        Ok(self.children.iter().map(|(name, child)| (name.as_str(), child)))
    }

    /// Serializable snapshot of the subtree.
    pub fn summary(&self) -> Result<NodeSummary> {
        self.ensure_alive("can not summarize a destroyed node")?;

        let mut children = Vec::with_capacity(self.children.len());
        for name in self.child_names()? {
            children.push(self.get(&name)?.summary()?);
        }

        Ok(NodeSummary {
            name: self
                .location
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            location: self.location.clone(),
            files: self.file_names()?,
            children,
        })
    }

    fn ensure_alive(&self, message: &'static str) -> Result<()> {
        if self.destroyed {
            return Err(RouteError::IllegalState(message));
        }
        Ok(())
    }

    fn scan(&mut self, ancestors: &mut Vec<PathBuf>) -> Result<()> {
        self.children.clear();
        self.files.clear();

        let location = std::path::absolute(&self.location).unwrap_or_else(|_| self.location.clone());
        self.location = location.clone();

        let Some(metadata) = stat(&location) else {
            return Ok(());
        };

        if !metadata.is_dir() {
            return Err(RouteError::validation(format!(
                "location {} must be a directory",
                location.display()
            )));
        }

        let canonical = fs::canonicalize(&location).unwrap_or_else(|_| location.clone());
        if ancestors.contains(&canonical) {
            tracing::debug!(location = %location.display(), "Skipping directory that links back to an ancestor");
            return Ok(());
        }

        ancestors.push(canonical);
        let result = self.read_directory(&location, ancestors);
        ancestors.pop();
        result
    }

    fn read_directory(&mut self, directory: &Path, ancestors: &mut Vec<PathBuf>) -> Result<()> {
        tracing::debug!(location = %directory.display(), "Reading through directory");

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(location = %directory.display(), error = %e, "Could not read directory");
                return Ok(());
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(location = %directory.display(), error = %e, "Could not read directory entry");
                    continue;
                }
            };

            let location = entry.path();
            let Some(metadata) = stat(&location) else {
                continue;
            };

            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                tracing::debug!(location = %location.display(), "Skipping entry with a non UTF-8 name");
                continue;
            };

            if metadata.is_dir() {
                self.child(location, name, ancestors)?;
            } else if metadata.is_file() {
                self.handle_file(location);
            }
        }

        Ok(())
    }

    fn child(&mut self, location: PathBuf, name: String, ancestors: &mut Vec<PathBuf>) -> Result<()> {
        let mut child = Node {
            location,
            parent: Some(self.location.clone()),
            prefix: join_key(&self.prefix, &name),
            children: HashMap::new(),
            files: HashMap::new(),
            resolver: Arc::clone(&self.resolver),
            destroyed: false,
        };

        tracing::debug!(name = %name, parent = %self.location.display(), "Created child node");

        child.scan(ancestors)?;
        self.children.insert(name, child);
        Ok(())
    }

    fn handle_file(&mut self, location: PathBuf) {
        let Some(name) = location.file_stem().and_then(|stem| stem.to_str()).map(str::to_owned) else {
            return;
        };

        // Hidden files
        if name.starts_with('.') {
            return;
        }

        let id = ModuleId::new(join_key(&self.prefix, &name), location);
        if !self.resolver.contains(&id) {
            return;
        }

        tracing::debug!(file = %name, location = %self.location.display(), "Found module file");
        self.files.insert(name, id);
    }
}

impl<S> fmt::Debug for Node<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("location", &self.location)
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

fn stat(location: &Path) -> Option<fs::Metadata> {
    match fs::metadata(location) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            tracing::debug!(location = %location.display(), error = %e, "Could not resolve file stats");
            None
        }
    }
}

/// Snapshot of a scanned subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub name: String,
    pub location: PathBuf,
    pub files: Vec<String>,
    pub children: Vec<NodeSummary>,
}
