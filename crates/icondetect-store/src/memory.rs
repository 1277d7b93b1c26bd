//! In-memory key store with registry semantics.
//!
//! Children keep insertion order (this is the enumeration order), names
//! compare ASCII case-insensitively, and a plain delete refuses keys that
//! still have children. Faults can be injected per path and operation so
//! callers can exercise their partial-failure handling.

use crate::{Access, KeyStore, StoreKey};
use icondetect_core::{Entry, KEY_SEPARATOR, StoreError, StoreResult, join_key};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Operation a fault can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Opening an existing key
    Open,
    /// Reading a value of the key
    Read,
    /// Creating the key
    Create,
    /// Writing a value of the key
    Write,
    /// Deleting the key
    Delete,
}

#[derive(Debug, Default)]
struct Node {
    name: String,
    values: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Node {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn child_index(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn set_value(&mut self, name: &str, value: &str) {
        match self
            .values
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value.to_string(),
            None => self.values.push((name.to_string(), value.to_string())),
        }
    }
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split(KEY_SEPARATOR).filter(|c| !c.is_empty())
}

fn value_path(key: &str, name: &str) -> String {
    if name.is_empty() {
        key.to_string()
    } else {
        join_key(key, name)
    }
}

#[derive(Debug, Default)]
struct Inner {
    root: Node,
    faults: HashSet<(FaultKind, String)>,
    mutations: usize,
}

impl Inner {
    fn node(&self, path: &str) -> Option<&Node> {
        components(path).try_fold(&self.root, |node, name| node.child(name))
    }

    fn node_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for name in components(path) {
            let idx = node.child_index(name)?;
            node = &mut node.children[idx];
        }
        Some(node)
    }

    /// Walk to `path`, creating missing keys. Returns whether anything was created.
    fn ensure(&mut self, path: &str) -> bool {
        let mut created = false;
        let mut node = &mut self.root;
        for name in components(path) {
            let idx = match node.child_index(name) {
                Some(idx) => idx,
                None => {
                    node.children.push(Node::new(name));
                    created = true;
                    node.children.len() - 1
                }
            };
            node = &mut node.children[idx];
        }
        created
    }

    fn check_fault(&self, kind: FaultKind, path: &str) -> StoreResult<()> {
        if self.faults.contains(&(kind, path.to_ascii_lowercase())) {
            return Err(StoreError::access_denied(path));
        }
        Ok(())
    }
}

/// In-memory [`KeyStore`]. Clones share the same tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding `entries` as children of `parent`, in order.
    pub fn from_entries<I>(parent: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = Entry>,
    {
        let store = Self::new();
        store.insert_key(parent);
        for entry in entries {
            store.insert_entry(parent, &entry.raw_name, &entry.value);
        }
        store
    }

    /// Create a key without going through fault injection or mutation counting.
    pub fn insert_key(&self, path: &str) {
        self.inner.write().ensure(path);
    }

    /// Create (or overwrite) `parent\name` with a default value, bypassing
    /// fault injection and mutation counting.
    pub fn insert_entry(&self, parent: &str, name: &str, value: &str) {
        let path = join_key(parent, name);
        let mut inner = self.inner.write();
        inner.ensure(&path);
        if let Some(node) = inner.node_mut(&path) {
            node.set_value("", value);
        }
    }

    /// Children of `parent` with their default values, in enumeration order.
    ///
    /// A child without a default value is reported with an empty value.
    pub fn entries(&self, parent: &str) -> StoreResult<Vec<Entry>> {
        let inner = self.inner.read();
        let node = inner
            .node(parent)
            .ok_or_else(|| StoreError::not_found(parent))?;
        Ok(node
            .children
            .iter()
            .map(|c| Entry::new(c.name.clone(), c.value("").unwrap_or_default()))
            .collect())
    }

    /// Make every `kind` operation on `path` fail with access denied.
    pub fn inject_fault(&self, kind: FaultKind, path: &str) {
        self.inner
            .write()
            .faults
            .insert((kind, path.to_ascii_lowercase()));
    }

    pub fn clear_faults(&self) {
        self.inner.write().faults.clear();
    }

    /// Number of successful mutations (key creations, value writes, deletions).
    pub fn mutations(&self) -> usize {
        self.inner.read().mutations
    }
}

impl KeyStore for MemoryStore {
    type Key = MemoryKey;

    fn open_key(&self, path: &str, access: Access) -> StoreResult<MemoryKey> {
        let inner = self.inner.read();
        inner.check_fault(FaultKind::Open, path)?;
        if inner.node(path).is_none() {
            return Err(StoreError::not_found(path));
        }
        Ok(MemoryKey {
            inner: Arc::clone(&self.inner),
            path: path.to_string(),
            access,
        })
    }

    fn create_key(&self, path: &str) -> StoreResult<MemoryKey> {
        let mut inner = self.inner.write();
        inner.check_fault(FaultKind::Create, path)?;
        if components(path).next().is_none() {
            return Err(StoreError::access_denied(path));
        }
        if inner.ensure(path) {
            inner.mutations += 1;
        }
        Ok(MemoryKey {
            inner: Arc::clone(&self.inner),
            path: path.to_string(),
            access: Access::All,
        })
    }

    fn delete_key(&self, path: &str) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.check_fault(FaultKind::Delete, path)?;

        let (parent, name) = path.rsplit_once(KEY_SEPARATOR).unwrap_or(("", path));
        if name.is_empty() {
            return Err(StoreError::access_denied(path));
        }

        let parent_node = inner
            .node_mut(parent)
            .ok_or_else(|| StoreError::not_found(path))?;
        let idx = parent_node
            .child_index(name)
            .ok_or_else(|| StoreError::not_found(path))?;
        if !parent_node.children[idx].children.is_empty() {
            return Err(StoreError::HasSubkeys {
                path: path.to_string(),
            });
        }
        parent_node.children.remove(idx);
        inner.mutations += 1;
        Ok(())
    }
}

/// Open key handle of a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryKey {
    inner: Arc<RwLock<Inner>>,
    path: String,
    access: Access,
}

impl StoreKey for MemoryKey {
    fn path(&self) -> &str {
        &self.path
    }

    fn subkey_names(&self) -> StoreResult<Vec<String>> {
        let inner = self.inner.read();
        let node = inner
            .node(&self.path)
            .ok_or_else(|| StoreError::not_found(&self.path))?;
        Ok(node.children.iter().map(|c| c.name.clone()).collect())
    }

    fn get_string(&self, name: &str) -> StoreResult<String> {
        let inner = self.inner.read();
        inner.check_fault(FaultKind::Read, &self.path)?;
        inner
            .node(&self.path)
            .and_then(|node| node.value(name))
            .map(str::to_string)
            .ok_or_else(|| StoreError::not_found(value_path(&self.path, name)))
    }

    fn set_string(&self, name: &str, value: &str) -> StoreResult<()> {
        if !self.access.can_write() {
            return Err(StoreError::access_denied(&self.path));
        }
        let mut inner = self.inner.write();
        inner.check_fault(FaultKind::Write, &self.path)?;
        let node = inner
            .node_mut(&self.path)
            .ok_or_else(|| StoreError::not_found(&self.path))?;
        node.set_value(name, value);
        inner.mutations += 1;
        Ok(())
    }
}
