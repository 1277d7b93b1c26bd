//! # Key Store
//!
//! Hierarchical key/value store abstraction in the shape of the Windows
//! registry: named keys under a root, each holding named string values (the
//! empty name addresses the default value) and child keys.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`] - in-process tree with registry semantics, used for
//!   tests and for repairing exported snapshots offline
//! - `RegistryStore` - the live Windows registry (Windows only)
//!
//! Keys are handles: they stay usable until dropped, and dropping closes
//! them.
//!
//! ```
//! use icondetect_store::{Access, KeyStore, MemoryStore, StoreKey};
//!
//! # fn main() -> icondetect_core::StoreResult<()> {
//! let store = MemoryStore::new();
//! let key = store.create_key("SOFTWARE\\Overlays\\Foo")?;
//! key.set_default_value("{0000}")?;
//!
//! let parent = store.open_key("SOFTWARE\\Overlays", Access::Read)?;
//! assert_eq!(parent.subkey_names()?, vec!["Foo".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod memory;
#[cfg(windows)]
pub mod registry;

pub use memory::{FaultKind, MemoryKey, MemoryStore};
#[cfg(windows)]
pub use registry::{RegistryKey, RegistryStore};

use icondetect_core::{StoreResult, join_key};

/// Access right requested when opening a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Enumerate children and read values
    Read,
    /// Read, write values, create and delete children
    All,
}

impl Access {
    pub fn can_write(self) -> bool {
        matches!(self, Access::All)
    }
}

/// An open key.
pub trait StoreKey {
    /// Path of this key relative to the store root
    fn path(&self) -> &str;

    /// Names of the direct children, in store enumeration order
    fn subkey_names(&self) -> StoreResult<Vec<String>>;

    /// Read a named string value
    fn get_string(&self, name: &str) -> StoreResult<String>;

    /// Write a named string value, creating it if needed
    fn set_string(&self, name: &str, value: &str) -> StoreResult<()>;

    fn default_value(&self) -> StoreResult<String> {
        self.get_string("")
    }

    fn set_default_value(&self, value: &str) -> StoreResult<()> {
        self.set_string("", value)
    }
}

/// A store of keys addressed by backslash-separated paths.
pub trait KeyStore {
    type Key: StoreKey;

    /// Open an existing key
    fn open_key(&self, path: &str, access: Access) -> StoreResult<Self::Key>;

    /// Create a key (and any missing ancestors) or open it if it exists
    fn create_key(&self, path: &str) -> StoreResult<Self::Key>;

    /// Delete a key that has no children
    fn delete_key(&self, path: &str) -> StoreResult<()>;

    /// Delete a key and everything below it
    fn delete_tree(&self, path: &str) -> StoreResult<()> {
        let children = self.open_key(path, Access::All)?.subkey_names()?;
        for child in children {
            self.delete_tree(&join_key(path, &child))?;
        }
        self.delete_key(path)
    }

    /// Whether the key exists; errors other than "not found" are propagated
    fn key_exists(&self, path: &str) -> StoreResult<bool> {
        match self.open_key(path, Access::Read) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
