//! Data model shared by the detector, the backup writer and the repair applier.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Separator between key path components.
pub const KEY_SEPARATOR: char = '\\';

/// Join a parent key path and a child name.
///
/// The child name is used verbatim, including any surrounding whitespace.
pub fn join_key(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        return child.to_string();
    }
    let mut path = String::with_capacity(parent.len() + child.len() + 1);
    path.push_str(parent);
    path.push(KEY_SEPARATOR);
    path.push_str(child);
    path
}

/// Predefined registry root a key path is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Hive {
    #[default]
    LocalMachine,
    ClassesRoot,
    CurrentUser,
}

impl Hive {
    /// Name used for this root in registry export files.
    pub fn export_name(self) -> &'static str {
        match self {
            Hive::LocalMachine => "HKEY_LOCAL_MACHINE",
            Hive::ClassesRoot => "HKEY_CLASSES_ROOT",
            Hive::CurrentUser => "HKEY_CURRENT_USER",
        }
    }

    /// Parse an export root name (long or short form).
    pub fn from_export_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "HKEY_LOCAL_MACHINE" | "HKLM" => Some(Hive::LocalMachine),
            "HKEY_CLASSES_ROOT" | "HKCR" => Some(Hive::ClassesRoot),
            "HKEY_CURRENT_USER" | "HKCU" => Some(Hive::CurrentUser),
            _ => None,
        }
    }
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.export_name())
    }
}

/// Fully qualified location of the overlay identifier list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyLocation {
    pub hive: Hive,
    pub path: String,
}

impl KeyLocation {
    pub fn new(hive: Hive, path: impl Into<String>) -> Self {
        Self {
            hive,
            path: path.into(),
        }
    }

    /// Path of a child entry, relative to the hive.
    pub fn child(&self, raw_name: &str) -> String {
        join_key(&self.path, raw_name)
    }
}

impl fmt::Display for KeyLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.hive, KEY_SEPARATOR, self.path)
    }
}

/// One registration in the overlay list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Name exactly as stored, whitespace included
    pub raw_name: String,
    /// Default string value, usually a CLSID
    pub value: String,
}

impl Entry {
    pub fn new(raw_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            raw_name: raw_name.into(),
            value: value.into(),
        }
    }

    pub fn canonical(&self) -> CanonicalName {
        CanonicalName::from_raw(&self.raw_name)
    }
}

/// A raw name with leading and trailing whitespace removed; the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalName(String);

impl CanonicalName {
    pub fn from_raw(raw_name: &str) -> Self {
        Self(raw_name.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name this entry should be stored under.
    ///
    /// Boosted names get exactly one leading space so they sort ahead of every
    /// unprefixed name.
    pub fn desired_name(&self, boost: &BTreeSet<String>) -> String {
        if boost.contains(&self.0) {
            format!(" {}", self.0)
        } else {
            self.0.clone()
        }
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
