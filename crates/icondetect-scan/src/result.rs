//! Immutable outcome of one detection pass.

use icondetect_core::{CanonicalName, Entry, KeyLocation};
use serde::Serialize;
use std::collections::BTreeMap;

/// An entry the detector could not read and left out of every list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub raw_name: String,
    pub reason: String,
}

/// Everything one detection pass learned about the overlay list.
///
/// Built once by [`crate::Detector::detect`] and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    location: KeyLocation,
    backup: BTreeMap<String, String>,
    survivors: BTreeMap<CanonicalName, String>,
    deletions: Vec<String>,
    renames: BTreeMap<String, String>,
    skipped: Vec<SkippedEntry>,
    changed: bool,
}

impl DetectionResult {
    pub(crate) fn new(location: KeyLocation) -> Self {
        Self {
            location,
            backup: BTreeMap::new(),
            survivors: BTreeMap::new(),
            deletions: Vec::new(),
            renames: BTreeMap::new(),
            skipped: Vec::new(),
            changed: false,
        }
    }

    /// Classify one successfully read entry.
    pub(crate) fn record(&mut self, entry: Entry, desired: impl FnOnce(&CanonicalName) -> String) {
        self.backup
            .insert(entry.raw_name.clone(), entry.value.clone());

        let canonical = entry.canonical();
        if self.survivors.contains_key(&canonical) {
            log::debug!("duplicate of {:?}: {:?}", canonical.as_str(), entry.raw_name);
            self.deletions.push(entry.raw_name);
            return;
        }

        let desired = desired(&canonical);
        if desired != entry.raw_name {
            self.renames.insert(entry.raw_name, desired);
        }
        self.survivors.insert(canonical, entry.value);
    }

    pub(crate) fn skip(&mut self, raw_name: String, reason: String) {
        self.skipped.push(SkippedEntry { raw_name, reason });
    }

    pub(crate) fn finish(mut self) -> Self {
        self.changed = !self.deletions.is_empty() || !self.renames.is_empty();
        self
    }

    /// Key the entries were read from
    pub fn location(&self) -> &KeyLocation {
        &self.location
    }

    /// Raw name to value, for every entry that was read
    pub fn backup(&self) -> &BTreeMap<String, String> {
        &self.backup
    }

    /// Canonical name to value of the first entry seen for that name
    pub fn survivors(&self) -> &BTreeMap<CanonicalName, String> {
        &self.survivors
    }

    /// Raw names of duplicates, in processing order
    pub fn deletions(&self) -> &[String] {
        &self.deletions
    }

    /// Survivor raw name to the name it must be stored under
    pub fn renames(&self) -> &BTreeMap<String, String> {
        &self.renames
    }

    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    /// True when the list needs deletions or renames
    pub fn changed(&self) -> bool {
        self.changed
    }
}
