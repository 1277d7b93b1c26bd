//! # Snapshot & Conflict Detection
//!
//! Reads the overlay identifier list once and works out what is wrong with
//! it:
//!
//! - every readable entry goes into the backup snapshot
//! - entries whose trimmed names collide are duplicates; the first one seen
//!   survives and the rest are scheduled for deletion
//! - survivors whose stored name differs from the desired name (trimmed, plus
//!   one leading space for boosted handlers) are scheduled for renaming
//!
//! Entries that cannot be opened or read are logged and left out entirely.
//! Only an unreadable parent key fails the pass.
//!
//! ```
//! use icondetect_core::{DetectConfig, Entry};
//! use icondetect_scan::Detector;
//! use icondetect_store::MemoryStore;
//!
//! # fn main() -> icondetect_core::Result<()> {
//! let config = DetectConfig::builder().boost(["Foo"]).build()?;
//! let store = MemoryStore::from_entries(
//!     &config.parent_path,
//!     vec![Entry::new("Foo ", "A"), Entry::new("Foo", "B"), Entry::new("Bar", "C")],
//! );
//!
//! let result = Detector::new(config).detect(&store)?;
//! assert!(result.changed());
//! assert_eq!(result.deletions(), ["Foo"]);
//! assert_eq!(result.renames()["Foo "], " Foo");
//! # Ok(())
//! # }
//! ```

mod result;

pub use result::{DetectionResult, SkippedEntry};

use icondetect_core::prelude::*;
use icondetect_core::SurvivorOrder;
use icondetect_store::{Access, KeyStore, StoreKey};

/// Single-use detector: [`Detector::detect`] consumes it.
#[derive(Debug, Clone)]
pub struct Detector {
    config: DetectConfig,
}

impl Detector {
    pub fn new(config: DetectConfig) -> Self {
        Self { config }
    }

    /// Enumerate the parent key and classify every child entry.
    ///
    /// Fails with [`Error::StoreUnavailable`] when the parent key cannot be
    /// opened or enumerated.
    pub fn detect<S: KeyStore>(self, store: &S) -> Result<DetectionResult> {
        let location = self.config.location();
        let parent = store
            .open_key(&location.path, Access::Read)
            .map_err(|e| Error::store_unavailable(location.to_string(), e))?;
        let mut names = parent
            .subkey_names()
            .map_err(|e| Error::store_unavailable(location.to_string(), e))?;
        drop(parent);

        if self.config.survivor_order == SurvivorOrder::Sorted {
            names.sort();
        }

        log::debug!("scanning {} entries under {}", names.len(), location);

        let mut result = DetectionResult::new(location.clone());
        for name in names {
            match read_entry(store, &location, &name) {
                Ok(entry) => {
                    result.record(entry, |canonical| canonical.desired_name(&self.config.boost))
                }
                Err(e) => {
                    log::warn!("{}, skip", e);
                    result.skip(name, e.to_string());
                }
            }
        }

        let result = result.finish();
        log::info!(
            "detected {} duplicates and {} renames under {}",
            result.deletions().len(),
            result.renames().len(),
            location
        );
        Ok(result)
    }
}

fn read_entry<S: KeyStore>(store: &S, location: &KeyLocation, name: &str) -> Result<Entry> {
    let key = store
        .open_key(&location.child(name), Access::Read)
        .map_err(|e| Error::entry_read(name, e))?;
    let value = key
        .default_value()
        .map_err(|e| Error::entry_read(name, e))?;
    Ok(Entry::new(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use icondetect_store::{FaultKind, MemoryStore};

    fn config() -> DetectConfig {
        DetectConfig::builder().boost(["Foo"]).build().unwrap()
    }

    fn store(entries: &[(&str, &str)]) -> MemoryStore {
        MemoryStore::from_entries(
            &config().parent_path,
            entries.iter().map(|(n, v)| Entry::new(*n, *v)),
        )
    }

    #[test]
    fn test_duplicate_and_boost_scenario() {
        let store = store(&[("Foo ", "A"), ("Foo", "B"), ("Bar", "C")]);
        let result = Detector::new(config()).detect(&store).unwrap();

        assert_eq!(result.backup().len(), 3);
        assert_eq!(result.backup()["Foo "], "A");
        assert_eq!(result.backup()["Foo"], "B");
        assert_eq!(result.backup()["Bar"], "C");

        assert_eq!(result.survivors().len(), 2);
        assert_eq!(result.survivors()[&CanonicalName::from_raw("Foo")], "A");
        assert_eq!(result.survivors()[&CanonicalName::from_raw("Bar")], "C");

        assert_eq!(result.deletions(), ["Foo"]);
        assert_eq!(result.renames().len(), 1);
        assert_eq!(result.renames()["Foo "], " Foo");
        assert!(result.changed());
        assert!(result.skipped().is_empty());
    }

    #[test]
    fn test_clean_list_is_unchanged() {
        let store = store(&[(" Foo", "A"), ("Bar", "C")]);
        let result = Detector::new(config()).detect(&store).unwrap();
        assert!(!result.changed());
        assert!(result.deletions().is_empty());
        assert!(result.renames().is_empty());
        assert_eq!(result.backup().len(), 2);
    }

    #[test]
    fn test_unboosted_names_lose_whitespace() {
        let store = store(&[("  Bar", "C"), ("Baz\t", "D")]);
        let result = Detector::new(config()).detect(&store).unwrap();
        assert_eq!(result.renames()["  Bar"], "Bar");
        assert_eq!(result.renames()["Baz\t"], "Baz");
    }

    #[test]
    fn test_unreadable_entry_is_left_out() {
        let store = store(&[("Foo ", "A"), ("Foo", "B"), ("Bar", "C")]);
        store.inject_fault(FaultKind::Read, &config().location().child("Foo "));

        let result = Detector::new(config()).detect(&store).unwrap();
        assert!(!result.backup().contains_key("Foo "));
        assert_eq!(result.survivors()[&CanonicalName::from_raw("Foo")], "B");
        assert!(result.deletions().is_empty());
        assert_eq!(result.renames()["Foo"], " Foo");
        assert_eq!(result.skipped().len(), 1);
        assert_eq!(result.skipped()[0].raw_name, "Foo ");
    }

    #[test]
    fn test_entry_without_default_value_is_skipped() {
        let store = store(&[("Bar", "C")]);
        store.insert_key(&config().location().child("Empty"));

        let result = Detector::new(config()).detect(&store).unwrap();
        assert_eq!(result.backup().len(), 1);
        assert_eq!(result.skipped()[0].raw_name, "Empty");
    }

    #[test]
    fn test_missing_parent_is_fatal() {
        let store = MemoryStore::new();
        let err = Detector::new(config()).detect(&store).unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }));
    }

    #[test]
    fn test_unopenable_parent_is_fatal() {
        let store = store(&[("Bar", "C")]);
        store.inject_fault(FaultKind::Open, &config().parent_path);
        let err = Detector::new(config()).detect(&store).unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }));
    }

    #[test]
    fn test_sorted_order_prefers_lowest_raw_name() {
        let store = store(&[("Foo", "B"), (" Foo", "A")]);

        let enumeration = Detector::new(config()).detect(&store).unwrap();
        assert_eq!(enumeration.deletions(), [" Foo"]);
        assert_eq!(enumeration.renames()["Foo"], " Foo");

        let sorted_config = DetectConfig::builder()
            .boost(["Foo"])
            .survivor_order(SurvivorOrder::Sorted)
            .build()
            .unwrap();
        let sorted = Detector::new(sorted_config).detect(&store).unwrap();
        assert_eq!(sorted.deletions(), ["Foo"]);
        assert!(sorted.renames().is_empty());
    }

    #[test]
    fn test_result_serializes_for_reports() {
        let store = store(&[("Foo ", "A"), ("Foo", "B")]);
        let result = Detector::new(config()).detect(&store).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["deletions"][0], "Foo");
        assert_eq!(json["renames"]["Foo "], " Foo");
        assert_eq!(json["changed"], true);
    }
}
