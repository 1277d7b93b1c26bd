//! # Repair Applier
//!
//! Applies a [`RepairPlan`] to a [`KeyStore`] in two strictly ordered
//! phases:
//!
//! 1. **Deletion** - every duplicate is deleted. A failed deletion is logged
//!    and skipped.
//! 2. **Rename** - the store has no rename primitive, so each rename copies
//!    the old entry's value to a newly created key and then deletes the old
//!    key, in ascending old-name order. If the copy fails, the old entry is
//!    left untouched. Names compare case-insensitively in the store, so a
//!    target still held by the old name of a later rename is retried once
//!    that rename went through.
//!
//! Only a parent key that cannot be opened for write aborts the repair; every
//! per-entry failure is recovered, logged and recorded in the
//! [`RepairReport`]. The pre-fix backup is the recovery path for anything a
//! partial repair leaves behind, and [`Repairer::restore`] replays it.
//!
//! ```
//! use icondetect_core::{DetectConfig, Entry};
//! use icondetect_repair::Repairer;
//! use icondetect_scan::Detector;
//! use icondetect_store::MemoryStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DetectConfig::builder().boost(["Foo"]).build()?;
//! let store = MemoryStore::from_entries(
//!     &config.parent_path,
//!     vec![Entry::new("Foo ", "A"), Entry::new("Foo", "B")],
//! );
//!
//! let result = Detector::new(config.clone()).detect(&store)?;
//! let report = Repairer::new(&store).fix(result)?;
//! assert_eq!((report.deleted, report.renamed, report.failed), (1, 1, 0));
//!
//! let names: Vec<_> = store.entries(&config.parent_path)?.into_iter().map(|e| e.raw_name).collect();
//! assert_eq!(names, vec![" Foo"]);
//! # Ok(())
//! # }
//! ```

mod plan;

pub use plan::{RepairAction, RepairPlan};

use icondetect_core::prelude::*;
use icondetect_export::BackupFile;
use icondetect_scan::DetectionResult;
use icondetect_store::{Access, KeyStore, StoreKey};
use serde::Serialize;
use std::time::Instant;

/// Record of a single executed action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRecord {
    /// Index in the plan
    pub index: usize,
    pub action: RepairAction,
    pub success: bool,
    /// Error message if failed
    pub error: Option<String>,
}

/// Outcome of a repair or restore
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    pub deleted: usize,
    pub renamed: usize,
    pub restored: usize,
    pub failed: usize,
    pub records: Vec<OperationRecord>,
    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    fn succeeded(&mut self, index: usize, action: RepairAction) {
        match action {
            RepairAction::Delete { .. } => self.deleted += 1,
            RepairAction::Rename { .. } => self.renamed += 1,
            RepairAction::Restore { .. } => self.restored += 1,
        }
        self.records.push(OperationRecord {
            index,
            action,
            success: true,
            error: None,
        });
    }

    fn failed(&mut self, index: usize, action: RepairAction, error: &Error) {
        log::warn!("{}: {}, skip", action, error);
        self.failed += 1;
        self.records.push(OperationRecord {
            index,
            action,
            success: false,
            error: Some(error.to_string()),
        });
    }

    fn finish(mut self, started: Instant) -> Self {
        self.records.sort_by_key(|r| r.index);
        self.duration_ms = started.elapsed().as_millis() as u64;
        self
    }
}

/// Applies repairs and restores against one store
pub struct Repairer<'a, S: KeyStore> {
    store: &'a S,
}

impl<'a, S: KeyStore> Repairer<'a, S> {
    /// Create a new repairer
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Repair the list described by `result`.
    ///
    /// Takes the result by value: a detection result is applied at most once.
    pub fn fix(&self, result: DetectionResult) -> Result<RepairReport> {
        self.apply(RepairPlan::from(&result))
    }

    /// Execute a plan: deletion phase, then rename phase.
    pub fn apply(&self, plan: RepairPlan) -> Result<RepairReport> {
        let started = Instant::now();
        let location = plan.location;
        let mut report = RepairReport::default();

        let (deletions, renames): (Vec<_>, Vec<_>) = plan
            .actions
            .into_iter()
            .enumerate()
            .partition(|(_, action)| matches!(action, RepairAction::Delete { .. }));

        if deletions.is_empty() && renames.is_empty() {
            return Ok(report.finish(started));
        }

        // Deletion phase
        if !deletions.is_empty() {
            let _parent = self.open_parent(&location)?;
            for (index, action) in deletions {
                let RepairAction::Delete { name } = &action else {
                    continue;
                };
                match self.store.delete_key(&location.child(name)) {
                    Ok(()) => {
                        log::info!("delete {:?}", name);
                        report.succeeded(index, action);
                    }
                    Err(e) => {
                        let err = Error::entry_write(name.clone(), e);
                        report.failed(index, action, &err);
                    }
                }
            }
        }

        // Rename phase: copy then delete, one entry at a time
        if !renames.is_empty() {
            let _parent = self.open_parent(&location)?;
            let mut pending = renames;
            loop {
                let attempted = pending.len();
                let mut blocked = Vec::new();
                for (index, action) in pending {
                    let RepairAction::Rename { from, to } = &action else {
                        report.failed(
                            index,
                            action.clone(),
                            &Error::unsupported("only deletions and renames can be applied"),
                        );
                        continue;
                    };
                    match self.rename_entry(&location, from, to) {
                        Ok(()) => {
                            log::info!("rename {:?} to {:?}", from, to);
                            report.succeeded(index, action);
                        }
                        Err(err) if is_blocked(&err) => blocked.push((index, action, err)),
                        Err(err) => report.failed(index, action, &err),
                    }
                }

                // A target may be held by the old name of a later rename
                if blocked.is_empty() || blocked.len() == attempted {
                    for (index, action, err) in blocked {
                        report.failed(index, action, &err);
                    }
                    break;
                }
                pending = blocked
                    .into_iter()
                    .map(|(index, action, _)| (index, action))
                    .collect();
            }
        }

        let report = report.finish(started);
        log::info!(
            "repair finished: {} deleted, {} renamed, {} failed",
            report.deleted,
            report.renamed,
            report.failed
        );
        Ok(report)
    }

    /// Make the list under `backup.location` match the backup exactly.
    ///
    /// Every backed-up entry is recreated with its value, then entries not in
    /// the backup are deleted.
    pub fn restore(&self, backup: &BackupFile) -> Result<RepairReport> {
        let started = Instant::now();
        let location = &backup.location;
        let mut report = RepairReport::default();

        let parent = self
            .store
            .create_key(&location.path)
            .map_err(|e| Error::store_unavailable(location.to_string(), e))?;
        let current = parent
            .subkey_names()
            .map_err(|e| Error::store_unavailable(location.to_string(), e))?;
        drop(parent);

        let mut index = 0;
        for (name, value) in &backup.entries {
            let action = RepairAction::Restore {
                name: name.clone(),
                value: value.clone(),
            };
            let written = self
                .store
                .create_key(&location.child(name))
                .and_then(|key| key.set_default_value(value));
            match written {
                Ok(()) => {
                    log::info!("restore {:?}", name);
                    report.succeeded(index, action);
                }
                Err(e) => report.failed(index, action, &Error::entry_write(name.clone(), e)),
            }
            index += 1;
        }

        let extras = current.into_iter().filter(|name| {
            !backup
                .entries
                .keys()
                .any(|kept| kept.eq_ignore_ascii_case(name))
        });
        for name in extras {
            let action = RepairAction::Delete { name: name.clone() };
            match self.store.delete_key(&location.child(&name)) {
                Ok(()) => {
                    log::info!("delete {:?} (not in backup)", name);
                    report.succeeded(index, action);
                }
                Err(e) => report.failed(index, action, &Error::entry_write(name, e)),
            }
            index += 1;
        }

        Ok(report.finish(started))
    }

    fn open_parent(&self, location: &KeyLocation) -> Result<S::Key> {
        self.store
            .open_key(&location.path, Access::All)
            .map_err(|e| Error::store_unavailable(location.to_string(), e))
    }

    /// Copy `from` to `to`, then delete `from`.
    fn rename_entry(&self, location: &KeyLocation, from: &str, to: &str) -> Result<()> {
        self.copy_entry(location, from, to)?;
        self.store
            .delete_key(&location.child(from))
            .map_err(|e| Error::entry_write(from, e))
    }

    /// Create `to` with the value of `from`. Leaves `from` untouched.
    fn copy_entry(&self, location: &KeyLocation, from: &str, to: &str) -> Result<()> {
        let value = self
            .store
            .open_key(&location.child(from), Access::Read)
            .and_then(|key| key.default_value())
            .map_err(|e| Error::entry_read(from, e))?;

        let to_path = location.child(to);
        match self.store.key_exists(&to_path) {
            Ok(false) => {}
            Ok(true) => {
                return Err(Error::entry_write(
                    to,
                    StoreError::AlreadyExists { path: to_path },
                ));
            }
            Err(e) => return Err(Error::entry_write(to, e)),
        }

        let key = self
            .store
            .create_key(&to_path)
            .map_err(|e| Error::entry_write(to, e))?;
        if let Err(e) = key.set_default_value(&value) {
            drop(key);
            if let Err(cleanup) = self.store.delete_key(&to_path) {
                log::warn!("error removing partial key {:?}: {}", to, cleanup);
            }
            return Err(Error::entry_write(to, e));
        }
        Ok(())
    }
}

/// The rename target is taken by another key
fn is_blocked(err: &Error) -> bool {
    matches!(
        err,
        Error::EntryWrite {
            source: StoreError::AlreadyExists { .. },
            ..
        }
    )
}
