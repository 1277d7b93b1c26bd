//! Orchestration: detect, back up, repair, notify.

use crate::notify::{Notification, Notifier};
use crate::process::{self, ProcessControl};
use crate::scheme;
use chrono::Local;
use icondetect_core::{AppConfig, Error, KeyLocation, Result};
use icondetect_export::{backup_file_name, read_backup, write_backup};
use icondetect_repair::{RepairPlan, RepairReport, Repairer};
use icondetect_scan::{DetectionResult, Detector};
use icondetect_store::{KeyStore, MemoryStore};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Switches for one repair run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Write a backup file before changing anything
    pub backup: bool,
    /// Detect and report only
    pub dry_run: bool,
}

/// What a dry run would do
#[derive(Debug, Clone, Serialize)]
pub struct DryRunReport {
    pub detection: DetectionResult,
    pub plan: RepairPlan,
}

/// Result of [`run_repair`]
#[derive(Debug)]
pub enum RunOutcome {
    /// The list was already clean
    Unchanged,
    /// Nothing was changed on request
    DryRun(DryRunReport),
    Repaired {
        report: RepairReport,
        backup: Option<PathBuf>,
    },
}

impl RunOutcome {
    pub fn is_repaired(&self) -> bool {
        matches!(self, RunOutcome::Repaired { .. })
    }
}

/// Detect, back up (if requested), repair and notify.
///
/// A failing backup aborts the run before the store is touched. A failing
/// notification is only logged.
pub fn run_repair<S: KeyStore>(
    store: &S,
    config: &AppConfig,
    options: &RunOptions,
    notifier: &dyn Notifier,
    scheme_registered: bool,
) -> Result<RunOutcome> {
    let detection = Detector::new(config.detect.clone()).detect(store)?;
    if !detection.changed() {
        log::debug!("no changes needed under {}", detection.location());
        return Ok(RunOutcome::Unchanged);
    }

    if options.dry_run {
        let plan = RepairPlan::from(&detection);
        return Ok(RunOutcome::DryRun(DryRunReport { detection, plan }));
    }

    let backup = if options.backup {
        let path = config.backup_dir.join(backup_file_name(&Local::now()));
        write_backup(&path, detection.location(), detection.backup())?;
        log::info!("backup written to {}", path.display());
        Some(path)
    } else {
        None
    };

    let report = Repairer::new(store).fix(detection)?;

    if config.notify.enabled {
        let mut notification = Notification::new(&config.notify).with_body(format!(
            "{} deleted, {} renamed, {} failed",
            report.deleted, report.renamed, report.failed
        ));
        if scheme_registered {
            notification = notification.with_restart(scheme::restart_uri(
                &config.scheme,
                &config.notify.restart_target,
            ));
        }
        if let Err(e) = notifier.notify(&notification) {
            log::warn!("error sending notification: {}", e);
        }
    }

    Ok(RunOutcome::Repaired { report, backup })
}

/// Make the store match the backup file at `path`.
pub fn run_restore<S: KeyStore>(store: &S, path: &Path) -> Result<RepairReport> {
    let backup = read_backup(path)?;
    log::info!(
        "restoring {} entries under {} from {}",
        backup.entries.len(),
        backup.location,
        path.display()
    );
    Repairer::new(store).restore(&backup)
}

/// Handle a `<scheme>://<image>` callback: restart `image` if it is the
/// configured restart target.
pub fn run_restart<P: ProcessControl + ?Sized>(
    control: &P,
    uri: &str,
    config: &AppConfig,
) -> Result<PathBuf> {
    let image = scheme::parse_restart_uri(uri, &config.scheme)?;
    if !image.eq_ignore_ascii_case(&config.notify.restart_target) {
        return Err(Error::process(format!(
            "should be {} in {}",
            config.notify.restart_target, uri
        )));
    }
    process::restart(control, &image)
}

/// A backup-format file loaded into a [`MemoryStore`], so the normal
/// operations can run offline and the result can be written back.
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
    location: KeyLocation,
    store: MemoryStore,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let backup = read_backup(path)?;
        let store = MemoryStore::from_entries(&backup.location.path, backup.to_entries());
        let location = backup.location;
        Ok(Self {
            path: path.to_path_buf(),
            location,
            store,
        })
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn location(&self) -> &KeyLocation {
        &self.location
    }

    /// `config` retargeted at the snapshot's key.
    pub fn config(&self, config: &AppConfig) -> AppConfig {
        let mut config = config.clone();
        config.detect.hive = self.location.hive;
        config.detect.parent_path = self.location.path.clone();
        config
    }

    /// Rewrite the snapshot file with the current store contents.
    pub fn save(&self) -> Result<()> {
        let entries: BTreeMap<String, String> = self
            .store
            .entries(&self.location.path)
            .map_err(|e| Error::store_unavailable(self.location.to_string(), e))?
            .into_iter()
            .map(|e| (e.raw_name, e.value))
            .collect();
        write_backup(&self.path, &self.location, &entries)?;
        log::info!("snapshot {} updated", self.path.display());
        Ok(())
    }
}
