//! # icon-detect
//!
//! Orchestrator and command line front end: configuration loading, the log
//! sink, notifications, URI scheme registration and the restart callback.

pub mod app;
pub mod cli;
pub mod logging;
pub mod notify;
pub mod process;
pub mod scheme;
pub mod settings;

pub use app::{DryRunReport, RunOptions, RunOutcome, Snapshot, run_repair, run_restart, run_restore};
pub use icondetect_core::APP_NAME;
pub use icondetect_core::prelude::*;
pub use notify::{LogNotifier, Notification, Notifier};
pub use process::{ProcessControl, SystemProcesses};
