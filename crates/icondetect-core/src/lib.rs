//! # icon-detect core
//!
//! Shared data model, error types and configuration for the overlay
//! identifier repair tool. Every other crate in the workspace depends on this
//! one.
//!
//! ## Core Modules
//!
//! - [`models`] - Entries, canonical names and key locations
//! - [`error`] - Error taxonomy and Result aliases
//! - [`config`] - Application, detector, log and notification configuration
//!
//! ## Usage
//!
//! ```
//! use icondetect_core::prelude::*;
//! use std::collections::BTreeSet;
//!
//! let boost: BTreeSet<String> = ["Tortoise1Normal".to_string()].into_iter().collect();
//! let name = CanonicalName::from_raw("Tortoise1Normal  ");
//! assert_eq!(name.desired_name(&boost), " Tortoise1Normal");
//! ```

pub mod config;
pub mod error;
pub mod models;

pub use config::*;
pub use error::{Error, Result, StoreError, StoreResult};
pub use models::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AppConfig, DetectConfig, LogConfig, NotifyConfig, SurvivorOrder};
    pub use crate::error::{Error, Result, StoreError, StoreResult};
    pub use crate::models::{CanonicalName, Entry, Hive, KeyLocation, join_key};
}
