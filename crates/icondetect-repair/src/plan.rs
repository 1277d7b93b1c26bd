//! Ordered list of store mutations derived from a detection result.

use icondetect_core::KeyLocation;
use icondetect_scan::DetectionResult;
use serde::Serialize;
use std::fmt;

/// A single store mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum RepairAction {
    /// Remove a duplicate entry
    Delete { name: String },
    /// Copy an entry to a new name, then remove the old one
    Rename { from: String, to: String },
    /// Recreate an entry from a backup
    Restore { name: String, value: String },
}

impl fmt::Display for RepairAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete { name } => write!(f, "delete {:?}", name),
            Self::Rename { from, to } => write!(f, "rename {:?} to {:?}", from, to),
            Self::Restore { name, .. } => write!(f, "restore {:?}", name),
        }
    }
}

/// All deletions first, then renames in ascending old-name order.
///
/// Deleting first frees every name a rename could want: a rename target
/// shares its canonical name only with duplicates of the same survivor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairPlan {
    pub location: KeyLocation,
    pub actions: Vec<RepairAction>,
}

impl RepairPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn deletions(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().filter_map(|a| match a {
            RepairAction::Delete { name } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn renames(&self) -> impl Iterator<Item = (&str, &str)> {
        self.actions.iter().filter_map(|a| match a {
            RepairAction::Rename { from, to } => Some((from.as_str(), to.as_str())),
            _ => None,
        })
    }
}

impl From<&DetectionResult> for RepairPlan {
    fn from(result: &DetectionResult) -> Self {
        let deletions = result
            .deletions()
            .iter()
            .map(|name| RepairAction::Delete { name: name.clone() });
        let renames = result.renames().iter().map(|(from, to)| RepairAction::Rename {
            from: from.clone(),
            to: to.clone(),
        });

        Self {
            location: result.location().clone(),
            actions: deletions.chain(renames).collect(),
        }
    }
}
