//! Package enumeration concealment

use crate::concealment::policy::ConcealmentPolicy;
use crate::interception::InterceptOutcome;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Entry returned by package listing calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl PackageEntry {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            label: None,
        }
    }
}

/// Hides companion applications from package queries
#[derive(Debug, Clone)]
pub struct PackageFilter {
    hidden: HashSet<String>,
}

impl PackageFilter {
    pub fn new(policy: &ConcealmentPolicy) -> Self {
        Self {
            hidden: policy
                .hidden_packages
                .iter()
                .map(|p| p.trim().to_lowercase())
                .collect(),
        }
    }

    /// Case-insensitive exact match against the hidden list
    pub fn is_hidden(&self, package: &str) -> bool {
        self.hidden.contains(&package.trim().to_lowercase())
    }

    /// Outcome for a "get info for package X" query
    pub fn package_info(&self, package: &str) -> InterceptOutcome {
        if self.is_hidden(package) {
            debug!(target: "idveil::concealment", "Reporting {} as not installed", package);
            InterceptOutcome::NotFound
        } else {
            InterceptOutcome::PassThrough
        }
    }

    /// Remove hidden entries from a package listing
    pub fn filter_packages(&self, entries: Vec<PackageEntry>) -> Vec<PackageEntry> {
        let before = entries.len();
        let kept: Vec<PackageEntry> = entries
            .into_iter()
            .filter(|e| !self.is_hidden(&e.package))
            .collect();
        if kept.len() != before {
            debug!(
                target: "idveil::concealment",
                "Removed {} hidden packages from listing",
                before - kept.len()
            );
        }
        kept
    }

    /// Same as [`Self::filter_packages`] for listings of bare names
    pub fn filter_names(&self, names: Vec<String>) -> Vec<String> {
        names.into_iter().filter(|n| !self.is_hidden(n)).collect()
    }
}
