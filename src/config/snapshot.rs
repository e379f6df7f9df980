use crate::config::profile::{now_millis, AppAssignment, Profile};
use crate::error::MaskError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

fn default_true() -> bool {
    true
}

/// Whole configuration as delivered by the configuration boundary
///
/// Snapshots are immutable once published. Every editing operation returns
/// a new snapshot with `version + 1`; consumers replace their reference
/// rather than diffing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub version: u64,

    /// Global switch; when false every hook passes through
    #[serde(default = "default_true")]
    pub module_enabled: bool,

    #[serde(default)]
    pub profiles: Vec<Profile>,

    /// Package name → assignment
    #[serde(default)]
    pub assignments: BTreeMap<String, AppAssignment>,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            version: 0,
            module_enabled: true,
            profiles: Vec::new(),
            assignments: BTreeMap::new(),
        }
    }
}

impl ConfigSnapshot {
    /// Parse and validate a JSON snapshot
    pub fn from_json_str(content: &str) -> Result<Self> {
        let snapshot: ConfigSnapshot =
            serde_json::from_str(content).context("Failed to parse configuration snapshot")?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Load a JSON snapshot from disk
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "Failed to read configuration snapshot: {}",
                path.as_ref().display()
            )
        })?;
        Self::from_json_str(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize configuration snapshot")
    }

    /// Check structural invariants
    pub fn validate(&self) -> std::result::Result<(), MaskError> {
        let mut ids = HashSet::new();
        for profile in &self.profiles {
            if profile.id.is_empty() {
                return Err(MaskError::InvalidConfig("profile with empty id".into()));
            }
            if !ids.insert(profile.id.as_str()) {
                return Err(MaskError::InvalidConfig(format!(
                    "duplicate profile id '{}'",
                    profile.id
                )));
            }
        }

        let defaults = self.profiles.iter().filter(|p| p.is_default).count();
        if defaults > 1 {
            return Err(MaskError::InvalidConfig(format!(
                "{} profiles marked default, at most one allowed",
                defaults
            )));
        }

        for (package, assignment) in &self.assignments {
            if package != &assignment.package {
                return Err(MaskError::InvalidConfig(format!(
                    "assignment key '{}' does not match package '{}'",
                    package, assignment.package
                )));
            }
            if let Some(id) = &assignment.profile_id {
                if !ids.contains(id.as_str()) {
                    return Err(MaskError::InvalidConfig(format!(
                        "assignment for '{}' refers to unknown profile '{}'",
                        package, id
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn profile(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn default_profile(&self) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.is_default)
    }

    pub fn assignment_for(&self, package: &str) -> Option<&AppAssignment> {
        self.assignments.get(package)
    }

    fn next(&self) -> Self {
        let mut next = self.clone();
        next.version = self.version + 1;
        next
    }

    /// Copy with `profile` inserted or replacing the one with the same id
    ///
    /// Marking the inserted profile default clears the flag everywhere else.
    pub fn with_profile(&self, profile: Profile) -> Self {
        let mut next = self.next();
        if profile.is_default {
            for p in &mut next.profiles {
                p.is_default = false;
            }
        }
        match next.profiles.iter_mut().find(|p| p.id == profile.id) {
            Some(slot) => *slot = profile,
            None => next.profiles.push(profile),
        }
        next
    }

    /// Copy without the profile; assignments pointing at it are cleared and
    /// a removed default is replaced by the first remaining profile
    pub fn remove_profile(&self, id: &str) -> std::result::Result<Self, MaskError> {
        let position = self
            .profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| MaskError::ProfileNotFound(id.to_string()))?;

        let mut next = self.next();
        let removed = next.profiles.remove(position);

        for assignment in next.assignments.values_mut() {
            if assignment.profile_id.as_deref() == Some(id) {
                assignment.profile_id = None;
            }
        }

        if removed.is_default {
            if let Some(first) = next.profiles.first_mut() {
                first.is_default = true;
                first.updated_at = now_millis();
            }
        }

        Ok(next)
    }

    pub fn set_default(&self, id: &str) -> std::result::Result<Self, MaskError> {
        if self.profile(id).is_none() {
            return Err(MaskError::ProfileNotFound(id.to_string()));
        }
        let mut next = self.next();
        for p in &mut next.profiles {
            p.is_default = p.id == id;
        }
        Ok(next)
    }

    /// Copy with `package` assigned to `profile_id`
    ///
    /// Keeps each profile's `assigned_apps` set in step with the assignment
    /// table.
    pub fn assign(
        &self,
        package: &str,
        profile_id: Option<&str>,
        enabled: bool,
    ) -> std::result::Result<Self, MaskError> {
        if let Some(id) = profile_id {
            if self.profile(id).is_none() {
                return Err(MaskError::ProfileNotFound(id.to_string()));
            }
        }

        let mut next = self.next();
        for p in &mut next.profiles {
            if Some(p.id.as_str()) == profile_id {
                p.assigned_apps.insert(package.to_string());
            } else {
                p.assigned_apps.remove(package);
            }
        }
        next.assignments.insert(
            package.to_string(),
            AppAssignment::new(package, profile_id.map(str::to_string), enabled),
        );
        Ok(next)
    }

    pub fn with_module_enabled(&self, enabled: bool) -> Self {
        let mut next = self.next();
        next.module_enabled = enabled;
        next
    }
}
