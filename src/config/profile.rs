use crate::identifier::IdentifierType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

fn default_true() -> bool {
    true
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Stored value and enable flag for one identifier type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for IdentifierRecord {
    fn default() -> Self {
        Self {
            value: None,
            enabled: true,
        }
    }
}

/// Named, versioned bundle of identifier records
///
/// Profiles are never mutated in place: every update returns a new profile
/// with a fresh `updated_at`, and the configuration boundary publishes it as
/// part of a whole new snapshot.
///
/// # Example JSON
/// ```json
/// {
///   "id": "work",
///   "name": "Work phone",
///   "is_default": true,
///   "created_at": 1700000000000,
///   "updated_at": 1700000000000,
///   "identifiers": {
///     "SERIAL": { "value": "ABC123", "enabled": true },
///     "IMEI": { "enabled": false }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,

    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub is_default: bool,

    #[serde(default)]
    pub created_at: u64,

    #[serde(default)]
    pub updated_at: u64,

    /// Records for configured types; absent types behave as enabled and empty
    #[serde(default)]
    pub identifiers: BTreeMap<IdentifierType, IdentifierRecord>,

    #[serde(default)]
    pub assigned_apps: BTreeSet<String>,

    /// Regeneration counter per derivation key (group name or type key)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub regeneration_epochs: BTreeMap<String, u32>,
}

impl Profile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, now: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            is_default: false,
            created_at: now,
            updated_at: now,
            identifiers: BTreeMap::new(),
            assigned_apps: BTreeSet::new(),
            regeneration_epochs: BTreeMap::new(),
        }
    }

    pub fn record(&self, ty: IdentifierType) -> IdentifierRecord {
        self.identifiers.get(&ty).cloned().unwrap_or_default()
    }

    pub fn epoch(&self, derivation_key: &str) -> u32 {
        self.regeneration_epochs
            .get(derivation_key)
            .copied()
            .unwrap_or(0)
    }

    /// Copy with an explicit value (or `None` to clear it) for `ty`
    pub fn with_value(&self, ty: IdentifierType, value: Option<String>, now: u64) -> Self {
        let mut next = self.clone();
        next.identifiers.entry(ty).or_default().value = value;
        next.updated_at = now;
        next
    }

    pub fn with_type_enabled(&self, ty: IdentifierType, enabled: bool, now: u64) -> Self {
        let mut next = self.clone();
        next.identifiers.entry(ty).or_default().enabled = enabled;
        next.updated_at = now;
        next
    }

    pub fn with_enabled(&self, enabled: bool, now: u64) -> Self {
        let mut next = self.clone();
        next.enabled = enabled;
        next.updated_at = now;
        next
    }

    /// Copy with stored values cleared for `types` and their derivation
    /// epochs advanced, so the next lookup derives fresh values
    ///
    /// Each derivation key is advanced once even when several requested
    /// types share it.
    pub fn regenerated(&self, types: &[IdentifierType], now: u64) -> Self {
        let mut next = self.clone();
        let mut bumped = BTreeSet::new();
        for ty in types {
            if let Some(record) = next.identifiers.get_mut(ty) {
                record.value = None;
            }
            let key = ty.derivation_key();
            if bumped.insert(key) {
                *next.regeneration_epochs.entry(key.to_string()).or_insert(0) += 1;
            }
        }
        next.updated_at = now;
        next
    }
}

/// Per-application masking assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppAssignment {
    pub package: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AppAssignment {
    pub fn new(package: impl Into<String>, profile_id: Option<String>, enabled: bool) -> Self {
        Self {
            package: package.into(),
            profile_id,
            enabled,
        }
    }
}
