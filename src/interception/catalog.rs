use crate::concealment::ConcealmentSurface;
use crate::identifier::IdentifierType;
use crate::interception::site::{HookSite, Stage};
use crate::resolver::Projection;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// What a hooked call-site is mapped to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HookTarget {
    /// Report a resolved identifier (or one field of it)
    Identity {
        identifier: IdentifierType,
        projection: Projection,
        /// Only applies when one of the string arguments equals this key
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
    },
    /// Filter an introspection surface
    Concealment { surface: ConcealmentSurface },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub site: HookSite,
    pub target: HookTarget,
}

/// Raw `[[hook]]` table as written in TOML
#[derive(Deserialize)]
struct RawEntry {
    interface: String,
    method: String,
    #[serde(default)]
    params: Vec<String>,
    stage: Stage,
    identifier: Option<IdentifierType>,
    projection: Option<Projection>,
    selector: Option<String>,
    surface: Option<ConcealmentSurface>,
}

impl RawEntry {
    fn into_entry(self) -> Result<CatalogEntry> {
        let site = HookSite {
            interface: self.interface,
            method: self.method,
            params: self.params,
            stage: self.stage,
        };

        let target = match (self.identifier, self.surface) {
            (Some(identifier), None) => {
                let projection = self.projection.unwrap_or_default();
                if !projection.applies_to(identifier) {
                    anyhow::bail!(
                        "Projection {:?} does not apply to {} at {}",
                        projection,
                        identifier,
                        site
                    );
                }
                HookTarget::Identity {
                    identifier,
                    projection,
                    selector: self.selector,
                }
            }
            (None, Some(surface)) => {
                if self.projection.is_some() || self.selector.is_some() {
                    anyhow::bail!(
                        "Concealment hook {} cannot carry a projection or selector",
                        site
                    );
                }
                HookTarget::Concealment { surface }
            }
            (Some(_), Some(_)) => {
                anyhow::bail!("Hook {} names both an identifier and a surface", site)
            }
            (None, None) => anyhow::bail!("Hook {} names neither an identifier nor a surface", site),
        };

        Ok(CatalogEntry { site, target })
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    version: u32,
    #[serde(default)]
    hook: Vec<RawEntry>,
}

/// Versioned, fixed set of call-sites supplied at startup
///
/// # Example TOML
/// ```toml
/// version = 1
///
/// [[hook]]
/// interface = "android.telephony.TelephonyManager"
/// method = "getSimOperator"
/// stage = "after"
/// identifier = "CARRIER_MCC_MNC"
///
/// [[hook]]
/// interface = "java.lang.Thread"
/// method = "getStackTrace"
/// stage = "after"
/// surface = "stack_trace"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookCatalog {
    pub version: u32,
    pub entries: Vec<CatalogEntry>,
}

impl HookCatalog {
    /// Load a catalog from a TOML file
    ///
    /// # Errors
    /// Returns error if the file is missing, is not valid TOML, or maps the
    /// same site to the same target twice.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read hook catalog: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile =
            toml::from_str(content).context("Failed to parse TOML hook catalog")?;

        let entries = file
            .hook
            .into_iter()
            .map(RawEntry::into_entry)
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert((entry.site.key(), &entry.target)) {
                anyhow::bail!("Duplicate hook {} -> {:?}", entry.site, entry.target);
            }
        }

        Ok(Self {
            version: file.version,
            entries,
        })
    }

    /// Catalog compiled into the binary from catalog-default.toml
    pub fn default_catalog() -> Result<Self> {
        const DEFAULT_TOML: &str = include_str!("../../catalog-default.toml");
        Self::from_toml_str(DEFAULT_TOML).context("Failed to parse embedded catalog-default.toml")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sites(&self) -> impl Iterator<Item = &HookSite> {
        self.entries.iter().map(|e| &e.site)
    }

    /// Entries reporting `ty`, in catalog order
    pub fn entries_for(&self, ty: IdentifierType) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(move |e| {
            matches!(e.target, HookTarget::Identity { identifier, .. } if identifier == ty)
        })
    }
}
