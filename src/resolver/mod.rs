// Identity resolution engine
//
// Decides, per calling application and identifier type, which value the
// interception hooks report. Tiers, first match wins:
//
//   1. module disabled              -> pass through, nothing is masked
//   2. app assignment disabled      -> session fallback value
//   3. assigned or default profile  -> none or disabled: session fallback
//   4. identifier record disabled   -> session fallback value
//   5. explicit record value        -> reported as stored
//   6. otherwise                    -> derived from the profile's seed
//
// Derived and fallback values come from the same correlated derivation
// (see `derive`), so grouped values are mutually consistent in every tier.

mod context;
pub mod derive;
mod projection;

pub use context::{ResolutionContext, SESSION_OWNER};
pub use derive::{DerivationSeed, HardwareBundle, LocationBundle, SimBundle};
pub use projection::Projection;

use crate::config::{now_millis, ConfigSnapshot, SnapshotStore};
use crate::error::MaskError;
use crate::identifier::{CorrelationGroup, IdentifierType};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Why a generated fallback value was used instead of profile data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    AppDisabled,
    NoProfile,
    ProfileDisabled,
    RecordDisabled,
}

/// Where a resolved value came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueSource {
    Profile { profile_id: String },
    Derived { profile_id: String, group: CorrelationGroup },
    Fallback { reason: FallbackReason },
}

/// Outcome of resolving one identifier for one application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum Resolution {
    Value { value: String, source: ValueSource },
    /// Masking is off; the real value must be reported
    PassThrough,
}

impl Resolution {
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Value { value, .. } => Some(value),
            Self::PassThrough => None,
        }
    }

    pub fn source(&self) -> Option<&ValueSource> {
        match self {
            Self::Value { source, .. } => Some(source),
            Self::PassThrough => None,
        }
    }
}

/// Resolves identifier values against the current configuration snapshot
#[derive(Debug)]
pub struct Resolver {
    store: Arc<SnapshotStore>,
    context: ResolutionContext,
}

impl Resolver {
    pub fn new(store: Arc<SnapshotStore>, context: ResolutionContext) -> Self {
        Self { store, context }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.context
    }

    /// Value to report for `ty` when `app` asks for it
    pub fn resolve(&self, app: &str, ty: IdentifierType) -> Resolution {
        let (generation, snapshot) = self.store.current_with_generation();
        if !snapshot.module_enabled {
            return Resolution::PassThrough;
        }

        if let Some(hit) = self.context.cached(generation, app, ty) {
            return hit;
        }

        let resolution = self.resolve_uncached(&snapshot, app, ty);
        self.context.store(generation, app, ty, &resolution);
        resolution
    }

    /// Resolve every member of a correlation group
    pub fn resolve_group(
        &self,
        app: &str,
        group: CorrelationGroup,
    ) -> Vec<(IdentifierType, Resolution)> {
        group
            .members()
            .into_iter()
            .map(|ty| (ty, self.resolve(app, ty)))
            .collect()
    }

    fn fallback(&self, app: &str, ty: IdentifierType, reason: FallbackReason) -> Resolution {
        debug!(
            target: "idveil::resolver",
            "Fallback for {} / {}: {:?}",
            app,
            ty,
            reason
        );
        let seed = DerivationSeed::for_session(SESSION_OWNER, self.context.session_salt());
        Resolution::Value {
            value: derive::derive_value(&seed, ty),
            source: ValueSource::Fallback { reason },
        }
    }

    fn resolve_uncached(
        &self,
        snapshot: &ConfigSnapshot,
        app: &str,
        ty: IdentifierType,
    ) -> Resolution {
        let assignment = snapshot.assignment_for(app);
        if let Some(a) = assignment {
            if !a.enabled {
                return self.fallback(app, ty, FallbackReason::AppDisabled);
            }
        }

        let profile = assignment
            .and_then(|a| a.profile_id.as_deref())
            .and_then(|id| snapshot.profile(id))
            .or_else(|| snapshot.default_profile());

        let Some(profile) = profile else {
            return self.fallback(app, ty, FallbackReason::NoProfile);
        };
        if !profile.enabled {
            return self.fallback(app, ty, FallbackReason::ProfileDisabled);
        }

        let record = profile.record(ty);
        if !record.enabled {
            return self.fallback(app, ty, FallbackReason::RecordDisabled);
        }

        if let Some(value) = record.value {
            return Resolution::Value {
                value,
                source: ValueSource::Profile {
                    profile_id: profile.id.clone(),
                },
            };
        }

        let value = derive::derive_value(&DerivationSeed::for_profile(profile), ty);
        Resolution::Value {
            value,
            source: ValueSource::Derived {
                profile_id: profile.id.clone(),
                group: ty.correlation_group(),
            },
        }
    }

    /// Clear stored values for `types` on a profile and publish the result
    ///
    /// Values for the affected derivation keys change on the next lookup;
    /// everything else stays as it was.
    pub fn regenerate(
        &self,
        profile_id: &str,
        types: &[IdentifierType],
    ) -> Result<Arc<ConfigSnapshot>, MaskError> {
        let next = self.store.update(|snapshot| {
            let profile = snapshot
                .profile(profile_id)
                .ok_or_else(|| MaskError::ProfileNotFound(profile_id.to_string()))?;
            Ok::<_, MaskError>(snapshot.with_profile(profile.regenerated(types, now_millis())))
        })?;
        debug!(
            target: "idveil::resolver",
            "Regenerated {} types for profile {}",
            types.len(),
            profile_id
        );
        Ok(next)
    }

    pub fn regenerate_group(
        &self,
        profile_id: &str,
        group: CorrelationGroup,
    ) -> Result<Arc<ConfigSnapshot>, MaskError> {
        self.regenerate(profile_id, &group.members())
    }
}
