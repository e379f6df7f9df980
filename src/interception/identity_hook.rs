use crate::identifier::IdentifierType;
use crate::interception::registry::{HandlerResult, HookHandler, InterceptOutcome, Invocation};
use crate::resolver::{Projection, Resolution, Resolver};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

#[derive(Debug, Default)]
struct HookCache {
    generation: u64,
    by_caller: HashMap<String, Option<Value>>,
}

/// Single handler shape for every identifier call-site
///
/// Resolves `ty` for the calling app, projects it to what the call-site
/// returns and reports it. Results are cached per registration and caller
/// until the configuration snapshot changes, so hot accessors never go back
/// to the resolver.
#[derive(Debug)]
pub struct IdentityHook {
    ty: IdentifierType,
    projection: Projection,
    selector: Option<String>,
    resolver: Arc<Resolver>,
    cache: Mutex<HookCache>,
}

impl IdentityHook {
    pub fn new(ty: IdentifierType, projection: Projection, resolver: Arc<Resolver>) -> Self {
        Self {
            ty,
            projection,
            selector: None,
            resolver,
            cache: Mutex::new(HookCache::default()),
        }
    }

    /// Restrict the hook to calls carrying `selector` as a string argument
    pub fn with_selector(mut self, selector: Option<String>) -> Self {
        self.selector = selector;
        self
    }

    pub fn identifier(&self) -> IdentifierType {
        self.ty
    }

    fn selected(&self, args: &[Value]) -> bool {
        match &self.selector {
            None => true,
            Some(key) => args.iter().any(|a| a.as_str() == Some(key.as_str())),
        }
    }

    fn lookup(&self, caller: &str) -> Option<Value> {
        let generation = self.resolver.store().generation();
        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if cache.generation != generation {
                cache.by_caller.clear();
                cache.generation = generation;
            } else if let Some(hit) = cache.by_caller.get(caller) {
                return hit.clone();
            }
        }

        let projected = match self.resolver.resolve(caller, self.ty) {
            Resolution::PassThrough => None,
            Resolution::Value { value, .. } => {
                let projected = self.projection.apply(&value);
                if projected.is_none() {
                    debug!(
                        target: "idveil::interception",
                        "Cannot project {} value {:?} as {:?}; passing through",
                        self.ty,
                        value,
                        self.projection
                    );
                }
                projected
            }
        };

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if cache.generation == generation {
            cache
                .by_caller
                .insert(caller.to_string(), projected.clone());
        }
        projected
    }
}

impl HookHandler for IdentityHook {
    fn handle(&self, call: &mut Invocation<'_>) -> HandlerResult {
        if !self.selected(&call.args) {
            return Ok(InterceptOutcome::PassThrough);
        }
        let outcome = match self.lookup(call.caller) {
            Some(value) => InterceptOutcome::Found(value),
            None => InterceptOutcome::PassThrough,
        };
        trace!(
            target: "idveil::interception",
            "{} for {}: {:?}",
            call.site,
            call.caller,
            outcome
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSnapshot, Profile, SnapshotStore};
    use crate::interception::site::{HookSite, Stage};
    use crate::resolver::ResolutionContext;
    use serde_json::json;

    fn resolver(snapshot: ConfigSnapshot) -> Arc<Resolver> {
        Arc::new(Resolver::new(
            Arc::new(SnapshotStore::new(snapshot)),
            ResolutionContext::with_session_salt(7),
        ))
    }

    fn with_serial(serial: &str) -> ConfigSnapshot {
        let mut profile = Profile::new("main", "Main", 1)
            .with_value(IdentifierType::Serial, Some(serial.to_string()), 1);
        profile.is_default = true;
        ConfigSnapshot::default().with_profile(profile)
    }

    fn run(hook: &IdentityHook, caller: &str, args: Vec<Value>) -> InterceptOutcome {
        let site = HookSite::new("android.os.Build", "getSerial", Stage::After);
        let mut call = Invocation {
            site: &site,
            caller,
            args,
            result: Some(crate::interception::CallResult::Returned(json!("REAL"))),
        };
        hook.handle(&mut call).unwrap()
    }

    #[test]
    fn test_reports_profile_value() {
        let hook = IdentityHook::new(IdentifierType::Serial, Projection::Full, resolver(with_serial("ABC123")));
        assert_eq!(hook.identifier(), IdentifierType::Serial);
        assert_eq!(run(&hook, "com.a", vec![]), InterceptOutcome::Found(json!("ABC123")));
    }

    #[test]
    fn test_module_disabled_passes_through() {
        let hook = IdentityHook::new(
            IdentifierType::Serial,
            Projection::Full,
            resolver(with_serial("ABC123").with_module_enabled(false)),
        );
        assert_eq!(run(&hook, "com.a", vec![]), InterceptOutcome::PassThrough);
    }

    #[test]
    fn test_selector_filters_calls() {
        let hook = IdentityHook::new(IdentifierType::AndroidId, Projection::Full, resolver(with_serial("X")))
            .with_selector(Some("android_id".into()));
        assert_eq!(
            run(&hook, "com.a", vec![json!(null), json!("bluetooth_name")]),
            InterceptOutcome::PassThrough
        );
        assert!(matches!(
            run(&hook, "com.a", vec![json!(null), json!("android_id")]),
            InterceptOutcome::Found(_)
        ));
    }

    #[test]
    fn test_cache_follows_snapshot_version() {
        let resolver = resolver(with_serial("FIRST"));
        let hook = IdentityHook::new(IdentifierType::Serial, Projection::Full, Arc::clone(&resolver));
        assert_eq!(run(&hook, "com.a", vec![]), InterceptOutcome::Found(json!("FIRST")));

        let store = resolver.store();
        let profile = store
            .current()
            .profile("main")
            .unwrap()
            .with_value(IdentifierType::Serial, Some("SECOND".into()), 2);
        store.replace(store.current().with_profile(profile));

        assert_eq!(run(&hook, "com.a", vec![]), InterceptOutcome::Found(json!("SECOND")));
    }

    #[test]
    fn test_cache_refreshed_when_version_unchanged() {
        let resolver = resolver(with_serial("FIRST"));
        let hook = IdentityHook::new(IdentifierType::Serial, Projection::Full, Arc::clone(&resolver));
        assert_eq!(run(&hook, "com.a", vec![]), InterceptOutcome::Found(json!("FIRST")));

        // Re-delivered snapshot without a version bump
        let next = with_serial("SECOND");
        assert_eq!(next.version, resolver.store().version());
        resolver.store().replace(next);

        assert_eq!(run(&hook, "com.a", vec![]), InterceptOutcome::Found(json!("SECOND")));
    }

    #[test]
    fn test_projection_applied() {
        let mut profile = Profile::new("main", "Main", 1)
            .with_value(IdentifierType::DeviceProfile, Some("pixel-7".into()), 1);
        profile.is_default = true;
        let hook = IdentityHook::new(
            IdentifierType::DeviceProfile,
            Projection::Model,
            resolver(ConfigSnapshot::default().with_profile(profile)),
        );
        assert_eq!(run(&hook, "com.a", vec![]), InterceptOutcome::Found(json!("Pixel 7")));
    }
}
