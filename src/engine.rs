//! Engine startup: guard, wiring and catalog registration

use crate::concealment::{Concealer, ConcealmentHook, ProcessGuard, ProcessIdentity};
use crate::config::{EngineConfig, SnapshotStore};
use crate::diagnostics::{DiagnosticsBuffer, DiagnosticsLayer};
use crate::error::MaskError;
use crate::interception::{
    CallResult, HookCatalog, HookHandler, HookHost, HookTarget, IdentityHook,
    InterceptionRegistry, RegistrationReport,
};
use crate::resolver::{ResolutionContext, Resolver};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Masking engine attached to one hosted process
///
/// Created once per process by [`MaskingEngine::attach`]. Every catalog
/// entry is registered with one shared resolver and one concealer; sites
/// the host cannot install are reported and skipped.
#[derive(Debug)]
pub struct MaskingEngine {
    identity: ProcessIdentity,
    resolver: Arc<Resolver>,
    concealer: Arc<Concealer>,
    registry: InterceptionRegistry,
    report: RegistrationReport,
    catalog_version: u32,
    diagnostics: Arc<DiagnosticsBuffer>,
}

impl MaskingEngine {
    /// Attach to `identity`, registering every catalog entry with `host`
    ///
    /// # Errors
    /// - [`MaskError::ProtectedProcess`] for the companion app and core
    ///   platform processes. Nothing is hooked in that case.
    /// - [`MaskError::InvalidConfig`] / [`MaskError::InvalidPattern`] when
    ///   the engine configuration is unusable.
    ///
    /// Individual registration failures are not errors; see [`Self::report`].
    pub fn attach(
        identity: ProcessIdentity,
        config: &EngineConfig,
        store: Arc<SnapshotStore>,
        catalog: &HookCatalog,
        host: Arc<dyn HookHost>,
    ) -> Result<Self, MaskError> {
        Self::attach_with_context(identity, config, store, catalog, host, ResolutionContext::new())
    }

    /// Same as [`Self::attach`] with a caller-supplied resolution context
    pub fn attach_with_context(
        identity: ProcessIdentity,
        config: &EngineConfig,
        store: Arc<SnapshotStore>,
        catalog: &HookCatalog,
        host: Arc<dyn HookHost>,
        context: ResolutionContext,
    ) -> Result<Self, MaskError> {
        ProcessGuard::new(config.self_package.as_str(), &config.protected_processes)
            .check(&identity)?;
        config.validate().map_err(MaskError::InvalidConfig)?;

        let resolver = Arc::new(Resolver::new(Arc::clone(&store), context));
        let concealer = Arc::new(Concealer::new(&config.concealment)?);
        let registry = InterceptionRegistry::new(host, store);
        let diagnostics = Arc::new(DiagnosticsBuffer::new(config.diagnostics_capacity));

        let handlers = catalog.entries.iter().map(|entry| {
            let handler: Arc<dyn HookHandler> = match &entry.target {
                HookTarget::Identity {
                    identifier,
                    projection,
                    selector,
                } => Arc::new(
                    IdentityHook::new(*identifier, *projection, Arc::clone(&resolver))
                        .with_selector(selector.clone()),
                ),
                HookTarget::Concealment { surface } => {
                    Arc::new(ConcealmentHook::new(*surface, Arc::clone(&concealer)))
                }
            };
            (entry.site.clone(), handler)
        });
        let report = registry.register_all(handlers);

        info!(
            target: "idveil::engine",
            "Attached to {}: {}/{} hooks from catalog v{}",
            identity.package,
            report.registered.len(),
            report.total(),
            catalog.version
        );

        Ok(Self {
            identity,
            resolver,
            concealer,
            registry,
            report,
            catalog_version: catalog.version,
            diagnostics,
        })
    }

    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn concealer(&self) -> &Arc<Concealer> {
        &self.concealer
    }

    pub fn registry(&self) -> &InterceptionRegistry {
        &self.registry
    }

    pub fn report(&self) -> &RegistrationReport {
        &self.report
    }

    pub fn catalog_version(&self) -> u32 {
        self.catalog_version
    }

    /// Buffer the log exporter drains
    pub fn diagnostics(&self) -> &Arc<DiagnosticsBuffer> {
        &self.diagnostics
    }

    /// Layer feeding this engine's diagnostics buffer
    ///
    /// The host installs it in its subscriber stack; events logged before
    /// that (including the attach summary) are not captured.
    pub fn diagnostics_layer(&self) -> DiagnosticsLayer {
        DiagnosticsLayer::new(Arc::clone(&self.diagnostics))
    }

    /// Execute a hooked call on behalf of the attached process
    pub fn call<F>(&self, call_key: &str, args: Vec<Value>, original: F) -> CallResult
    where
        F: FnOnce(&[Value]) -> CallResult,
    {
        self.registry
            .invoke(call_key, &self.identity.package, args, original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSnapshot, Profile};
    use crate::identifier::IdentifierType;
    use crate::interception::{HostFailure, MethodTable};
    use serde_json::json;

    fn store() -> Arc<SnapshotStore> {
        let mut profile = Profile::new("main", "Main", 1)
            .with_value(IdentifierType::Serial, Some("ABC123".into()), 1);
        profile.is_default = true;
        Arc::new(SnapshotStore::new(ConfigSnapshot::default().with_profile(profile)))
    }

    fn attach(package: &str) -> Result<MaskingEngine, MaskError> {
        let catalog = HookCatalog::default_catalog().unwrap();
        let host = MethodTable::new().with_sites(catalog.sites());
        MaskingEngine::attach_with_context(
            ProcessIdentity::new(package),
            &EngineConfig::default(),
            store(),
            &catalog,
            Arc::new(host),
            ResolutionContext::with_session_salt(3),
        )
    }

    #[test]
    fn test_refuses_protected_processes() {
        for package in ["com.idveil.app", "system_server", "com.android.systemui"] {
            let err = attach(package).unwrap_err();
            assert!(matches!(err, MaskError::ProtectedProcess(_)), "{}", package);
        }
    }

    #[test]
    fn test_registers_whole_catalog() {
        let engine = attach("com.example.shop").unwrap();
        let catalog = HookCatalog::default_catalog().unwrap();
        assert_eq!(engine.report().registered.len(), catalog.len());
        assert!(engine.report().failed.is_empty());
    }

    #[test]
    fn test_serial_masked_through_call() {
        let engine = attach("com.example.shop").unwrap();
        let result = engine.call("android.os.Build#getSerial()", vec![], |_| {
            CallResult::Returned(json!("REALSERIAL"))
        });
        assert_eq!(result, CallResult::Returned(json!("ABC123")));
    }

    #[test]
    fn test_locale_call_sites_agree() {
        let engine = attach("com.example.shop").unwrap();
        let real = |_: &[serde_json::Value]| CallResult::Returned(json!("xx"));
        let CallResult::Returned(locale) = engine.call("java.util.Locale#toString()", vec![], real)
        else {
            panic!("locale call threw");
        };
        let CallResult::Returned(tag) = engine.call("java.util.Locale#toLanguageTag()", vec![], real)
        else {
            panic!("language tag call threw");
        };
        let locale = locale.as_str().unwrap();
        assert!(locale.contains('_'), "{}", locale);
        assert_eq!(tag, json!(locale.replace('_', "-")));
    }

    #[test]
    fn test_companion_package_reported_missing() {
        let engine = attach("com.example.shop").unwrap();
        let result = engine.call(
            "android.app.ApplicationPackageManager#getPackageInfo(java.lang.String,int)",
            vec![json!("com.idveil.app"), json!(0)],
            |_| CallResult::Returned(json!({"packageName": "com.idveil.app"})),
        );
        assert_eq!(result, CallResult::Threw(HostFailure::NotFound));
    }

    #[test]
    fn test_diagnostics_sized_from_config() {
        let engine = attach("com.example.shop").unwrap();
        assert_eq!(
            engine.diagnostics().stats().capacity,
            EngineConfig::default().diagnostics_capacity
        );
    }

    #[test]
    fn test_diagnostics_layer_captures_calls() {
        use tracing_subscriber::layer::SubscriberExt;

        let engine = attach("com.example.shop").unwrap();
        let subscriber = tracing_subscriber::registry().with(engine.diagnostics_layer());
        tracing::subscriber::with_default(subscriber, || {
            engine.call("java.lang.Thread#getStackTrace()", vec![], |_| {
                CallResult::Returned(json!([
                    "java.lang.Thread.getStackTrace",
                    "LSPHooker_.getImei"
                ]))
            });
        });
        let records = engine.diagnostics().drain_all();
        assert!(records
            .iter()
            .any(|r| r.message == "Concealed 1 of 2 stack frames"));
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let mut config = EngineConfig::default();
        config.concealment.symbol_patterns.push("(unclosed".into());
        let catalog = HookCatalog::default_catalog().unwrap();
        let err = MaskingEngine::attach(
            ProcessIdentity::new("com.example.shop"),
            &config,
            store(),
            &catalog,
            Arc::new(MethodTable::new()),
        )
        .unwrap_err();
        assert!(matches!(err, MaskError::InvalidConfig(_)));
    }
}
