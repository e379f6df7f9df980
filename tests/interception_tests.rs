//! Integration tests for hook registration and invocation through the engine

use idveil::concealment::ProcessIdentity;
use idveil::config::{ConfigSnapshot, EngineConfig, Profile, SnapshotStore};
use idveil::generators;
use idveil::identifier::IdentifierType;
use idveil::interception::{
    CallResult, HandlerResult, HookCatalog, HookHandler, HookSite, HostFailure, InterceptOutcome,
    InterceptionRegistry, Invocation, MethodTable, Stage,
};
use idveil::resolver::ResolutionContext;
use idveil::{MaskError, MaskingEngine};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const APP: &str = "com.example.shop";
const GET_IMEI: &str = "android.telephony.TelephonyManager#getImei()";
const GET_PACKAGE_INFO: &str =
    "android.app.ApplicationPackageManager#getPackageInfo(java.lang.String,int)";
const GET_INSTALLED_APPS: &str =
    "android.app.ApplicationPackageManager#getInstalledApplications(int)";
const SECURE_GET_STRING: &str =
    "android.provider.Settings$Secure#getString(android.content.ContentResolver,java.lang.String)";

fn store() -> Arc<SnapshotStore> {
    let mut profile = Profile::new("main", "Main", 1)
        .with_value(IdentifierType::Serial, Some("ABC123".into()), 1)
        .with_value(
            IdentifierType::AndroidId,
            Some("00112233aabbccdd".into()),
            1,
        );
    profile.is_default = true;
    Arc::new(SnapshotStore::new(
        ConfigSnapshot::default().with_profile(profile),
    ))
}

fn engine_with(config: &EngineConfig, store: Arc<SnapshotStore>) -> MaskingEngine {
    let catalog = HookCatalog::default_catalog().unwrap();
    let host = MethodTable::new().with_sites(catalog.sites());
    MaskingEngine::attach_with_context(
        ProcessIdentity::new(APP),
        config,
        store,
        &catalog,
        Arc::new(host),
        ResolutionContext::with_session_salt(11),
    )
    .unwrap()
}

fn hiding_target_app() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.concealment.hidden_packages.push("target.app".into());
    config
}

#[test]
fn test_malformed_site_skipped_rest_registered() {
    let host = MethodTable::new()
        .with_method("a.Phone#getImei()")
        .with_method("a.Phone#getMeid()")
        .with_method("a.Phone#getSerial()");
    let registry = InterceptionRegistry::new(Arc::new(host), store());
    let noop = |_: &mut Invocation<'_>| -> HandlerResult { Ok(InterceptOutcome::PassThrough) };

    let sites = vec![
        HookSite::new("a.Phone", "getImei", Stage::After),
        HookSite::new("a.Phone", "get Meid", Stage::After),
        HookSite::new("a.Phone", "getMeid", Stage::After),
        HookSite::new("a.Phone", "getSerial", Stage::After),
    ];
    let report = registry.register_all(
        sites
            .into_iter()
            .map(|s| (s, Arc::new(noop) as Arc<dyn HookHandler>)),
    );

    assert_eq!(report.total(), 4);
    assert_eq!(report.registered.len(), 3);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0.method, "get Meid");
    assert_eq!(registry.call_keys().len(), 3);
}

#[test]
fn test_missing_and_foreign_methods_reported() {
    let catalog = HookCatalog::default_catalog().unwrap();
    let host = MethodTable::new()
        .with_sites(catalog.sites())
        .without_method(GET_IMEI)
        .with_foreign_hook(GET_PACKAGE_INFO);
    let engine = MaskingEngine::attach(
        ProcessIdentity::new(APP),
        &EngineConfig::default(),
        store(),
        &catalog,
        Arc::new(host),
    )
    .unwrap();

    let failed: Vec<String> = engine
        .report()
        .failed
        .iter()
        .map(|(site, _)| site.call_key())
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.contains(&GET_IMEI.to_string()));
    assert!(failed.contains(&GET_PACKAGE_INFO.to_string()));

    // Unregistered calls run the original untouched
    let result = engine.call(GET_IMEI, vec![], |_| {
        CallResult::Returned(json!("490154203237518"))
    });
    assert_eq!(result, CallResult::Returned(json!("490154203237518")));
}

#[test]
fn test_hidden_package_not_found_and_absent_from_lists() {
    let engine = engine_with(&hiding_target_app(), store());
    let original_calls = AtomicUsize::new(0);

    let info = engine.call(GET_PACKAGE_INFO, vec![json!("target.app"), json!(0)], |_| {
        original_calls.fetch_add(1, Ordering::SeqCst);
        CallResult::Returned(json!({"packageName": "target.app"}))
    });
    assert_eq!(info, CallResult::Threw(HostFailure::NotFound));
    assert_eq!(original_calls.load(Ordering::SeqCst), 0);

    let listed = engine.call(GET_INSTALLED_APPS, vec![json!(0)], |_| {
        CallResult::Returned(json!([
            {"packageName": "com.android.chrome"},
            {"packageName": "target.app"},
            {"packageName": "org.lsposed.manager"},
            {"packageName": "com.example.shop"}
        ]))
    });
    let names: Vec<&str> = listed
        .value()
        .and_then(Value::as_array)
        .unwrap()
        .iter()
        .filter_map(|v| v["packageName"].as_str())
        .collect();
    assert_eq!(names, vec!["com.android.chrome", "com.example.shop"]);
}

#[test]
fn test_visible_package_queried_normally() {
    let engine = engine_with(&hiding_target_app(), store());
    let info = engine.call(
        GET_PACKAGE_INFO,
        vec![json!("com.android.chrome"), json!(0)],
        |_| CallResult::Returned(json!({"packageName": "com.android.chrome"})),
    );
    assert_eq!(
        info,
        CallResult::Returned(json!({"packageName": "com.android.chrome"}))
    );
}

#[test]
fn test_identity_hooks_idempotent() {
    let engine = engine_with(&EngineConfig::default(), store());
    let first = engine.call(GET_IMEI, vec![], |_| {
        CallResult::Returned(json!("490154203237518"))
    });
    let imei = first.value().and_then(Value::as_str).unwrap().to_string();
    assert_ne!(imei, "490154203237518");
    assert!(generators::is_valid_imei(&imei));

    for _ in 0..5 {
        let again = engine.call(GET_IMEI, vec![], |_| {
            CallResult::Returned(json!("490154203237518"))
        });
        assert_eq!(again, first);
    }
}

#[test]
fn test_selector_limits_generic_accessor() {
    let engine = engine_with(&EngineConfig::default(), store());
    let android_id = engine.call(
        SECURE_GET_STRING,
        vec![json!("resolver"), json!("android_id")],
        |_| CallResult::Returned(json!("ffffffffffffffff")),
    );
    assert_eq!(android_id, CallResult::Returned(json!("00112233aabbccdd")));

    let other = engine.call(
        SECURE_GET_STRING,
        vec![json!("resolver"), json!("bluetooth_name")],
        |_| CallResult::Returned(json!("Pixel")),
    );
    assert_eq!(other, CallResult::Returned(json!("Pixel")));
}

#[test]
fn test_snapshot_update_reaches_hooks() {
    let store = store();
    let engine = engine_with(&EngineConfig::default(), Arc::clone(&store));
    let serial = || {
        engine.call("android.os.Build#getSerial()", vec![], |_| {
            CallResult::Returned(json!("REAL"))
        })
    };
    assert_eq!(serial(), CallResult::Returned(json!("ABC123")));

    store
        .update(|s| {
            let profile = s.profile("main").ok_or(MaskError::ProfileNotFound("main".into()))?;
            Ok::<_, MaskError>(s.with_profile(profile.with_value(
                IdentifierType::Serial,
                Some("XYZ789".into()),
                2,
            )))
        })
        .unwrap();
    assert_eq!(serial(), CallResult::Returned(json!("XYZ789")));

    store.replace(store.current().with_module_enabled(false));
    assert_eq!(serial(), CallResult::Returned(json!("REAL")));
}

#[test]
fn test_faulting_handler_does_not_break_call() {
    let host = MethodTable::new().with_method("a.Phone#getSerial()");
    let registry = InterceptionRegistry::new(Arc::new(host), store());
    let site = || HookSite::new("a.Phone", "getSerial", Stage::After);

    let panicking = |_: &mut Invocation<'_>| -> HandlerResult { panic!("handler bug") };
    let masking =
        |_: &mut Invocation<'_>| -> HandlerResult { Ok(InterceptOutcome::Found(json!("MASKED"))) };
    assert!(registry.register(site(), Arc::new(panicking)).is_ok());
    assert!(registry.register(site(), Arc::new(masking)).is_ok());

    let result = registry.invoke("a.Phone#getSerial()", APP, vec![], |_| {
        CallResult::Returned(json!("REAL"))
    });
    assert_eq!(result, CallResult::Returned(json!("MASKED")));
}
