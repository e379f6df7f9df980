//! End-to-end identifier resolution scenarios
//!
//! Covers the resolution fallback order, correlated regeneration and
//! concurrent reads against a changing snapshot.

use idveil::config::{ConfigSnapshot, Profile, SnapshotStore};
use idveil::correlation;
use idveil::generators;
use idveil::identifier::{CorrelationGroup, IdentifierType};
use idveil::resolver::{FallbackReason, Resolution, ResolutionContext, Resolver, ValueSource};
use std::sync::Arc;
use std::thread;

const APP: &str = "com.example.shop";

fn default_profile(id: &str) -> Profile {
    let mut profile = Profile::new(id, "Default", 1);
    profile.is_default = true;
    profile
}

fn resolver(snapshot: ConfigSnapshot) -> Resolver {
    Resolver::new(
        Arc::new(SnapshotStore::new(snapshot)),
        ResolutionContext::with_session_salt(7),
    )
}

fn sim_values(resolver: &Resolver) -> (String, String, String) {
    let value = |ty| {
        resolver
            .resolve(APP, ty)
            .value()
            .map(str::to_string)
            .expect("masked value")
    };
    (
        value(IdentifierType::Imsi),
        value(IdentifierType::Iccid),
        value(IdentifierType::CarrierMccMnc),
    )
}

#[test]
fn test_disabled_type_falls_back_explicit_value_wins() {
    let profile = default_profile("main")
        .with_type_enabled(IdentifierType::Imei, false, 2)
        .with_value(IdentifierType::Serial, Some("ABC123".into()), 2);
    let snapshot = ConfigSnapshot::default().with_profile(profile);
    let snapshot = snapshot.assign(APP, Some("main"), true).unwrap();
    let resolver = resolver(snapshot);

    let imei = resolver.resolve(APP, IdentifierType::Imei);
    assert!(generators::is_valid_imei(imei.value().unwrap()));
    assert_eq!(
        imei.source(),
        Some(&ValueSource::Fallback {
            reason: FallbackReason::RecordDisabled
        })
    );

    let serial = resolver.resolve(APP, IdentifierType::Serial);
    assert_eq!(serial.value(), Some("ABC123"));
    assert_eq!(
        serial.source(),
        Some(&ValueSource::Profile {
            profile_id: "main".to_string()
        })
    );
}

#[test]
fn test_disabled_app_falls_back_despite_assignment() {
    let profile = default_profile("main").with_value(
        IdentifierType::AndroidId,
        Some("0123456789abcdef".into()),
        2,
    );
    let snapshot = ConfigSnapshot::default()
        .with_profile(profile)
        .assign(APP, Some("main"), false)
        .unwrap();
    let resolver = resolver(snapshot);

    let r = resolver.resolve(APP, IdentifierType::AndroidId);
    assert_ne!(r.value(), Some("0123456789abcdef"));
    assert_eq!(
        r.source(),
        Some(&ValueSource::Fallback {
            reason: FallbackReason::AppDisabled
        })
    );
    assert!(generators::is_valid_hex_id(
        r.value().unwrap(),
        generators::ANDROID_ID_LEN
    ));
}

#[test]
fn test_unassigned_app_uses_default_profile() {
    let profile = default_profile("main").with_value(
        IdentifierType::Serial,
        Some("DEFAULT01".into()),
        2,
    );
    let resolver = resolver(ConfigSnapshot::default().with_profile(profile));
    assert_eq!(
        resolver.resolve("com.other.app", IdentifierType::Serial).value(),
        Some("DEFAULT01")
    );
}

#[test]
fn test_module_disabled_reports_real_values() {
    let snapshot = ConfigSnapshot::default()
        .with_profile(default_profile("main"))
        .with_module_enabled(false);
    let resolver = resolver(snapshot);
    for ty in IdentifierType::ALL {
        assert_eq!(resolver.resolve(APP, ty), Resolution::PassThrough);
    }
}

#[test]
fn test_sim_regeneration_changes_values_and_stays_consistent() {
    let resolver = resolver(ConfigSnapshot::default().with_profile(default_profile("main")));
    let mut seen = vec![sim_values(&resolver)];

    for _ in 0..2 {
        resolver
            .regenerate_group("main", CorrelationGroup::SimCard)
            .unwrap();
        seen.push(sim_values(&resolver));
    }

    for (imsi, iccid, mcc_mnc) in &seen {
        let carrier = correlation::carrier_for_network_code(mcc_mnc).expect("known carrier");
        assert!(imsi.starts_with(&carrier.network_code()), "{} / {}", imsi, mcc_mnc);
        assert!(iccid.starts_with(&carrier.iccid_prefix()), "{} / {}", iccid, mcc_mnc);
    }
    assert_ne!(seen[0].0, seen[1].0);
    assert_ne!(seen[1].0, seen[2].0);
}

#[test]
fn test_sim_regeneration_leaves_hardware_alone() {
    let resolver = resolver(ConfigSnapshot::default().with_profile(default_profile("main")));
    let before = resolver.resolve_group(APP, CorrelationGroup::DeviceHardware);
    resolver
        .regenerate_group("main", CorrelationGroup::SimCard)
        .unwrap();
    assert_eq!(
        resolver.resolve_group(APP, CorrelationGroup::DeviceHardware),
        before
    );
}

#[test]
fn test_replacement_with_same_version_is_resolved_again() {
    let serial = |value: &str| {
        // Snapshots from a boundary that never sets `version`
        let mut snapshot = ConfigSnapshot::default().with_profile(
            default_profile("main").with_value(IdentifierType::Serial, Some(value.into()), 1),
        );
        snapshot.version = 0;
        snapshot
    };
    let resolver = resolver(serial("FIRST"));
    assert_eq!(
        resolver.resolve(APP, IdentifierType::Serial).value(),
        Some("FIRST")
    );

    resolver.store().replace(serial("SECOND"));
    assert_eq!(resolver.store().version(), 0);
    assert_eq!(
        resolver.resolve(APP, IdentifierType::Serial).value(),
        Some("SECOND")
    );
}

#[test]
fn test_regenerate_unknown_profile_errors() {
    let resolver = resolver(ConfigSnapshot::default());
    assert!(resolver
        .regenerate("missing", &[IdentifierType::Imei])
        .is_err());
}

#[test]
fn test_fallback_stable_within_session() {
    let resolver = resolver(ConfigSnapshot::default());
    let a = resolver.resolve(APP, IdentifierType::Imei);
    resolver.context().clear();
    let b = resolver.resolve(APP, IdentifierType::Imei);
    assert_eq!(a, b);
}

#[test]
fn test_concurrent_resolution_during_updates() {
    let resolver = Arc::new(resolver(
        ConfigSnapshot::default().with_profile(default_profile("main")),
    ));

    let readers: Vec<_> = (0..4)
        .map(|i| {
            let resolver = Arc::clone(&resolver);
            thread::spawn(move || {
                let app = format!("com.reader.app{}", i);
                for _ in 0..200 {
                    for ty in IdentifierType::ALL {
                        let r = resolver.resolve(&app, ty);
                        let value = r.value().expect("masking enabled");
                        assert!(!value.is_empty());
                    }
                    let (imsi, mcc_mnc) = (
                        resolver.resolve(&app, IdentifierType::Imsi),
                        resolver.resolve(&app, IdentifierType::CarrierMccMnc),
                    );
                    // A regeneration may land between the two reads, so only
                    // formats are checked here
                    assert!(generators::is_valid_imsi(imsi.value().unwrap(), None));
                    assert!(mcc_mnc.value().unwrap().len() >= 5);
                }
            })
        })
        .collect();

    let writer = {
        let resolver = Arc::clone(&resolver);
        thread::spawn(move || {
            for _ in 0..20 {
                resolver
                    .regenerate_group("main", CorrelationGroup::SimCard)
                    .unwrap();
            }
        })
    };

    for handle in readers {
        handle.join().unwrap();
    }
    writer.join().unwrap();

    assert_eq!(
        resolver.store().current().profile("main").unwrap().epoch("SIM_CARD"),
        20
    );
}
