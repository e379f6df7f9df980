//! Deterministic derivation of generated values
//!
//! Each derivation key (a correlation group, or a lone type) gets its own
//! `StdRng` seeded from FNV-1a over `(owner id, salt, key, epoch)`. Grouped
//! values are produced together as one bundle from that single stream, so
//! every member of a group draws from the same correlation record and the
//! bundle is identical every time it is derived for the same epoch.

use crate::config::Profile;
use crate::correlation::{self, CarrierRecord, CountryRecord, DevicePreset};
use crate::generators;
use crate::identifier::{CorrelationGroup, IdentifierType};
use fnv::FnvHasher;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hash::Hasher;

/// Who values are derived for
#[derive(Debug, Clone, Copy)]
pub struct DerivationSeed<'a> {
    /// Profile id, or a session marker for fallback values
    pub owner: &'a str,
    /// Per-session salt for fallback values, 0 for profiles
    pub salt: u64,
    /// Source of epochs and explicit anchor values
    pub profile: Option<&'a Profile>,
}

impl<'a> DerivationSeed<'a> {
    pub fn for_profile(profile: &'a Profile) -> Self {
        Self {
            owner: &profile.id,
            salt: 0,
            profile: Some(profile),
        }
    }

    pub fn for_session(owner: &'a str, salt: u64) -> Self {
        Self {
            owner,
            salt,
            profile: None,
        }
    }

    fn epoch(&self, key: &str) -> u32 {
        self.profile.map(|p| p.epoch(key)).unwrap_or(0)
    }

    fn explicit(&self, ty: IdentifierType) -> Option<&'a str> {
        let profile = self.profile?;
        let record = profile.identifiers.get(&ty)?;
        if record.enabled {
            record.value.as_deref()
        } else {
            None
        }
    }

    pub fn rng(&self, key: &str) -> StdRng {
        let mut hasher = FnvHasher::default();
        hasher.write(self.owner.as_bytes());
        hasher.write_u8(0);
        hasher.write_u64(self.salt);
        hasher.write(key.as_bytes());
        hasher.write_u8(0);
        hasher.write_u32(self.epoch(key));
        StdRng::seed_from_u64(hasher.finish())
    }
}

/// Jointly derived SIM values, all from one carrier record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimBundle {
    pub carrier: &'static CarrierRecord,
    pub imsi: String,
    pub iccid: String,
    pub phone_number: String,
}

/// Jointly derived hardware identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareBundle {
    pub imei: String,
    pub meid: String,
    pub serial: String,
    pub wifi_mac: String,
    pub bluetooth_mac: String,
}

/// Jointly derived location values, all from one country record
#[derive(Debug, Clone, PartialEq)]
pub struct LocationBundle {
    pub country: &'static CountryRecord,
    pub timezone: String,
    pub locale: String,
    pub latitude: String,
    pub longitude: String,
}

/// Carrier implied by explicit SIM values, if any names a known network
pub fn anchor_carrier(seed: &DerivationSeed<'_>) -> Option<&'static CarrierRecord> {
    [
        IdentifierType::Imsi,
        IdentifierType::CarrierMccMnc,
        IdentifierType::NetworkOperator,
    ]
    .iter()
    .filter_map(|ty| seed.explicit(*ty))
    .find_map(correlation::carrier_for_network_code)
}

pub fn sim_bundle(seed: &DerivationSeed<'_>) -> SimBundle {
    let mut rng = seed.rng(CorrelationGroup::SimCard.as_str());
    let drawn = &correlation::CARRIERS[rng.gen_range(0..correlation::CARRIERS.len())];
    let carrier = anchor_carrier(seed).unwrap_or(drawn);
    let imsi = generators::generate_imsi(&mut rng, carrier);
    let iccid = generators::generate_iccid(&mut rng, carrier);
    let phone_number = match carrier.country() {
        Some(country) => generators::generate_phone_number(&mut rng, country),
        None => format!("+{}", generators::generate_imsi(&mut rng, carrier)),
    };
    SimBundle {
        carrier,
        imsi,
        iccid,
        phone_number,
    }
}

pub fn device_preset(seed: &DerivationSeed<'_>) -> &'static DevicePreset {
    if let Some(preset) = seed
        .explicit(IdentifierType::DeviceProfile)
        .and_then(correlation::device_preset)
    {
        return preset;
    }
    let mut rng = seed.rng(IdentifierType::DeviceProfile.key());
    &correlation::DEVICE_PRESETS[rng.gen_range(0..correlation::DEVICE_PRESETS.len())]
}

pub fn hardware_bundle(seed: &DerivationSeed<'_>) -> HardwareBundle {
    let preset = device_preset(seed);
    let mut rng = seed.rng(CorrelationGroup::DeviceHardware.as_str());
    let tac = preset.tac_prefixes[rng.gen_range(0..preset.tac_prefixes.len())];
    HardwareBundle {
        imei: generators::generate_imei(&mut rng, Some(tac)),
        meid: generators::generate_meid(&mut rng),
        serial: generators::generate_serial(&mut rng),
        wifi_mac: generators::generate_mac(&mut rng),
        bluetooth_mac: generators::generate_mac(&mut rng),
    }
}

/// Location follows the SIM country so locale, timezone and coordinates
/// agree with the carrier
pub fn location_bundle(seed: &DerivationSeed<'_>) -> LocationBundle {
    let sim = sim_bundle(seed);
    let country = sim
        .carrier
        .country()
        .unwrap_or(&correlation::COUNTRIES[0]);
    let mut rng = seed.rng(CorrelationGroup::Location.as_str());
    let (latitude, longitude) = generators::generate_coordinates(&mut rng, country);
    LocationBundle {
        country,
        timezone: country.timezone.to_string(),
        locale: country.locale.to_string(),
        latitude,
        longitude,
    }
}

/// Derived value for one identifier type
pub fn derive_value(seed: &DerivationSeed<'_>, ty: IdentifierType) -> String {
    match ty.correlation_group() {
        CorrelationGroup::SimCard => {
            let sim = sim_bundle(seed);
            match ty {
                IdentifierType::Imsi => sim.imsi,
                IdentifierType::Iccid => sim.iccid,
                IdentifierType::PhoneNumber => sim.phone_number,
                IdentifierType::CarrierName | IdentifierType::SimOperatorName => {
                    sim.carrier.name.to_string()
                }
                IdentifierType::CarrierMccMnc | IdentifierType::NetworkOperator => {
                    sim.carrier.network_code()
                }
                _ => sim.carrier.country_iso.to_string(),
            }
        }
        CorrelationGroup::DeviceHardware => {
            let hw = hardware_bundle(seed);
            match ty {
                IdentifierType::Imei => hw.imei,
                IdentifierType::Meid => hw.meid,
                IdentifierType::Serial => hw.serial,
                IdentifierType::WifiMac => hw.wifi_mac,
                _ => hw.bluetooth_mac,
            }
        }
        CorrelationGroup::Location => {
            let loc = location_bundle(seed);
            match ty {
                IdentifierType::Timezone => loc.timezone,
                IdentifierType::Locale => loc.locale,
                IdentifierType::Latitude => loc.latitude,
                _ => loc.longitude,
            }
        }
        CorrelationGroup::None => {
            let mut rng = seed.rng(ty.key());
            match ty {
                IdentifierType::AndroidId => generators::generate_android_id(&mut rng),
                IdentifierType::GsfId => generators::generate_gsf_id(&mut rng),
                IdentifierType::MediaDrmId => generators::generate_media_drm_id(&mut rng),
                IdentifierType::AdvertisingId => generators::generate_advertising_id(&mut rng),
                IdentifierType::WifiSsid => generators::generate_ssid(&mut rng),
                IdentifierType::WifiBssid => generators::generate_bssid(&mut rng),
                _ => device_preset(seed).key.to_string(),
            }
        }
    }
}

/// Check a derived or stored value against its type's format
///
/// Types without a fixed shape (names, locales, timezones) accept any
/// non-empty value.
pub fn is_well_formed(ty: IdentifierType, value: &str) -> bool {
    match ty {
        IdentifierType::Imei => generators::is_valid_imei(value),
        IdentifierType::Meid => generators::is_valid_meid(value),
        IdentifierType::Serial => generators::is_valid_serial(value),
        IdentifierType::AndroidId => {
            generators::is_valid_hex_id(value, generators::ANDROID_ID_LEN)
        }
        IdentifierType::GsfId => generators::is_valid_hex_id(value, generators::GSF_ID_LEN),
        IdentifierType::MediaDrmId => {
            generators::is_valid_hex_id(value, generators::MEDIA_DRM_ID_LEN)
        }
        IdentifierType::AdvertisingId => generators::is_valid_advertising_id(value),
        IdentifierType::Imsi => generators::is_valid_imsi(value, None),
        IdentifierType::Iccid => generators::is_valid_iccid(value, None),
        IdentifierType::PhoneNumber => generators::is_valid_phone_number(value, None),
        IdentifierType::WifiMac | IdentifierType::BluetoothMac => {
            generators::is_valid_generated_mac(value)
        }
        IdentifierType::WifiBssid => generators::is_valid_bssid(value),
        IdentifierType::WifiSsid => generators::is_valid_ssid(value),
        IdentifierType::CarrierMccMnc | IdentifierType::NetworkOperator => {
            (5..=6).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_digit())
        }
        IdentifierType::Latitude => generators::is_valid_latitude(value),
        IdentifierType::Longitude => generators::is_valid_longitude(value),
        IdentifierType::DeviceProfile => correlation::device_preset(value).is_some(),
        _ => !value.trim().is_empty(),
    }
}
