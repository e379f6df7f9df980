//! Immutable reference records for correlated generation
//!
//! Carrier, country and device tables are consulted by the resolver so that
//! jointly generated values stay mutually plausible: an IMSI starts with its
//! carrier's MCC/MNC, the ICCID with the same carrier's issuer prefix, and
//! the locale and timezone match the SIM country. Records are `'static` and
//! never mutated; lookups are by key.

/// Country reference entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountryRecord {
    /// ISO 3166-1 alpha-2, lowercase as the platform reports it
    pub iso: &'static str,
    /// E.164 country calling code
    pub calling_code: &'static str,
    pub timezone: &'static str,
    pub locale: &'static str,
    /// (min_lat, max_lat, min_lon, max_lon)
    pub bounds: (f64, f64, f64, f64),
}

/// Carrier reference entry bundling network, country and issuer codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierRecord {
    pub key: &'static str,
    pub name: &'static str,
    pub mcc: &'static str,
    pub mnc: &'static str,
    pub country_iso: &'static str,
    /// Issuer identifier appended after the country calling code in ICCIDs
    pub issuer_code: &'static str,
}

impl CarrierRecord {
    /// Combined subscriber-network code (MCC + MNC)
    pub fn network_code(&self) -> String {
        format!("{}{}", self.mcc, self.mnc)
    }

    /// ICCID prefix: telecom industry id 89, calling code, issuer
    pub fn iccid_prefix(&self) -> String {
        let calling = self.country().map(|c| c.calling_code).unwrap_or("");
        format!("89{}{}", calling, self.issuer_code)
    }

    pub fn country(&self) -> Option<&'static CountryRecord> {
        country(self.country_iso)
    }
}

/// Device build preset reported through build metadata call-sites
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePreset {
    pub key: &'static str,
    pub manufacturer: &'static str,
    pub brand: &'static str,
    pub model: &'static str,
    pub device: &'static str,
    pub product: &'static str,
    pub board: &'static str,
    pub fingerprint: &'static str,
    pub security_patch: &'static str,
    /// 8-digit type allocation codes used as IMEI prefixes
    pub tac_prefixes: &'static [&'static str],
}

pub static COUNTRIES: &[CountryRecord] = &[
    CountryRecord {
        iso: "us",
        calling_code: "1",
        timezone: "America/New_York",
        locale: "en_US",
        bounds: (25.0, 48.0, -123.0, -71.0),
    },
    CountryRecord {
        iso: "gb",
        calling_code: "44",
        timezone: "Europe/London",
        locale: "en_GB",
        bounds: (50.2, 58.5, -5.5, 1.7),
    },
    CountryRecord {
        iso: "de",
        calling_code: "49",
        timezone: "Europe/Berlin",
        locale: "de_DE",
        bounds: (47.4, 54.8, 6.0, 14.9),
    },
    CountryRecord {
        iso: "fr",
        calling_code: "33",
        timezone: "Europe/Paris",
        locale: "fr_FR",
        bounds: (43.3, 50.9, -1.7, 7.5),
    },
    CountryRecord {
        iso: "in",
        calling_code: "91",
        timezone: "Asia/Kolkata",
        locale: "en_IN",
        bounds: (8.5, 31.0, 70.0, 88.0),
    },
    CountryRecord {
        iso: "jp",
        calling_code: "81",
        timezone: "Asia/Tokyo",
        locale: "ja_JP",
        bounds: (31.0, 43.0, 130.5, 145.0),
    },
    CountryRecord {
        iso: "br",
        calling_code: "55",
        timezone: "America/Sao_Paulo",
        locale: "pt_BR",
        bounds: (-30.0, -3.0, -60.0, -35.0),
    },
    CountryRecord {
        iso: "ca",
        calling_code: "1",
        timezone: "America/Toronto",
        locale: "en_CA",
        bounds: (43.0, 53.0, -123.0, -64.0),
    },
];

pub static CARRIERS: &[CarrierRecord] = &[
    CarrierRecord {
        key: "us-tmobile",
        name: "T-Mobile",
        mcc: "310",
        mnc: "260",
        country_iso: "us",
        issuer_code: "260",
    },
    CarrierRecord {
        key: "us-att",
        name: "AT&T",
        mcc: "310",
        mnc: "410",
        country_iso: "us",
        issuer_code: "410",
    },
    CarrierRecord {
        key: "us-verizon",
        name: "Verizon",
        mcc: "311",
        mnc: "480",
        country_iso: "us",
        issuer_code: "480",
    },
    CarrierRecord {
        key: "gb-ee",
        name: "EE",
        mcc: "234",
        mnc: "30",
        country_iso: "gb",
        issuer_code: "30",
    },
    CarrierRecord {
        key: "gb-vodafone",
        name: "Vodafone UK",
        mcc: "234",
        mnc: "15",
        country_iso: "gb",
        issuer_code: "15",
    },
    CarrierRecord {
        key: "de-telekom",
        name: "Telekom.de",
        mcc: "262",
        mnc: "01",
        country_iso: "de",
        issuer_code: "01",
    },
    CarrierRecord {
        key: "fr-orange",
        name: "Orange F",
        mcc: "208",
        mnc: "01",
        country_iso: "fr",
        issuer_code: "01",
    },
    CarrierRecord {
        key: "in-jio",
        name: "Jio",
        mcc: "405",
        mnc: "857",
        country_iso: "in",
        issuer_code: "857",
    },
    CarrierRecord {
        key: "jp-docomo",
        name: "NTT DOCOMO",
        mcc: "440",
        mnc: "10",
        country_iso: "jp",
        issuer_code: "10",
    },
    CarrierRecord {
        key: "br-vivo",
        name: "Vivo",
        mcc: "724",
        mnc: "06",
        country_iso: "br",
        issuer_code: "06",
    },
    CarrierRecord {
        key: "ca-rogers",
        name: "Rogers",
        mcc: "302",
        mnc: "720",
        country_iso: "ca",
        issuer_code: "720",
    },
];

pub static DEVICE_PRESETS: &[DevicePreset] = &[
    DevicePreset {
        key: "pixel-7",
        manufacturer: "Google",
        brand: "google",
        model: "Pixel 7",
        device: "panther",
        product: "panther",
        board: "panther",
        fingerprint: "google/panther/panther:14/UQ1A.240205.004/11269751:user/release-keys",
        security_patch: "2024-02-05",
        tac_prefixes: &["35394911", "35195911"],
    },
    DevicePreset {
        key: "galaxy-s23",
        manufacturer: "samsung",
        brand: "samsung",
        model: "SM-S911B",
        device: "dm1q",
        product: "dm1qxxx",
        board: "kalama",
        fingerprint: "samsung/dm1qxxx/dm1q:14/UP1A.231005.007/S911BXXU3BWK5:user/release-keys",
        security_patch: "2023-12-01",
        tac_prefixes: &["35067211", "35116982"],
    },
    DevicePreset {
        key: "oneplus-11",
        manufacturer: "OnePlus",
        brand: "OnePlus",
        model: "CPH2449",
        device: "OP594DL1",
        product: "CPH2449EEA",
        board: "kalama",
        fingerprint: "OnePlus/CPH2449EEA/OP594DL1:14/UKQ1.230924.001/T.R4T2.1a2b3c4:user/release-keys",
        security_patch: "2024-01-05",
        tac_prefixes: &["86223606"],
    },
    DevicePreset {
        key: "xiaomi-13",
        manufacturer: "Xiaomi",
        brand: "Xiaomi",
        model: "2211133G",
        device: "fuxi",
        product: "fuxi_global",
        board: "kalama",
        fingerprint: "Xiaomi/fuxi_global/fuxi:14/UKQ1.230804.001/V816.0.5.0.UMCMIXM:user/release-keys",
        security_patch: "2024-01-01",
        tac_prefixes: &["86769906", "86769806"],
    },
];

pub fn country(iso: &str) -> Option<&'static CountryRecord> {
    COUNTRIES.iter().find(|c| c.iso.eq_ignore_ascii_case(iso))
}

pub fn carrier(key: &str) -> Option<&'static CarrierRecord> {
    CARRIERS.iter().find(|c| c.key == key)
}

pub fn device_preset(key: &str) -> Option<&'static DevicePreset> {
    DEVICE_PRESETS.iter().find(|d| d.key == key)
}

/// Carrier whose MCC/MNC prefixes the given subscriber or operator code
pub fn carrier_for_network_code(code: &str) -> Option<&'static CarrierRecord> {
    CARRIERS
        .iter()
        .filter(|c| code.starts_with(&c.network_code()))
        .max_by_key(|c| c.mnc.len())
}
