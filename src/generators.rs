//! Validated value generators
//!
//! One generator per identifier shape, each paired with an `is_valid_*`
//! predicate that re-checks the same format invariant in decision form.
//! Generators take any [`Rng`] so the resolver can drive them either from a
//! seeded `StdRng` (stable derivation) or from `thread_rng` (fresh values).

use crate::correlation::{CarrierRecord, CountryRecord};
use rand::Rng;
use sha2::{Digest, Sha256};

const SERIAL_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SSID_PREFIXES: &[&str] = &["NETGEAR", "TP-Link", "Linksys", "ASUS", "HUAWEI", "Vodafone"];

pub const IMEI_LEN: usize = 15;
pub const IMSI_LEN: usize = 15;
pub const MEID_LEN: usize = 14;
pub const SERIAL_LEN: usize = 12;
pub const ANDROID_ID_LEN: usize = 16;
pub const GSF_ID_LEN: usize = 16;
pub const MEDIA_DRM_ID_LEN: usize = 64;

fn random_digits<R: Rng + ?Sized>(rng: &mut R, count: usize) -> String {
    (0..count)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn all_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Luhn check digit for a string of decimal digits
///
/// Returns `None` if `payload` contains anything but ASCII digits.
pub fn luhn_check_digit(payload: &str) -> Option<u8> {
    if !all_digits(payload) {
        return None;
    }

    // Rightmost payload digit is doubled once the check digit is appended
    let sum: u32 = payload
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    Some(((10 - (sum % 10)) % 10) as u8)
}

/// True if the last digit is the Luhn checksum of the preceding ones
pub fn luhn_valid(value: &str) -> bool {
    if value.len() < 2 || !all_digits(value) {
        return false;
    }
    let (payload, check) = value.split_at(value.len() - 1);
    luhn_check_digit(payload) == Some(check.as_bytes()[0] - b'0')
}

fn append_luhn(payload: String) -> String {
    // payload is built from digits only, the check digit always exists
    let check = luhn_check_digit(&payload).unwrap_or(0);
    format!("{}{}", payload, check)
}

/// 15-digit equipment identifier with a Luhn check digit
///
/// `tac` is an optional 8-digit type allocation code; invalid or missing
/// codes fall back to a random reporting-body prefix.
pub fn generate_imei<R: Rng + ?Sized>(rng: &mut R, tac: Option<&str>) -> String {
    let prefix = match tac {
        Some(tac) if tac.len() == 8 && all_digits(tac) => tac.to_string(),
        _ => format!("35{}", random_digits(rng, 6)),
    };
    let body = random_digits(rng, IMEI_LEN - 1 - prefix.len());
    append_luhn(prefix + &body)
}

pub fn is_valid_imei(value: &str) -> bool {
    value.len() == IMEI_LEN && luhn_valid(value)
}

/// 14 uppercase hex digits
pub fn generate_meid<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; MEID_LEN / 2];
    rng.fill(&mut bytes[..]);
    // A0 and above is the MEID range; below is reserved for ESN-derived ids
    bytes[0] |= 0xA0;
    hex::encode_upper(bytes)
}

pub fn is_valid_meid(value: &str) -> bool {
    value.len() == MEID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
        && value.as_bytes()[0] >= b'A'
}

/// 12 characters from `[0-9A-Z]`
pub fn generate_serial<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SERIAL_LEN)
        .map(|_| char::from(SERIAL_ALPHABET[rng.gen_range(0..SERIAL_ALPHABET.len())]))
        .collect()
}

pub fn is_valid_serial(value: &str) -> bool {
    value.len() == SERIAL_LEN && value.bytes().all(|b| SERIAL_ALPHABET.contains(&b))
}

/// Format 6 bytes as `XX:XX:XX:XX:XX:XX`
pub fn format_mac(bytes: &[u8; 6]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parse the colon-separated textual form back into 6 bytes
pub fn parse_mac(value: &str) -> Option<[u8; 6]> {
    let mut bytes = [0u8; 6];
    let mut parts = value.split(':');
    for slot in bytes.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *slot = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(bytes)
}

/// Locally administered unicast hardware address
pub fn generate_mac<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 6];
    rng.fill(&mut bytes[..]);
    // clear multicast (bit 0), set locally administered (bit 1)
    bytes[0] = (bytes[0] & 0b1111_1100) | 0b0000_0010;
    format_mac(&bytes)
}

/// Vendor address: fixed OUI, random NIC-specific half
pub fn generate_vendor_mac<R: Rng + ?Sized>(rng: &mut R, oui: [u8; 3]) -> String {
    let mut bytes = [0u8; 6];
    bytes[..3].copy_from_slice(&oui);
    rng.fill(&mut bytes[3..]);
    bytes[0] &= 0b1111_1110;
    format_mac(&bytes)
}

/// Uppercase text, unicast, locally administered
pub fn is_valid_generated_mac(value: &str) -> bool {
    if value.bytes().any(|b| b.is_ascii_lowercase()) {
        return false;
    }
    match parse_mac(value) {
        Some(bytes) => bytes[0] & 0b01 == 0 && bytes[0] & 0b10 != 0,
        None => false,
    }
}

/// Lowercase BSSID as the platform reports it for access points
pub fn generate_bssid<R: Rng + ?Sized>(rng: &mut R) -> String {
    generate_mac(rng).to_ascii_lowercase()
}

pub fn is_valid_bssid(value: &str) -> bool {
    !value.bytes().any(|b| b.is_ascii_uppercase())
        && is_valid_generated_mac(&value.to_ascii_uppercase())
}

/// 15-digit subscriber id prefixed by the carrier's MCC+MNC
pub fn generate_imsi<R: Rng + ?Sized>(rng: &mut R, carrier: &CarrierRecord) -> String {
    let network = carrier.network_code();
    let msin = random_digits(rng, IMSI_LEN - network.len());
    network + &msin
}

pub fn is_valid_imsi(value: &str, carrier: Option<&CarrierRecord>) -> bool {
    if value.len() != IMSI_LEN || !all_digits(value) {
        return false;
    }
    match carrier {
        Some(c) => value.starts_with(&c.network_code()),
        None => true,
    }
}

/// 19 or 20 digit SIM serial starting with the carrier's issuer prefix
///
/// The final digit is a Luhn check digit over the rest.
pub fn generate_iccid<R: Rng + ?Sized>(rng: &mut R, carrier: &CarrierRecord) -> String {
    let prefix = carrier.iccid_prefix();
    let total = if rng.gen_bool(0.5) { 19 } else { 20 };
    let body = random_digits(rng, total - 1 - prefix.len());
    append_luhn(prefix + &body)
}

pub fn is_valid_iccid(value: &str, carrier: Option<&CarrierRecord>) -> bool {
    if !(19..=20).contains(&value.len()) || !value.starts_with("89") || !luhn_valid(value) {
        return false;
    }
    match carrier {
        Some(c) => value.starts_with(&c.iccid_prefix()),
        None => true,
    }
}

/// `+<calling code><10 digits>`, the national part never starting with 0
pub fn generate_phone_number<R: Rng + ?Sized>(rng: &mut R, country: &CountryRecord) -> String {
    let lead = char::from(b'1' + rng.gen_range(0..9u8));
    format!("+{}{}{}", country.calling_code, lead, random_digits(rng, 9))
}

pub fn is_valid_phone_number(value: &str, country: Option<&CountryRecord>) -> bool {
    let Some(digits) = value.strip_prefix('+') else {
        return false;
    };
    if !all_digits(digits) || !(8..=15).contains(&digits.len()) {
        return false;
    }
    match country {
        Some(c) => {
            digits.starts_with(c.calling_code) && digits.len() == c.calling_code.len() + 10
        }
        None => true,
    }
}

/// Fixed-length lowercase hex id (advertising / storage ids)
pub fn generate_hex_id<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    let mut bytes = vec![0u8; len.div_ceil(2)];
    rng.fill(&mut bytes[..]);
    let mut encoded = hex::encode(bytes);
    encoded.truncate(len);
    encoded
}

pub fn is_valid_hex_id(value: &str, len: usize) -> bool {
    value.len() == len
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

pub fn generate_android_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    generate_hex_id(rng, ANDROID_ID_LEN)
}

pub fn generate_gsf_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    generate_hex_id(rng, GSF_ID_LEN)
}

/// 32-byte device unique id as reported by DRM plugins, hex encoded
pub fn generate_media_drm_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut seed = [0u8; 32];
    rng.fill(&mut seed[..]);
    hex::encode(Sha256::digest(seed))
}

/// Lowercase version-4 UUID text
pub fn generate_advertising_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut b = [0u8; 16];
    rng.fill(&mut b[..]);
    b[6] = (b[6] & 0x0F) | 0x40;
    b[8] = (b[8] & 0x3F) | 0x80;
    let h = hex::encode(b);
    format!(
        "{}-{}-{}-{}-{}",
        &h[0..8],
        &h[8..12],
        &h[12..16],
        &h[16..20],
        &h[20..32]
    )
}

pub fn is_valid_advertising_id(value: &str) -> bool {
    let groups: Vec<&str> = value.split('-').collect();
    let lens = [8, 4, 4, 4, 12];
    groups.len() == lens.len()
        && groups
            .iter()
            .zip(lens)
            .all(|(g, len)| is_valid_hex_id(g, len))
        && groups[2].starts_with('4')
        && matches!(groups[3].as_bytes()[0], b'8' | b'9' | b'a' | b'b')
}

pub fn generate_ssid<R: Rng + ?Sized>(rng: &mut R) -> String {
    let prefix = SSID_PREFIXES[rng.gen_range(0..SSID_PREFIXES.len())];
    format!("{}-{:04X}", prefix, rng.gen::<u16>())
}

pub fn is_valid_ssid(value: &str) -> bool {
    (1..=32).contains(&value.len()) && !value.chars().any(char::is_control)
}

/// Point inside the country's bounding box, 6 decimal places
pub fn generate_coordinates<R: Rng + ?Sized>(rng: &mut R, country: &CountryRecord) -> (String, String) {
    let (min_lat, max_lat, min_lon, max_lon) = country.bounds;
    let lat = rng.gen_range(min_lat..max_lat);
    let lon = rng.gen_range(min_lon..max_lon);
    (format!("{:.6}", lat), format!("{:.6}", lon))
}

pub fn is_valid_latitude(value: &str) -> bool {
    value
        .parse::<f64>()
        .map(|v| (-90.0..=90.0).contains(&v))
        .unwrap_or(false)
}

pub fn is_valid_longitude(value: &str) -> bool {
    value
        .parse::<f64>()
        .map(|v| (-180.0..=180.0).contains(&v))
        .unwrap_or(false)
}
