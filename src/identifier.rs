//! Identifier type registry
//!
//! Every identifier the engine can mask is a variant of [`IdentifierType`].
//! Category and correlation group are fixed by `match` arms, so membership is
//! decided at compile time and can never drift at runtime.

use crate::error::MaskError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display category used by configuration front-ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Device,
    Network,
    Advertising,
    System,
    Location,
}

/// Set of types whose generated values are derived jointly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrelationGroup {
    None,
    SimCard,
    Location,
    DeviceHardware,
}

impl CorrelationGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::SimCard => "SIM_CARD",
            Self::Location => "LOCATION",
            Self::DeviceHardware => "DEVICE_HARDWARE",
        }
    }

    /// Types belonging to this group, in registry order
    pub fn members(&self) -> Vec<IdentifierType> {
        IdentifierType::ALL
            .iter()
            .copied()
            .filter(|t| t.correlation_group() == *self)
            .collect()
    }
}

impl fmt::Display for CorrelationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An identifier the host platform can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierType {
    Imei,
    Meid,
    Serial,
    AndroidId,
    Imsi,
    Iccid,
    PhoneNumber,
    SimCountryIso,
    SimOperatorName,
    WifiMac,
    BluetoothMac,
    WifiSsid,
    WifiBssid,
    CarrierName,
    CarrierMccMnc,
    NetworkCountryIso,
    NetworkOperator,
    AdvertisingId,
    GsfId,
    MediaDrmId,
    DeviceProfile,
    Timezone,
    Locale,
    Latitude,
    Longitude,
}

impl IdentifierType {
    pub const ALL: [IdentifierType; 25] = [
        Self::Imei,
        Self::Meid,
        Self::Serial,
        Self::AndroidId,
        Self::Imsi,
        Self::Iccid,
        Self::PhoneNumber,
        Self::SimCountryIso,
        Self::SimOperatorName,
        Self::WifiMac,
        Self::BluetoothMac,
        Self::WifiSsid,
        Self::WifiBssid,
        Self::CarrierName,
        Self::CarrierMccMnc,
        Self::NetworkCountryIso,
        Self::NetworkOperator,
        Self::AdvertisingId,
        Self::GsfId,
        Self::MediaDrmId,
        Self::DeviceProfile,
        Self::Timezone,
        Self::Locale,
        Self::Latitude,
        Self::Longitude,
    ];

    /// Stable key used in configuration files and catalogs
    pub fn key(&self) -> &'static str {
        match self {
            Self::Imei => "IMEI",
            Self::Meid => "MEID",
            Self::Serial => "SERIAL",
            Self::AndroidId => "ANDROID_ID",
            Self::Imsi => "IMSI",
            Self::Iccid => "ICCID",
            Self::PhoneNumber => "PHONE_NUMBER",
            Self::SimCountryIso => "SIM_COUNTRY_ISO",
            Self::SimOperatorName => "SIM_OPERATOR_NAME",
            Self::WifiMac => "WIFI_MAC",
            Self::BluetoothMac => "BLUETOOTH_MAC",
            Self::WifiSsid => "WIFI_SSID",
            Self::WifiBssid => "WIFI_BSSID",
            Self::CarrierName => "CARRIER_NAME",
            Self::CarrierMccMnc => "CARRIER_MCC_MNC",
            Self::NetworkCountryIso => "NETWORK_COUNTRY_ISO",
            Self::NetworkOperator => "NETWORK_OPERATOR",
            Self::AdvertisingId => "ADVERTISING_ID",
            Self::GsfId => "GSF_ID",
            Self::MediaDrmId => "MEDIA_DRM_ID",
            Self::DeviceProfile => "DEVICE_PROFILE",
            Self::Timezone => "TIMEZONE",
            Self::Locale => "LOCALE",
            Self::Latitude => "LATITUDE",
            Self::Longitude => "LONGITUDE",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Imei => "IMEI",
            Self::Meid => "MEID",
            Self::Serial => "Serial Number",
            Self::AndroidId => "Android ID",
            Self::Imsi => "IMSI",
            Self::Iccid => "ICCID",
            Self::PhoneNumber => "Phone Number",
            Self::SimCountryIso => "SIM Country",
            Self::SimOperatorName => "SIM Operator",
            Self::WifiMac => "Wi-Fi MAC",
            Self::BluetoothMac => "Bluetooth MAC",
            Self::WifiSsid => "Wi-Fi SSID",
            Self::WifiBssid => "Wi-Fi BSSID",
            Self::CarrierName => "Carrier Name",
            Self::CarrierMccMnc => "Carrier MCC/MNC",
            Self::NetworkCountryIso => "Network Country",
            Self::NetworkOperator => "Network Operator",
            Self::AdvertisingId => "Advertising ID",
            Self::GsfId => "GSF ID",
            Self::MediaDrmId => "Media DRM ID",
            Self::DeviceProfile => "Device Profile",
            Self::Timezone => "Timezone",
            Self::Locale => "Locale",
            Self::Latitude => "Latitude",
            Self::Longitude => "Longitude",
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Imei
            | Self::Meid
            | Self::Serial
            | Self::AndroidId
            | Self::Imsi
            | Self::Iccid
            | Self::PhoneNumber
            | Self::SimCountryIso
            | Self::SimOperatorName => Category::Device,
            Self::WifiMac
            | Self::BluetoothMac
            | Self::WifiSsid
            | Self::WifiBssid
            | Self::CarrierName
            | Self::CarrierMccMnc
            | Self::NetworkCountryIso
            | Self::NetworkOperator => Category::Network,
            Self::AdvertisingId | Self::GsfId | Self::MediaDrmId => Category::Advertising,
            Self::DeviceProfile => Category::System,
            Self::Timezone | Self::Locale | Self::Latitude | Self::Longitude => {
                Category::Location
            }
        }
    }

    pub fn correlation_group(&self) -> CorrelationGroup {
        match self {
            Self::Imei | Self::Meid | Self::Serial | Self::WifiMac | Self::BluetoothMac => {
                CorrelationGroup::DeviceHardware
            }
            Self::Imsi
            | Self::Iccid
            | Self::PhoneNumber
            | Self::SimCountryIso
            | Self::SimOperatorName
            | Self::CarrierName
            | Self::CarrierMccMnc
            | Self::NetworkCountryIso
            | Self::NetworkOperator => CorrelationGroup::SimCard,
            Self::Timezone | Self::Locale | Self::Latitude | Self::Longitude => {
                CorrelationGroup::Location
            }
            Self::AndroidId
            | Self::WifiSsid
            | Self::WifiBssid
            | Self::AdvertisingId
            | Self::GsfId
            | Self::MediaDrmId
            | Self::DeviceProfile => CorrelationGroup::None,
        }
    }

    /// Key under which derived values share a seed
    ///
    /// Grouped types share their group's key; ungrouped types derive alone.
    pub fn derivation_key(&self) -> &'static str {
        match self.correlation_group() {
            CorrelationGroup::None => self.key(),
            group => group.as_str(),
        }
    }
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for IdentifierType {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.key() == wanted)
            .ok_or_else(|| MaskError::UnknownIdentifier(s.to_string()))
    }
}
