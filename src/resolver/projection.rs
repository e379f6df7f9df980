use crate::correlation;
use crate::generators;
use crate::identifier::IdentifierType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which part of a resolved value a call-site reports
///
/// Call-sites such as `Build.MODEL` or `getSimOperator` do not report the
/// identifier itself but one field of it; the catalog names the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    #[default]
    Full,
    Mcc,
    Mnc,
    Manufacturer,
    Brand,
    Model,
    Device,
    Product,
    Board,
    Fingerprint,
    SecurityPatch,
    /// Hardware address as a 6-element byte array
    MacBytes,
    /// Decimal value as a JSON number
    Number,
    /// `en_US` locale as the BCP-47 tag `en-US`
    LanguageTag,
}

impl Projection {
    /// Whether the projection makes sense for `ty`
    pub fn applies_to(&self, ty: IdentifierType) -> bool {
        match self {
            Self::Full => true,
            Self::Mcc | Self::Mnc => matches!(
                ty,
                IdentifierType::CarrierMccMnc | IdentifierType::NetworkOperator
            ),
            Self::Manufacturer
            | Self::Brand
            | Self::Model
            | Self::Device
            | Self::Product
            | Self::Board
            | Self::Fingerprint
            | Self::SecurityPatch => ty == IdentifierType::DeviceProfile,
            Self::MacBytes => matches!(
                ty,
                IdentifierType::WifiMac | IdentifierType::BluetoothMac | IdentifierType::WifiBssid
            ),
            Self::Number => matches!(ty, IdentifierType::Latitude | IdentifierType::Longitude),
            Self::LanguageTag => ty == IdentifierType::Locale,
        }
    }

    /// Project a resolved value into what the call-site returns
    ///
    /// Returns `None` when the value cannot be projected (unknown preset,
    /// malformed address); callers then leave the original result alone.
    pub fn apply(&self, value: &str) -> Option<Value> {
        match self {
            Self::Full => Some(Value::String(value.to_string())),
            Self::Mcc => value.get(..3).map(|s| Value::String(s.to_string())),
            Self::Mnc => value.get(3..).filter(|s| !s.is_empty()).map(|s| Value::String(s.to_string())),
            Self::MacBytes => generators::parse_mac(&value.to_ascii_uppercase())
                .map(|bytes| Value::Array(bytes.iter().map(|b| Value::from(*b)).collect())),
            Self::Number => value
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            Self::LanguageTag => Some(Value::String(value.replace('_', "-"))),
            preset_field => {
                let preset = correlation::device_preset(value)?;
                let field = match preset_field {
                    Self::Manufacturer => preset.manufacturer,
                    Self::Brand => preset.brand,
                    Self::Model => preset.model,
                    Self::Device => preset.device,
                    Self::Product => preset.product,
                    Self::Board => preset.board,
                    Self::Fingerprint => preset.fingerprint,
                    _ => preset.security_patch,
                };
                Some(Value::String(field.to_string()))
            }
        }
    }
}
