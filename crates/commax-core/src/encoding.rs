// ── Intent → vendor value encoding ──
//
// Category behavior is data, not code: which sub-device an intent
// targets is a row in `ROUTES`, and how a logical state is spelled on the
// wire is a row in a value table.

use serde::Serialize;
use strum::{Display, EnumIter, EnumString};

use crate::model::{DeviceCategory, Sort};

// ── Value tables ─────────────────────────────────────────────────────

/// On/off state of binary switches and the boiler mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum BinaryState {
    On,
    Off,
}

/// Ventilation preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum FanPreset {
    Bypass,
    Manual,
    Auto,
}

const BINARY_TABLE: &[(BinaryState, &str)] = &[(BinaryState::On, "1"), (BinaryState::Off, "0")];

/// Alternate spellings the cloud has been seen to report.
const BINARY_ALIASES: &[(BinaryState, &str)] = &[
    (BinaryState::On, "on"),
    (BinaryState::On, "true"),
    (BinaryState::Off, "off"),
    (BinaryState::Off, "false"),
];

const FAN_TABLE: &[(FanPreset, &str)] = &[
    (FanPreset::Bypass, "0"),
    (FanPreset::Manual, "1"),
    (FanPreset::Auto, "2"),
];

fn encode_with<T: PartialEq + Copy>(table: &[(T, &'static str)], key: T) -> &'static str {
    table
        .iter()
        .find(|(k, _)| *k == key)
        .map_or("", |(_, wire)| *wire)
}

fn decode_with<T: Copy>(table: &[(T, &str)], raw: &str) -> Option<T> {
    table
        .iter()
        .find(|(_, wire)| wire.eq_ignore_ascii_case(raw))
        .map(|(k, _)| *k)
}

impl BinaryState {
    pub fn encode(self) -> &'static str {
        encode_with(BINARY_TABLE, self)
    }

    /// Decode a vendor value; accepts `1/0` and `on/off/true/false`.
    pub fn decode(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        decode_with(BINARY_TABLE, raw).or_else(|| decode_with(BINARY_ALIASES, raw))
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl From<bool> for BinaryState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

impl FanPreset {
    pub fn encode(self) -> &'static str {
        encode_with(FAN_TABLE, self)
    }

    pub fn decode(raw: &str) -> Option<Self> {
        decode_with(FAN_TABLE, raw.trim())
    }
}

// ── Intents ──────────────────────────────────────────────────────────

/// An abstract user intent, independent of device category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    TurnOn,
    TurnOff,
    /// Target temperature. Passed through as-is; rounding is the caller's call.
    SetTemperature(f64),
    SetFanPreset(FanPreset),
}

/// Which routing row an intent uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntentKind {
    Power,
    Temperature,
    Preset,
}

/// `(commaxDevice, intent kind, target sort)`.
const ROUTES: &[(&str, IntentKind, &str)] = &[
    ("light", IntentKind::Power, "switchBinary"),
    ("standbyPowerSwitch", IntentKind::Power, "switchBinary"),
    ("boiler", IntentKind::Power, "thermostatMode"),
    ("boiler", IntentKind::Temperature, "thermostatSetpoint"),
    ("fanSystem", IntentKind::Power, "switchBinary"),
    ("fanSystem", IntentKind::Preset, "fanMode"),
];

impl Intent {
    fn kind(&self) -> IntentKind {
        match self {
            Self::TurnOn | Self::TurnOff => IntentKind::Power,
            Self::SetTemperature(_) => IntentKind::Temperature,
            Self::SetFanPreset(_) => IntentKind::Preset,
        }
    }

    /// The sort this intent targets on a device of `category`, if any.
    /// Unknown categories have no routes.
    pub fn target_sort(&self, category: &DeviceCategory) -> Option<Sort> {
        if !category.is_known() {
            return None;
        }
        let kind = self.kind();
        ROUTES
            .iter()
            .find(|(cat, k, _)| *cat == category.as_str() && *k == kind)
            .map(|(_, _, sort)| Sort::parse(sort))
    }

    /// The vendor value for this intent.
    pub fn encode(&self) -> String {
        match self {
            Self::TurnOn => BinaryState::On.encode().to_owned(),
            Self::TurnOff => BinaryState::Off.encode().to_owned(),
            Self::SetTemperature(celsius) => celsius.to_string(),
            Self::SetFanPreset(preset) => preset.encode().to_owned(),
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TurnOn => f.write_str("turn on"),
            Self::TurnOff => f.write_str("turn off"),
            Self::SetTemperature(t) => write!(f, "set temperature {t}"),
            Self::SetFanPreset(p) => write!(f, "set fan preset {p}"),
        }
    }
}
