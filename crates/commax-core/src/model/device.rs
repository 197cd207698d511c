// ── Device domain types ──

use std::fmt;

use serde::{Serialize, Serializer};

/// Root device identity (`rootUuid`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

/// Sub-device identity (`subUuid`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubDeviceId(String);

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(DeviceId);
string_id!(SubDeviceId);

/// Vendor device category (`commaxDevice`).
///
/// Unseen categories are kept as [`Unknown`](Self::Unknown) so a new
/// vendor product never breaks the device list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceCategory {
    Light,
    Boiler,
    StandbyPowerSwitch,
    FanSystem,
    Unknown(String),
}

impl DeviceCategory {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "light" => Self::Light,
            "boiler" => Self::Boiler,
            "standbyPowerSwitch" => Self::StandbyPowerSwitch,
            "fanSystem" => Self::FanSystem,
            other => Self::Unknown(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Light => "light",
            Self::Boiler => "boiler",
            Self::StandbyPowerSwitch => "standbyPowerSwitch",
            Self::FanSystem => "fanSystem",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DeviceCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Functional role of a sub-device (`sort`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sort {
    SwitchBinary,
    AirTemperature,
    ThermostatMode,
    ThermostatSetpoint,
    FanMode,
    Other(String),
}

impl Sort {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "switchBinary" => Self::SwitchBinary,
            "airTemperature" => Self::AirTemperature,
            "thermostatMode" => Self::ThermostatMode,
            "thermostatSetpoint" => Self::ThermostatSetpoint,
            "fanMode" => Self::FanMode,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SwitchBinary => "switchBinary",
            Self::AirTemperature => "airTemperature",
            Self::ThermostatMode => "thermostatMode",
            Self::ThermostatSetpoint => "thermostatSetpoint",
            Self::FanMode => "fanMode",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Sort {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Sub-device access mode (`type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Access {
    Read,
    ReadWrite,
}

impl Access {
    /// Anything other than `readWrite` is treated as read-only.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("readWrite") => Self::ReadWrite,
            _ => Self::Read,
        }
    }
}

/// One functional endpoint of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubDevice {
    pub id: SubDeviceId,
    pub sort: Sort,
    pub access: Access,
    /// Current value, kept exactly as the vendor encodes it.
    pub value: String,
    /// Vendor-declared legal values. Empty = unconstrained.
    pub scale: Vec<String>,
    pub options: Vec<String>,
}

impl SubDevice {
    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }

    /// Whether `value` is legal: a member of `scale` or `options` when
    /// either is declared, anything otherwise.
    pub fn allows(&self, value: &str) -> bool {
        if self.scale.is_empty() && self.options.is_empty() {
            return true;
        }
        self.scale.iter().chain(&self.options).any(|v| v == value)
    }

    /// The declared value set (scale first, then options).
    pub fn allowed_values(&self) -> Vec<String> {
        self.scale.iter().chain(&self.options).cloned().collect()
    }
}

/// A registered device and its sub-devices, in vendor order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub id: DeviceId,
    pub category: DeviceCategory,
    pub name: String,
    /// Vendor device kind (`rootDevice`), echoed back in commands.
    pub root_device: Option<String>,
    pub sub_devices: Vec<SubDevice>,
}

impl Device {
    pub fn sub_device(&self, id: &SubDeviceId) -> Option<&SubDevice> {
        self.sub_devices.iter().find(|s| &s.id == id)
    }

    pub(crate) fn sub_device_mut(&mut self, id: &SubDeviceId) -> Option<&mut SubDevice> {
        self.sub_devices.iter_mut().find(|s| &s.id == id)
    }

    /// First sub-device with the given sort, preferring writable ones.
    pub fn find_sort(&self, sort: &Sort) -> Option<&SubDevice> {
        let mut matching = self.sub_devices.iter().filter(|s| &s.sort == sort);
        let first = matching.next()?;
        if first.is_writable() {
            return Some(first);
        }
        matching.find(|s| s.is_writable()).or(Some(first))
    }
}
