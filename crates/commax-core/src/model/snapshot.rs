// ── Registry snapshot ──
//
// An immutable view of every device at one point in time. The registry
// swaps whole snapshots; nothing mutates one in place once published.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use super::device::{Device, DeviceId, SubDevice, SubDeviceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySnapshot {
    /// Strictly increasing across every snapshot a registry publishes.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    devices: IndexMap<DeviceId, Device>,
}

impl RegistrySnapshot {
    pub fn empty() -> Self {
        Self {
            version: 0,
            updated_at: Utc::now(),
            devices: IndexMap::new(),
        }
    }

    pub(crate) fn new(version: u64, devices: IndexMap<DeviceId, Device>) -> Self {
        Self {
            version,
            updated_at: Utc::now(),
            devices,
        }
    }

    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn lookup(&self, device: &DeviceId, sub: &SubDeviceId) -> Option<&SubDevice> {
        self.devices.get(device)?.sub_device(sub)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Device count per category name.
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for device in self.devices.values() {
            *counts.entry(device.category.as_str().to_owned()).or_insert(0) += 1;
        }
        counts
    }

    /// Copy of this snapshot with one sub-device value replaced and the
    /// version bumped. `None` if the target does not exist.
    pub(crate) fn with_value(
        &self,
        version: u64,
        device: &DeviceId,
        sub: &SubDeviceId,
        value: &str,
    ) -> Option<Self> {
        let mut devices = self.devices.clone();
        let target = devices.get_mut(device)?.sub_device_mut(sub)?;
        value.clone_into(&mut target.value);
        Some(Self {
            version,
            updated_at: self.updated_at,
            devices,
        })
    }
}

impl Default for RegistrySnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Access, DeviceCategory, Sort};

    fn light() -> Device {
        Device {
            id: DeviceId::from("light-1"),
            category: DeviceCategory::Light,
            name: "Kitchen".into(),
            root_device: None,
            sub_devices: vec![SubDevice {
                id: SubDeviceId::from("light-1-sw"),
                sort: Sort::SwitchBinary,
                access: Access::ReadWrite,
                value: "0".into(),
                scale: Vec::new(),
                options: Vec::new(),
            }],
        }
    }

    #[test]
    fn with_value_copies_and_leaves_original_alone() {
        let original = RegistrySnapshot::new(3, IndexMap::from([(DeviceId::from("light-1"), light())]));
        let device = DeviceId::from("light-1");
        let sub = SubDeviceId::from("light-1-sw");

        let next = original.with_value(4, &device, &sub, "1").unwrap();
        assert_eq!(next.version, 4);
        assert_eq!(next.lookup(&device, &sub).unwrap().value, "1");
        assert_eq!(original.lookup(&device, &sub).unwrap().value, "0");

        assert!(original.with_value(5, &device, &SubDeviceId::from("nope"), "1").is_none());
    }
}
