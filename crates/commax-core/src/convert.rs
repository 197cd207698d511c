// ── Raw vendor payload → domain model ──
//
// Entries missing their identity are dropped with a debug line; every
// other field has a sensible fallback so one odd device never fails
// the whole list.

use indexmap::IndexMap;
use tracing::{debug, warn};

use commax_api::{RawDevice, RawSubDevice};

use crate::model::{Access, Device, DeviceCategory, DeviceId, Sort, SubDevice, SubDeviceId};

/// Convert one raw device. `None` when `rootUuid` is missing or empty.
pub(crate) fn device_from_raw(raw: RawDevice) -> Option<Device> {
    let id = raw.root_uuid.filter(|id| !id.is_empty())?;
    let category = DeviceCategory::parse(raw.commax_device.as_deref().unwrap_or("unknown"));
    if !category.is_known() {
        debug!(device = %id, category = %category, "unrecognized device category, keeping as unknown");
    }

    let sub_devices = raw
        .sub_device
        .into_iter()
        .filter_map(|sub| sub_device_from_raw(&id, sub))
        .collect();

    Some(Device {
        name: raw.nickname.unwrap_or_else(|| id.clone()),
        id: DeviceId::new(id),
        category,
        root_device: raw.root_device,
        sub_devices,
    })
}

fn sub_device_from_raw(device: &str, raw: RawSubDevice) -> Option<SubDevice> {
    let Some(id) = raw.sub_uuid.filter(|id| !id.is_empty()) else {
        debug!(device, "skipping sub-device without subUuid");
        return None;
    };

    Some(SubDevice {
        id: SubDeviceId::new(id),
        sort: Sort::parse(raw.sort.as_deref().unwrap_or_default()),
        access: Access::parse(raw.access.as_deref()),
        value: raw.value.unwrap_or_default(),
        scale: raw.scale,
        options: raw.option,
    })
}

/// Convert a full device list, keyed by identity in vendor order.
/// The first occurrence of a duplicated identity wins.
pub(crate) fn devices_from_raw(raw: Vec<RawDevice>) -> IndexMap<DeviceId, Device> {
    let mut devices = IndexMap::with_capacity(raw.len());
    for device in raw.into_iter().filter_map(device_from_raw) {
        if devices.contains_key(&device.id) {
            warn!(device = %device.id, "duplicate rootUuid in device list, ignoring later entry");
            continue;
        }
        devices.insert(device.id.clone(), device);
    }
    devices
}
