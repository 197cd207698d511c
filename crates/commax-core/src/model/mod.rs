// ── Domain model ──
//
// Canonical types the bridge hands to platform entities. Built from the
// raw vendor payloads in `convert`; never serialized back to the vendor.

pub mod device;
pub mod snapshot;

pub use device::{Access, Device, DeviceCategory, DeviceId, Sort, SubDevice, SubDeviceId};
pub use snapshot::RegistrySnapshot;
