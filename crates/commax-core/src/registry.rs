// ── Device registry ──
//
// Holds the latest device snapshot. Reads are lock-free loads of an
// `Arc`; writers build a complete new snapshot and swap it in, so a
// reader sees either the old set or the new set and never a mix.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::convert::devices_from_raw;
use crate::error::ApiError;
use crate::model::{Device, DeviceId, RegistrySnapshot, SubDevice, SubDeviceId};
use crate::session::AuthSessionManager;
use crate::stream::SnapshotStream;

/// Current view of every device registered to one resource.
pub struct DeviceRegistry {
    auth: Arc<AuthSessionManager>,
    resource_no: String,
    current: ArcSwap<RegistrySnapshot>,
    /// Subscribers are told only when the bridge decides to publish.
    published: watch::Sender<Arc<RegistrySnapshot>>,
    version: AtomicU64,
}

impl DeviceRegistry {
    pub fn new(auth: Arc<AuthSessionManager>, resource_no: impl Into<String>) -> Self {
        let empty = Arc::new(RegistrySnapshot::empty());
        let (published, _) = watch::channel(Arc::clone(&empty));
        Self {
            auth,
            resource_no: resource_no.into(),
            current: ArcSwap::new(empty),
            published,
            version: AtomicU64::new(0),
        }
    }

    pub fn resource_no(&self) -> &str {
        &self.resource_no
    }

    /// Fetch the device list and swap in a fresh snapshot.
    ///
    /// On failure the previous snapshot stays in place untouched.
    pub async fn refresh(&self) -> Result<Arc<RegistrySnapshot>, ApiError> {
        let client = self.auth.client();
        let resource_no = self.resource_no.as_str();
        let raw = self
            .auth
            .authorized(move |token| async move { client.device_list(&token, resource_no).await })
            .await?;

        let devices = devices_from_raw(raw);
        let mut snapshot = Arc::new(RegistrySnapshot::empty());
        self.current.rcu(|_| {
            snapshot = Arc::new(RegistrySnapshot::new(self.next_version(), devices.clone()));
            Arc::clone(&snapshot)
        });

        info!(
            version = snapshot.version,
            devices = snapshot.len(),
            categories = ?snapshot.category_counts(),
            "device registry refreshed"
        );
        Ok(snapshot)
    }

    /// The latest snapshot. Never performs I/O.
    pub fn current_snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    pub fn device(&self, id: &DeviceId) -> Option<Device> {
        self.current.load().device(id).cloned()
    }

    /// Look up one sub-device in the latest snapshot. Never performs I/O.
    pub fn lookup(&self, device: &DeviceId, sub: &SubDeviceId) -> Option<SubDevice> {
        self.current.load().lookup(device, sub).cloned()
    }

    /// Notify subscribers of the current snapshot.
    pub fn publish(&self) {
        let snapshot = self.current_snapshot();
        debug!(version = snapshot.version, "publishing device snapshot");
        self.published.send_replace(snapshot);
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.published.subscribe())
    }

    /// Record a value the vendor just accepted, ahead of the next poll.
    ///
    /// Applied on top of whatever snapshot is current; the next refresh
    /// replaces it with whatever the vendor reports. Returns `false` if
    /// the target vanished from the registry in the meantime.
    pub fn apply_optimistic(&self, device: &DeviceId, sub: &SubDeviceId, value: &str) -> bool {
        let mut applied = false;
        self.current.rcu(|snapshot| {
            match snapshot.with_value(self.next_version(), device, sub, value) {
                Some(next) => {
                    applied = true;
                    Arc::new(next)
                }
                None => {
                    applied = false;
                    Arc::clone(snapshot)
                }
            }
        });
        if applied {
            debug!(device = %device, sub = %sub, value, "applied optimistic value");
            self.publish();
        }
        applied
    }

    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("resource_no", &self.resource_no)
            .field("version", &self.current.load().version)
            .finish_non_exhaustive()
    }
}
