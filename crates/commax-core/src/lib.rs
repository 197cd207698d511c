//! Session and command bridge between a home-automation platform and the
//! COMMAX IoT cloud.
//!
//! - **[`Bridge`]**: facade over the whole core.
//!   [`connect()`](Bridge::connect) logs in, loads the first device
//!   snapshot, then spawns the polling task and the token refresh timer.
//!   [`Bridge::oneshot()`] runs a single operation without background tasks.
//!
//! - **[`AuthSessionManager`]**: owns the [`Session`] behind a single-flight
//!   guard. Every vendor call goes through
//!   [`authorized()`](AuthSessionManager::authorized), which refreshes a
//!   stale session first and re-authenticates exactly once on a `401`.
//!
//! - **[`DeviceRegistry`]**: immutable [`RegistrySnapshot`]s swapped in
//!   atomically on each poll; lookups never perform I/O.
//!
//! - **[`CommandDispatcher`]**: validates [`Command`]s against the current
//!   snapshot, serializes them into vendor envelopes and applies the
//!   accepted value optimistically until the next poll.
//!
//! - **[`PollingScheduler`]**: periodic refresh with pause/resume and a
//!   graceful stop that waits for the in-flight poll.
//!
//! Category behavior lives in the mapping tables of [`encoding`].

pub mod bridge;
pub mod command;
pub mod config;
mod convert;
pub mod encoding;
pub mod error;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{Bridge, BridgeState};
pub use command::{Ack, Command, CommandDispatcher};
pub use config::{
    BridgeConfig, Credentials, DEFAULT_REFRESH_MARGIN, DEFAULT_UPDATE_INTERVAL,
    MIN_UPDATE_INTERVAL, RetryPolicy,
};
pub use encoding::{BinaryState, FanPreset, Intent};
pub use error::{ApiError, AuthError, CommandError, CoreError};
pub use model::{
    Access, Device, DeviceCategory, DeviceId, RegistrySnapshot, Sort, SubDevice, SubDeviceId,
};
pub use registry::DeviceRegistry;
pub use scheduler::PollingScheduler;
pub use session::{AuthSessionManager, Session, TokenStore};
pub use stream::{SnapshotStream, SnapshotWatchStream};
