// ── Bridge facade ──
//
// Wires the session manager, registry, dispatcher and scheduler together
// and exposes the surface a platform layer talks to.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use commax_api::{CommaxClient, TransportConfig};

use crate::command::{Ack, Command, CommandDispatcher};
use crate::config::BridgeConfig;
use crate::encoding::Intent;
use crate::error::{ApiError, CoreError};
use crate::model::{Device, DeviceId, RegistrySnapshot};
use crate::registry::DeviceRegistry;
use crate::scheduler::PollingScheduler;
use crate::session::AuthSessionManager;
use crate::stream::SnapshotStream;

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Entry point for platform layers.
///
/// Cheaply cloneable. [`connect()`](Self::connect) logs in, loads the
/// first snapshot and starts polling plus the token refresh timer;
/// [`disconnect()`](Self::disconnect) stops both and waits for them.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    auth: Arc<AuthSessionManager>,
    registry: Arc<DeviceRegistry>,
    dispatcher: CommandDispatcher,
    /// Shared between the dispatcher and each scheduler generation.
    command_kick: Arc<Notify>,
    state: watch::Sender<BridgeState>,
    scheduler: Mutex<Option<PollingScheduler>>,
    /// Cancelled on disconnect, replaced on reconnect.
    cancel: Mutex<CancellationToken>,
    refresh_timer: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    /// Build a bridge. Does not touch the network.
    pub fn new(config: BridgeConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig::with_timeout(config.request_timeout);
        let client = CommaxClient::new(config.auth_url.clone(), config.api_url.clone(), &transport)
            .map_err(ApiError::from)?;
        Ok(Self::with_client(config, client))
    }

    /// Build a bridge over a pre-built client.
    pub fn with_client(config: BridgeConfig, client: CommaxClient) -> Self {
        let auth = Arc::new(AuthSessionManager::new(
            client,
            config.credentials.clone(),
            config.token_refresh_margin,
            config.login_retry.clone(),
        ));
        let registry = Arc::new(DeviceRegistry::new(
            Arc::clone(&auth),
            config.resource_no.clone(),
        ));
        let command_kick = Arc::new(Notify::new());
        let dispatcher = CommandDispatcher::new(Arc::clone(&auth), Arc::clone(&registry))
            .with_submit_hint(Arc::clone(&command_kick));
        let (state, _) = watch::channel(BridgeState::Disconnected);

        Self {
            inner: Arc::new(BridgeInner {
                config,
                auth,
                registry,
                dispatcher,
                command_kick,
                state,
                scheduler: Mutex::new(None),
                cancel: Mutex::new(CancellationToken::new()),
                refresh_timer: Mutex::new(None),
            }),
        }
    }

    /// The configuration this bridge was built with.
    pub fn configuration(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn session_manager(&self) -> &Arc<AuthSessionManager> {
        &self.inner.auth
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.inner.registry
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Log in, load the first snapshot, then start background polling
    /// and the token refresh timer.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.connect_with(true).await
    }

    async fn connect_with(&self, background: bool) -> Result<(), CoreError> {
        if self.state() == BridgeState::Connected {
            debug!("already connected");
            return Ok(());
        }
        self.inner.state.send_replace(BridgeState::Connecting);

        if let Err(e) = self.load_initial().await {
            warn!(error = %e, "connect failed");
            self.inner.state.send_replace(BridgeState::Failed);
            return Err(e);
        }

        if background {
            let cancel = {
                let mut guard = self.inner.cancel.lock().await;
                if guard.is_cancelled() {
                    *guard = CancellationToken::new();
                }
                guard.clone()
            };
            *self.inner.refresh_timer.lock().await =
                Some(self.inner.auth.spawn_refresh_timer(cancel));

            let config = &self.inner.config;
            let scheduler = PollingScheduler::new(
                Arc::clone(&self.inner.registry),
                config.update_interval,
            )
            .with_kick(
                Arc::clone(&self.inner.command_kick),
                config.post_command_refresh,
            );
            scheduler.start().await;
            *self.inner.scheduler.lock().await = Some(scheduler);
        }

        self.inner.state.send_replace(BridgeState::Connected);
        info!(resource_no = %self.inner.config.resource_no, "bridge connected");
        Ok(())
    }

    async fn load_initial(&self) -> Result<(), CoreError> {
        self.inner.auth.login().await?;
        self.inner.registry.refresh().await?;
        self.inner.registry.publish();
        Ok(())
    }

    /// Stop polling and the refresh timer, waiting for any in-flight
    /// refresh, then drop the session.
    pub async fn disconnect(&self) {
        self.inner.cancel.lock().await.cancel();

        if let Some(scheduler) = self.inner.scheduler.lock().await.take() {
            scheduler.stop().await;
        }
        if let Some(handle) = self.inner.refresh_timer.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "token refresh timer ended abnormally");
            }
        }

        self.inner.auth.invalidate().await;
        self.inner.state.send_replace(BridgeState::Disconnected);
        debug!("bridge disconnected");
    }

    /// Connect without background tasks, run `f`, then disconnect.
    pub async fn oneshot<F, Fut, T>(config: BridgeConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Bridge) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let bridge = Bridge::new(config)?;
        bridge.connect_with(false).await?;
        let result = f(bridge.clone()).await;
        bridge.disconnect().await;
        result
    }

    pub fn state(&self) -> BridgeState {
        *self.inner.state.borrow()
    }

    /// Subscribe to lifecycle state changes.
    pub fn state_changes(&self) -> watch::Receiver<BridgeState> {
        self.inner.state.subscribe()
    }

    // ── Platform surface ─────────────────────────────────────────────

    /// The latest device snapshot. Never performs I/O.
    pub fn device_list(&self) -> Arc<RegistrySnapshot> {
        self.inner.registry.current_snapshot()
    }

    pub fn device(&self, id: &DeviceId) -> Result<Device, CoreError> {
        self.inner
            .registry
            .device(id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: id.to_string(),
            })
    }

    /// Subscribe to published snapshots.
    pub fn subscribe(&self) -> SnapshotStream {
        self.inner.registry.subscribe()
    }

    /// Submit a command. Requires a connected bridge.
    pub async fn send_command(&self, command: Command) -> Result<Ack, CoreError> {
        self.ensure_connected()?;
        Ok(self.inner.dispatcher.send(command).await?)
    }

    /// Submit several commands in one request.
    pub async fn send_commands(&self, commands: Vec<Command>) -> Result<Ack, CoreError> {
        self.ensure_connected()?;
        Ok(self.inner.dispatcher.send_batch(commands).await?)
    }

    /// Resolve and submit an abstract intent for one device.
    pub async fn send_intent(&self, device: &DeviceId, intent: &Intent) -> Result<Ack, CoreError> {
        self.ensure_connected()?;
        if self.inner.registry.device(device).is_none() {
            return Err(CoreError::DeviceNotFound {
                identifier: device.to_string(),
            });
        }
        Ok(self.inner.dispatcher.send_intent(device, intent).await?)
    }

    /// Refresh the registry now and publish the result.
    pub async fn refresh_now(&self) -> Result<Arc<RegistrySnapshot>, CoreError> {
        let snapshot = self.inner.registry.refresh().await?;
        self.inner.registry.publish();
        Ok(snapshot)
    }

    pub async fn pause_polling(&self) {
        if let Some(scheduler) = self.inner.scheduler.lock().await.as_ref() {
            scheduler.pause();
        }
    }

    pub async fn resume_polling(&self) {
        if let Some(scheduler) = self.inner.scheduler.lock().await.as_ref() {
            scheduler.resume();
        }
    }

    fn ensure_connected(&self) -> Result<(), CoreError> {
        if self.state() == BridgeState::Connected {
            Ok(())
        } else {
            Err(CoreError::Disconnected)
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("resource_no", &self.inner.config.resource_no)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
