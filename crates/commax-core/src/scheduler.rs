// ── Polling scheduler ──
//
// One background task refreshes the registry on a fixed interval and
// publishes each new snapshot. Failures are logged and the next tick
// tries again; nothing short of `stop()` ends the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MIN_UPDATE_INTERVAL;
use crate::registry::DeviceRegistry;

/// Clamp a configured interval to the allowed floor.
pub fn effective_interval(configured: Duration) -> Duration {
    if configured < MIN_UPDATE_INTERVAL {
        warn!(
            configured_ms = u64::try_from(configured.as_millis()).unwrap_or(u64::MAX),
            floor_secs = MIN_UPDATE_INTERVAL.as_secs(),
            "update interval below floor, clamping"
        );
        MIN_UPDATE_INTERVAL
    } else {
        configured
    }
}

/// Periodic registry refresh with pause/resume and graceful stop.
pub struct PollingScheduler {
    registry: Arc<DeviceRegistry>,
    interval: Duration,
    /// Delay between a submitted command and the extra poll it triggers.
    kick_delay: Option<Duration>,
    kick: Arc<Notify>,
    paused: watch::Sender<bool>,
    cancel: Mutex<CancellationToken>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollingScheduler {
    pub fn new(registry: Arc<DeviceRegistry>, interval: Duration) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            registry,
            interval: effective_interval(interval),
            kick_delay: None,
            kick: Arc::new(Notify::new()),
            paused,
            cancel: Mutex::new(CancellationToken::new()),
            handle: Mutex::new(None),
        }
    }

    /// Poll again `delay` after each notification on `kick`. `None`
    /// ignores the notifications.
    #[must_use]
    pub fn with_kick(mut self, kick: Arc<Notify>, delay: Option<Duration>) -> Self {
        self.kick = kick;
        self.kick_delay = delay;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the polling task. The first tick happens one full interval
    /// from now. Calling `start` twice is a no-op; calling it after
    /// [`stop`](Self::stop) polls again with a fresh token.
    pub async fn start(&self) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            debug!("polling scheduler already running");
            return;
        }
        let cancel = {
            let mut guard = self.cancel.lock().await;
            if guard.is_cancelled() {
                *guard = CancellationToken::new();
            }
            guard.clone()
        };
        info!(interval_secs = self.interval.as_secs(), "starting device polling");
        *handle = Some(tokio::spawn(poll_task(
            Arc::clone(&self.registry),
            self.interval,
            self.kick_delay,
            Arc::clone(&self.kick),
            self.paused.subscribe(),
            cancel,
        )));
    }

    /// Skip ticks until [`resume`](Self::resume). A refresh already in
    /// flight is allowed to finish.
    pub fn pause(&self) {
        if !self.paused.send_replace(true) {
            info!("device polling paused");
        }
    }

    pub fn resume(&self) {
        if self.paused.send_replace(false) {
            info!("device polling resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Cancel the timer and wait for any in-flight refresh to finish.
    pub async fn stop(&self) {
        self.cancel.lock().await.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "polling task ended abnormally");
            }
        }
        debug!("device polling stopped");
    }
}

impl std::fmt::Debug for PollingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingScheduler")
            .field("interval", &self.interval)
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}

async fn poll_task(
    registry: Arc<DeviceRegistry>,
    period: Duration,
    kick_delay: Option<Duration>,
    kick: Arc<Notify>,
    mut paused: watch::Receiver<bool>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = paused.changed() => {
                if changed.is_err() {
                    break;
                }
                if !*paused.borrow_and_update() {
                    // Resumed: restart the period from now.
                    interval.reset();
                }
            }
            () = kick.notified(), if kick_delay.is_some() => {
                let Some(delay) = kick_delay else { continue };
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
                if !*paused.borrow() {
                    debug!("post-command refresh");
                    poll_once(&registry).await;
                    interval.reset();
                }
            }
            _ = interval.tick() => {
                if *paused.borrow() {
                    continue;
                }
                poll_once(&registry).await;
            }
        }
    }
    debug!("polling task exited");
}

async fn poll_once(registry: &DeviceRegistry) {
    match registry.refresh().await {
        Ok(snapshot) => {
            debug!(version = snapshot.version, "poll succeeded");
            registry.publish();
        }
        Err(e) => warn!(error = %e, "device poll failed; retrying next interval"),
    }
}
