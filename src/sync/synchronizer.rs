//! Async driver for the occupancy state
//!
//! Two tasks share one [`OccupancyState`]:
//!
//! - the poll loop pulls a full snapshot on a fixed interval, and once more
//!   for every accepted push event (one pull per event, never coalesced);
//! - the event loop owns the push connection: connect, read until it drops,
//!   report offline, wait the fixed reconnect delay, repeat. No retry cap,
//!   no backoff.
//!
//! Every state change publishes a fresh [`MonitorView`] on a watch channel.
//! [`Synchronizer::shutdown`] closes the open connection, cancels the pending
//! reconnect wait and the poll timer, and joins both tasks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::state::{EventOutcome, OccupancyState};
use crate::client::SnapshotSource;
use crate::config::MonitorConfig;
use crate::events::{EventSource, EventStream};
use crate::view::MonitorView;

/// Timing of the two loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Interval between periodic snapshot pulls
    pub poll_interval: Duration,
    /// Wait after a disconnect before the next connect attempt
    pub reconnect_delay: Duration,
}

/// Shortest interval or delay the loops will run with
const MIN_PERIOD: Duration = Duration::from_millis(100);

impl SyncSettings {
    /// Raise zero or tiny periods to [`MIN_PERIOD`].
    ///
    /// A zero poll interval would make the ticker panic, a zero reconnect
    /// delay would spin on a refused connection.
    fn clamped(self) -> Self {
        let clamped = Self {
            poll_interval: self.poll_interval.max(MIN_PERIOD),
            reconnect_delay: self.reconnect_delay.max(MIN_PERIOD),
        };
        if clamped != self {
            warn!(requested = ?self, using = ?clamped, "Sync periods below minimum, clamping");
        }
        clamped
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

impl From<&MonitorConfig> for SyncSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

/// State plus the channel its views are published on
struct Shared {
    state: Mutex<OccupancyState>,
    view_tx: watch::Sender<Arc<MonitorView>>,
    snapshots: Arc<dyn SnapshotSource>,
}

impl Shared {
    async fn update<R>(&self, f: impl FnOnce(&mut OccupancyState) -> R) -> R {
        let mut state = self.state.lock().await;
        let result = f(&mut state);
        let view = state.view();
        if view.revision() != self.view_tx.borrow().revision() {
            self.view_tx.send_replace(Arc::new(view));
        }
        result
    }

    /// Pull zones and aggregate counts together; apply only if both succeed.
    async fn refresh_snapshot(&self) -> bool {
        let pulled = tokio::try_join!(
            self.snapshots.fetch_zones(),
            self.snapshots.fetch_occupancy()
        );
        match pulled {
            Ok((zones, occupancy)) => {
                self.update(|state| state.apply_snapshot(zones, occupancy)).await;
                true
            }
            Err(e) => {
                warn!(error = %e, "Snapshot refresh failed, keeping current view");
                false
            }
        }
    }
}

/// Keeps an in-memory view of spot occupancy current
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use cloudpark_monitor::{ApiClient, MonitorConfig, SyncSettings, Synchronizer, WsEventSource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = MonitorConfig::default();
/// let api = Arc::new(ApiClient::new(&config.api)?);
/// let events = Arc::new(WsEventSource::new(config.events.url.clone()));
///
/// let sync = Synchronizer::start(api, events, SyncSettings::from(&config));
/// let mut views = sync.subscribe();
/// views.changed().await?;
/// println!("live: {}", views.borrow().is_live());
///
/// sync.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Synchronizer {
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl Synchronizer {
    /// Spawn the poll and event loops. Must be called inside a Tokio runtime.
    ///
    /// Periods shorter than 100 ms are raised to 100 ms.
    pub fn start(
        snapshots: Arc<dyn SnapshotSource>,
        events: Arc<dyn EventSource>,
        settings: SyncSettings,
    ) -> Self {
        let settings = settings.clamped();
        let state = OccupancyState::new();
        let (view_tx, _) = watch::channel(Arc::new(state.view()));
        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            view_tx,
            snapshots,
        });

        let (shutdown_tx, _) = broadcast::channel(1);
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();

        let poll = tokio::spawn(poll_loop(
            shared.clone(),
            settings.poll_interval,
            refresh_rx,
            shutdown_tx.subscribe(),
        ));
        let listen = tokio::spawn(event_loop(
            shared.clone(),
            events,
            settings.reconnect_delay,
            refresh_tx,
            shutdown_tx.subscribe(),
        ));

        info!(
            poll_secs = settings.poll_interval.as_secs_f64(),
            reconnect_secs = settings.reconnect_delay.as_secs_f64(),
            "Synchronizer started"
        );

        Self {
            shared,
            shutdown_tx,
            tasks: vec![poll, listen],
        }
    }

    /// Latest view
    pub fn view(&self) -> Arc<MonitorView> {
        self.shared.view_tx.borrow().clone()
    }

    /// Receive every new view as it is published
    pub fn subscribe(&self) -> watch::Receiver<Arc<MonitorView>> {
        self.shared.view_tx.subscribe()
    }

    /// Pull a snapshot now, outside the periodic schedule.
    ///
    /// Returns whether the view was replaced; failures leave it untouched.
    pub async fn refresh_snapshot(&self) -> bool {
        self.shared.refresh_snapshot().await
    }

    /// Stop both loops and close the event connection.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(error = %e, "Synchronizer task ended abnormally");
            }
        }
        self.shared.update(|state| state.close()).await;
        info!("Synchronizer stopped");
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            // Dropped without shutdown(): still stop the loops
            let _ = self.shutdown_tx.send(());
        }
    }
}

async fn poll_loop(
    shared: Arc<Shared>,
    interval: Duration,
    mut refresh_rx: mpsc::UnboundedReceiver<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let serve = async {
        loop {
            tokio::select! {
                // First tick completes immediately: the startup pull
                _ = ticker.tick() => {
                    debug!("Periodic snapshot refresh");
                }
                Some(()) = refresh_rx.recv() => {
                    debug!("Event-triggered snapshot refresh");
                }
            }
            shared.refresh_snapshot().await;
        }
    };

    tokio::select! {
        _ = serve => {}
        _ = shutdown_rx.recv() => {
            debug!("Poll loop shutting down");
        }
    }
}

/// Why a live connection ended
enum Ended {
    Disconnected,
    Shutdown,
}

async fn event_loop(
    shared: Arc<Shared>,
    source: Arc<dyn EventSource>,
    reconnect_delay: Duration,
    refresh_tx: mpsc::UnboundedSender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        shared.update(|state| state.begin_connect(attempt)).await;

        let connected = tokio::select! {
            result = source.connect() => result,
            _ = shutdown_rx.recv() => break,
        };

        let offline_at = match connected {
            Ok(mut stream) => {
                let epoch = shared.update(|state| state.connected()).await;
                info!(epoch, "Spot event stream live");
                attempt = 0;

                let ended =
                    listen(&shared, stream.as_mut(), epoch, &refresh_tx, &mut shutdown_rx).await;
                if let Ended::Shutdown = ended {
                    close(stream, reconnect_delay).await;
                    break;
                }

                // Offline is reported before the close handshake, which may stall
                let offline_at = go_offline(&shared, attempt, reconnect_delay).await;
                // The old connection is gone before any new one is opened
                close(stream, reconnect_delay).await;
                offline_at
            }
            Err(e) => {
                warn!(error = %e, attempt, "Spot event stream connect failed");
                go_offline(&shared, attempt, reconnect_delay).await
            }
        };

        tokio::select! {
            _ = tokio::time::sleep_until(offline_at + reconnect_delay) => {}
            _ = shutdown_rx.recv() => {
                debug!("Shutdown received during reconnect wait");
                break;
            }
        }
    }

    debug!("Event loop stopped");
}

async fn go_offline(shared: &Shared, attempt: u32, reconnect_delay: Duration) -> Instant {
    shared.update(|state| state.disconnected(attempt + 1)).await;
    info!(delay = ?reconnect_delay, "Spot event stream offline, reconnecting");
    Instant::now()
}

/// Close a finished connection, giving up after `limit`
async fn close(mut stream: Box<dyn EventStream>, limit: Duration) {
    if tokio::time::timeout(limit, stream.close()).await.is_err() {
        warn!("Spot event stream close timed out, dropping connection");
    }
}

async fn listen(
    shared: &Shared,
    stream: &mut dyn EventStream,
    epoch: u64,
    refresh_tx: &mpsc::UnboundedSender<()>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Ended {
    loop {
        let message = tokio::select! {
            message = stream.next_message() => message,
            _ = shutdown_rx.recv() => return Ended::Shutdown,
        };

        match message {
            Ok(Some(payload)) => {
                let outcome = shared
                    .update(|state| state.on_connection_message(epoch, &payload, Utc::now()))
                    .await;
                if let EventOutcome::Applied(_) | EventOutcome::Unmatched(_) = outcome {
                    let _ = refresh_tx.send(());
                }
            }
            Ok(None) => {
                info!(epoch, "Spot event stream closed by server");
                return Ended::Disconnected;
            }
            Err(e) => {
                warn!(epoch, error = %e, "Spot event stream failed");
                return Ended::Disconnected;
            }
        }
    }
}
