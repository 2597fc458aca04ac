// ABOUTME: Supervised single logical connection to the key-value backend.
// ABOUTME: A supervisor task owns the connect/loss/backoff state machine; callers share the live connection.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::backend::{BackendError, Connection, Connector};
use crate::backoff::{Backoff, BackoffPolicy};

/// Default time-to-live of every write.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Connectivity of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LinkState {
    Disconnected = 0,
    Connecting = 1,
    Ready = 2,
    /// Retries exhausted or closed on shutdown. No further attempts are made.
    Closed = 3,
}

impl LinkState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LinkState::Connecting,
            2 => LinkState::Ready,
            3 => LinkState::Closed,
            _ => LinkState::Disconnected,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Ready => "ready",
            LinkState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Link tuning.
#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    /// TTL applied by [`BackendLink::set`].
    pub default_ttl: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum OpKind {
    Get,
    Set,
    Delete,
    Ping,
    Scan,
}

impl OpKind {
    fn name(self) -> &'static str {
        match self {
            OpKind::Get => "get",
            OpKind::Set => "set",
            OpKind::Delete => "delete",
            OpKind::Ping => "ping",
            OpKind::Scan => "scan",
        }
    }
}

#[derive(Default)]
struct OpCounter {
    calls: AtomicU64,
    failures: AtomicU64,
    total_micros: AtomicU64,
}

impl OpCounter {
    fn record(&self, elapsed: Duration, ok: bool) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> OpCounterSnapshot {
        let calls = self.calls.load(Ordering::Relaxed);
        let total_micros = self.total_micros.load(Ordering::Relaxed);
        OpCounterSnapshot {
            calls,
            failures: self.failures.load(Ordering::Relaxed),
            avg_latency_ms: if calls == 0 {
                0.0
            } else {
                total_micros as f64 / calls as f64 / 1000.0
            },
        }
    }
}

#[derive(Default)]
struct OpStats {
    get: OpCounter,
    set: OpCounter,
    delete: OpCounter,
    ping: OpCounter,
    scan: OpCounter,
}

impl OpStats {
    fn counter(&self, kind: OpKind) -> &OpCounter {
        match kind {
            OpKind::Get => &self.get,
            OpKind::Set => &self.set,
            OpKind::Delete => &self.delete,
            OpKind::Ping => &self.ping,
            OpKind::Scan => &self.scan,
        }
    }
}

/// Outcome counters for one operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OpCounterSnapshot {
    pub calls: u64,
    pub failures: u64,
    pub avg_latency_ms: f64,
}

/// Point-in-time copy of the link's per-operation counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpStatsSnapshot {
    pub get: OpCounterSnapshot,
    pub set: OpCounterSnapshot,
    pub delete: OpCounterSnapshot,
    pub ping: OpCounterSnapshot,
    pub scan: OpCounterSnapshot,
}

enum LinkEvent {
    /// A call on the connection of `epoch` failed at the link level.
    Lost { epoch: u64, reason: String },
    Shutdown,
}

struct LinkInner {
    connector: Arc<dyn Connector>,
    config: LinkConfig,
    /// Written only by the supervisor.
    state: AtomicU8,
    /// Written only by the supervisor. Paired with the epoch it was installed at.
    conn: RwLock<Option<(u64, Arc<dyn Connection>)>>,
    epoch: AtomicU64,
    connect_attempts: AtomicU32,
    stats: OpStats,
    events: mpsc::UnboundedSender<LinkEvent>,
    pending_events: Mutex<Option<mpsc::UnboundedReceiver<LinkEvent>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Handle to the backend link. Cheap to clone; all clones share one
/// connection and one supervisor.
#[derive(Clone)]
pub struct BackendLink {
    inner: Arc<LinkInner>,
}

impl BackendLink {
    pub fn new(connector: Arc<dyn Connector>, config: LinkConfig) -> Self {
        let (events, pending) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(LinkInner {
                connector,
                config,
                state: AtomicU8::new(LinkState::Disconnected as u8),
                conn: RwLock::new(None),
                epoch: AtomicU64::new(0),
                connect_attempts: AtomicU32::new(0),
                stats: OpStats::default(),
                events,
                pending_events: Mutex::new(Some(pending)),
                supervisor: Mutex::new(None),
            }),
        }
    }

    /// Start the supervisor and wait for the outcome of the first attempt.
    ///
    /// An error here does not stop the link: the supervisor keeps retrying in
    /// the background per the backoff policy, and callers may serve in
    /// degraded mode meanwhile. Calling this again after the link started is
    /// a no-op that reports the current state.
    pub async fn connect(&self) -> Result<(), BackendError> {
        let pending = lock(&self.inner.pending_events).take();
        let Some(events) = pending else {
            return match self.state() {
                LinkState::Ready => Ok(()),
                state => Err(BackendError::Connection(format!("backend link is {}", state))),
            };
        };

        let (first_tx, first_rx) = oneshot::channel();
        let supervisor = Supervisor {
            inner: Arc::clone(&self.inner),
            events,
            first_outcome: Some(first_tx),
        };
        *lock(&self.inner.supervisor) = Some(tokio::spawn(supervisor.run()));

        first_rx.await.unwrap_or_else(|_| {
            Err(BackendError::Connection(
                "backend link supervisor stopped".to_string(),
            ))
        })
    }

    /// Stop the supervisor, quit the connection, and move to `Closed`.
    pub async fn close(&self) {
        let handle = lock(&self.inner.supervisor).take();
        match handle {
            Some(handle) => {
                let _ = self.inner.events.send(LinkEvent::Shutdown);
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "backend link supervisor panicked");
                }
            }
            None => {
                // Never started: there is no other writer.
                lock(&self.inner.pending_events).take();
                self.inner.set_state(LinkState::Closed);
            }
        }
    }

    pub fn state(&self) -> LinkState {
        LinkState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LinkState::Ready
    }

    /// Total connection attempts made by the supervisor.
    pub fn connect_attempts(&self) -> u32 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.config.default_ttl
    }

    pub fn describe(&self) -> String {
        self.inner.connector.describe()
    }

    pub fn stats(&self) -> OpStatsSnapshot {
        let stats = &self.inner.stats;
        OpStatsSnapshot {
            get: stats.get.snapshot(),
            set: stats.set.snapshot(),
            delete: stats.delete.snapshot(),
            ping: stats.ping.snapshot(),
            scan: stats.scan.snapshot(),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        self.call(OpKind::Get, key, |conn| async move { conn.get(key).await })
            .await
    }

    /// Write with the link's default TTL.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        self.set_with_ttl(key, value, self.inner.config.default_ttl)
            .await
    }

    pub async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), BackendError> {
        self.call(OpKind::Set, key, |conn| async move {
            conn.set(key, value, ttl).await
        })
        .await
    }

    pub async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.call(OpKind::Delete, key, |conn| async move { conn.delete(key).await })
            .await
    }

    /// Live round trip to the backend.
    pub async fn ping(&self) -> Result<(), BackendError> {
        self.call(OpKind::Ping, "", |conn| async move { conn.ping().await })
            .await
    }

    pub async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        self.call(OpKind::Scan, prefix, |conn| async move {
            conn.scan_prefix(prefix).await
        })
        .await
    }

    async fn call<'a, T, F, Fut>(
        &self,
        kind: OpKind,
        key: &'a str,
        op: F,
    ) -> Result<T, BackendError>
    where
        F: FnOnce(Arc<dyn Connection>) -> Fut,
        Fut: Future<Output = Result<T, BackendError>> + 'a,
    {
        let started = Instant::now();
        let current = self
            .inner
            .conn
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let result = match current {
            Some((epoch, conn)) => {
                let result = op(conn).await;
                if let Err(e) = &result {
                    if e.is_connection() {
                        let _ = self.inner.events.send(LinkEvent::Lost {
                            epoch,
                            reason: e.to_string(),
                        });
                    }
                }
                result
            }
            None => Err(BackendError::Connection(format!(
                "backend link is {}",
                self.state()
            ))),
        };

        let elapsed = started.elapsed();
        self.inner
            .stats
            .counter(kind)
            .record(elapsed, result.is_ok());
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => tracing::debug!(op = kind.name(), key, elapsed_ms, "backend call"),
            Err(e) => tracing::error!(op = kind.name(), key, elapsed_ms, error = %e, "backend call failed"),
        }
        result
    }
}

impl LinkInner {
    fn set_state(&self, state: LinkState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn install(&self, conn: Arc<dyn Connection>) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        *self.conn.write().unwrap_or_else(|e| e.into_inner()) = Some((epoch, conn));
    }

    fn uninstall(&self) -> Option<Arc<dyn Connection>> {
        self.conn
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .map(|(_, conn)| conn)
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

async fn wait_for_shutdown(events: &mut mpsc::UnboundedReceiver<LinkEvent>) {
    loop {
        match events.recv().await {
            Some(LinkEvent::Lost { .. }) => continue,
            Some(LinkEvent::Shutdown) | None => return,
        }
    }
}

enum Wake {
    Lost(String),
    Shutdown,
}

/// Sole writer of the link's state and connection slot.
struct Supervisor {
    inner: Arc<LinkInner>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
    first_outcome: Option<oneshot::Sender<Result<(), BackendError>>>,
}

impl Supervisor {
    async fn run(mut self) {
        let mut backoff = Backoff::new(self.inner.config.backoff);
        let target = self.inner.connector.describe();

        loop {
            self.inner.set_state(LinkState::Connecting);
            let attempt = self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::info!(backend = %target, attempt, "backend link connecting");

            match self.inner.connector.connect().await {
                Ok(conn) => {
                    backoff.reset();
                    self.inner.install(conn);
                    self.inner.set_state(LinkState::Ready);
                    tracing::info!(backend = %target, "backend link ready");
                    self.report(Ok(()));

                    match self.wait_for_loss().await {
                        Wake::Lost(reason) => {
                            self.inner.uninstall();
                            self.inner.set_state(LinkState::Disconnected);
                            tracing::warn!(backend = %target, reason = %reason, "backend link lost");
                        }
                        Wake::Shutdown => {
                            self.shutdown().await;
                            return;
                        }
                    }
                }
                Err(e) => {
                    self.inner.set_state(LinkState::Disconnected);
                    tracing::error!(backend = %target, attempt, error = %e, "backend connection failed");
                    self.report(Err(e));
                }
            }

            let Some(delay) = backoff.next_delay() else {
                self.inner.set_state(LinkState::Closed);
                tracing::error!(
                    backend = %target,
                    retries = backoff.retries() - 1,
                    "max backend reconnection attempts reached; link closed"
                );
                return;
            };
            tracing::warn!(
                backend = %target,
                retries = backoff.retries(),
                delay_ms = delay.as_millis() as u64,
                "attempting backend reconnection"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_for_shutdown(&mut self.events) => {
                    self.inner.set_state(LinkState::Closed);
                    tracing::info!(backend = %target, "backend link closed during backoff");
                    return;
                }
            }
        }
    }

    fn report(&mut self, outcome: Result<(), BackendError>) {
        if let Some(tx) = self.first_outcome.take() {
            let _ = tx.send(outcome);
        }
    }

    /// Wait for a loss on the current connection. Losses reported against
    /// older connections are ignored.
    async fn wait_for_loss(&mut self) -> Wake {
        loop {
            match self.events.recv().await {
                Some(LinkEvent::Lost { epoch, reason }) if epoch == self.inner.current_epoch() => {
                    return Wake::Lost(reason);
                }
                Some(LinkEvent::Lost { .. }) => continue,
                Some(LinkEvent::Shutdown) | None => return Wake::Shutdown,
            }
        }
    }

    async fn shutdown(&mut self) {
        if let Some(conn) = self.inner.uninstall() {
            if let Err(e) = conn.quit().await {
                tracing::debug!(error = %e, "backend quit failed");
            }
        }
        self.inner.set_state(LinkState::Closed);
        tracing::info!("backend link closed gracefully");
    }
}
