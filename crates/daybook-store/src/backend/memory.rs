// ABOUTME: In-process key-value backend with TTL expiry on the tokio clock.
// ABOUTME: Supports fault injection (refused connects, dropped links, rejected writes, latency) for tests and local runs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{BackendError, Connection, Connector};

struct StoredValue {
    value: String,
    expires_at: Instant,
}

/// Shared in-memory keyspace. Every connection opened from the same backend
/// sees the same data.
pub struct MemoryBackend {
    records: Mutex<HashMap<String, StoredValue>>,
    rejected_writes: Mutex<HashSet<String>>,
    online: AtomicBool,
    connects_to_fail: AtomicU32,
    connect_attempts: AtomicU32,
    generation: AtomicU64,
    latency_micros: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(HashMap::new()),
            rejected_writes: Mutex::new(HashSet::new()),
            online: AtomicBool::new(true),
            connects_to_fail: AtomicU32::new(0),
            connect_attempts: AtomicU32::new(0),
            generation: AtomicU64::new(0),
            latency_micros: AtomicU64::new(0),
        })
    }

    pub fn connector(self: &Arc<Self>) -> MemoryConnector {
        MemoryConnector {
            backend: Arc::clone(self),
        }
    }

    /// While offline, connects are refused and open connections fail.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Refuse the next `n` connection attempts.
    pub fn fail_next_connects(&self, n: u32) {
        self.connects_to_fail.store(n, Ordering::SeqCst);
    }

    /// Invalidate every open connection, as if the server reset them.
    pub fn drop_connections(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Delay every command by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_micros
            .store(latency.as_micros() as u64, Ordering::SeqCst);
    }

    /// Make writes to `key` fail with a command error until cleared.
    pub fn reject_writes_to(&self, key: &str) {
        lock(&self.rejected_writes).insert(key.to_string());
    }

    pub fn accept_all_writes(&self) {
        lock(&self.rejected_writes).clear();
    }

    /// Read a key directly, bypassing any connection.
    pub fn raw_get(&self, key: &str) -> Option<String> {
        let mut records = lock(&self.records);
        live_value(&mut records, key)
    }

    /// Write a key directly, bypassing any connection. Expired keys are
    /// dropped on every write.
    pub fn raw_set(&self, key: &str, value: &str, ttl: Duration) {
        let now = Instant::now();
        let mut records = lock(&self.records);
        records.retain(|_, stored| stored.expires_at > now);
        records.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
    }

    /// Unexpired keys starting with `prefix`, bypassing any connection.
    pub fn raw_keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = Instant::now();
        lock(&self.records)
            .iter()
            .filter(|(key, stored)| key.starts_with(prefix) && stored.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of unexpired keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        lock(&self.records)
            .values()
            .filter(|v| v.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn delay(&self) {
        let micros = self.latency_micros.load(Ordering::SeqCst);
        if micros > 0 {
            tokio::time::sleep(Duration::from_micros(micros)).await;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn live_value(records: &mut HashMap<String, StoredValue>, key: &str) -> Option<String> {
    let expired = match records.get(key) {
        Some(stored) if stored.expires_at > Instant::now() => return Some(stored.value.clone()),
        Some(_) => true,
        None => false,
    };
    if expired {
        records.remove(key);
    }
    None
}

/// Connector handing out connections to one [`MemoryBackend`].
#[derive(Clone)]
pub struct MemoryConnector {
    backend: Arc<MemoryBackend>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn Connection>, BackendError> {
        let backend = &self.backend;
        backend.connect_attempts.fetch_add(1, Ordering::SeqCst);
        backend.delay().await;

        let refused = backend
            .connects_to_fail
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused || !backend.online.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("connection refused".to_string()));
        }

        Ok(Arc::new(MemoryConnection {
            backend: Arc::clone(backend),
            generation: backend.generation.load(Ordering::SeqCst),
        }))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

struct MemoryConnection {
    backend: Arc<MemoryBackend>,
    generation: u64,
}

impl MemoryConnection {
    async fn check(&self) -> Result<&MemoryBackend, BackendError> {
        self.backend.delay().await;
        let backend = &*self.backend;
        if !backend.online.load(Ordering::SeqCst)
            || backend.generation.load(Ordering::SeqCst) != self.generation
        {
            return Err(BackendError::Connection("connection reset".to_string()));
        }
        Ok(backend)
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let backend = self.check().await?;
        Ok(backend.raw_get(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError> {
        let backend = self.check().await?;
        if lock(&backend.rejected_writes).contains(key) {
            return Err(BackendError::Command(format!("write rejected for {}", key)));
        }
        backend.raw_set(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let backend = self.check().await?;
        lock(&backend.records).remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.check().await.map(|_| ())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        let backend = self.check().await?;
        Ok(backend.raw_keys_with_prefix(prefix))
    }
}
