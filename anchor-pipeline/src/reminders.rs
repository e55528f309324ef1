//! Scheduled reminders with explicit cancellation
//!
//! Prescription follow-ups and anchoring re-checks need delayed, local,
//! one-shot triggers. These are explicit scheduled tasks owned by a
//! process-wide scheduler: each schedule returns a cancel handle, and
//! pending entries live in a bounded store with per-entry TTL eviction
//! instead of an unbounded process-lifetime map.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Reminder store limits
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// Maximum pending entries
    pub max_entries: usize,

    /// Entry lifetime; expired entries are evicted, fired or not
    pub ttl: Duration,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_024,
            ttl: Duration::from_secs(24 * 3600),
        }
    }
}

/// A fired reminder, delivered on the scheduler channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    /// Caller-chosen key
    pub key: String,
    /// Opaque payload
    pub payload: String,
}

struct Entry {
    payload: String,
    inserted_at: Instant,
}

/// Bounded TTL store of pending reminders
pub struct ReminderStore {
    entries: Mutex<HashMap<String, Entry>>,
    config: ReminderConfig,
}

impl ReminderStore {
    /// Create with the given limits
    pub fn new(config: ReminderConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Insert a pending entry, evicting expired entries first and the
    /// oldest entry when still full
    pub fn insert(&self, key: &str, payload: &str) {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        entries.retain(|_, e| now.duration_since(e.inserted_at) < self.config.ttl);

        if entries.len() >= self.config.max_entries && !entries.contains_key(key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                warn!(evicted = %oldest, "Reminder store full, evicting oldest entry");
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                payload: payload.to_string(),
                inserted_at: now,
            },
        );
    }

    /// Fetch a pending payload; expired entries read as absent
    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock();
        entries.get(key).and_then(|e| {
            if e.inserted_at.elapsed() < self.config.ttl {
                Some(e.payload.clone())
            } else {
                None
            }
        })
    }

    /// Remove one entry
    pub fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Pending entries (expired ones still count until evicted)
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Cancel handle for one scheduled reminder
///
/// Cancellation is explicit: dropping the handle does NOT cancel the task.
pub struct CancelHandle {
    key: String,
    store: Arc<ReminderStore>,
    task: JoinHandle<()>,
}

impl CancelHandle {
    /// Cancel the reminder before it fires
    pub fn cancel(self) {
        self.task.abort();
        self.store.remove(&self.key);
        debug!(key = %self.key, "Reminder cancelled");
    }
}

/// Process-wide reminder scheduler
pub struct ReminderScheduler {
    store: Arc<ReminderStore>,
    tx: mpsc::Sender<Reminder>,
}

impl ReminderScheduler {
    /// Create a scheduler; fired reminders arrive on the returned receiver
    pub fn new(config: ReminderConfig) -> (Self, mpsc::Receiver<Reminder>) {
        let (tx, rx) = mpsc::channel(64);
        (
            Self {
                store: Arc::new(ReminderStore::new(config)),
                tx,
            },
            rx,
        )
    }

    /// Pending-entry store (observability)
    pub fn store(&self) -> &Arc<ReminderStore> {
        &self.store
    }

    /// Schedule a one-shot reminder after `delay`
    pub fn schedule(&self, key: &str, delay: Duration, payload: &str) -> CancelHandle {
        self.store.insert(key, payload);

        let store = self.store.clone();
        let tx = self.tx.clone();
        let fired_key = key.to_string();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Entry may have been evicted by TTL in the meantime
            if let Some(payload) = store.get(&fired_key) {
                store.remove(&fired_key);
                let _ = tx
                    .send(Reminder {
                        key: fired_key,
                        payload,
                    })
                    .await;
            }
        });

        CancelHandle {
            key: key.to_string(),
            store: self.store.clone(),
            task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_entries: usize, ttl_ms: u64) -> ReminderConfig {
        ReminderConfig {
            max_entries,
            ttl: Duration::from_millis(ttl_ms),
        }
    }

    #[tokio::test]
    async fn test_reminder_fires_with_payload() {
        let (scheduler, mut rx) = ReminderScheduler::new(ReminderConfig::default());
        let _handle = scheduler.schedule("rx-refill", Duration::from_millis(10), "PRX-1");

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.key, "rx-refill");
        assert_eq!(fired.payload, "PRX-1");
        assert!(scheduler.store().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_prevents_firing() {
        let (scheduler, mut rx) = ReminderScheduler::new(ReminderConfig::default());
        let handle = scheduler.schedule("rx-refill", Duration::from_millis(20), "PRX-1");
        handle.cancel();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert!(scheduler.store().is_empty());
    }

    #[test]
    fn test_store_is_bounded() {
        let store = ReminderStore::new(config(2, 60_000));
        store.insert("a", "1");
        store.insert("b", "2");
        store.insert("c", "3");

        assert_eq!(store.len(), 2);
        // Oldest entry was evicted
        assert!(store.get("a").is_none());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn test_ttl_eviction() {
        let store = ReminderStore::new(config(10, 10));
        store.insert("a", "1");
        std::thread::sleep(Duration::from_millis(20));

        assert!(store.get("a").is_none());
        // Next insert sweeps the expired entry out
        store.insert("b", "2");
        assert_eq!(store.len(), 1);
    }
}
