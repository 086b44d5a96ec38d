//! Cache instrumentation
//!
//! A [`CacheRecorder`] counts hit, miss, eviction and expiry events for one
//! named cache and tracks its current item count. Recorders are owned by an
//! explicit [`MetricsRegistry`] rather than process-global state, so every
//! test can build an isolated registry.
//!
//! Recording never influences cache behaviour and never fails: each event is
//! a single relaxed atomic increment.

use crate::error::{ChartkitError, ChartkitResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Observable cache events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheEvent {
    /// `get` found a live entry
    Hit,
    /// `get` found nothing, or only an expired entry
    Miss,
    /// A live entry was dropped to make room for a new key
    Eviction,
    /// An expired entry was removed, lazily on access or by a sweep
    Expiration,
}

impl CacheEvent {
    /// All events in exposition order
    pub fn all() -> &'static [Self] {
        &[Self::Hit, Self::Miss, Self::Eviction, Self::Expiration]
    }

    /// Label value used in metric output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Eviction => "eviction",
            Self::Expiration => "expiration",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Hit => 0,
            Self::Miss => 1,
            Self::Eviction => 2,
            Self::Expiration => 3,
        }
    }
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event counters and item gauge for a single named cache
#[derive(Debug)]
pub struct CacheRecorder {
    name: String,
    events: [AtomicU64; 4],
    items: AtomicU64,
}

impl CacheRecorder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            events: Default::default(),
            items: AtomicU64::new(0),
        }
    }

    /// Name of the cache this recorder observes
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Count one occurrence of `event`
    pub fn record(&self, event: CacheEvent) {
        self.events[event.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Update the item gauge
    pub fn set_items(&self, items: usize) {
        self.items.store(items as u64, Ordering::Relaxed);
    }

    /// Current count for `event`
    pub fn count(&self, event: CacheEvent) -> u64 {
        self.events[event.index()].load(Ordering::Relaxed)
    }

    /// Current value of the item gauge
    pub fn items(&self) -> u64 {
        self.items.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            cache: self.name.clone(),
            hits: self.count(CacheEvent::Hit),
            misses: self.count(CacheEvent::Miss),
            evictions: self.count(CacheEvent::Eviction),
            expirations: self.count(CacheEvent::Expiration),
            items: self.items(),
        }
    }
}

/// Serializable view of a recorder's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheMetricsSnapshot {
    pub cache: String,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub items: u64,
}

impl CacheMetricsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Owner of every cache recorder in a process
///
/// Each cache name maps to exactly one recorder. [`MetricsRegistry::register`]
/// refuses duplicates; [`MetricsRegistry::must_make_cache_metrics`] hands back
/// the recorder already registered under that name.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    recorders: Mutex<BTreeMap<String, Arc<CacheRecorder>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recorder for `name`, failing if one already exists
    pub fn register(&self, name: &str) -> ChartkitResult<Arc<CacheRecorder>> {
        let mut recorders = self.recorders.lock();
        if recorders.contains_key(name) {
            return Err(ChartkitError::MetricsAlreadyRegistered(name.to_string()));
        }

        let recorder = Arc::new(CacheRecorder::new(name));
        recorders.insert(name.to_string(), Arc::clone(&recorder));
        debug!(cache = name, "Registered cache metrics");
        Ok(recorder)
    }

    /// Get the recorder for `name`, registering it on first use
    pub fn must_make_cache_metrics(&self, name: &str) -> Arc<CacheRecorder> {
        let mut recorders = self.recorders.lock();
        let recorder = recorders.entry(name.to_string()).or_insert_with(|| {
            debug!(cache = name, "Registered cache metrics");
            Arc::new(CacheRecorder::new(name))
        });
        Arc::clone(recorder)
    }

    /// Look up an already registered recorder
    pub fn get(&self, name: &str) -> Option<Arc<CacheRecorder>> {
        self.recorders.lock().get(name).cloned()
    }

    /// Snapshots of every registered cache, ordered by name
    pub fn gather(&self) -> Vec<CacheMetricsSnapshot> {
        self.recorders
            .lock()
            .values()
            .map(|recorder| recorder.snapshot())
            .collect()
    }

    /// Render all recorders in the Prometheus text exposition format
    pub fn encode_text(&self) -> String {
        let snapshots = self.gather();
        let mut out = String::new();

        out.push_str("# HELP chartkit_cache_events_total Total number of cache events by type.\n");
        out.push_str("# TYPE chartkit_cache_events_total counter\n");
        for snapshot in &snapshots {
            let cache = escape_label(&snapshot.cache);
            for event in CacheEvent::all() {
                let value = match event {
                    CacheEvent::Hit => snapshot.hits,
                    CacheEvent::Miss => snapshot.misses,
                    CacheEvent::Eviction => snapshot.evictions,
                    CacheEvent::Expiration => snapshot.expirations,
                };
                out.push_str(&format!(
                    "chartkit_cache_events_total{{cache=\"{}\",event_type=\"{}\"}} {}\n",
                    cache, event, value
                ));
            }
        }

        out.push_str("# HELP chartkit_cache_items Number of entries currently held.\n");
        out.push_str("# TYPE chartkit_cache_items gauge\n");
        for snapshot in &snapshots {
            out.push_str(&format!(
                "chartkit_cache_items{{cache=\"{}\"}} {}\n",
                escape_label(&snapshot.cache),
                snapshot.items
            ));
        }

        out
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
