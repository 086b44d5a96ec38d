//! Bounded, TTL-aware in-memory store
//!
//! Entries live in a map guarded by a single mutex, alongside two ordered
//! indexes: last-access order for LRU eviction and expiry order for sweeping.
//! Every operation is O(log n) under the lock.
//!
//! Expiry is enforced twice through the same predicate: reads treat an expired
//! entry as absent (and drop it), and a sweeper thread removes expired entries
//! every `sweep_interval` so keys that are never read again cannot pile up.

use super::recorder::{CacheEvent, CacheRecorder};
use crate::config::CacheConfig;
use crate::error::{ChartkitError, ChartkitResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// TTL applied by [`Cache::insert`]
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

// Instant arithmetic panics on overflow.
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    expires_at: Instant,
    /// Logical clock value of the last write or hit
    last_access: u64,
    /// Logical clock value at insertion, unique per entry
    seq: u64,
}

impl<V> Entry<V> {
    fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

struct State<V> {
    entries: HashMap<String, Entry<V>>,
    lru: BTreeMap<u64, String>,
    expiry: BTreeMap<(Instant, u64), String>,
    clock: u64,
}

impl<V> State<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            lru: BTreeMap::new(),
            expiry: BTreeMap::new(),
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn put(&mut self, key: String, value: V, now: Instant, ttl: Duration) {
        let seq = self.tick();
        let expires_at = now + ttl.min(MAX_TTL);
        self.lru.insert(seq, key.clone());
        self.expiry.insert((expires_at, seq), key.clone());
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                expires_at,
                last_access: seq,
                seq,
            },
        );
    }

    fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(&entry.last_access);
        self.expiry.remove(&(entry.expires_at, entry.seq));
        Some(entry)
    }

    /// Move `key` to the most recently used position
    fn touch(&mut self, key: &str) -> Option<&V> {
        let tick = self.tick();
        let entry = self.entries.get_mut(key)?;
        self.lru.remove(&entry.last_access);
        entry.last_access = tick;
        self.lru.insert(tick, key.to_string());
        Some(&entry.value)
    }

    fn retime(&mut self, key: &str, expires_at: Instant) {
        if let Some(entry) = self.entries.get_mut(key) {
            self.expiry.remove(&(entry.expires_at, entry.seq));
            entry.expires_at = expires_at;
            self.expiry.insert((expires_at, entry.seq), key.to_string());
        }
    }

    fn next_expired(&self, now: Instant) -> Option<String> {
        let (_, key) = self.expiry.first_key_value()?;
        let entry = self.entries.get(key)?;
        entry.is_expired_at(now).then(|| key.clone())
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let mut removed = 0;
        while let Some(key) = self.next_expired(now) {
            self.remove(&key);
            removed += 1;
        }
        removed
    }

    fn evict_lru(&mut self) -> Option<String> {
        let key = self.lru.first_key_value()?.1.clone();
        self.remove(&key);
        Some(key)
    }

    fn live(&self, key: &str, now: Instant) -> Option<&Entry<V>> {
        self.entries.get(key).filter(|entry| !entry.is_expired_at(now))
    }
}

/// Construction parameters for a [`Cache`]
#[derive(Debug, Clone)]
pub struct CacheOptions {
    name: String,
    max_items: usize,
    sweep_interval: Duration,
    default_ttl: Duration,
    recorder: Option<Arc<CacheRecorder>>,
}

impl CacheOptions {
    pub fn new(max_items: usize, sweep_interval: Duration) -> Self {
        Self {
            name: "default".to_string(),
            max_items,
            sweep_interval,
            default_ttl: DEFAULT_TTL,
            recorder: None,
        }
    }

    /// Name used in logs and for the sweeper thread
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// TTL used by [`Cache::insert`]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Attach a recorder; the cache name follows the recorder's name
    pub fn with_recorder(mut self, recorder: Arc<CacheRecorder>) -> Self {
        self.name = recorder.name().to_string();
        self.recorder = Some(recorder);
        self
    }

    fn validate(&self) -> ChartkitResult<()> {
        if self.max_items == 0 {
            return Err(ChartkitError::CacheConfig(
                "max_items must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(ChartkitError::CacheConfig(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

struct Shared<V> {
    name: String,
    max_items: usize,
    default_ttl: Duration,
    recorder: Option<Arc<CacheRecorder>>,
    state: Mutex<State<V>>,
    // Dropping the sender disconnects the sweeper's receiver.
    _stop: Sender<()>,
}

impl<V> Shared<V> {
    fn record(&self, event: CacheEvent, times: usize) {
        if let Some(recorder) = &self.recorder {
            for _ in 0..times {
                recorder.record(event);
            }
        }
    }

    fn observe_len(&self, len: usize) {
        if let Some(recorder) = &self.recorder {
            recorder.set_items(len);
        }
    }

    fn delete_expired(&self) -> usize {
        let mut state = self.state.lock();
        let removed = state.purge_expired(Instant::now());
        self.observe_len(state.entries.len());
        drop(state);

        if removed > 0 {
            self.record(CacheEvent::Expiration, removed);
            debug!(cache = %self.name, removed, "Swept expired cache entries");
        }
        removed
    }

    fn set_locked(&self, state: &mut State<V>, key: String, value: V, ttl: Duration, now: Instant) {
        if state.remove(&key).is_none() && state.entries.len() >= self.max_items {
            let expired = state.purge_expired(now);
            self.record(CacheEvent::Expiration, expired);

            if state.entries.len() >= self.max_items {
                if let Some(evicted) = state.evict_lru() {
                    self.record(CacheEvent::Eviction, 1);
                    debug!(cache = %self.name, key = %evicted, "Evicted least recently used entry");
                }
            }
        }

        state.put(key, value, now, ttl);
        self.observe_len(state.entries.len());
    }
}

/// Bounded, concurrency-safe key/value store with per-entry TTL
///
/// `Cache` is a cheap handle; clones share the same entries. The background
/// sweeper stops once the last handle is dropped.
pub struct Cache<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache holding at most `max_items` entries, sweeping expired
    /// entries every `sweep_interval`
    pub fn new(max_items: usize, sweep_interval: Duration) -> ChartkitResult<Self> {
        Self::with_options(CacheOptions::new(max_items, sweep_interval))
    }

    /// Create a cache from the `[cache]` config section
    pub fn from_config(
        config: &CacheConfig,
        recorder: Option<Arc<CacheRecorder>>,
    ) -> ChartkitResult<Self> {
        let mut options = CacheOptions::new(config.max_items, config.sweep_interval())
            .with_default_ttl(config.ttl());
        if let Some(recorder) = recorder {
            options = options.with_recorder(recorder);
        }
        Self::with_options(options)
    }

    pub fn with_options(options: CacheOptions) -> ChartkitResult<Self> {
        options.validate()?;

        let (stop_tx, stop_rx) = mpsc::channel();
        let shared = Arc::new(Shared {
            name: options.name,
            max_items: options.max_items,
            default_ttl: options.default_ttl,
            recorder: options.recorder,
            state: Mutex::new(State::new()),
            _stop: stop_tx,
        });

        let weak = Arc::downgrade(&shared);
        let interval = options.sweep_interval;
        thread::Builder::new()
            .name(format!("cache-sweeper-{}", shared.name))
            .spawn(move || run_sweeper(weak, stop_rx, interval))
            .map_err(|e| ChartkitError::io("spawning cache sweeper", e))?;

        debug!(
            cache = %shared.name,
            max_items = shared.max_items,
            ?interval,
            "Created cache"
        );
        Ok(Self { shared })
    }

    /// Insert or replace `key` with an explicit TTL
    ///
    /// Replacing an existing key resets its expiry and does not use a new
    /// slot. A new key at capacity first drops expired entries, then the least
    /// recently used live entry if that was not enough.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = Instant::now();
        let mut state = self.shared.state.lock();
        self.shared.set_locked(&mut state, key.into(), value, ttl, now);
    }

    /// Insert or replace `key` with the cache's default TTL
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.shared.default_ttl);
    }

    /// Insert `key` only if no live entry exists for it
    pub fn add(&self, key: impl Into<String>, value: V, ttl: Duration) -> ChartkitResult<()> {
        let key = key.into();
        let now = Instant::now();
        let mut state = self.shared.state.lock();
        if state.live(&key, now).is_some() {
            return Err(ChartkitError::CacheKeyExists(key));
        }
        self.shared.set_locked(&mut state, key, value, ttl, now);
        Ok(())
    }

    /// Look up `key`, treating expired entries as absent
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut state = self.shared.state.lock();

        let expired = match state.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                drop(state);
                self.shared.record(CacheEvent::Miss, 1);
                trace!(cache = %self.shared.name, key, "Cache miss");
                return None;
            }
        };

        if expired {
            state.remove(key);
            self.shared.observe_len(state.entries.len());
            drop(state);
            self.shared.record(CacheEvent::Expiration, 1);
            self.shared.record(CacheEvent::Miss, 1);
            trace!(cache = %self.shared.name, key, "Cache entry expired on read");
            return None;
        }

        let value = state.touch(key).cloned();
        drop(state);
        self.shared.record(CacheEvent::Hit, 1);
        value
    }

    /// Remove `key` if present
    pub fn delete(&self, key: &str) {
        let mut state = self.shared.state.lock();
        if state.remove(key).is_some() {
            self.shared.observe_len(state.entries.len());
        }
    }

    /// Reset the TTL of a live entry; returns false if there is none
    pub fn set_expiration(&self, key: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut state = self.shared.state.lock();
        if state.live(key, now).is_none() {
            return false;
        }
        state.retime(key, now + ttl.min(MAX_TTL));
        true
    }

    /// Remaining lifetime of a live entry
    pub fn expiration(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let state = self.shared.state.lock();
        state
            .live(key, now)
            .map(|entry| entry.expires_at.saturating_duration_since(now))
    }

    /// True when `key` is absent or its TTL has elapsed
    pub fn has_expired(&self, key: &str) -> bool {
        let state = self.shared.state.lock();
        state.live(key, Instant::now()).is_none()
    }

    /// Time since a live entry was last written
    pub fn age(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let state = self.shared.state.lock();
        state
            .live(key, now)
            .map(|entry| now.saturating_duration_since(entry.inserted_at))
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let state = self.shared.state.lock();
        state
            .entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_items(&self) -> usize {
        self.shared.max_items
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        state.entries.clear();
        state.lru.clear();
        state.expiry.clear();
        self.shared.observe_len(0);
    }

    /// Run one sweep pass now, returning how many entries were removed
    pub fn delete_expired(&self) -> usize {
        self.shared.delete_expired()
    }
}

fn run_sweeper<V>(shared: Weak<Shared<V>>, stop: Receiver<()>, interval: Duration) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => match shared.upgrade() {
                Some(shared) => {
                    shared.delete_expired();
                }
                None => break,
            },
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    trace!("Cache sweeper stopped");
}
