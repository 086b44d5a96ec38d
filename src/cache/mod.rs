//! In-memory artifact cache
//!
//! Holds fetched chart archives and repository indexes so reconcilers do not
//! repeat identical fetches.
//!
//! # Expiry and eviction
//!
//! | Event | Trigger | Recorded as |
//! |-------|---------|-------------|
//! | Lazy expiry | `get` finds an entry past its TTL | `expiration` + `miss` |
//! | Sweep | background tick every `sweep_interval` | `expiration` |
//! | Capacity | new key inserted while full | `expiration` for expired entries, else `eviction` |
//! | Delete | explicit `delete` | nothing |

pub mod key;
pub mod recorder;
pub mod store;

pub use key::{artifact_key, index_key};
pub use recorder::{CacheEvent, CacheMetricsSnapshot, CacheRecorder, MetricsRegistry};
pub use store::{Cache, CacheOptions, DEFAULT_TTL};
