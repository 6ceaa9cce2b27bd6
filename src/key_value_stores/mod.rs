//! Common interface to key/value stores used for caching.
//!
//! Adapted from the teacher's `key_value_stores` module: same pipelined
//! get/set shape, narrowed to the single backend the original system
//! actually runs (Redis), with `add_set` gaining a TTL parameter since
//! every cache entry here is time-limited (spec §4.2).

use async_trait::async_trait;
use url::Url;

use crate::errors::{EngineError, Result};

mod fake;
mod redis;

pub use fake::FakeKeyValueStore;

/// A key/value store used for caching upstream lookups.
///
/// We focus only on "pipelined" operations, where many requests are sent at
/// once, to minimize network round trips.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Create a new "pipelined" get request.
    fn new_pipelined_get<'store>(&'store self) -> Box<dyn PipelinedGet<'store> + 'store>;

    /// Create a new "pipelined" set request.
    fn new_pipelined_set<'store>(&'store self) -> Box<dyn PipelinedSet<'store> + 'store>;

    /// Get a prefix to use for all our keys.
    fn key_prefix(&self) -> &str;

    /// Prepend `key_prefix` to `key`.
    fn prefix_key(&self, key: &mut String) {
        key.insert_str(0, self.key_prefix());
    }
}

impl dyn KeyValueStore {
    /// Create an appropriate `KeyValueStore` instance based on `url`.
    pub async fn new_from_url(url: Url, key_prefix: String) -> Result<Box<dyn KeyValueStore>> {
        match url.scheme() {
            "redis" | "rediss" => Ok(Box::new(redis::Redis::new(url, key_prefix).await?)),
            scheme => Err(EngineError::Fatal(format!(
                "don't know how to connect to {scheme}: URLs"
            ))),
        }
    }
}

/// An interface for creating a `KeyValueStore`.
///
/// This can't be part of `KeyValueStore` because we can't have static
/// methods like `new` on types we put in a `Box` (object-safety).
#[async_trait]
pub trait KeyValueStoreNew: KeyValueStore + Sized {
    async fn new(url: Url, key_prefix: String) -> Result<Self>;
}

/// A series of "get" requests sent in a single batch.
#[async_trait]
pub trait PipelinedGet<'store>: Send + Sync {
    /// Add a "get" request to our pipeline.
    fn add_get(&mut self, key: String);

    /// Execute all our requests and return the results in order. We return
    /// `None` when a value can't be found.
    async fn execute(&self) -> Result<Vec<Option<Vec<u8>>>>;
}

/// A series of "set" requests sent in a single batch.
#[async_trait]
pub trait PipelinedSet<'store>: Send + Sync {
    /// Add a "set" request to our pipeline, expiring after `ttl_seconds`.
    fn add_set(&mut self, key: String, value: Vec<u8>, ttl_seconds: u64);

    /// Execute all our requests.
    async fn execute(&self) -> Result<()>;
}
