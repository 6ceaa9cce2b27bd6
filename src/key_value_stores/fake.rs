//! An in-memory `KeyValueStore`, for cache and engine tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::Result;

use super::{KeyValueStore, PipelinedGet, PipelinedSet};

/// A `HashMap`-backed key/value store. TTLs are accepted but not enforced;
/// tests that care about expiry exercise `CacheRecord::ttl_seconds`
/// directly instead.
#[derive(Default)]
pub struct FakeKeyValueStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeKeyValueStore {
    pub fn new() -> Self {
        FakeKeyValueStore::default()
    }
}

impl KeyValueStore for FakeKeyValueStore {
    fn new_pipelined_get<'store>(&'store self) -> Box<dyn PipelinedGet<'store> + 'store> {
        Box::new(FakeGet {
            store: self,
            keys: Vec::new(),
        })
    }

    fn new_pipelined_set<'store>(&'store self) -> Box<dyn PipelinedSet<'store> + 'store> {
        Box::new(FakeSet {
            store: self,
            writes: Vec::new(),
        })
    }

    fn key_prefix(&self) -> &str {
        ""
    }
}

struct FakeGet<'store> {
    store: &'store FakeKeyValueStore,
    keys: Vec<String>,
}

#[async_trait]
impl<'store> PipelinedGet<'store> for FakeGet<'store> {
    fn add_get(&mut self, key: String) {
        self.keys.push(key);
    }

    async fn execute(&self) -> Result<Vec<Option<Vec<u8>>>> {
        let values = self.store.values.lock().unwrap();
        Ok(self.keys.iter().map(|k| values.get(k).cloned()).collect())
    }
}

struct FakeSet<'store> {
    store: &'store FakeKeyValueStore,
    writes: Vec<(String, Vec<u8>)>,
}

#[async_trait]
impl<'store> PipelinedSet<'store> for FakeSet<'store> {
    fn add_set(&mut self, key: String, value: Vec<u8>, _ttl_seconds: u64) {
        self.writes.push((key, value));
    }

    async fn execute(&self) -> Result<()> {
        let mut values = self.store.values.lock().unwrap();
        for (key, value) in &self.writes {
            values.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
