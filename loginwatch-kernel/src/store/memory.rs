use super::{expiry_from, now_epoch, KvStore, StoreError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Store clé/valeur en mémoire, perdu au redémarrage
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, (String, Option<i64>)>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock();
        Ok(entries.get(key).and_then(|(value, expires_at)| match expires_at {
            Some(at) if *at <= now_epoch() => None,
            _ => Some(value.clone()),
        }))
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), expiry_from(ttl)));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = now_epoch();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| expires_at.map_or(true, |at| at > now));
        Ok(before - entries.len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
