/**
 * JSON FILE STORE - Fichier JSON unique clé -> entrée
 *
 * Cache mémoire chargé à l'ouverture, fichier réécrit entièrement à chaque
 * modification (écriture dans un fichier temporaire puis rename).
 */

use super::{expiry_from, now_epoch, KvStore, StoreError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    value: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

pub struct JsonFileKv {
    path: PathBuf,
    cache: Mutex<BTreeMap<String, FileEntry>>,
}

impl JsonFileKv {
    /// Ouvre le fichier; absent => store vide, illisible => store vide + warning
    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let entries = match Self::load_from_disk(&path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable store file, starting empty");
                BTreeMap::new()
            }
        };
        Self { path, cache: Mutex::new(entries) }
    }

    fn load_from_disk(path: &Path) -> Result<BTreeMap<String, FileEntry>, StoreError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save_to_disk(&self, entries: &BTreeMap<String, FileEntry>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Applique `change` sur une copie; le cache n'est remplacé qu'après
    /// l'écriture du fichier. `change` retourne false s'il n'a rien modifié.
    fn update<F>(&self, change: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, FileEntry>) -> bool,
    {
        let mut cache = self.cache.lock();
        let mut next = cache.clone();
        if !change(&mut next) {
            return Ok(false);
        }
        self.save_to_disk(&next)?;
        *cache = next;
        Ok(true)
    }
}

impl KvStore for JsonFileKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let cache = self.cache.lock();
        Ok(cache.get(key).and_then(|entry| match entry.expires_at {
            Some(at) if at <= now_epoch() => None,
            _ => Some(entry.value.clone()),
        }))
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(
                key.to_string(),
                FileEntry { value: value.to_string(), expires_at: expiry_from(ttl) },
            );
            true
        })
        .map(|_| ())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| entries.remove(key).is_some()).map(|_| ())
    }

    fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = now_epoch();
        let mut removed = 0;
        self.update(|entries| {
            let before = entries.len();
            entries.retain(|_, entry| entry.expires_at.map_or(true, |at| at > now));
            removed = before - entries.len();
            removed > 0
        })?;
        Ok(removed)
    }

    fn name(&self) -> &str {
        "file"
    }
}
