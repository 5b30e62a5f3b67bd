/**
 * STORES - Persistance clé/valeur et état durable des hôtes
 *
 * RÔLE :
 * Ce module définit l'interface de stockage commune (KvStore) et le Host State Store
 * qui s'appuie dessus pour conserver un HostState par hôte d'inventaire.
 *
 * FONCTIONNEMENT :
 * - KvStore trait = get / put (avec expiration optionnelle) / delete
 * - SqliteKv      = store principal durable (table kv avec expires_at)
 * - JsonFileKv    = fichier JSON unique, utilisé comme repli pour le panneau
 * - MemoryKv      = store en mémoire (tests, ou si la base SQLite est inaccessible)
 *
 * POLITIQUE D'ERREURS :
 * Une lecture en échec retombe sur l'état par défaut, une écriture en échec est
 * remontée à l'appelant qui la journalise : l'hôte sera réécrit au cycle suivant.
 */

pub mod file;
pub mod memory;
pub mod sqlite;

pub use file::JsonFileKv;
pub use memory::MemoryKv;
pub use sqlite::SqliteKv;

use crate::models::{HostDescriptor, HostState};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Rétention par défaut d'un enregistrement d'hôte (rafraîchie à chaque écriture)
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60 * 24 * 14);

/// Erreurs possibles lors des opérations sur un store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Interface commune à tous les backends clé/valeur.
/// Les valeurs sont du JSON sérialisé par l'appelant.
pub trait KvStore: Send + Sync {
    /// Lecture; une entrée expirée est vue comme absente
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Écriture; `ttl` remplace l'expiration précédente (None = pas d'expiration)
    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Suppression; supprimer une clé absente n'est pas une erreur
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Supprime physiquement les entrées expirées, retourne leur nombre
    fn purge_expired(&self) -> Result<usize, StoreError> {
        Ok(0)
    }

    /// Nom du backend pour les logs
    fn name(&self) -> &str;
}

pub(crate) fn now_epoch() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

pub(crate) fn expiry_from(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|d| now_epoch().saturating_add(i64::try_from(d.as_secs()).unwrap_or(i64::MAX)))
}

pub fn host_key(host: &str) -> String {
    format!("hosts:{host}")
}

/// État durable des hôtes, une entrée par hôte sous `hosts:{host}`
#[derive(Clone)]
pub struct HostStateStore {
    kv: Arc<dyn KvStore>,
    retention: Duration,
}

impl HostStateStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv, retention: DEFAULT_RETENTION }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Retourne l'état stocké ou un état par défaut.
    /// Si le label d'inventaire a changé, il est réécrit tout de suite (sans dirty).
    pub fn get(&self, host: &HostDescriptor, now: i64) -> HostState {
        let key = host_key(&host.host);
        let label = host.label.as_deref();

        let mut state = match self.kv.get(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<HostState>(&raw) {
                Ok(state) => state,
                Err(e) => {
                    warn!(host = %host.host, error = %e, "corrupt host record, using defaults");
                    HostState::new(&host.host, label, now)
                }
            },
            Ok(None) => HostState::new(&host.host, label, now),
            Err(e) => {
                warn!(host = %host.host, store = self.kv.name(), error = %e, "host state read failed, using defaults");
                HostState::new(&host.host, label, now)
            }
        };

        // enregistrement antérieur au champ : la dernière écriture est la meilleure borne connue
        if state.created_at.is_none() {
            state.created_at = Some(state.last_update);
        }

        if let Some(label) = label {
            if state.label != label {
                state.label = label.to_string();
                if let Err(e) = self.write(&state) {
                    warn!(host = %host.host, error = %e, "label backfill failed");
                }
            }
        }

        state
    }

    /// Persiste l'état; `last_update` avance à chaque écriture
    pub fn put(&self, state: &mut HostState, now: i64) -> Result<(), StoreError> {
        state.last_update = now;
        self.write(state)
    }

    /// États de tout l'inventaire, dans l'ordre de l'inventaire
    pub fn snapshot(&self, inventory: &[HostDescriptor], now: i64) -> Vec<HostState> {
        inventory.iter().map(|h| self.get(h, now)).collect()
    }

    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        self.kv.purge_expired()
    }

    fn write(&self, state: &HostState) -> Result<(), StoreError> {
        let raw = serde_json::to_string(state)?;
        self.kv.put(&host_key(&state.host), &raw, Some(self.retention))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HostStatus;

    const T0: i64 = 1_700_000_000;

    /// Backend qui échoue sur toutes les opérations
    struct BrokenKv;

    impl KvStore for BrokenKv {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn put(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        fn name(&self) -> &str {
            "broken"
        }
    }

    #[test]
    fn test_missing_record_yields_defaults() {
        let store = HostStateStore::new(Arc::new(MemoryKv::new()));
        let host = HostDescriptor::new("srv-01", "watcher").with_label("Build");

        let st = store.get(&host, T0);
        assert_eq!(st.host, "srv-01");
        assert_eq!(st.label, "Build");
        assert_eq!(st.status, HostStatus::Free);
        assert_eq!(st.last_update, T0);
    }

    #[test]
    fn test_put_then_get_round_trips_and_stamps_update() {
        let store = HostStateStore::new(Arc::new(MemoryKv::new()));
        let host = HostDescriptor::new("srv-01", "watcher");

        let mut st = store.get(&host, T0);
        st.status = HostStatus::Occupied;
        st.last_users = vec!["alice".into()];
        store.put(&mut st, T0 + 15).unwrap();

        let back = store.get(&host, T0 + 30);
        assert_eq!(back.status, HostStatus::Occupied);
        assert_eq!(back.last_users, vec!["alice"]);
        assert_eq!(back.last_update, T0 + 15);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        assert_eq!(expiry_from(Some(Duration::from_secs(u64::MAX))), Some(i64::MAX));
        assert_eq!(expiry_from(None), None);
    }

    #[test]
    fn test_put_keeps_creation_time() {
        let store = HostStateStore::new(Arc::new(MemoryKv::new()));
        let host = HostDescriptor::new("srv-01", "watcher");

        let mut st = store.get(&host, T0);
        store.put(&mut st, T0).unwrap();
        let mut st = store.get(&host, T0 + 15);
        store.put(&mut st, T0 + 15).unwrap();

        let back = store.get(&host, T0 + 30);
        assert_eq!(back.created_at, Some(T0));
        assert_eq!(back.last_update, T0 + 15);
    }

    #[test]
    fn test_legacy_record_gets_creation_time_from_last_update() {
        let kv = Arc::new(MemoryKv::new());
        kv.put(&host_key("srv-01"), r#"{"host":"srv-01","status":"free","last_update":1699999000}"#, None)
            .unwrap();
        let store = HostStateStore::new(kv);

        let st = store.get(&HostDescriptor::new("srv-01", "watcher"), T0);
        assert_eq!(st.created_at, Some(1_699_999_000));
    }

    #[test]
    fn test_label_backfill_is_written_immediately() {
        let kv = Arc::new(MemoryKv::new());
        let store = HostStateStore::new(kv.clone());

        let mut st = store.get(&HostDescriptor::new("srv-01", "watcher").with_label("Old"), T0);
        store.put(&mut st, T0).unwrap();

        let renamed = HostDescriptor::new("srv-01", "watcher").with_label("New");
        assert_eq!(store.get(&renamed, T0 + 5).label, "New");

        // réécrit sans toucher last_update
        let raw = kv.get(&host_key("srv-01")).unwrap().unwrap();
        let stored: HostState = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.label, "New");
        assert_eq!(stored.last_update, T0);
    }

    #[test]
    fn test_unlabelled_descriptor_keeps_stored_label() {
        let kv = Arc::new(MemoryKv::new());
        let store = HostStateStore::new(kv);
        let mut st = store.get(&HostDescriptor::new("srv-01", "w").with_label("GPU"), T0);
        store.put(&mut st, T0).unwrap();

        assert_eq!(store.get(&HostDescriptor::new("srv-01", "w"), T0).label, "GPU");
    }

    #[test]
    fn test_failed_read_and_write_are_host_local() {
        let store = HostStateStore::new(Arc::new(BrokenKv));
        let host = HostDescriptor::new("srv-01", "watcher");

        let mut st = store.get(&host, T0);
        assert_eq!(st.status, HostStatus::Free);
        assert!(store.put(&mut st, T0).is_err());
    }

    #[test]
    fn test_corrupt_record_falls_back_to_defaults() {
        let kv = Arc::new(MemoryKv::new());
        kv.put(&host_key("srv-01"), "{not json", None).unwrap();
        let store = HostStateStore::new(kv);

        let st = store.get(&HostDescriptor::new("srv-01", "watcher"), T0);
        assert_eq!(st.status, HostStatus::Free);
        assert_eq!(st.last_update, T0);
    }

    #[test]
    fn test_snapshot_keeps_inventory_order() {
        let store = HostStateStore::new(Arc::new(MemoryKv::new()));
        let inventory = vec![
            HostDescriptor::new("c", "w"),
            HostDescriptor::new("a", "w"),
            HostDescriptor::new("b", "w"),
        ];
        let hosts: Vec<String> = store.snapshot(&inventory, T0).into_iter().map(|s| s.host).collect();
        assert_eq!(hosts, vec!["c", "a", "b"]);
    }
}
