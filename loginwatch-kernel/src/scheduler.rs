/**
 * SCHEDULER - Tâches périodiques du watcher
 *
 * RÔLE :
 * - poller   : un cycle de réconciliation toutes les POLL_INTERVAL_SEC
 * - sweeper  : purge des enregistrements expirés (rétention)
 *
 * Le cycle est attendu dans la boucle : jamais deux cycles du timer en vol.
 * Un tick manqué pendant un cycle long est sauté, pas rattrapé.
 */

use crate::watcher::LoginWatch;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Démarre la boucle de sondage; le premier cycle part immédiatement
pub fn spawn_poller(watch: Arc<LoginWatch>, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), hosts = watch.inventory().len(), "starting poller");

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let report = watch.run_cycle().await;
            if !report.store_failures.is_empty() {
                warn!(hosts = ?report.store_failures, "some host states were not persisted");
            }
        }
    })
}

/// Purge périodique des états d'hôtes expirés
pub fn spawn_retention_sweeper(watch: Arc<LoginWatch>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // pas de purge au démarrage
        interval.tick().await;

        loop {
            interval.tick().await;
            match watch.purge_expired() {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "expired host states purged"),
                Err(e) => warn!(error = %e, "retention sweep failed"),
            }
        }
    })
}
