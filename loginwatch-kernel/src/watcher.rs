/**
 * WATCHER - Flux de réconciliation (un cycle = un passage sur tout l'inventaire)
 *
 * RÔLE : Pour chaque hôte, dans l'ordre de l'inventaire :
 *   store.get -> sonde SSH -> parsing -> réconciliation -> store.put
 * puis, si au moins un hôte a changé, mise à jour du panneau.
 *
 * ARCHITECTURE : tous les collaborateurs sont injectés (stores, prober, sink);
 * l'inventaire est immuable et partagé. Aucun verrou n'est tenu pendant les I/O :
 * deux cycles concurrents (timer + refresh manuel) peuvent se croiser, la
 * dernière écriture gagne.
 *
 * POLITIQUE D'ERREURS : une sonde en échec est un résultat normal (branche
 * "unreachable"); une écriture en échec est journalisée et l'hôte sera repris
 * au cycle suivant; un update du panneau en échec invalide son emplacement.
 */

use crate::health::{HealthTracker, WatchHealth};
use crate::models::{HostDescriptor, HostState, PanelLocation, ProbeOutcome};
use crate::panel::{render_panel, PanelPayload};
use crate::panel_store::{PanelLocationStore, TierOutcome};
use crate::parser::parse_users;
use crate::prober::{probe_sessions, SessionProber};
use crate::reconciler::{reconcile, HysteresisPolicy};
use crate::sink::{DisplaySink, SinkError};
use crate::store::{HostStateStore, StoreError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Ce qui est arrivé au panneau en fin de cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelRefresh {
    /// Aucun hôte n'a changé
    NotNeeded,
    /// Aucun panneau n'a encore été créé
    NoPanel,
    Updated,
    /// L'update a échoué, l'emplacement a été oublié
    Invalidated,
}

#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("panel target is empty")]
    EmptyTarget,
    #[error("panel post failed: {0}")]
    Post(#[from] SinkError),
    #[error("panel posted as {message_id} but no tier stored its location")]
    NotPersisted { message_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub at: i64,
    pub hosts: usize,
    pub dirty: Vec<String>,
    pub probe_failures: Vec<String>,
    pub store_failures: Vec<String>,
    pub panel: PanelRefresh,
}

pub struct LoginWatch {
    inventory: Arc<[HostDescriptor]>,
    hosts: HostStateStore,
    panel: PanelLocationStore,
    prober: Arc<dyn SessionProber>,
    sink: Arc<dyn DisplaySink>,
    policy: HysteresisPolicy,
    health: HealthTracker,
}

impl LoginWatch {
    pub fn new(
        inventory: Vec<HostDescriptor>,
        hosts: HostStateStore,
        panel: PanelLocationStore,
        prober: Arc<dyn SessionProber>,
        sink: Arc<dyn DisplaySink>,
    ) -> Self {
        Self {
            inventory: inventory.into(),
            hosts,
            panel,
            prober,
            sink,
            policy: HysteresisPolicy::default(),
            health: HealthTracker::new(),
        }
    }

    pub fn with_policy(mut self, policy: HysteresisPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn inventory(&self) -> &[HostDescriptor] {
        &self.inventory
    }

    pub fn policy(&self) -> &HysteresisPolicy {
        &self.policy
    }

    /// Exécute un cycle complet maintenant (timer ou refresh manuel)
    pub async fn run_cycle(&self) -> CycleReport {
        self.run_cycle_at(OffsetDateTime::now_utc()).await
    }

    pub async fn run_cycle_at(&self, now: OffsetDateTime) -> CycleReport {
        let started = Instant::now();
        let ts = now.unix_timestamp();
        let mut report = CycleReport {
            at: ts,
            hosts: self.inventory.len(),
            dirty: Vec::new(),
            probe_failures: Vec::new(),
            store_failures: Vec::new(),
            panel: PanelRefresh::NotNeeded,
        };
        let mut states = Vec::with_capacity(self.inventory.len());

        for host in self.inventory.iter() {
            let mut state = self.hosts.get(host, ts);

            let outcome = match probe_sessions(self.prober.as_ref(), host).await {
                Ok(Some((variant, raw))) => ProbeOutcome::Reachable(parse_users(variant, &raw)),
                Ok(None) => ProbeOutcome::Reachable(Vec::new()),
                Err(e) => {
                    debug!(host = %host.host, error = %e, "probe failed");
                    report.probe_failures.push(host.host.clone());
                    ProbeOutcome::Unreachable
                }
            };

            let change = reconcile(&mut state, &outcome, ts, &self.policy);
            if change.dirty {
                info!(
                    host = %host.host,
                    from = %change.previous,
                    to = %state.status,
                    users = %state.last_users.join(","),
                    "host status changed"
                );
                report.dirty.push(host.host.clone());
            }

            if let Err(e) = self.hosts.put(&mut state, ts) {
                warn!(host = %host.host, error = %e, "host state write failed, update lost for this cycle");
                report.store_failures.push(host.host.clone());
            }
            states.push(state);
        }

        if !report.dirty.is_empty() {
            report.panel = self.push_panel(&states, now).await;
        }

        self.health.record_cycle(ts, started.elapsed(), report.dirty.len(), report.probe_failures.len());
        debug!(
            hosts = report.hosts,
            dirty = report.dirty.len(),
            probe_failures = report.probe_failures.len(),
            "cycle done"
        );
        report
    }

    /// Met à jour le panneau avec l'état stocké actuel
    pub async fn refresh_panel(&self, now: OffsetDateTime) -> PanelRefresh {
        let states = self.states(now);
        self.push_panel(&states, now).await
    }

    async fn push_panel(&self, states: &[HostState], now: OffsetDateTime) -> PanelRefresh {
        let Some(location) = self.panel.get() else {
            debug!("no panel yet, skipping display update");
            return PanelRefresh::NoPanel;
        };

        let payload = render_panel(states, now);
        match self.sink.update(&location, &payload).await {
            Ok(()) => PanelRefresh::Updated,
            Err(e) => {
                // message supprimé ou canal changé : on oublie le panneau
                warn!(channel = %location.target, error = %e, "panel update failed, forgetting panel location");
                self.panel.invalidate();
                PanelRefresh::Invalidated
            }
        }
    }

    /// États courants de tout l'inventaire
    pub fn states(&self, now: OffsetDateTime) -> Vec<HostState> {
        self.hosts.snapshot(&self.inventory, now.unix_timestamp())
    }

    pub fn render_current(&self, now: OffsetDateTime) -> PanelPayload {
        render_panel(&self.states(now), now)
    }

    pub fn panel_location(&self) -> Option<PanelLocation> {
        self.panel.get()
    }

    /// Enregistre l'emplacement d'un panneau créé ailleurs
    pub fn adopt_panel(&self, location: &PanelLocation) -> Vec<TierOutcome> {
        info!(channel = %location.target, message_id = %location.message_id, "panel location set");
        self.panel.set(location)
    }

    /// Crée (ou déplace) le panneau vers `target`.
    /// Réussit dès qu'au moins un tier a mémorisé l'emplacement.
    pub async fn create_panel(&self, target: &str, now: OffsetDateTime) -> Result<PanelLocation, PanelError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(PanelError::EmptyTarget);
        }

        let payload = self.render_current(now);
        let message_id = self.sink.post(target, &payload).await?;
        let location = PanelLocation { target: target.to_string(), message_id };
        if !self.adopt_panel(&location).iter().any(TierOutcome::is_ok) {
            return Err(PanelError::NotPersisted { message_id: location.message_id });
        }
        Ok(location)
    }

    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        self.hosts.purge_expired()
    }

    pub fn health(&self) -> WatchHealth {
        self.health.get_health(self.inventory.len())
    }
}
