/*!
Test Harness pour le watcher

Assemble un `LoginWatch` complet sur les fakes :
- store principal partagé entre états d'hôtes et panneau (comme en production)
- store de repli pour l'emplacement du panneau
- horloge pilotée par le test (timestamps epoch)
*/

use crate::mocks::{FlakyKv, RecordingSink, Reply, ScriptedProber};
use loginwatch_kernel::models::{HostDescriptor, HostState, PanelLocation};
use loginwatch_kernel::panel_store::PanelLocationStore;
use loginwatch_kernel::reconciler::HysteresisPolicy;
use loginwatch_kernel::store::{host_key, HostStateStore, KvStore};
use loginwatch_kernel::watcher::{CycleReport, LoginWatch};
use std::sync::Arc;
use time::OffsetDateTime;

pub const T0: i64 = 1_700_000_000;

pub struct TestHarness {
    pub watch: Arc<LoginWatch>,
    pub primary: Arc<FlakyKv>,
    pub fallback: Arc<FlakyKv>,
    pub prober: Arc<ScriptedProber>,
    pub sink: Arc<RecordingSink>,
}

impl TestHarness {
    pub fn new(inventory: Vec<HostDescriptor>) -> Self {
        Self::with_policy(inventory, HysteresisPolicy::default())
    }

    pub fn with_policy(inventory: Vec<HostDescriptor>, policy: HysteresisPolicy) -> Self {
        init_tracing();

        let primary = Arc::new(FlakyKv::new("primary"));
        let fallback = Arc::new(FlakyKv::new("fallback"));
        let prober = Arc::new(ScriptedProber::new());
        let sink = Arc::new(RecordingSink::new());

        let hosts = HostStateStore::new(primary.clone());
        let panel = PanelLocationStore::new(vec![primary.clone() as Arc<dyn KvStore>, fallback.clone()]);
        let watch = LoginWatch::new(inventory, hosts, panel, prober.clone(), sink.clone()).with_policy(policy);

        Self { watch: Arc::new(watch), primary, fallback, prober, sink }
    }

    /// Inventaire simple `srv-01..srv-N`
    pub fn hosts(n: usize) -> Vec<HostDescriptor> {
        (1..=n).map(|i| HostDescriptor::new(&format!("srv-{i:02}"), "watcher")).collect()
    }

    pub fn at(ts: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(ts).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    pub fn script(&self, host: &str, replies: impl IntoIterator<Item = Reply>) -> &Self {
        self.prober.script(host, replies);
        self
    }

    pub async fn cycle_at(&self, ts: i64) -> CycleReport {
        self.watch.run_cycle_at(Self::at(ts)).await
    }

    /// État tel que persisté dans le store principal
    pub fn stored(&self, host: &str) -> Option<HostState> {
        self.primary
            .raw(&host_key(host))
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    /// Écrit directement un état d'hôte (état antérieur au test)
    pub fn seed(&self, state: &HostState) -> anyhow::Result<()> {
        self.primary.put(&host_key(&state.host), &serde_json::to_string(state)?, None)?;
        Ok(())
    }

    /// Enregistre un panneau existant
    pub fn with_panel(&self) -> PanelLocation {
        let location = PanelLocation { target: "C0PANEL".into(), message_id: "1699999999.000100".into() };
        self.watch.adopt_panel(&location);
        location
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}
