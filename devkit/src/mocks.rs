/*!
Fakes pour les ports du kernel (KvStore, SessionProber, DisplaySink)
*/

use async_trait::async_trait;
use loginwatch_kernel::models::{HostDescriptor, PanelLocation};
use loginwatch_kernel::panel::PanelPayload;
use loginwatch_kernel::parser::CommandVariant;
use loginwatch_kernel::prober::{ProbeError, SessionProber};
use loginwatch_kernel::sink::{DisplaySink, SinkError};
use loginwatch_kernel::store::{KvStore, MemoryKv, StoreError};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Store en mémoire dont chaque opération peut être mise en panne
pub struct FlakyKv {
    name: String,
    inner: MemoryKv,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FlakyKv {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: MemoryKv::new(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, on: bool) {
        self.fail_deletes.store(on, Ordering::SeqCst);
    }

    /// Panne totale (ou fin de panne)
    pub fn set_down(&self, down: bool) {
        self.fail_reads(down);
        self.fail_writes(down);
        self.fail_deletes(down);
    }

    /// Lecture directe, en ignorant les pannes
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.get(key).ok().flatten()
    }

    fn down(&self, op: &str) -> StoreError {
        StoreError::Unavailable(format!("{} {} failure (injected)", self.name, op))
    }
}

impl KvStore for FlakyKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(self.down("read"));
        }
        self.inner.get(key)
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(self.down("write"));
        }
        self.inner.put(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(self.down("delete"));
        }
        self.inner.delete(key)
    }

    fn purge_expired(&self) -> Result<usize, StoreError> {
        self.inner.purge_expired()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Réponse d'un hôte pour un cycle de sonde
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Sortie brute de `who --ips`
    Who(String),
    /// `who` ne répond rien, seul `users` liste les sessions
    UsersOnly(String),
    /// Joignable, personne de connecté
    Empty,
    /// Erreur de connexion
    Unreachable,
}

impl Reply {
    /// Sessions `who --ips` pour une liste de comptes
    pub fn sessions(users: &[&str]) -> Self {
        let lines: Vec<String> = users
            .iter()
            .enumerate()
            .map(|(i, u)| format!("{u}     pts/{i}        2024-05-02 09:1{i} (10.0.0.{})", 20 + i))
            .collect();
        Reply::Who(lines.join("\n"))
    }
}

/// Sonde scriptée : une file de réponses par hôte.
/// Une réponse est consommée au début de chaque sonde (commande `who --ips`);
/// la dernière reste active quand la file est vide.
#[derive(Default)]
pub struct ScriptedProber {
    queues: Mutex<HashMap<String, VecDeque<Reply>>>,
    current: Mutex<HashMap<String, Reply>>,
    delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicU64,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute des réponses à la file d'un hôte
    pub fn script(&self, host: &str, replies: impl IntoIterator<Item = Reply>) {
        self.queues.lock().entry(host.to_string()).or_default().extend(replies);
    }

    /// Remplace la réponse courante d'un hôte (vide sa file)
    pub fn set(&self, host: &str, reply: Reply) {
        self.queues.lock().remove(host);
        self.current.lock().insert(host.to_string(), reply);
    }

    /// Latence ajoutée à chaque commande
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn reply_for(&self, host: &str, command: &str) -> Reply {
        if CommandVariant::from_command(command) == Some(CommandVariant::PROBE_ORDER[0]) {
            if let Some(next) = self.queues.lock().get_mut(host).and_then(VecDeque::pop_front) {
                self.current.lock().insert(host.to_string(), next);
            }
        }
        self.current.lock().get(host).cloned().unwrap_or(Reply::Empty)
    }
}

#[async_trait]
impl SessionProber for ScriptedProber {
    async fn exec(&self, host: &HostDescriptor, command: &str) -> Result<String, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.reply_for(&host.host, command);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let variant = CommandVariant::from_command(command);
        match reply {
            Reply::Unreachable => Err(ProbeError::Connection(format!("ssh: connect to host {} port 22: Connection refused", host.host))),
            Reply::Empty => Ok(String::new()),
            Reply::Who(out) if variant == Some(CommandVariant::WhoIps) => Ok(out),
            Reply::UsersOnly(out) if variant == Some(CommandVariant::Users) => Ok(out),
            Reply::Who(_) | Reply::UsersOnly(_) => Ok(String::new()),
        }
    }
}

/// Sink qui enregistre tout ce qui est posté
#[derive(Default)]
pub struct RecordingSink {
    posts: Mutex<Vec<(String, PanelPayload)>>,
    updates: Mutex<Vec<(PanelLocation, PanelPayload)>>,
    fail_posts: AtomicBool,
    fail_updates: AtomicBool,
    next_id: AtomicU64,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_posts(&self, on: bool) {
        self.fail_posts.store(on, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, on: bool) {
        self.fail_updates.store(on, Ordering::SeqCst);
    }

    pub fn posts(&self) -> Vec<(String, PanelPayload)> {
        self.posts.lock().clone()
    }

    pub fn updates(&self) -> Vec<(PanelLocation, PanelPayload)> {
        self.updates.lock().clone()
    }

    pub fn last_update(&self) -> Option<PanelPayload> {
        self.updates.lock().last().map(|(_, p)| p.clone())
    }
}

#[async_trait]
impl DisplaySink for RecordingSink {
    async fn post(&self, target: &str, payload: &PanelPayload) -> Result<String, SinkError> {
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(SinkError::Api("channel_not_found".into()));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.posts.lock().push((target.to_string(), payload.clone()));
        Ok(format!("1700000000.{n:06}"))
    }

    async fn update(&self, location: &PanelLocation, payload: &PanelPayload) -> Result<(), SinkError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(SinkError::Api("message_not_found".into()));
        }
        self.updates.lock().push((location.clone(), payload.clone()));
        Ok(())
    }
}
