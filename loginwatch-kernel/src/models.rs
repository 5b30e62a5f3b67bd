use serde::{Deserialize, Serialize};

/// Entrée d'inventaire : un hôte à surveiller (immuable pendant la vie du process)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HostDescriptor {
    pub host: String,
    pub user: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub label: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

impl HostDescriptor {
    pub fn new(host: &str, user: &str) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            port: default_ssh_port(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Nom affiché : le label s'il existe, sinon l'adresse
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.host)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Occupied,
    #[default]
    Free,
    Offline,
}

impl HostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostStatus::Occupied => "occupied",
            HostStatus::Free => "free",
            HostStatus::Offline => "offline",
        }
    }
}

impl std::fmt::Display for HostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enregistrement persistant d'un hôte (un par entrée d'inventaire).
///
/// Invariants :
/// - `last_users` non vide uniquement quand `status == Occupied`
/// - `first_empty_ts` à `None` dès qu'aucun compte à rebours n'est en cours
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HostState {
    pub host: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub status: HostStatus,
    #[serde(default)]
    pub last_users: Vec<String>,
    #[serde(default)]
    pub first_empty_ts: Option<i64>,
    #[serde(default)]
    pub last_ok: Option<i64>,
    #[serde(default)]
    pub last_update: i64,
    /// Première création de l'enregistrement, jamais déplacée par les écritures
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl HostState {
    /// État par défaut créé à la première lecture
    pub fn new(host: &str, label: Option<&str>, now: i64) -> Self {
        Self {
            host: host.to_string(),
            label: label.unwrap_or(host).to_string(),
            status: HostStatus::Free,
            last_users: Vec::new(),
            first_empty_ts: None,
            last_ok: None,
            last_update: now,
            created_at: Some(now),
        }
    }

    pub fn display_label(&self) -> &str {
        if self.label.is_empty() { &self.host } else { &self.label }
    }
}

/// Emplacement du panneau vivant (destination + id du message)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PanelLocation {
    pub target: String,
    pub message_id: String,
}

/// Résultat d'une sonde tel que vu par le réconciliateur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Sonde réussie : utilisateurs humains connectés (triés, dédoublonnés, éventuellement vide)
    Reachable(Vec<String>),
    /// Erreur de connectivité ou timeout
    Unreachable,
}
