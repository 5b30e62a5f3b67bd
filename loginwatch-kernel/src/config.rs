/**
 * CONFIG - Configuration du watcher par variables d'environnement
 *
 * RÔLE : Lit les réglages (intervalle, hystérésis, SSH, stockage, Slack, HTTP)
 * avec des valeurs par défaut. Le `.env` éventuel est chargé par main (dotenvy).
 *
 * `from_lookup` prend une fonction de lecture pour rester testable sans
 * toucher à l'environnement du process.
 */

use crate::prober::SshSettings;
use crate::reconciler::{HysteresisPolicy, OfflineRecovery};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_INVENTORY_PATH: &str = "/config/inventory.yml";
pub const FALLBACK_INVENTORY_PATH: &str = "/app/inventory.yml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}: expected a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key}: invalid value {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub poll_interval: Duration,
    pub hold_occupied_secs: i64,
    pub offline_after_secs: i64,
    pub offline_recovery: OfflineRecovery,
    pub ssh_timeout: Duration,
    pub ssh_key_path: PathBuf,
    pub ssh_extra_options: Vec<String>,
    pub state_db_path: PathBuf,
    pub panel_state_path: PathBuf,
    pub inventory_path: PathBuf,
    pub inventory_fallback_path: PathBuf,
    pub state_retention: Duration,
    pub slack_bot_token: Option<String>,
    pub slack_api_url: String,
    pub slack_timeout: Duration,
    pub http_bind: SocketAddr,
    pub api_key: Option<String>,
}

impl WatchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // une variable vide compte comme absente
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let number = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match get(key) {
                None => Ok(default),
                Some(v) => v
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidNumber { key, value: v }),
            }
        };

        let positive = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match number(key, default)? {
                0 => Err(ConfigError::Invalid {
                    key,
                    value: "0".into(),
                    reason: "must be at least one second".into(),
                }),
                n => Ok(n),
            }
        };

        // fenêtres comparées à des timestamps epoch signés
        let seconds = |key: &'static str, default: u64| -> Result<i64, ConfigError> {
            let n = number(key, default)?;
            i64::try_from(n).map_err(|_| ConfigError::Invalid {
                key,
                value: n.to_string(),
                reason: "value too large".into(),
            })
        };

        let retention_days = number("STATE_RETENTION_DAYS", 14)?;
        let retention_secs = retention_days
            .checked_mul(24 * 60 * 60)
            .filter(|secs| i64::try_from(*secs).is_ok())
            .ok_or_else(|| ConfigError::Invalid {
                key: "STATE_RETENTION_DAYS",
                value: retention_days.to_string(),
                reason: "value too large".into(),
            })?;

        let offline_recovery = match get("OFFLINE_RECOVERY").as_deref() {
            None | Some("stay") => OfflineRecovery::Stay,
            Some("hold") => OfflineRecovery::ReleaseAfterHold,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "OFFLINE_RECOVERY",
                    value: other.to_string(),
                    reason: "expected `stay` or `hold`".into(),
                })
            }
        };

        let ssh_extra_options = match get("SSH_EXTRA_OPTS") {
            None => Vec::new(),
            Some(raw) => shell_words::split(&raw).map_err(|e| ConfigError::Invalid {
                key: "SSH_EXTRA_OPTS",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
        };

        let http_raw = get("HTTP_BIND").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let http_bind = http_raw.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
            key: "HTTP_BIND",
            value: http_raw.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            poll_interval: Duration::from_secs(positive("POLL_INTERVAL_SEC", 15)?),
            hold_occupied_secs: seconds("HOLD_OCCUPIED_SEC", 600)?,
            offline_after_secs: seconds("OFFLINE_AFTER_SEC", 600)?,
            offline_recovery,
            ssh_timeout: Duration::from_secs(positive("SSH_TIMEOUT", 6)?),
            ssh_key_path: get("SSH_KEY_PATH")
                .unwrap_or_else(|| "/run/secrets/ssh_key".into())
                .into(),
            ssh_extra_options,
            state_db_path: get("STATE_DB_PATH")
                .unwrap_or_else(|| "./data/loginwatch.db".into())
                .into(),
            panel_state_path: get("PANEL_STATE_PATH")
                .unwrap_or_else(|| "./data/panel.json".into())
                .into(),
            inventory_path: get("INVENTORY_PATH")
                .unwrap_or_else(|| DEFAULT_INVENTORY_PATH.into())
                .into(),
            inventory_fallback_path: FALLBACK_INVENTORY_PATH.into(),
            state_retention: Duration::from_secs(retention_secs),
            slack_bot_token: get("SLACK_BOT_TOKEN"),
            slack_api_url: get("SLACK_API_URL").unwrap_or_else(|| "https://slack.com/api".into()),
            slack_timeout: Duration::from_secs(positive("SLACK_TIMEOUT_SEC", 10)?),
            http_bind,
            api_key: get("LOGINWATCH_API_KEY"),
        })
    }

    pub fn policy(&self) -> HysteresisPolicy {
        HysteresisPolicy {
            hold_occupied_secs: self.hold_occupied_secs,
            offline_after_secs: self.offline_after_secs,
            offline_recovery: self.offline_recovery,
        }
    }

    pub fn ssh_settings(&self) -> SshSettings {
        SshSettings {
            key_path: self.ssh_key_path.clone(),
            timeout: self.ssh_timeout,
            extra_options: self.ssh_extra_options.clone(),
        }
    }
}
