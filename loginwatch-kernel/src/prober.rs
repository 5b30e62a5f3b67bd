//! Session probing over SSH
//!
//! Handles:
//! - Read-only remote commands listing logged-in users (`who --ips`, `who`, `users`)
//! - First non-empty variant wins, all-empty means "reachable, nobody logged in"
//! - Bounded timeout on every remote call

use crate::models::HostDescriptor;
use crate::parser::CommandVariant;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// Exit status used by the ssh client for its own (connection) errors
const SSH_CONNECTION_FAILURE: i32 = 255;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("failed to spawn ssh client: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Remote command execution against one host
#[async_trait]
pub trait SessionProber: Send + Sync {
    /// Run a read-only command and return its stdout.
    /// A command that runs but prints nothing returns `Ok(String::new())`.
    async fn exec(&self, host: &HostDescriptor, command: &str) -> Result<String, ProbeError>;
}

/// Try each command variant in order and keep the first non-empty output.
/// `Ok(None)` means the host answered but no variant printed anything.
pub async fn probe_sessions(
    prober: &dyn SessionProber,
    host: &HostDescriptor,
) -> Result<Option<(CommandVariant, String)>, ProbeError> {
    for variant in CommandVariant::PROBE_ORDER {
        let out = prober.exec(host, variant.command_line()).await?;
        let out = out.trim();
        if !out.is_empty() {
            debug!(host = %host.host, command = variant.command_line(), "session listing received");
            return Ok(Some((variant, out.to_string())));
        }
    }
    Ok(None)
}

/// SSH settings shared by every probe
#[derive(Debug, Clone)]
pub struct SshSettings {
    pub key_path: PathBuf,
    pub timeout: Duration,
    pub extra_options: Vec<String>,
}

/// Prober backed by the system `ssh` client
pub struct SshProber {
    settings: SshSettings,
}

impl SshProber {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    /// Arguments passed to `ssh` for one remote command
    pub fn ssh_args(&self, host: &HostDescriptor, command: &str) -> Vec<String> {
        let connect_timeout = self.settings.timeout.as_secs().max(1);
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={connect_timeout}"),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-i".to_string(),
            self.settings.key_path.display().to_string(),
            "-p".to_string(),
            host.port.to_string(),
            "-l".to_string(),
            host.user.clone(),
        ];
        args.extend(self.settings.extra_options.iter().cloned());
        args.push(host.host.clone());
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl SessionProber for SshProber {
    async fn exec(&self, host: &HostDescriptor, command: &str) -> Result<String, ProbeError> {
        let args = self.ssh_args(host, command);
        // connexion + commande, bornées ensemble
        let budget = self.settings.timeout.saturating_mul(2);

        let output = tokio::time::timeout(
            budget,
            AsyncCommand::new("ssh")
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ProbeError::Timeout(budget))??;

        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
            Some(SSH_CONNECTION_FAILURE) | None => Err(ProbeError::Connection(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )),
            // la commande distante a échoué (ex: `who --ips` non supporté) : sortie vide
            Some(code) => {
                debug!(host = %host.host, command, code, "remote command failed, treated as empty");
                Ok(String::new())
            }
        }
    }
}
