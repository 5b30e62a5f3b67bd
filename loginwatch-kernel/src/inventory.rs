/**
 * INVENTORY - Liste des hôtes à surveiller
 *
 * RÔLE : Charge le fichier YAML d'inventaire (liste de {host, user, port?, label?})
 * depuis le chemin configuré, ou depuis le chemin de repli s'il est absent,
 * illisible ou invalide.
 * Lu une seule fois au démarrage.
 */

use crate::models::HostDescriptor;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("no inventory file found (tried {tried:?})")]
    NotFound { tried: Vec<PathBuf> },
    #[error("failed to read inventory: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid inventory YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("inventory must be a YAML list of hosts")]
    NotAList,
    #[error("inventory entry #{index}: {reason}")]
    InvalidEntry { index: usize, reason: String },
}

/// Premier fichier lisible et valide; un fichier illisible ou invalide est
/// signalé puis on passe au suivant. Si aucun ne convient, la première
/// erreur rencontrée est retournée.
pub async fn load_inventory(primary: &Path, fallback: &Path) -> Result<Vec<HostDescriptor>, InventoryError> {
    let mut first_error = None;

    for path in [primary, fallback] {
        let loaded = match fs::read_to_string(path).await {
            Ok(text) => parse_inventory(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => Err(e.into()),
        };

        match loaded {
            Ok(hosts) => {
                info!(path = %path.display(), hosts = hosts.len(), "inventory loaded");
                return Ok(hosts);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "inventory unusable, trying next path");
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error.unwrap_or_else(|| InventoryError::NotFound {
        tried: vec![primary.to_path_buf(), fallback.to_path_buf()],
    }))
}

pub fn parse_inventory(text: &str) -> Result<Vec<HostDescriptor>, InventoryError> {
    let doc: serde_yaml::Value = serde_yaml::from_str(text)?;
    let entries = match doc {
        serde_yaml::Value::Null => return Ok(Vec::new()),
        serde_yaml::Value::Sequence(entries) => entries,
        _ => return Err(InventoryError::NotAList),
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let host: HostDescriptor = serde_yaml::from_value(entry)
                .map_err(|e| InventoryError::InvalidEntry { index, reason: e.to_string() })?;
            if host.host.trim().is_empty() || host.user.trim().is_empty() {
                return Err(InventoryError::InvalidEntry {
                    index,
                    reason: "host and user must not be empty".into(),
                });
            }
            Ok(host)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let yaml = r#"
- host: srv-01.local
  user: watcher
- host: 10.0.0.12
  user: ops
  port: 2222
  label: GPU box
"#;
        let hosts = parse_inventory(yaml).unwrap();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].port, 22);
        assert_eq!(hosts[1].port, 2222);
        assert_eq!(hosts[1].display_label(), "GPU box");
    }

    #[test]
    fn test_empty_document_is_empty_inventory() {
        assert!(parse_inventory("").unwrap().is_empty());
        assert!(parse_inventory("[]").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(matches!(parse_inventory("hosts: {}"), Err(InventoryError::NotAList)));
        assert!(matches!(
            parse_inventory("- host: srv-01\n- user: nobody\n"),
            Err(InventoryError::InvalidEntry { index: 1, .. })
        ));
        assert!(matches!(
            parse_inventory("- host: ''\n  user: watcher\n"),
            Err(InventoryError::InvalidEntry { index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_missing() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("inventory.yml");
        std::fs::write(&fallback, "- host: srv-09\n  user: watcher\n").unwrap();

        let hosts = load_inventory(&dir.path().join("missing.yml"), &fallback).await.unwrap();
        assert_eq!(hosts[0].host, "srv-09");
    }

    #[tokio::test]
    async fn test_invalid_primary_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("primary.yml");
        let fallback = dir.path().join("fallback.yml");
        std::fs::write(&primary, "hosts: not-a-list\n").unwrap();
        std::fs::write(&fallback, "- host: srv-02\n  user: watcher\n").unwrap();

        let hosts = load_inventory(&primary, &fallback).await.unwrap();
        assert_eq!(hosts[0].host, "srv-02");

        // chemin illisible (répertoire) : même repli
        let hosts = load_inventory(dir.path(), &fallback).await.unwrap();
        assert_eq!(hosts.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_primary_without_fallback_reports_primary_error() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("primary.yml");
        std::fs::write(&primary, "- user: nobody\n").unwrap();

        let err = load_inventory(&primary, &dir.path().join("missing.yml")).await.unwrap_err();
        assert!(matches!(err, InventoryError::InvalidEntry { index: 0, .. }));
    }

    #[tokio::test]
    async fn test_missing_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_inventory(&dir.path().join("a.yml"), &dir.path().join("b.yml")).await.unwrap_err();
        assert!(matches!(err, InventoryError::NotFound { tried } if tried.len() == 2));
    }
}
