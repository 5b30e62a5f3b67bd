/**
 * PANEL LOCATION STORE - Où vit le panneau de statut
 *
 * RÔLE : Mémorise {target, message_id} du message vivant sur une liste ordonnée
 * de stores (principal rapide, puis repli durable).
 *
 * FONCTIONNEMENT :
 * - get()        : premier tier qui répond; un succès sur un tier de repli
 *                  est recopié dans les tiers précédents
 * - set()        : écrit dans tous les tiers, chaque résultat est rapporté
 * - invalidate() : supprime dans tous les tiers (best effort)
 *
 * Un tier en échec ne bloque jamais les autres.
 */

use crate::models::PanelLocation;
use crate::store::{KvStore, StoreError};
use std::sync::Arc;
use tracing::{debug, warn};

pub const PANEL_KEY: &str = "panel";

/// Résultat d'une opération sur un tier
#[derive(Debug)]
pub struct TierOutcome {
    pub tier: String,
    pub result: Result<(), StoreError>,
}

impl TierOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Clone)]
pub struct PanelLocationStore {
    tiers: Vec<Arc<dyn KvStore>>,
}

impl PanelLocationStore {
    /// Tiers dans l'ordre de consultation (le plus rapide d'abord)
    pub fn new(tiers: Vec<Arc<dyn KvStore>>) -> Self {
        Self { tiers }
    }

    pub fn get(&self) -> Option<PanelLocation> {
        for (index, tier) in self.tiers.iter().enumerate() {
            let raw = match tier.get(PANEL_KEY) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!(tier = tier.name(), error = %e, "panel location read failed");
                    continue;
                }
            };

            let location = match serde_json::from_str::<PanelLocation>(&raw) {
                Ok(location) => location,
                Err(e) => {
                    warn!(tier = tier.name(), error = %e, "corrupt panel location ignored");
                    continue;
                }
            };

            for faster in &self.tiers[..index] {
                if let Err(e) = faster.put(PANEL_KEY, &raw, None) {
                    warn!(tier = faster.name(), error = %e, "panel location backfill failed");
                } else {
                    debug!(tier = faster.name(), from = tier.name(), "panel location backfilled");
                }
            }
            return Some(location);
        }
        None
    }

    pub fn set(&self, location: &PanelLocation) -> Vec<TierOutcome> {
        let raw = match serde_json::to_string(location) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "panel location serialization failed");
                return Vec::new();
            }
        };
        self.each_tier("write", |tier| tier.put(PANEL_KEY, &raw, None))
    }

    pub fn invalidate(&self) -> Vec<TierOutcome> {
        self.each_tier("delete", |tier| tier.delete(PANEL_KEY))
    }

    fn each_tier<F>(&self, op: &str, f: F) -> Vec<TierOutcome>
    where
        F: Fn(&dyn KvStore) -> Result<(), StoreError>,
    {
        self.tiers
            .iter()
            .map(|tier| {
                let result = f(tier.as_ref());
                if let Err(e) = &result {
                    warn!(tier = tier.name(), op, error = %e, "panel location tier failed");
                }
                TierOutcome { tier: tier.name().to_string(), result }
            })
            .collect()
    }
}
