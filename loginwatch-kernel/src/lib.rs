/**
 * LOGINWATCH KERNEL - Surveillance des sessions ouvertes sur un parc d'hôtes SSH
 *
 * RÔLE : Sonde périodiquement chaque hôte de l'inventaire (`who`/`users` via SSH),
 * applique une hystérésis occupied / free / offline, persiste l'état par hôte
 * et maintient un panneau de statut vivant sur Slack.
 *
 * ARCHITECTURE :
 * - parser / reconciler / panel : logique pure, sans I/O
 * - store / panel_store         : persistance clé-valeur avec expiration
 * - prober / sink               : ports vers SSH et l'API de chat (traits)
 * - watcher / scheduler / http  : orchestration, boucle périodique, API REST
 */

pub mod config;
pub mod health;
pub mod http;
pub mod inventory;
pub mod models;
pub mod panel;
pub mod panel_store;
pub mod parser;
pub mod prober;
pub mod reconciler;
pub mod scheduler;
pub mod sink;
pub mod store;
pub mod watcher;
