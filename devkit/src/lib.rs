/*!
# Loginwatch DevKit - Fakes et harness de test

Bibliothèque facilitant les tests du watcher sans SSH ni Slack :
- Store clé/valeur avec pannes commandées
- Sonde scriptée par hôte (sessions, vide, injoignable, latence)
- Sink qui enregistre les posts / updates du panneau
- Harness assemblant un `LoginWatch` complet sur ces fakes
*/

pub mod harness;
pub mod mocks;

pub use harness::TestHarness;
pub use mocks::{FlakyKv, RecordingSink, Reply, ScriptedProber};
