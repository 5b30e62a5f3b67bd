/**
 * LOGINWATCH KERNEL - Point d'entrée du service
 *
 * RÔLE : Bootstrap : config, inventaire, stores, sonde SSH, Slack, boucle de
 * sondage et API HTTP.
 */

use anyhow::Context;
use loginwatch_kernel::config::WatchConfig;
use loginwatch_kernel::http::{build_router, AppState};
use loginwatch_kernel::inventory::load_inventory;
use loginwatch_kernel::panel_store::PanelLocationStore;
use loginwatch_kernel::prober::SshProber;
use loginwatch_kernel::scheduler::{spawn_poller, spawn_retention_sweeper};
use loginwatch_kernel::sink::SlackSink;
use loginwatch_kernel::store::{HostStateStore, JsonFileKv, KvStore, MemoryKv, SqliteKv};
use loginwatch_kernel::watcher::LoginWatch;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = WatchConfig::from_env().context("invalid configuration")?;
    let inventory = load_inventory(&cfg.inventory_path, &cfg.inventory_fallback_path)
        .await
        .context("failed to load inventory")?;

    // store principal : SQLite, sinon mémoire (l'état repartira de zéro au redémarrage)
    let primary: Arc<dyn KvStore> = match SqliteKv::open(&cfg.state_db_path) {
        Ok(kv) => Arc::new(kv),
        Err(e) => {
            error!(path = %cfg.state_db_path.display(), error = %e, "state database unavailable, using in-memory store");
            Arc::new(MemoryKv::new())
        }
    };
    let panel_fallback: Arc<dyn KvStore> = Arc::new(JsonFileKv::open(&cfg.panel_state_path));

    let hosts = HostStateStore::new(primary.clone()).with_retention(cfg.state_retention);
    let panel = PanelLocationStore::new(vec![primary, panel_fallback]);

    let token = cfg
        .slack_bot_token
        .as_deref()
        .context("SLACK_BOT_TOKEN is required")?;
    let sink = SlackSink::new(&cfg.slack_api_url, token, cfg.slack_timeout).context("failed to build Slack client")?;
    let prober = SshProber::new(cfg.ssh_settings());

    let watch = Arc::new(
        LoginWatch::new(inventory, hosts, panel, Arc::new(prober), Arc::new(sink)).with_policy(cfg.policy()),
    );

    spawn_poller(watch.clone(), cfg.poll_interval);
    spawn_retention_sweeper(watch.clone(), Duration::from_secs(60 * 60));

    let app = build_router(AppState::new(watch, cfg.api_key.clone()));
    let listener = TcpListener::bind(cfg.http_bind)
        .await
        .with_context(|| format!("failed to bind {}", cfg.http_bind))?;
    info!(addr = %cfg.http_bind, "listening");
    axum::serve(listener, app).await.context("http server failed")?;
    Ok(())
}
