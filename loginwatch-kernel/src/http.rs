/**
 * API REST LOGINWATCH - Surface de commande du watcher
 *
 * RÔLE :
 * Expose l'état des hôtes et les commandes opérateur (création du panneau,
 * refresh manuel) pour un dashboard, un bot ou des scripts.
 *
 * ROUTES :
 * - GET  /health          : liveness, toujours accessible
 * - GET  /system/health   : statistiques des cycles
 * - GET  /hosts           : états courants dans l'ordre de l'inventaire
 * - GET  /hosts/{host}    : état d'un hôte
 * - GET  /panel           : panneau rendu + emplacement actuel
 * - POST /panel {target}  : poste le panneau et mémorise son emplacement
 * - POST /refresh         : lance un cycle immédiatement
 *
 * SÉCURITÉ :
 * - Header x-api-key obligatoire sur toutes routes sauf /health
 * - Sans clé configurée, l'API est fermée
 */

use crate::models::{HostState, PanelLocation};
use crate::panel::PanelPayload;
use crate::watcher::{LoginWatch, PanelError};
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub watch: Arc<LoginWatch>,
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(watch: Arc<LoginWatch>, api_key: Option<String>) -> Self {
        Self { watch, api_key: api_key.map(Arc::from) }
    }
}

async fn require_api_key(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    // Health check toujours accessible
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let Some(expected) = app.api_key.as_deref() else {
        warn!(path = %req.uri().path(), "LOGINWATCH_API_KEY not set, API access denied");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        warn!(path = %req.uri().path(), "rejected request with missing or wrong api key");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/hosts", get(get_hosts))
        .route("/hosts/{host}", get(get_host))
        .route("/panel", get(get_panel).post(create_panel))
        .route("/refresh", post(refresh))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

async fn get_system_health(State(app): State<AppState>) -> Json<crate::health::WatchHealth> {
    Json(app.watch.health())
}

async fn get_hosts(State(app): State<AppState>) -> Json<Vec<HostState>> {
    Json(app.watch.states(OffsetDateTime::now_utc()))
}

async fn get_host(
    State(app): State<AppState>,
    Path(host): Path<String>,
) -> Result<Json<HostState>, StatusCode> {
    app.watch
        .states(OffsetDateTime::now_utc())
        .into_iter()
        .find(|s| s.host == host)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Serialize)]
struct PanelView {
    location: Option<PanelLocation>,
    payload: PanelPayload,
}

async fn get_panel(State(app): State<AppState>) -> Json<PanelView> {
    Json(PanelView {
        location: app.watch.panel_location(),
        payload: app.watch.render_current(OffsetDateTime::now_utc()),
    })
}

#[derive(Debug, Deserialize)]
struct CreatePanel {
    target: String,
}

async fn create_panel(
    State(app): State<AppState>,
    Json(body): Json<CreatePanel>,
) -> Result<Json<PanelLocation>, (StatusCode, Json<serde_json::Value>)> {
    match app.watch.create_panel(&body.target, OffsetDateTime::now_utc()).await {
        Ok(location) => Ok(Json(location)),
        Err(e) => {
            warn!(target_channel = %body.target, error = %e, "panel creation failed");
            let code = match e {
                PanelError::EmptyTarget => StatusCode::BAD_REQUEST,
                PanelError::Post(_) => StatusCode::BAD_GATEWAY,
                PanelError::NotPersisted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((code, Json(serde_json::json!({ "ok": false, "msg": e.to_string() }))))
        }
    }
}

async fn refresh(State(app): State<AppState>) -> Json<crate::watcher::CycleReport> {
    Json(app.watch.run_cycle().await)
}
