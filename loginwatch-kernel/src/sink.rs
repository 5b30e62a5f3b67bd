/**
 * DISPLAY SINK - Publication du panneau sur la plateforme de chat
 *
 * RÔLE : Interface étroite post / update vers le message vivant, plus
 * l'implémentation Slack (Web API chat.postMessage / chat.update).
 *
 * Une erreur d'update est remontée telle quelle : c'est le flux de
 * réconciliation qui décide d'invalider l'emplacement du panneau.
 */

use crate::models::PanelLocation;
use crate::panel::{Block, PanelPayload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat API error: {0}")]
    Api(String),
    #[error("unexpected chat API response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait DisplaySink: Send + Sync {
    /// Poste un nouveau message, retourne son identifiant
    async fn post(&self, target: &str, payload: &PanelPayload) -> Result<String, SinkError>;

    /// Remplace le contenu d'un message existant
    async fn update(&self, location: &PanelLocation, payload: &PanelPayload) -> Result<(), SinkError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts: Option<&'a str>,
    text: &'a str,
    blocks: &'a [Block],
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SlackResponse {
    fn into_result(self) -> Result<Self, SinkError> {
        if self.ok {
            Ok(self)
        } else {
            Err(SinkError::Api(self.error.unwrap_or_else(|| "unknown_error".to_string())))
        }
    }
}

pub struct SlackSink {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl SlackSink {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("loginwatch")
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn call(&self, method: &str, message: &ChatMessage<'_>) -> Result<SlackResponse, SinkError> {
        let url = format!("{}/{}", self.api_url, method);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(message)
            .send()
            .await?
            .error_for_status()?;

        let body: SlackResponse = response
            .json()
            .await
            .map_err(|e| SinkError::Decode(e.to_string()))?;
        debug!(method, ok = body.ok, "chat API call");
        body.into_result()
    }
}

#[async_trait]
impl DisplaySink for SlackSink {
    async fn post(&self, target: &str, payload: &PanelPayload) -> Result<String, SinkError> {
        let message = ChatMessage { channel: target, ts: None, text: &payload.text, blocks: &payload.blocks };
        let response = self.call("chat.postMessage", &message).await?;
        response
            .ts
            .ok_or_else(|| SinkError::Decode("chat.postMessage returned no ts".to_string()))
    }

    async fn update(&self, location: &PanelLocation, payload: &PanelPayload) -> Result<(), SinkError> {
        let message = ChatMessage {
            channel: &location.target,
            ts: Some(&location.message_id),
            text: &payload.text,
            blocks: &payload.blocks,
        };
        self.call("chat.update", &message).await.map(|_| ())
    }
}
