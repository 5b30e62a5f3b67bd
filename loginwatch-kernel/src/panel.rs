/**
 * PANEL - Rendu déterministe du panneau de statut
 *
 * RÔLE : Transforme la liste ordonnée des HostState en message structuré
 * (blocs façon Slack Block Kit) : titre, horodatage, puis sections
 * Occupied / Free / Offline. Les sections vides ne sont pas rendues.
 *
 * Fonction pure : l'instant de rendu est un paramètre.
 */

use crate::models::{HostState, HostStatus};
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

pub const PANEL_TITLE: &str = "Server Login Status";

const SECTIONS: [(HostStatus, &str); 3] = [
    (HostStatus::Occupied, "Occupied"),
    (HostStatus::Free, "Free"),
    (HostStatus::Offline, "Offline"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    PlainText,
    Mrkdwn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextObject {
    #[serde(rename = "type")]
    pub kind: TextKind,
    pub text: String,
}

impl TextObject {
    fn plain(text: &str) -> Self {
        Self { kind: TextKind::PlainText, text: text.to_string() }
    }

    fn mrkdwn(text: String) -> Self {
        Self { kind: TextKind::Mrkdwn, text }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { text: TextObject },
    Context { elements: Vec<TextObject> },
    Section { text: TextObject },
}

impl Block {
    fn section(text: String) -> Self {
        Block::Section { text: TextObject::mrkdwn(text) }
    }

    /// Texte brut du bloc (premier élément pour un contexte)
    pub fn text(&self) -> &str {
        match self {
            Block::Header { text } | Block::Section { text } => &text.text,
            Block::Context { elements } => elements.first().map(|e| e.text.as_str()).unwrap_or(""),
        }
    }
}

/// Message prêt à poster : texte de repli + blocs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelPayload {
    pub text: String,
    pub blocks: Vec<Block>,
}

impl PanelPayload {
    pub fn lines(&self) -> Vec<&str> {
        self.blocks.iter().map(Block::text).collect()
    }
}

pub fn render_panel(states: &[HostState], rendered_at: OffsetDateTime) -> PanelPayload {
    let stamp = rendered_at
        .to_offset(UtcOffset::UTC)
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_default();

    let mut blocks = vec![
        Block::Header { text: TextObject::plain(PANEL_TITLE) },
        Block::Context { elements: vec![TextObject::mrkdwn(format!("*Last update:* {stamp} UTC"))] },
    ];

    for (status, title) in SECTIONS {
        let mut rows = states.iter().filter(|s| s.status == status).peekable();
        if rows.peek().is_none() {
            continue;
        }
        blocks.push(Block::section(format!("*{title}*")));
        blocks.extend(rows.map(|s| Block::section(host_line(s))));
    }

    PanelPayload { text: PANEL_TITLE.to_string(), blocks }
}

fn host_line(state: &HostState) -> String {
    let label = state.display_label();
    match state.status {
        HostStatus::Occupied => format!("🟢 *{label}* — `{}`", state.last_users.join(", ")),
        HostStatus::Free => format!("⚪ {label}"),
        HostStatus::Offline => format!("🔴 {label} (offline)"),
    }
}
