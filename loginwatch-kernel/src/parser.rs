/**
 * PARSER - Extraction des utilisateurs humains depuis la sortie des commandes de session
 *
 * RÔLE : Fonction pure, sortie brute (who --ips / who / users) -> liste triée de logins.
 * Ne peut pas échouer : texte vide => liste vide.
 */

use std::collections::BTreeSet;

/// Comptes système jamais considérés comme des sessions interactives
pub const IGNORED_ACCOUNTS: [&str; 3] = ["gdm", "lightdm", "login"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandVariant {
    WhoIps,
    Who,
    Users,
}

impl CommandVariant {
    /// Ordre d'essai des commandes sur l'hôte distant
    pub const PROBE_ORDER: [CommandVariant; 3] =
        [CommandVariant::WhoIps, CommandVariant::Who, CommandVariant::Users];

    pub fn command_line(&self) -> &'static str {
        match self {
            CommandVariant::WhoIps => "who --ips",
            CommandVariant::Who => "who",
            CommandVariant::Users => "users",
        }
    }

    pub fn from_command(cmd: &str) -> Option<Self> {
        Self::PROBE_ORDER.into_iter().find(|v| v.command_line() == cmd.trim())
    }
}

pub fn parse_users(variant: CommandVariant, raw: &str) -> Vec<String> {
    let candidates: Vec<&str> = match variant {
        // une session par ligne, login en premier champ
        CommandVariant::WhoIps | CommandVariant::Who => raw
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .collect(),
        // tous les logins sur une ligne, séparés par des espaces
        CommandVariant::Users => raw.split_whitespace().collect(),
    };

    candidates
        .into_iter()
        .filter(|u| !IGNORED_ACCOUNTS.contains(u))
        .map(str::to_string)
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}
