use clap::{Args, Subcommand};

use crate::config::AppConfig;
use crate::error::AppResult;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Show the effective configuration (secrets masked).
    Show,
}

pub fn run(config: &AppConfig, command: ConfigCommand) -> AppResult<()> {
    match command {
        ConfigCommand::Show => {
            for (label, value) in describe(config) {
                println!("{label}: {value}");
            }
            Ok(())
        }
    }
}

fn describe(config: &AppConfig) -> Vec<(&'static str, String)> {
    let slack = config.slack.as_ref();
    let backlog = config.backlog.as_ref();

    vec![
        (
            "Slack webhook URL",
            mask_secret(slack.map(|s| s.webhook_url.as_str())),
        ),
        (
            "Slack username",
            display_value(slack.and_then(|s| s.username.as_deref())),
        ),
        (
            "Slack icon emoji",
            display_value(slack.and_then(|s| s.icon_emoji.as_deref())),
        ),
        (
            "Slack channel",
            display_value(slack.and_then(|s| s.channel.as_deref())),
        ),
        (
            "Backlog space URL",
            display_value(backlog.map(|b| b.space_url.as_str())),
        ),
        (
            "Backlog API key",
            mask_secret(backlog.map(|b| b.api_key.as_str())),
        ),
        (
            "Default project",
            display_value(config.default_project.as_deref()),
        ),
        ("Preferred issue type", config.preferences.issue_type.clone()),
        ("Preferred priority", config.preferences.priority.clone()),
        ("Timeout", format!("{}s", config.http.timeout.as_secs())),
        ("Max retries", config.http.max_retries.to_string()),
    ]
}

fn display_value(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<not set>".to_string())
}

fn mask_secret(value: Option<&str>) -> String {
    match value {
        Some(secret) if secret.chars().count() > 6 => {
            let chars: Vec<char> = secret.chars().collect();
            let prefix: String = chars[..3].iter().collect();
            let suffix: String = chars[chars.len() - 3..].iter().collect();
            format!("{prefix}***{suffix}")
        }
        Some(secret) if !secret.is_empty() => "***".to_string(),
        _ => "<not set>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_secrets() {
        assert_eq!(mask_secret(Some("abcdefghij")), "abc***hij");
        assert_eq!(mask_secret(Some("short")), "***");
        assert_eq!(mask_secret(None), "<not set>");
    }

    #[test]
    fn shows_defaults_for_an_empty_environment() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        let lines = describe(&config);

        let lookup = |label: &str| {
            lines
                .iter()
                .find(|(l, _)| *l == label)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(lookup("Backlog API key"), "<not set>");
        assert_eq!(lookup("Preferred issue type"), "Task");
        assert_eq!(lookup("Timeout"), "60s");
    }
}
