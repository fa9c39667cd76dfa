use std::env;
use std::time::Duration;

use tracing::warn;

use crate::domain::ticket::AttributePreferences;
use crate::error::{AppError, AppResult};

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub slack: Option<SlackConfig>,
    pub backlog: Option<BacklogConfig>,
    pub default_project: Option<String>,
    pub preferences: AttributePreferences,
    pub http: HttpSettings,
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub webhook_url: String,
    pub username: Option<String>,
    pub icon_emoji: Option<String>,
    pub channel: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BacklogConfig {
    pub space_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

impl AppConfig {
    /// Reads the process environment, after merging an optional `.env` file.
    pub fn load() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let slack = value("SLACK_WEBHOOK_URL").map(|webhook_url| SlackConfig {
            webhook_url,
            username: value("SLACK_USERNAME"),
            icon_emoji: value("SLACK_ICON_EMOJI"),
            channel: value("SLACK_CHANNEL"),
        });

        let space_url = value("BACKLOG_SPACE_URL").or_else(|| value("BACKLOG_BASE_URL"));
        let backlog = match (space_url, value("BACKLOG_API_KEY")) {
            (Some(space_url), Some(api_key)) => Some(BacklogConfig { space_url, api_key }),
            (None, None) => None,
            (Some(_), None) => {
                warn!("BACKLOG_API_KEY is not set; the Backlog channel is disabled");
                None
            }
            (None, Some(_)) => {
                warn!("BACKLOG_SPACE_URL is not set; the Backlog channel is disabled");
                None
            }
        };

        let defaults = AttributePreferences::default();
        let preferences = AttributePreferences {
            issue_type: value("BACKLOG_ISSUE_TYPE_NAME").unwrap_or(defaults.issue_type),
            priority: value("BACKLOG_PRIORITY_NAME").unwrap_or(defaults.priority),
        };

        let mut http = HttpSettings::default();
        if let Some(raw) = value("NOTIFIER_TIMEOUT_SECS") {
            http.timeout = Duration::from_secs(parse_number("NOTIFIER_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = value("NOTIFIER_MAX_RETRIES") {
            http.max_retries = parse_number("NOTIFIER_MAX_RETRIES", &raw)?;
        }

        Ok(Self {
            slack,
            backlog,
            default_project: value("BACKLOG_PROJECT_ID"),
            preferences,
            http,
        })
    }

    pub fn with_timeout(mut self, timeout_secs: Option<u64>) -> Self {
        if let Some(secs) = timeout_secs {
            self.http.timeout = Duration::from_secs(secs);
        }
        self
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> AppResult<T> {
    raw.parse::<T>().map_err(|_| {
        AppError::Configuration(format!("{key} must be a non-negative integer, got '{raw}'"))
    })
}
