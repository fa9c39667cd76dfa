use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::infra::backlog::BacklogChannel;
use crate::infra::emoji::EmojiStripper;
use crate::infra::http::HttpClient;
use crate::infra::slack::SlackChannel;
use crate::infra::web::WebExtractor;
use crate::services::NotificationChannel;
use crate::workflow::notify::ContentNotifier;

/// Configuration plus the one transport every channel shares.
#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub http: Arc<HttpClient>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let http = Arc::new(HttpClient::new(&config.http)?);
        Ok(Self { config, http })
    }

    pub fn slack(&self) -> Option<SlackChannel> {
        self.config
            .slack
            .clone()
            .map(|slack| SlackChannel::new(self.http.clone(), slack))
    }

    pub fn backlog(&self) -> Option<BacklogChannel> {
        self.config.backlog.clone().map(|backlog| {
            BacklogChannel::new(
                self.http.clone(),
                backlog,
                self.config.preferences.clone(),
                Arc::new(EmojiStripper),
            )
        })
    }

    pub fn require_slack(&self) -> AppResult<SlackChannel> {
        self.slack().ok_or_else(|| {
            AppError::Configuration("SLACK_WEBHOOK_URL is not set".to_string())
        })
    }

    pub fn require_backlog(&self) -> AppResult<BacklogChannel> {
        self.backlog().ok_or_else(|| {
            AppError::Configuration(
                "BACKLOG_SPACE_URL and BACKLOG_API_KEY must both be set".to_string(),
            )
        })
    }

    /// Every configured channel, chat first, behind one dispatcher.
    pub fn notifier(&self) -> AppResult<ContentNotifier> {
        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
        if let Some(slack) = self.slack() {
            channels.push(Arc::new(slack));
        }
        if let Some(backlog) = self.backlog() {
            channels.push(Arc::new(backlog));
        }

        let extractor = Arc::new(WebExtractor::new(self.http.clone()));
        ContentNotifier::new(channels, extractor)
    }
}
