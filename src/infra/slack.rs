use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::SlackConfig;
use crate::domain::blocks::{Block, DEFAULT_HEADER, MessageFormatter};
use crate::domain::ticket::{TicketReceipt, TicketRequest};
use crate::error::{AppError, AppResult};
use crate::infra::http::HttpClient;
use crate::services::{Capability, NotificationChannel};

const ERROR_BODY_LIMIT: usize = 1024;
const SHORT_HEADER_CHARS: usize = 50;
const TICKET_HEADER_PREFIX: &str = "【Ticket】";

/// Tickets are accepted and posted as a formatted message.
const CAPABILITIES: &[Capability] = &[
    Capability::PlainText,
    Capability::Header,
    Capability::Ticket,
];

/// Slack incoming-webhook channel rendering messages as Block Kit.
pub struct SlackChannel {
    http: Arc<HttpClient>,
    webhook_url: String,
    username: Option<String>,
    icon_emoji: Option<String>,
    channel: Option<String>,
}

impl SlackChannel {
    pub fn new(http: Arc<HttpClient>, config: SlackConfig) -> Self {
        Self {
            http,
            webhook_url: config.webhook_url,
            username: config.username,
            icon_emoji: config.icon_emoji,
            channel: config.channel,
        }
    }

    fn webhook_message<'a>(&'a self, header: &'a str, blocks: Vec<Block>) -> WebhookMessage<'a> {
        WebhookMessage {
            text: header,
            username: self.username.as_deref(),
            icon_emoji: self.icon_emoji.as_deref(),
            channel: self.channel.as_deref(),
            blocks,
        }
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn send_text(&self, message: &str, cancel: &CancellationToken) -> AppResult<()> {
        let header = short_header(message);
        self.send_with_header(&header, message, cancel).await
    }

    async fn send_with_header(
        &self,
        header: &str,
        body: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let blocks = MessageFormatter::format(header, body);
        let fallback = blocks
            .first()
            .and_then(Block::text)
            .unwrap_or(DEFAULT_HEADER)
            .to_string();
        let payload = self.webhook_message(&fallback, blocks);

        let request = self
            .http
            .post(&self.webhook_url)
            .header(CONTENT_TYPE, "application/json")
            .json(&payload);
        let response = self.http.send(request, cancel).await?;

        if response.status() != StatusCode::OK {
            return Err(AppError::Delivery {
                status: response.status().as_u16(),
                body: response.text_limited(ERROR_BODY_LIMIT),
            });
        }

        info!("Slack message delivered");
        Ok(())
    }

    async fn send_ticket(
        &self,
        ticket: &TicketRequest,
        cancel: &CancellationToken,
    ) -> AppResult<TicketReceipt> {
        let header = format!("{TICKET_HEADER_PREFIX}{}", ticket.summary);
        self.send_with_header(&header, &ticket.description, cancel)
            .await?;
        Ok(TicketReceipt::default())
    }
}

/// First line of `message`, cut to 50 characters, for messages sent without a header.
pub fn short_header(message: &str) -> String {
    let first_line = message.lines().next().unwrap_or_default().trim();
    if first_line.is_empty() {
        return DEFAULT_HEADER.to_string();
    }
    if first_line.chars().count() > SHORT_HEADER_CHARS {
        let head: String = first_line.chars().take(SHORT_HEADER_CHARS).collect();
        return format!("{head}...");
    }
    first_line.to_string()
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_emoji: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    blocks: Vec<Block>,
}
