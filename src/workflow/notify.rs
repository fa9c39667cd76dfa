use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::message::Message;
use crate::domain::ticket::{TicketOptions, TicketReceipt, TicketRequest};
use crate::error::{AppError, AppResult, MultiError};
use crate::services::{Capability, ContentExtractor, NotificationChannel};

/// How a message should land on each channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Text,
    Ticket(TicketTarget),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketTarget {
    pub project_id: i64,
    pub options: TicketOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub channel: String,
    pub receipt: Option<TicketReceipt>,
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub delivered: Vec<Delivered>,
}

/// Fans one message out to every configured channel.
///
/// Channels run one after another in registration order. A failing channel
/// never stops the others; all failures come back together as
/// [`AppError::PartialFailure`].
pub struct ContentNotifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
    extractor: Arc<dyn ContentExtractor>,
}

impl ContentNotifier {
    pub fn new(
        channels: Vec<Arc<dyn NotificationChannel>>,
        extractor: Arc<dyn ContentExtractor>,
    ) -> AppResult<Self> {
        if channels.is_empty() {
            return Err(AppError::Configuration(
                "no notification channel is configured".to_string(),
            ));
        }
        for channel in &channels {
            info!(channel = channel.name(), "registered notification channel");
        }
        Ok(Self {
            channels,
            extractor,
        })
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|channel| channel.name()).collect()
    }

    /// Extracts `url` and dispatches the result. Extraction failure aborts
    /// before any channel is contacted.
    pub async fn notify_from_url(
        &self,
        url: &str,
        delivery: &Delivery,
        cancel: &CancellationToken,
    ) -> AppResult<DispatchReport> {
        let text = self
            .extractor
            .extract(url, cancel)
            .await
            .map_err(|err| match err {
                AppError::Extraction(_) | AppError::Cancelled(_) => err,
                other => AppError::Extraction(format!("{url}: {other}")),
            })?;

        let message = Message::from_extracted(url, &text);
        self.dispatch(&message, delivery, cancel).await
    }

    pub async fn dispatch(
        &self,
        message: &Message,
        delivery: &Delivery,
        cancel: &CancellationToken,
    ) -> AppResult<DispatchReport> {
        let mut report = DispatchReport::default();
        let mut failures = MultiError::default();

        for channel in &self.channels {
            let name = channel.name();

            if cancel.is_cancelled() {
                warn!(channel = name, "dispatch cancelled, skipping channel");
                failures.push(
                    name,
                    AppError::Cancelled(
                        "dispatch cancelled before this channel ran".to_string(),
                    ),
                );
                continue;
            }

            match deliver(channel.as_ref(), message, delivery, cancel).await {
                Ok(receipt) => {
                    info!(channel = name, "notification delivered");
                    report.delivered.push(Delivered {
                        channel: name.to_string(),
                        receipt,
                    });
                }
                Err(err) => {
                    warn!(
                        channel = name,
                        error = %err,
                        retryable = err.is_retryable(),
                        "notification failed"
                    );
                    failures.push(name, err);
                }
            }
        }

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(AppError::PartialFailure(failures))
        }
    }
}

async fn deliver(
    channel: &dyn NotificationChannel,
    message: &Message,
    delivery: &Delivery,
    cancel: &CancellationToken,
) -> AppResult<Option<TicketReceipt>> {
    match delivery {
        Delivery::Ticket(target) if channel.supports(Capability::Ticket) => {
            let ticket = TicketRequest {
                summary: message.title().to_string(),
                description: message.body().to_string(),
                project_id: target.project_id,
                options: target.options,
            };
            channel.send_ticket(&ticket, cancel).await.map(Some)
        }
        _ => channel
            .send_with_header(message.title(), message.body(), cancel)
            .await
            .map(|()| None),
    }
}
