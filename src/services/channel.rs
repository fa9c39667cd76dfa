use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::ticket::{IssueKey, TicketReceipt, TicketRequest};
use crate::error::{AppError, AppResult};

/// Operations a channel can perform natively or through a documented fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    PlainText,
    Header,
    Ticket,
    Comment,
}

/// A notification backend driven through one uniform contract.
///
/// Callers branch on [`Capability`], never on the concrete backend.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> &'static [Capability];

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    async fn send_text(&self, message: &str, cancel: &CancellationToken) -> AppResult<()>;

    async fn send_with_header(
        &self,
        header: &str,
        body: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()>;

    async fn send_ticket(
        &self,
        ticket: &TicketRequest,
        cancel: &CancellationToken,
    ) -> AppResult<TicketReceipt>;

    async fn post_comment(
        &self,
        _issue_key: &IssueKey,
        _content: &str,
        _cancel: &CancellationToken,
    ) -> AppResult<()> {
        Err(AppError::Unsupported(format!(
            "{} cannot post comments",
            self.name()
        )))
    }
}
