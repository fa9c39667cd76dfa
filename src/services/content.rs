use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Fetches `url` and returns its readable text.
    async fn extract(&self, url: &str, cancel: &CancellationToken) -> AppResult<String>;
}
