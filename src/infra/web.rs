use std::sync::Arc;

use async_trait::async_trait;
use htmd::HtmlToMarkdown;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::infra::http::HttpClient;
use crate::services::ContentExtractor;

const MAX_PAGE_BYTES: usize = 5 * 1024 * 1024;
const HIDDEN_TAGS: [&str; 5] = ["script", "style", "noscript", "head", "template"];

/// Fetches a page through the shared transport and reduces it to plain text.
pub struct WebExtractor {
    http: Arc<HttpClient>,
}

impl WebExtractor {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ContentExtractor for WebExtractor {
    async fn extract(&self, url: &str, cancel: &CancellationToken) -> AppResult<String> {
        let response = self
            .http
            .send_limited(self.http.get(url), MAX_PAGE_BYTES, cancel)
            .await
            .map_err(|err| match err {
                AppError::Cancelled(_) => err,
                other => AppError::Extraction(format!("failed to fetch {url}: {other}")),
            })?;

        if !response.is_success() {
            return Err(AppError::Extraction(format!(
                "{url} responded with {}",
                response.status()
            )));
        }

        let text = html_to_text(&response.text_limited(MAX_PAGE_BYTES))?;
        if text.is_empty() {
            return Err(AppError::Extraction(format!(
                "{url} contains no readable text"
            )));
        }

        debug!(url, chars = text.chars().count(), "extracted page text");
        Ok(text)
    }
}

/// Renders a page as markdown, then collapses runs of blank lines.
pub fn html_to_text(html: &str) -> AppResult<String> {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(HIDDEN_TAGS.to_vec())
        .build();
    let markdown = converter
        .convert(html)
        .map_err(|err| AppError::Extraction(format!("failed to convert HTML: {err}")))?;

    let mut lines: Vec<&str> = Vec::new();
    for line in markdown.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            if lines.last().is_none_or(|last| last.is_empty()) {
                continue;
            }
            lines.push("");
        } else {
            lines.push(line);
        }
    }
    while lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }
    Ok(lines.join("\n"))
}
