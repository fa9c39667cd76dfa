use std::time::Duration;

use reqwest::{Client, Request, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::HttpSettings;
use crate::error::{AppError, AppResult, is_retryable_status};

const MAX_BACKOFF: Duration = Duration::from_secs(10);
const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// A fully read response. The body is buffered so callers can inspect it freely.
#[derive(Debug)]
pub struct HttpResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl HttpResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// At most `limit` bytes of the body, cut on a character boundary.
    pub fn text_limited(&self, limit: usize) -> String {
        let mut end = self.body.len().min(limit);
        let text = loop {
            match std::str::from_utf8(&self.body[..end]) {
                Ok(text) => break text,
                Err(err) if err.error_len().is_none() => end = err.valid_up_to(),
                Err(_) => return String::from_utf8_lossy(&self.body[..end]).trim().to_string(),
            }
        };
        text.trim().to_string()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Shared transport: one connection pool, timeout and retry policy for every channel.
pub struct HttpClient {
    client: Client,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| AppError::Configuration(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            max_retries: settings.max_retries,
            retry_base_delay: settings.retry_base_delay,
        })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Sends `request`, retrying network failures and 429/5xx responses with
    /// exponential backoff. Other statuses, 4xx included, are returned as-is.
    pub async fn send(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> AppResult<HttpResponse> {
        self.send_limited(request, DEFAULT_MAX_BODY_BYTES, cancel).await
    }

    /// Like [`HttpClient::send`], but stops reading once the body passes
    /// `max_body_bytes`.
    pub async fn send_limited(
        &self,
        request: RequestBuilder,
        max_body_bytes: usize,
        cancel: &CancellationToken,
    ) -> AppResult<HttpResponse> {
        let request = request
            .build()
            .map_err(|err| AppError::Transport(format!("invalid request: {err}")))?;
        let host = request.url().host_str().unwrap_or("unknown host").to_string();

        let mut attempt: u32 = 0;
        loop {
            let current = request.try_clone().ok_or_else(|| {
                AppError::Transport("request body cannot be replayed".to_string())
            })?;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(AppError::Cancelled(format!("request to {host} was cancelled")));
                }
                outcome = self.execute(current, max_body_bytes) => outcome,
            };

            match outcome {
                Ok(response)
                    if is_retryable_status(response.status.as_u16())
                        && attempt < self.max_retries =>
                {
                    warn!(%host, status = %response.status, attempt, "retryable response");
                }
                Ok(response) => {
                    debug!(%host, status = %response.status, "request completed");
                    return Ok(response);
                }
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    warn!(%host, error = %err, attempt, "request failed, retrying");
                }
                Err(AppError::Transport(reason)) => {
                    return Err(AppError::Transport(format!(
                        "request to {host} failed after {} attempts: {reason}",
                        attempt + 1
                    )));
                }
                Err(err) => return Err(err),
            }

            attempt += 1;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(AppError::Cancelled(format!("request to {host} was cancelled")));
                }
                _ = tokio::time::sleep(self.backoff(attempt)) => {}
            }
        }
    }

    async fn execute(&self, request: Request, max_body_bytes: usize) -> AppResult<HttpResponse> {
        let mut response = self
            .client
            .execute(request)
            .await
            .map_err(|err| AppError::Transport(err.to_string()))?;
        let status = response.status();

        let too_large = || AppError::ResponseTooLarge {
            limit: max_body_bytes,
        };
        if response
            .content_length()
            .is_some_and(|length| length > max_body_bytes as u64)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| AppError::Transport(err.to_string()))?
        {
            if body.len() + chunk.len() > max_body_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(HttpResponse { status, body })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}
