use std::fmt;
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("lookup error: {0}")]
    Lookup(String),
    #[error("attribute not found: {0}")]
    AttributeNotFound(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
    #[error("delivery failed with status {status}: {body}")]
    Delivery { status: u16, body: String },
    #[error("{}", tracker_api_message(.status, .code, .message))]
    TrackerApi {
        status: u16,
        code: Option<i64>,
        message: String,
    },
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("response body exceeded {limit} bytes")]
    ResponseTooLarge { limit: usize },
    #[error("content extraction failed: {0}")]
    Extraction(String),
    #[error(transparent)]
    PartialFailure(#[from] MultiError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl AppError {
    /// HTTP status reported by the remote side, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Delivery { status, .. } | AppError::TrackerApi { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// 4xx responses are final; network failures, 429 and 5xx may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Transport(_) => true,
            _ => self.status().is_some_and(is_retryable_status),
        }
    }
}

pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn tracker_api_message(status: &u16, code: &Option<i64>, message: &str) -> String {
    match code {
        Some(code) => format!("tracker API error (status {status}, code {code}): {message}"),
        None => format!("tracker API error (status {status}): {message}"),
    }
}

#[derive(Debug)]
pub struct ChannelFailure {
    pub channel: String,
    pub error: AppError,
}

/// Every channel failure from one dispatch, in registration order.
#[derive(Debug, Default)]
pub struct MultiError {
    failures: Vec<ChannelFailure>,
}

impl MultiError {
    pub fn push(&mut self, channel: impl Into<String>, error: AppError) {
        self.failures.push(ChannelFailure {
            channel: channel.into(),
            error,
        });
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[ChannelFailure] {
        &self.failures
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "no errors");
        }
        writeln!(f, "{} errors occurred:", self.len())?;
        for (index, failure) in self.failures().iter().enumerate() {
            writeln!(f, "  [{}] {}: {}", index + 1, failure.channel, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

pub type AppResult<T> = Result<T, AppError>;
