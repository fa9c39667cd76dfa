use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{AppError, AppResult};

static ISSUE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*-[0-9]+$").expect("Invalid issue key regex"));

/// Caller-supplied overrides; missing ids are discovered from the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketOptions {
    pub issue_type_id: Option<i64>,
    pub priority_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct TicketRequest {
    pub summary: String,
    pub description: String,
    pub project_id: i64,
    pub options: TicketOptions,
}

/// Fully resolved identifiers for a ticket creation call. All ids are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketAttributes {
    pub project_id: i64,
    pub issue_type_id: i64,
    pub priority_id: i64,
}

impl TicketAttributes {
    pub fn new(project_id: i64, issue_type_id: i64, priority_id: i64) -> AppResult<Self> {
        ensure_positive("project id", project_id)?;
        ensure_positive("issue type id", issue_type_id)?;
        ensure_positive("priority id", priority_id)?;
        Ok(Self {
            project_id,
            issue_type_id,
            priority_id,
        })
    }
}

pub fn ensure_positive(field: &str, value: i64) -> AppResult<()> {
    if value <= 0 {
        return Err(AppError::Validation(format!(
            "{field} must be positive, got {value}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketReceipt {
    pub issue_key: Option<String>,
    pub url: Option<String>,
}

/// How a caller names the target project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    Id(i64),
    Key(String),
}

impl ProjectRef {
    pub fn parse(value: &str) -> AppResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::Validation(
                "project must not be empty".to_string(),
            ));
        }
        match value.parse::<i64>() {
            Ok(id) => {
                ensure_positive("project id", id)?;
                Ok(ProjectRef::Id(id))
            }
            Err(_) => Ok(ProjectRef::Key(value.to_string())),
        }
    }
}

/// An issue key of the form `PROJECT-123`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueKey(String);

impl IssueKey {
    pub fn parse(value: &str) -> AppResult<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::Validation(
                "issue key must not be empty".to_string(),
            ));
        }
        if !ISSUE_KEY_RE.is_match(value) {
            return Err(AppError::Validation(format!(
                "issue key '{value}' must look like PROJECT-123"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Labels looked for first when the caller does not pin issue type or priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePreferences {
    pub issue_type: String,
    pub priority: String,
}

impl Default for AttributePreferences {
    fn default() -> Self {
        Self {
            issue_type: "Task".to_string(),
            priority: "Medium".to_string(),
        }
    }
}

/// An `{ id, name }` entry from the tracker's metadata endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedEntry {
    pub id: i64,
    pub name: String,
}

/// Picks the entry named `preferred`, else the first entry returned.
pub fn select_preferred(kind: &str, entries: &[NamedEntry], preferred: &str) -> AppResult<i64> {
    entries
        .iter()
        .find(|entry| entry.name == preferred)
        .or_else(|| entries.first())
        .map(|entry| entry.id)
        .ok_or_else(|| AppError::AttributeNotFound(format!("tracker returned no {kind} entries")))
}
