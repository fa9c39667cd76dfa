use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::BacklogConfig;
use crate::domain::ticket::{
    AttributePreferences, IssueKey, NamedEntry, TicketAttributes, TicketReceipt, TicketRequest,
    ensure_positive, select_preferred,
};
use crate::error::{AppError, AppResult};
use crate::infra::http::{HttpClient, HttpResponse};
use crate::services::{Capability, NotificationChannel, TextSanitizer};

const API_VERSION_PATH: &str = "/api/v2";
const API_KEY_HEADER: &str = "X-Api-Key";
const ERROR_BODY_LIMIT: usize = 4096;
const CAPABILITIES: &[Capability] = &[Capability::Ticket, Capability::Comment];

/// Backlog issue tracker. Accepts structured tickets and comments only.
pub struct BacklogChannel {
    http: Arc<HttpClient>,
    space_url: String,
    api_url: String,
    api_key: String,
    preferences: AttributePreferences,
    sanitizer: Arc<dyn TextSanitizer>,
}

impl BacklogChannel {
    pub fn new(
        http: Arc<HttpClient>,
        config: BacklogConfig,
        preferences: AttributePreferences,
        sanitizer: Arc<dyn TextSanitizer>,
    ) -> Self {
        let api_url = normalize_base_url(&config.space_url);
        let space_url = api_url
            .strip_suffix(API_VERSION_PATH)
            .unwrap_or(&api_url)
            .to_string();
        Self {
            http,
            space_url,
            api_url,
            api_key: config.api_key,
            preferences,
            sanitizer,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = Url::parse(&self.api_url).map_err(|err| {
            AppError::Configuration(format!("invalid Backlog URL '{}': {err}", self.api_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                AppError::Configuration(format!("Backlog URL '{}' cannot be a base", self.api_url))
            })?
            .extend(segments);
        Ok(url)
    }

    fn view_url(&self, issue_key: &str) -> String {
        format!("{}/view/{issue_key}", self.space_url)
    }

    pub async fn resolve_project_id(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> AppResult<i64> {
        let key = key.trim();
        if key.is_empty() {
            return Err(AppError::Lookup("project key must not be empty".to_string()));
        }

        let url = self.endpoint(&["projects", key])?;
        let response = self
            .get(url, cancel)
            .await
            .map_err(|err| into_lookup(format!("project '{key}' lookup failed"), err))?;

        let project: BacklogProject = response.json().map_err(|err| {
            AppError::Lookup(format!("failed to parse project '{key}' response: {err}"))
        })?;
        if project.id == 0 {
            return Err(AppError::Lookup(format!(
                "project '{key}' resolved to id 0"
            )));
        }

        debug!(
            key,
            project_key = ?project.project_key,
            name = ?project.name,
            id = project.id,
            "resolved Backlog project"
        );
        Ok(project.id)
    }

    /// Discovers `(issue_type_id, priority_id)`, issue type first.
    pub async fn resolve_attributes(
        &self,
        project_id: i64,
        cancel: &CancellationToken,
    ) -> AppResult<(i64, i64)> {
        let issue_type_id = self.resolve_issue_type(project_id, cancel).await?;
        let priority_id = self.resolve_priority(cancel).await?;
        Ok((issue_type_id, priority_id))
    }

    async fn resolve_issue_type(
        &self,
        project_id: i64,
        cancel: &CancellationToken,
    ) -> AppResult<i64> {
        let url = self.endpoint(&["projects", &project_id.to_string(), "issueTypes"])?;
        let entries = self.fetch_entries("issue type", url, cancel).await?;
        select_preferred("issue type", &entries, &self.preferences.issue_type)
    }

    async fn resolve_priority(&self, cancel: &CancellationToken) -> AppResult<i64> {
        let url = self.endpoint(&["priorities"])?;
        let entries = self.fetch_entries("priority", url, cancel).await?;
        select_preferred("priority", &entries, &self.preferences.priority)
    }

    async fn fetch_entries(
        &self,
        kind: &str,
        url: Url,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<NamedEntry>> {
        let response = self
            .get(url, cancel)
            .await
            .map_err(|err| into_lookup(format!("{kind} list request failed"), err))?;
        response
            .json()
            .map_err(|err| AppError::Lookup(format!("failed to parse {kind} list: {err}")))
    }

    async fn get(&self, url: Url, cancel: &CancellationToken) -> AppResult<HttpResponse> {
        let request = self
            .http
            .get(url.as_str())
            .header(API_KEY_HEADER, &self.api_key)
            .header(ACCEPT, "application/json");
        let response = self.http.send(request, cancel).await?;
        if !response.is_success() {
            return Err(tracker_error(&response));
        }
        Ok(response)
    }

    async fn post<T: Serialize>(
        &self,
        url: Url,
        body: &T,
        cancel: &CancellationToken,
    ) -> AppResult<HttpResponse> {
        let request = self
            .http
            .post(url.as_str())
            .header(API_KEY_HEADER, &self.api_key)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        let response = self.http.send(request, cancel).await?;
        if !response.is_success() {
            return Err(tracker_error(&response));
        }
        Ok(response)
    }
}

#[async_trait]
impl NotificationChannel for BacklogChannel {
    fn name(&self) -> &str {
        "backlog"
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    async fn send_text(&self, _message: &str, _cancel: &CancellationToken) -> AppResult<()> {
        Err(unsupported_free_text())
    }

    async fn send_with_header(
        &self,
        _header: &str,
        _body: &str,
        _cancel: &CancellationToken,
    ) -> AppResult<()> {
        Err(unsupported_free_text())
    }

    async fn send_ticket(
        &self,
        ticket: &TicketRequest,
        cancel: &CancellationToken,
    ) -> AppResult<TicketReceipt> {
        ensure_positive("project id", ticket.project_id)?;
        if let Some(id) = ticket.options.issue_type_id {
            ensure_positive("issue type id", id)?;
        }
        if let Some(id) = ticket.options.priority_id {
            ensure_positive("priority id", id)?;
        }

        let summary = self.sanitizer.sanitize(&ticket.summary);
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(AppError::Validation(
                "ticket summary must not be empty".to_string(),
            ));
        }
        let description = self.sanitizer.sanitize(&ticket.description);

        let (issue_type_id, priority_id) =
            match (ticket.options.issue_type_id, ticket.options.priority_id) {
                (Some(issue_type_id), Some(priority_id)) => (issue_type_id, priority_id),
                (None, None) => self.resolve_attributes(ticket.project_id, cancel).await?,
                (Some(issue_type_id), None) => {
                    (issue_type_id, self.resolve_priority(cancel).await?)
                }
                (None, Some(priority_id)) => (
                    self.resolve_issue_type(ticket.project_id, cancel).await?,
                    priority_id,
                ),
            };
        let attributes = TicketAttributes::new(ticket.project_id, issue_type_id, priority_id)?;

        let payload = CreateIssueRequest::new(&attributes, summary, description.trim());
        let response = self.post(self.endpoint(&["issues"])?, &payload, cancel).await?;

        let issue_key = response
            .json::<CreateIssueResponse>()
            .ok()
            .map(|created| created.issue_key);
        info!(
            project_id = attributes.project_id,
            issue_key = issue_key.as_deref().unwrap_or("<unknown>"),
            "Backlog issue created"
        );

        Ok(TicketReceipt {
            url: issue_key.as_deref().map(|key| self.view_url(key)),
            issue_key,
        })
    }

    async fn post_comment(
        &self,
        issue_key: &IssueKey,
        content: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let content = self.sanitizer.sanitize(content);
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation(
                "comment content must not be empty".to_string(),
            ));
        }

        let url = self.endpoint(&["issues", issue_key.as_str(), "comments"])?;
        self.post(url, &CommentRequest { content }, cancel).await?;

        info!(issue_key = issue_key.as_str(), "Backlog comment posted");
        Ok(())
    }
}

/// Trims trailing slashes and any existing `/api/v2`, then appends exactly one `/api/v2`.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let base = trimmed
        .strip_suffix(API_VERSION_PATH)
        .unwrap_or(trimmed)
        .trim_end_matches('/');
    format!("{base}{API_VERSION_PATH}")
}

fn tracker_error(response: &HttpResponse) -> AppError {
    let status = response.status().as_u16();
    if let Ok(parsed) = response.json::<BacklogErrorResponse>() {
        if let Some(first) = parsed.errors.into_iter().next() {
            return AppError::TrackerApi {
                status,
                code: Some(first.code),
                message: first.message,
            };
        }
    }
    AppError::TrackerApi {
        status,
        code: None,
        message: response.text_limited(ERROR_BODY_LIMIT),
    }
}

fn into_lookup(context: String, err: AppError) -> AppError {
    match err {
        AppError::Cancelled(_) => err,
        other => AppError::Lookup(format!("{context}: {other}")),
    }
}

fn unsupported_free_text() -> AppError {
    AppError::Unsupported(
        "Backlog does not accept free text; use a ticket or a comment instead".to_string(),
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateIssueRequest<'a> {
    project_id: i64,
    summary: &'a str,
    description: &'a str,
    issue_type_id: i64,
    priority_id: i64,
}

impl<'a> CreateIssueRequest<'a> {
    fn new(attributes: &TicketAttributes, summary: &'a str, description: &'a str) -> Self {
        Self {
            project_id: attributes.project_id,
            summary,
            description,
            issue_type_id: attributes.issue_type_id,
            priority_id: attributes.priority_id,
        }
    }
}

#[derive(Serialize)]
struct CommentRequest<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateIssueResponse {
    issue_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BacklogProject {
    id: i64,
    project_key: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct BacklogErrorResponse {
    errors: Vec<BacklogErrorDetail>,
}

#[derive(Deserialize)]
struct BacklogErrorDetail {
    message: String,
    code: i64,
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::domain::ticket::TicketOptions;
    use crate::infra::emoji::EmojiStripper;
    use crate::infra::http::tests::fast_client;

    fn backlog(server: &MockServer) -> BacklogChannel {
        BacklogChannel::new(
            Arc::new(fast_client(0)),
            BacklogConfig {
                space_url: server.base_url(),
                api_key: "secret-key".to_string(),
            },
            AttributePreferences::default(),
            Arc::new(EmojiStripper),
        )
    }

    fn ticket(project_id: i64, options: TicketOptions) -> TicketRequest {
        TicketRequest {
            summary: "Deploy 🚀 failed".to_string(),
            description: "See the pipeline log ✅".to_string(),
            project_id,
            options,
        }
    }

    #[test]
    fn normalizes_base_urls() {
        for raw in [
            "https://space.example.com",
            "https://space.example.com/",
            "https://space.example.com/api/v2",
            "https://space.example.com/api/v2/",
            "https://space.example.com//",
        ] {
            assert_eq!(normalize_base_url(raw), "https://space.example.com/api/v2");
        }
    }

    #[tokio::test]
    async fn resolves_project_ids() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v2/projects/PROJ")
                    .header("X-Api-Key", "secret-key");
                then.status(200)
                    .json_body(json!({"id": 12, "projectKey": "PROJ", "name": "Project"}));
            })
            .await;

        let id = backlog(&server)
            .resolve_project_id("PROJ", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(id, 12);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn project_lookup_failures_are_lookup_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/projects/ZERO");
                then.status(200).json_body(json!({"id": 0, "projectKey": "ZERO"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/projects/GONE");
                then.status(404)
                    .json_body(json!({"errors": [{"message": "No project.", "code": 6}]}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/projects/JUNK");
                then.status(200).body("not json");
            })
            .await;

        let channel = backlog(&server);
        let cancel = CancellationToken::new();
        for key in ["", "ZERO", "GONE", "JUNK"] {
            let err = channel.resolve_project_id(key, &cancel).await.unwrap_err();
            assert!(matches!(err, AppError::Lookup(_)), "{key}: {err}");
        }
    }

    #[tokio::test]
    async fn resolves_preferred_attributes() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/projects/12/issueTypes");
                then.status(200).json_body(json!([
                    {"id": 9, "name": "Bug"},
                    {"id": 5, "name": "Task"}
                ]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/priorities");
                then.status(200).json_body(json!([
                    {"id": 2, "name": "High"},
                    {"id": 3, "name": "Medium"},
                    {"id": 4, "name": "Low"}
                ]));
            })
            .await;

        let resolved = backlog(&server)
            .resolve_attributes(12, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolved, (5, 3));
    }

    #[tokio::test]
    async fn falls_back_to_first_attribute_and_fails_on_empty_lists() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/projects/12/issueTypes");
                then.status(200).json_body(json!([{"id": 9, "name": "Bug"}]));
            })
            .await;
        let priorities = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/priorities");
                then.status(200).json_body(json!([]));
            })
            .await;

        let channel = backlog(&server);
        let cancel = CancellationToken::new();
        assert_eq!(channel.resolve_issue_type(12, &cancel).await.unwrap(), 9);

        let err = channel.resolve_attributes(12, &cancel).await.unwrap_err();
        assert!(matches!(err, AppError::AttributeNotFound(_)));
        priorities.assert_async().await;
    }

    #[tokio::test]
    async fn zero_project_id_fails_without_network_calls() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.path_contains("/");
                then.status(200);
            })
            .await;

        let err = backlog(&server)
            .send_ticket(&ticket(0, TicketOptions::default()), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        any.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn non_positive_attribute_overrides_are_rejected() {
        let server = MockServer::start_async().await;
        let options = TicketOptions {
            issue_type_id: Some(0),
            priority_id: Some(3),
        };
        let err = backlog(&server)
            .send_ticket(&ticket(12, options), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn creates_sanitized_issue_with_supplied_attributes() {
        let server = MockServer::start_async().await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v2/issues")
                    .header("X-Api-Key", "secret-key")
                    .json_body(json!({
                        "projectId": 12,
                        "summary": "Deploy  failed",
                        "description": "See the pipeline log",
                        "issueTypeId": 101,
                        "priorityId": 3
                    }));
                then.status(201)
                    .json_body(json!({"id": 1001, "issueKey": "PROJ-42"}));
            })
            .await;

        let options = TicketOptions {
            issue_type_id: Some(101),
            priority_id: Some(3),
        };
        let receipt = backlog(&server)
            .send_ticket(&ticket(12, options), &CancellationToken::new())
            .await
            .unwrap();

        create.assert_async().await;
        assert_eq!(receipt.issue_key.as_deref(), Some("PROJ-42"));
        assert_eq!(
            receipt.url,
            Some(format!("{}/view/PROJ-42", server.base_url()))
        );
    }

    #[tokio::test]
    async fn creates_issue_with_discovered_attributes() {
        let server = MockServer::start_async().await;
        let issue_types = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/projects/12/issueTypes");
                then.status(200).json_body(json!([{"id": 5, "name": "Task"}]));
            })
            .await;
        let priorities = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/priorities");
                then.status(200).json_body(json!([{"id": 3, "name": "Medium"}]));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v2/issues")
                    .json_body_partial(r#"{"issueTypeId": 5, "priorityId": 3}"#);
                then.status(201).json_body(json!({"issueKey": "PROJ-43"}));
            })
            .await;

        let receipt = backlog(&server)
            .send_ticket(&ticket(12, TicketOptions::default()), &CancellationToken::new())
            .await
            .unwrap();

        issue_types.assert_async().await;
        priorities.assert_async().await;
        create.assert_async().await;
        assert_eq!(receipt.issue_key.as_deref(), Some("PROJ-43"));
    }

    #[tokio::test]
    async fn discovers_only_the_missing_attribute() {
        let server = MockServer::start_async().await;
        let issue_types = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/projects/12/issueTypes");
                then.status(200).json_body(json!([{"id": 8, "name": "Bug"}]));
            })
            .await;
        let priorities = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/priorities");
                then.status(200).json_body(json!([{"id": 3, "name": "Medium"}]));
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v2/issues")
                    .json_body_partial(r#"{"issueTypeId": 8, "priorityId": 2}"#);
                then.status(201).json_body(json!({"issueKey": "PROJ-44"}));
            })
            .await;

        let options = TicketOptions {
            issue_type_id: None,
            priority_id: Some(2),
        };
        backlog(&server)
            .send_ticket(&ticket(12, options), &CancellationToken::new())
            .await
            .unwrap();

        issue_types.assert_async().await;
        priorities.assert_hits_async(0).await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn structured_tracker_errors_are_parsed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/issues");
                then.status(404).json_body(json!({
                    "errors": [{"message": "No project.", "code": 6, "moreInfo": ""}]
                }));
            })
            .await;

        let options = TicketOptions {
            issue_type_id: Some(1),
            priority_id: Some(1),
        };
        let err = backlog(&server)
            .send_ticket(&ticket(12, options), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(!err.is_retryable());
        match err {
            AppError::TrackerApi {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, Some(6));
                assert_eq!(message, "No project.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unstructured_tracker_errors_keep_the_raw_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/issues");
                then.status(404).body("<html>Not Found</html>");
            })
            .await;

        let options = TicketOptions {
            issue_type_id: Some(1),
            priority_id: Some(1),
        };
        let err = backlog(&server)
            .send_ticket(&ticket(12, options), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            AppError::TrackerApi {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, None);
                assert_eq!(message, "<html>Not Found</html>");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn posts_comments() {
        let server = MockServer::start_async().await;
        let comment = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v2/issues/PROJ-42/comments")
                    .header("X-Api-Key", "secret-key")
                    .json_body(json!({"content": "Fixed in release 1.4"}));
                then.status(201).json_body(json!({"id": 77}));
            })
            .await;

        let key = IssueKey::parse("PROJ-42").unwrap();
        backlog(&server)
            .post_comment(&key, "Fixed in release 1.4 🎉", &CancellationToken::new())
            .await
            .unwrap();

        comment.assert_async().await;
    }

    #[tokio::test]
    async fn free_text_is_unsupported() {
        let server = MockServer::start_async().await;
        let channel = backlog(&server);
        let cancel = CancellationToken::new();

        assert!(matches!(
            channel.send_text("hello", &cancel).await.unwrap_err(),
            AppError::Unsupported(_)
        ));
        assert!(matches!(
            channel.send_with_header("hi", "there", &cancel).await.unwrap_err(),
            AppError::Unsupported(_)
        ));
        assert!(channel.supports(Capability::Comment));
        assert!(!channel.supports(Capability::PlainText));
    }
}
