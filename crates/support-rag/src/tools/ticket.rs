use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use super::{IssueTracker, NewIssue, TicketRequest, ToolCallResult, ToolRequest};
use crate::error::ToolError;
use crate::types::ToolCallRequest;

static URL_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-zA-Z][a-zA-Z0-9+.\-]*://[^/]*|(?:www\.)?github\.com)")
        .expect("url prefix regex is valid")
});

/// Runs support-ticket tool calls. Every outcome, including remote failure,
/// comes back as a `ToolCallResult`.
pub struct ToolExecutor {
    tracker: Arc<dyn IssueTracker>,
    labels: Vec<String>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(tracker: Arc<dyn IssueTracker>, labels: Vec<String>, timeout: Duration) -> Self {
        Self {
            tracker,
            labels,
            timeout,
        }
    }

    /// Decode and execute a merged tool call. `None` for tools we don't know.
    pub async fn execute(
        &self,
        call: &ToolCallRequest,
        ticket_token: Option<&str>,
        ticket_repo_id: Option<&str>,
    ) -> Option<ToolCallResult> {
        match ToolRequest::decode(call) {
            Ok(ToolRequest::CreateSupportTicket(request)) => {
                Some(self.run(&request, ticket_token, ticket_repo_id).await)
            }
            Ok(ToolRequest::Unrecognized { name }) => {
                tracing::debug!(
                    tool = %name,
                    call_id = %call.call_id,
                    "Ignoring unrecognized tool call"
                );
                None
            }
            Err(e) => {
                tracing::warn!(call_id = %call.call_id, error = %e, "Rejected tool call arguments");
                Some(ToolCallResult::failure(format!("Failed to create GitHub issue: {}", e)))
            }
        }
    }

    pub async fn run(
        &self,
        request: &TicketRequest,
        ticket_token: Option<&str>,
        ticket_repo_id: Option<&str>,
    ) -> ToolCallResult {
        tracing::info!(summary = %request.issue_summary, "Creating support ticket");

        let (token, repo) = match (ticket_token, ticket_repo_id) {
            (Some(token), Some(repo)) => (token, repo),
            _ => {
                let id = mock_ticket_id(&request.issue_summary);
                tracing::warn!(
                    ticket = %id,
                    "Issue tracker not configured, returning placeholder ticket"
                );
                return ToolCallResult::success(format!(
                    "GitHub configuration missing (set GITHUB_TOKEN and GITHUB_REPO), so no ticket \
                     was filed. Mock Ticket ID: {} (placeholder, not persisted)",
                    id
                ));
            }
        };

        // GitHub requires a title; placeholders do not.
        if request.issue_summary.trim().is_empty() {
            return ToolCallResult::failure(
                "Failed to create GitHub issue: issue_summary is empty",
            );
        }

        let repo = normalize_repo_id(repo);
        if repo.is_empty() {
            return ToolCallResult::failure(
                "Failed to create GitHub issue: repository identifier is empty",
            );
        }

        let issue = NewIssue {
            title: request.issue_summary.clone(),
            body: format!(
                "**User**: {} ({})\n\n**Description**:\n{}\n\n*Created via AI Agent*",
                request.user_name, request.user_email, request.issue_description
            ),
            labels: self.labels.clone(),
        };

        let outcome = match tokio::time::timeout(
            self.timeout,
            self.tracker.create_issue(token, &repo, &issue),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(created) => {
                tracing::info!(repo = %repo, number = created.number, "Support ticket created");
                ToolCallResult::success(format!(
                    "Success! GitHub Issue created: {} (Issue #{})",
                    created.html_url, created.number
                ))
            }
            Err(e) => {
                tracing::warn!(repo = %repo, error = %e, "Support ticket creation failed");
                ToolCallResult::failure(format!("Failed to create GitHub issue: {}", e))
            }
        }
    }
}

/// Stable placeholder id for a summary: `TICKET-<0..9999>`.
pub fn mock_ticket_id(summary: &str) -> String {
    let digest = Sha256::digest(summary.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("TICKET-{}", u64::from_be_bytes(prefix) % 10_000)
}

/// `https://github.com/acme/support/` → `acme/support`.
pub fn normalize_repo_id(repo: &str) -> String {
    let trimmed = repo.trim();
    let without_prefix = URL_PREFIX_RE.replace(trimmed, "");
    let path = without_prefix.trim_matches('/');
    path.strip_suffix(".git").unwrap_or(path).to_string()
}
