use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ToolError;

const USER_AGENT: &str = "support-rag";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CreatedIssue {
    pub html_url: String,
    pub number: u64,
}

/// Remote issue tracker used for support tickets.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// `repo` is `owner/name`.
    async fn create_issue(
        &self,
        token: &str,
        repo: &str,
        issue: &NewIssue,
    ) -> Result<CreatedIssue, ToolError>;
}

/// GitHub REST API (`POST /repos/{owner}/{repo}/issues`).
pub struct GitHubIssues {
    client: Client,
    api_base: String,
}

impl GitHubIssues {
    pub fn new(api_base: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IssueTracker for GitHubIssues {
    async fn create_issue(
        &self,
        token: &str,
        repo: &str,
        issue: &NewIssue,
    ) -> Result<CreatedIssue, ToolError> {
        let endpoint = format!("{}/repos/{}/issues", self.api_base, repo);
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(issue)
            .send()
            .await
            .map_err(|e| ToolError::Transport(format!("request to {} failed: {}", endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(300).collect();
            return Err(ToolError::Remote {
                status: status.as_u16(),
                body: preview,
            });
        }

        response
            .json::<CreatedIssue>()
            .await
            .map_err(|e| {
                ToolError::Transport(format!("unexpected response from {}: {}", endpoint, e))
            })
    }
}
