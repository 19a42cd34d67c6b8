//! Tools the model may call during a support turn

pub mod github;
pub mod ticket;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ToolError;
use crate::llm::ToolSchema;
use crate::types::ToolCallRequest;

pub use github::{CreatedIssue, GitHubIssues, IssueTracker, NewIssue};
pub use ticket::{mock_ticket_id, normalize_repo_id, ToolExecutor};

pub const CREATE_SUPPORT_TICKET: &str = "create_support_ticket";

/// Arguments of `create_support_ticket`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketRequest {
    pub user_name: String,
    pub user_email: String,
    pub issue_summary: String,
    pub issue_description: String,
}

/// A decoded tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    CreateSupportTicket(TicketRequest),
    /// Any other tool name. Ignored by the orchestrator.
    Unrecognized { name: String },
}

impl ToolRequest {
    pub fn decode(call: &ToolCallRequest) -> Result<Self, ToolError> {
        if call.tool_name != CREATE_SUPPORT_TICKET {
            return Ok(Self::Unrecognized {
                name: call.tool_name.clone(),
            });
        }
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool: CREATE_SUPPORT_TICKET.to_string(),
            reason,
        };
        let request: TicketRequest =
            serde_json::from_value(serde_json::Value::Object(call.arguments.clone()))
                .map_err(|e| invalid(e.to_string()))?;
        Ok(Self::CreateSupportTicket(request))
    }
}

/// Outcome of a tool call, always shown to the user as text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallResult {
    pub succeeded: bool,
    pub message: String,
}

impl ToolCallResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for ToolCallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Declaration of `create_support_ticket` sent with every streaming call.
pub fn support_ticket_schema() -> ToolSchema {
    ToolSchema {
        name: CREATE_SUPPORT_TICKET.to_string(),
        description: "Creates a support ticket on GitHub Issues. Use this tool when the user \
            explicitly asks to create a ticket OR when the answer cannot be found in the \
            documentation."
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "user_name": {
                    "type": "string",
                    "description": "Full name of the user reporting the issue"
                },
                "user_email": {
                    "type": "string",
                    "description": "Email address to follow up with"
                },
                "issue_summary": {
                    "type": "string",
                    "description": "One-line summary, used as the ticket title"
                },
                "issue_description": {
                    "type": "string",
                    "description": "Detailed description of the problem"
                }
            },
            "required": ["user_name", "user_email", "issue_summary", "issue_description"]
        }),
    }
}
