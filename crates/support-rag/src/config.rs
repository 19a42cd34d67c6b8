use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::llm::ApiProvider;

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    pub data_dir: PathBuf,
    /// Prebuilt vector index. Relative paths resolve against `data_dir`.
    pub index_path: PathBuf,
    pub retrieval: RetrievalConfig,
    pub llm: LlmSettings,
    pub tickets: TicketConfig,
    pub company: CompanyProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub embedding_model: String,
    pub embedding_cache_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: ApiProvider,
    pub default_model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub request_timeout_secs: u64,
    /// Longest silence tolerated between two stream events.
    pub stream_idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketConfig {
    pub api_base: String,
    pub timeout_secs: u64,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl SupportConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=20).contains(&self.retrieval.top_k) {
            return Err(invalid("retrieval.top_k must be in [1, 20]"));
        }
        if self.llm.default_model.trim().is_empty() {
            return Err(invalid("llm.default_model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(invalid("llm.temperature must be in [0.0, 2.0]"));
        }
        if self.llm.request_timeout_secs == 0 || self.llm.stream_idle_timeout_secs == 0 {
            return Err(invalid("llm timeouts must be > 0"));
        }
        if self.tickets.timeout_secs == 0 {
            return Err(invalid("tickets.timeout_secs must be > 0"));
        }
        if self.tickets.api_base.trim().is_empty() {
            return Err(invalid("tickets.api_base must not be empty"));
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Invalid(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Invalid(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn resolved_index_path(&self) -> PathBuf {
        if self.index_path.is_absolute() {
            self.index_path.clone()
        } else {
            self.data_dir.join(&self.index_path)
        }
    }
}

impl Default for SupportConfig {
    fn default() -> Self {
        let data_dir = if Path::new("data").exists() {
            PathBuf::from("data")
        } else {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("support-rag")
        };

        Self {
            data_dir,
            index_path: PathBuf::from("index.json"),
            retrieval: RetrievalConfig::default(),
            llm: LlmSettings::default(),
            tickets: TicketConfig::default(),
            company: CompanyProfile::default(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            embedding_model: "text-embedding-004".to_string(),
            embedding_cache_size: 256,
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ApiProvider::Google,
            default_model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 8192,
            request_timeout_secs: 120,
            stream_idle_timeout_secs: 60,
        }
    }
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            timeout_secs: 30,
            labels: vec!["support".to_string(), "ai-generated".to_string()],
        }
    }
}

impl Default for CompanyProfile {
    fn default() -> Self {
        Self {
            name: "TechSolutions Inc.".to_string(),
            phone: "+1-800-555-0199".to_string(),
            email: "support@techsolutions.fake".to_string(),
        }
    }
}

// ==================== Per-request resolution ====================

/// Process environment captured once at startup.
///
/// Later changes to the environment are not observed; callers that want
/// them must capture a new snapshot.
#[derive(Debug, Clone, Default)]
pub struct EnvDefaults {
    pub google_api_key: Option<String>,
    pub ticket_token: Option<String>,
    pub ticket_repo: Option<String>,
    pub model_name: Option<String>,
}

impl EnvDefaults {
    pub fn capture() -> Self {
        let read = |name: &str| std::env::var(name).ok().and_then(non_blank);
        let defaults = Self {
            google_api_key: read("GOOGLE_API_KEY"),
            ticket_token: read("GITHUB_TOKEN"),
            ticket_repo: read("GITHUB_REPO"),
            model_name: read("SUPPORT_RAG_MODEL"),
        };
        tracing::info!(
            google_api_key = defaults.google_api_key.is_some(),
            ticket_token = defaults.ticket_token.is_some(),
            ticket_repo = defaults.ticket_repo.is_some(),
            "Captured environment defaults"
        );
        defaults
    }
}

/// Settings typed into the chat UI for one request. Any field may be blank.
#[derive(Debug, Clone, Default)]
pub struct UiConfig {
    pub google_api_key: Option<String>,
    pub ticket_token: Option<String>,
    pub ticket_repo: Option<String>,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub model_name: String,
    pub credential: Option<String>,
    pub ticket_token: Option<String>,
    pub ticket_repo_id: Option<String>,
}

/// Merges UI settings over the startup environment snapshot, field by field.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    env: EnvDefaults,
    default_model: String,
}

impl ConfigResolver {
    pub fn new(env: EnvDefaults, default_model: impl Into<String>) -> Self {
        Self {
            env,
            default_model: default_model.into(),
        }
    }

    /// Never fails; missing fields are reported downstream.
    pub fn resolve(&self, ui: &UiConfig) -> EffectiveConfig {
        let effective = EffectiveConfig {
            model_name: prefer(&ui.model_name, &self.env.model_name)
                .unwrap_or_else(|| self.default_model.clone()),
            credential: prefer(&ui.google_api_key, &self.env.google_api_key),
            ticket_token: prefer(&ui.ticket_token, &self.env.ticket_token),
            ticket_repo_id: prefer(&ui.ticket_repo, &self.env.ticket_repo),
        };
        tracing::debug!(
            model = %effective.model_name,
            credential = source_label(&ui.google_api_key, &self.env.google_api_key),
            ticket_token = source_label(&ui.ticket_token, &self.env.ticket_token),
            ticket_repo = source_label(&ui.ticket_repo, &self.env.ticket_repo),
            "Resolved request configuration"
        );
        effective
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid(reason.to_string())
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn prefer(ui: &Option<String>, env: &Option<String>) -> Option<String> {
    ui.clone()
        .and_then(non_blank)
        .or_else(|| env.clone().and_then(non_blank))
}

fn source_label(ui: &Option<String>, env: &Option<String>) -> &'static str {
    if ui.as_deref().is_some_and(|v| !v.trim().is_empty()) {
        "ui"
    } else if env.is_some() {
        "env"
    } else {
        "absent"
    }
}
