use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing_error::SpanTrace;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppId(pub i64);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AppId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// --- GENERATION TYPES ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GenerationType {
    SingleFile,
    MultiFile,
    ToolDrivenProject,
}

impl GenerationType {
    pub const ALL: [GenerationType; 3] = [
        GenerationType::SingleFile,
        GenerationType::MultiFile,
        GenerationType::ToolDrivenProject,
    ];

    /// Textual key used for session-cache keys and on-disk directory names.
    pub fn key(&self) -> &'static str {
        match self {
            Self::SingleFile => "html",
            Self::MultiFile => "multi_file",
            Self::ToolDrivenProject => "vue_project",
        }
    }

    pub fn supports_tools(&self) -> bool {
        matches!(self, Self::ToolDrivenProject)
    }

    /// Directory name for this type and application, e.g. `multi_file_42`.
    pub fn dir_name(&self, app_id: AppId) -> String {
        format!("{}_{}", self.key(), app_id)
    }
}

impl fmt::Display for GenerationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for GenerationType {
    type Err = ObservedError;

    fn from_str(s: &str) -> Result<Self> {
        match GenerationType::ALL.iter().find(|t| t.key() == s) {
            Some(t) => Ok(*t),
            None => Err(CodeloomError::Configuration(format!(
                "Unsupported generation type: {}",
                s
            ))
            .into()),
        }
    }
}

/// --- CHAT HISTORY ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Ai,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }
}

impl FromStr for ChatRole {
    type Err = ObservedError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "ai" => Ok(Self::Ai),
            other => Err(CodeloomError::Persistence(format!(
                "Unknown chat role in history: {}",
                other
            ))
            .into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub app_id: AppId,
    pub role: ChatRole,
    pub text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// --- STREAM EVENTS (model side) ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    PartialText(String),
    ToolCallRequested {
        id: String,
        name: String,
        arguments: String,
    },
    ToolCallCompleted {
        id: String,
        name: String,
        result: String,
    },
    Completed,
    Failed(String),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

/// --- STREAM MESSAGES (caller side) ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    AiResponse {
        data: String,
    },
    ToolRequest {
        id: String,
        name: String,
        arguments: String,
    },
    ToolExecuted {
        id: String,
        name: String,
        result: String,
    },
    Done,
    Error {
        message: String,
    },
}

impl StreamMessage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// JSON payload for a transport frame. An encoding failure turns into an
    /// error sentinel so the receiving side still sees a terminated stream.
    pub fn to_payload(&self) -> String {
        match serde_json::to_string(self) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("[⚙️ ] Failed to encode stream message: {}", e);
                serde_json::json!({
                    "type": "error",
                    "message": format!("failed to encode stream message: {}", e),
                })
                .to_string()
            }
        }
    }
}

/// --- ARTIFACTS ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlArtifact {
    pub html: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiFileArtifact {
    pub html: String,
    pub css: String,
    pub js: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneratedArtifact {
    SingleFile(HtmlArtifact),
    MultiFile(MultiFileArtifact),
}

impl GeneratedArtifact {
    pub fn generation_type(&self) -> GenerationType {
        match self {
            Self::SingleFile(_) => GenerationType::SingleFile,
            Self::MultiFile(_) => GenerationType::MultiFile,
        }
    }

    /// Minimal validity: multi-file output must carry markup.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::SingleFile(_) => Ok(()),
            Self::MultiFile(a) if a.html.trim().is_empty() => Err(CodeloomError::Validation(
                "multi-file artifact is missing its HTML section".to_string(),
            )
            .into()),
            Self::MultiFile(_) => Ok(()),
        }
    }
}

/// --- ERRORS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    UpstreamModel,
    Persistence,
    Internal,
}

#[derive(Error, Debug)]
pub enum CodeloomError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream model error: {0}")]
    UpstreamModel(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String, SpanTrace),
}

impl CodeloomError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::UpstreamModel(_) | Self::Network(_) => ErrorKind::UpstreamModel,
            Self::Persistence(_) | Self::Database(_) | Self::Io(_) => ErrorKind::Persistence,
            Self::Serialization(_) | Self::Internal(_, _) => ErrorKind::Internal,
        }
    }
}

#[derive(Debug)]
pub struct ObservedError {
    pub inner: CodeloomError,
    pub span_trace: SpanTrace,
}

impl ObservedError {
    pub fn kind(&self) -> ErrorKind {
        self.inner.kind()
    }

    /// Rebuilds an owned error from one shared between callers of a
    /// single-flight initialization. Source errors are flattened to text.
    pub fn from_shared(shared: &ObservedError) -> Self {
        let inner = match &shared.inner {
            CodeloomError::Configuration(m) => CodeloomError::Configuration(m.clone()),
            CodeloomError::Validation(m) => CodeloomError::Validation(m.clone()),
            CodeloomError::UpstreamModel(m) => CodeloomError::UpstreamModel(m.clone()),
            CodeloomError::Persistence(m) => CodeloomError::Persistence(m.clone()),
            CodeloomError::Internal(m, trace) => CodeloomError::Internal(m.clone(), trace.clone()),
            other => match other.kind() {
                ErrorKind::UpstreamModel => CodeloomError::UpstreamModel(other.to_string()),
                ErrorKind::Persistence => CodeloomError::Persistence(other.to_string()),
                _ => CodeloomError::Internal(other.to_string(), SpanTrace::capture()),
            },
        };
        inner.into()
    }
}

impl std::fmt::Display for ObservedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n\nSpan Trace:\n{}", self.inner, self.span_trace)
    }
}

impl std::error::Error for ObservedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}

impl<E> From<E> for ObservedError
where
    E: Into<CodeloomError>,
{
    fn from(error: E) -> Self {
        Self {
            inner: error.into(),
            span_trace: SpanTrace::capture(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ObservedError>;
