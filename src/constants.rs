use std::time::Duration;

/// Conversation window defaults
pub const MEMORY_WINDOW_CAPACITY: usize = 20;

/// Session cache defaults
pub const SESSION_CACHE_MAX_CAPACITY: u64 = 1000;
pub const SESSION_EXPIRE_AFTER_WRITE: Duration = Duration::from_secs(30 * 60);
pub const SESSION_EXPIRE_AFTER_ACCESS: Duration = Duration::from_secs(10 * 60);

/// Content store defaults
pub const CODE_OUTPUT_ROOT_DIR: &str = "tmp/code_output";

/// Fixed file names written by the savers
pub const INDEX_HTML_FILE: &str = "index.html";
pub const STYLE_CSS_FILE: &str = "style.css";
pub const SCRIPT_JS_FILE: &str = "script.js";

/// Model endpoint defaults (any OpenAI-compatible backend)
pub const DEFAULT_MODEL_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_CHAT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_REASONING_MODEL: &str = "deepseek-reasoner";
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 20;

/// Streaming limits
pub const MAX_STREAM_LINES: usize = 100_000;
pub const MAX_SSE_LINE_BYTES: usize = 1024 * 1024;
pub const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Chat history wording
pub const AI_FAILURE_PREFIX: &str = "AI response failed: ";
pub const AI_CANCELLED_TEXT: &str = "AI response cancelled: the client disconnected before generation finished";

/// Database defaults
pub const DB_PRAGMAS: &[&str] = &[
    "PRAGMA journal_mode = WAL",
    "PRAGMA synchronous = NORMAL",
    "PRAGMA busy_timeout = 5000",
];
