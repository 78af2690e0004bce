use crate::constants::*;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Natural-language description of the app to generate
    #[arg(long)]
    pub message: String,
    #[arg(long, default_value_t = 1)]
    pub app_id: i64,
    /// One of: html, multi_file, vue_project
    #[arg(long, default_value = "html")]
    pub gen_type: String,
    #[arg(long, default_value_t = false)]
    pub sync: bool,
    #[arg(long, env = "CODELOOM_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,
    /// Also write an NDJSON trace file next to the text log
    #[arg(long, env = "CODELOOM_JSON_LOGS", default_value_t = false)]
    pub json_logs: bool,
    #[arg(long, env = "CODELOOM_DATABASE", default_value = "codeloom.db")]
    pub database: String,
    #[arg(long, env = "CODELOOM_OUTPUT_DIR", default_value = CODE_OUTPUT_ROOT_DIR)]
    pub output_dir: PathBuf,
    #[arg(long, env = "CODELOOM_MEMORY_WINDOW", default_value_t = MEMORY_WINDOW_CAPACITY)]
    pub memory_window: usize,
    #[arg(long, env = "CODELOOM_CACHE_MAX_SESSIONS", default_value_t = SESSION_CACHE_MAX_CAPACITY)]
    pub cache_max_sessions: u64,
    #[arg(long, env = "CODELOOM_EXPIRE_AFTER_WRITE_SECS", default_value_t = SESSION_EXPIRE_AFTER_WRITE.as_secs())]
    pub expire_after_write_secs: u64,
    #[arg(long, env = "CODELOOM_EXPIRE_AFTER_ACCESS_SECS", default_value_t = SESSION_EXPIRE_AFTER_ACCESS.as_secs())]
    pub expire_after_access_secs: u64,
    #[arg(long, env = "CODELOOM_MODEL_BASE_URL", default_value = DEFAULT_MODEL_BASE_URL)]
    pub model_base_url: String,
    #[arg(long, env = "CODELOOM_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,
    #[arg(long, env = "CODELOOM_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    pub chat_model: String,
    #[arg(long, env = "CODELOOM_REASONING_MODEL", default_value = DEFAULT_REASONING_MODEL)]
    pub reasoning_model: String,
    #[arg(long, env = "CODELOOM_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,
    #[arg(long, env = "CODELOOM_MAX_TOOL_ROUNDS", default_value_t = DEFAULT_MAX_TOOL_ROUNDS)]
    pub max_tool_rounds: usize,
    #[arg(long, default_value_t = 300)]
    pub request_timeout_secs: u64,
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,
}

/// Settings the library consumes; independent of how they were sourced.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub output_root: PathBuf,
    pub memory_window: usize,
    pub cache_max_sessions: u64,
    pub expire_after_write: Duration,
    pub expire_after_access: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(CODE_OUTPUT_ROOT_DIR),
            memory_window: MEMORY_WINDOW_CAPACITY,
            cache_max_sessions: SESSION_CACHE_MAX_CAPACITY,
            expire_after_write: SESSION_EXPIRE_AFTER_WRITE,
            expire_after_access: SESSION_EXPIRE_AFTER_ACCESS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub max_tool_rounds: usize,
}

impl Args {
    pub fn core_config(&self) -> CoreConfig {
        CoreConfig {
            output_root: self.output_dir.clone(),
            memory_window: self.memory_window,
            cache_max_sessions: self.cache_max_sessions,
            expire_after_write: Duration::from_secs(self.expire_after_write_secs),
            expire_after_access: Duration::from_secs(self.expire_after_access_secs),
        }
    }

    pub fn chat_model_settings(&self) -> ModelSettings {
        self.model_settings(&self.chat_model)
    }

    pub fn reasoning_model_settings(&self) -> ModelSettings {
        self.model_settings(&self.reasoning_model)
    }

    fn model_settings(&self, model: &str) -> ModelSettings {
        ModelSettings {
            base_url: self.model_base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key.clone(),
            model: model.to_string(),
            max_tokens: self.max_tokens,
            max_tool_rounds: self.max_tool_rounds,
        }
    }

    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()
    }
}
