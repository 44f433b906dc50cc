use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Wallcrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Minimum spacing between any two outbound requests (milliseconds)
    #[serde(rename = "request-interval-ms", default = "default_request_interval_ms")]
    pub request_interval_ms: u64,

    /// Records requested per page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Pause after the remote reports its rate limit (seconds)
    #[serde(
        rename = "rate-limit-cooldown-secs",
        default = "default_rate_limit_cooldown_secs"
    )]
    pub rate_limit_cooldown_secs: u64,

    /// Per-request network timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How often counters are flushed while crawling (seconds)
    #[serde(rename = "flush-interval-secs", default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// What to do with the offset after a transport failure
    #[serde(rename = "transient-retry", default)]
    pub transient_retry: TransientRetry,

    /// Offset increment used by the `nudge` policy
    #[serde(rename = "nudge-step", default = "default_nudge_step")]
    pub nudge_step: u64,

    /// First delay before retrying a transient failure (milliseconds)
    #[serde(rename = "transient-backoff-ms", default = "default_transient_backoff_ms")]
    pub transient_backoff_ms: u64,

    /// Upper bound for the transient retry delay (milliseconds)
    #[serde(
        rename = "transient-backoff-max-ms",
        default = "default_transient_backoff_max_ms"
    )]
    pub transient_backoff_max_ms: u64,

    /// Time given to workers to stop after a shutdown signal (seconds)
    #[serde(rename = "shutdown-grace-secs", default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

/// Offset handling after a transport-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransientRetry {
    /// Retry exactly the same offset
    #[default]
    SameOffset,

    /// Skip ahead by `nudge-step` without checkpointing
    Nudge,
}

/// Remote API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL that method names are appended to
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// API version sent with every call
    #[serde(default = "default_api_version")]
    pub version: String,

    /// Method returning one page of posts with their comments
    #[serde(rename = "comments-method", default = "default_comments_method")]
    pub comments_method: String,

    /// Method resolving screen names to group ids
    #[serde(rename = "resolve-method", default = "default_resolve_method")]
    pub resolve_method: String,

    /// Base URL used to build links to posts
    #[serde(rename = "web-base-url", default = "default_web_base_url")]
    pub web_base_url: String,

    /// Environment variable holding the access token
    #[serde(rename = "access-token-env", default = "default_access_token_env")]
    pub access_token_env: String,

    /// File holding the access token when the variable is unset
    #[serde(rename = "access-token-file", default = "default_access_token_file")]
    pub access_token_file: PathBuf,
}

/// Input configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Newline-delimited list of group screen names
    #[serde(rename = "sources-path")]
    pub sources_path: PathBuf,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Root directory for persisted records
    #[serde(rename = "data-dir")]
    pub data_dir: PathBuf,

    /// Which record store to use
    #[serde(default)]
    pub backend: StoreBackend,

    /// SQLite database file (defaults to `<data-dir>/records.db`)
    #[serde(rename = "database-path", default)]
    pub database_path: Option<PathBuf>,
}

impl OutputConfig {
    /// Returns the SQLite path, falling back to the data directory
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("records.db"))
    }
}

/// Record store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    /// One JSON file per record under `data-dir`
    #[default]
    Files,

    /// One row per record in a SQLite database
    Sqlite,
}

impl CrawlerConfig {
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_interval_ms: default_request_interval_ms(),
            page_size: default_page_size(),
            rate_limit_cooldown_secs: default_rate_limit_cooldown_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            flush_interval_secs: default_flush_interval_secs(),
            transient_retry: TransientRetry::default(),
            nudge_step: default_nudge_step(),
            transient_backoff_ms: default_transient_backoff_ms(),
            transient_backoff_max_ms: default_transient_backoff_max_ms(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            version: default_api_version(),
            comments_method: default_comments_method(),
            resolve_method: default_resolve_method(),
            web_base_url: default_web_base_url(),
            access_token_env: default_access_token_env(),
            access_token_file: default_access_token_file(),
        }
    }
}

fn default_request_interval_ms() -> u64 {
    666
}

fn default_page_size() -> u32 {
    20
}

fn default_rate_limit_cooldown_secs() -> u64 {
    360
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_flush_interval_secs() -> u64 {
    30
}

fn default_nudge_step() -> u64 {
    10
}

fn default_transient_backoff_ms() -> u64 {
    1_000
}

fn default_transient_backoff_max_ms() -> u64 {
    60_000
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

fn default_base_url() -> String {
    "https://api.vk.com/method".to_string()
}

fn default_api_version() -> String {
    "5.122".to_string()
}

fn default_comments_method() -> String {
    "execute.getComments".to_string()
}

fn default_resolve_method() -> String {
    "groups.getById".to_string()
}

fn default_web_base_url() -> String {
    "https://vk.com".to_string()
}

fn default_access_token_env() -> String {
    "VK_API_ACCESS_TOKEN_USER".to_string()
}

fn default_access_token_file() -> PathBuf {
    PathBuf::from("access_token.txt")
}
