use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `SHOWCASE__`, read once at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub personalization: PersonalizationConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub visitor: VisitorConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Credentials and endpoint for the content delivery API.
#[derive(Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub delivery_token: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Custom host; falls back to the public CDN when unset.
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonalizationConfig {
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    #[serde(default = "default_session_key")]
    pub session_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisitorConfig {
    #[serde(default = "default_returning_marker_key")]
    pub returning_marker_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutomationConfig {
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Directory for file-backed durable slots. In-memory when unset.
    #[serde(default)]
    pub dir: Option<String>,
}

// Default functions
fn default_environment() -> String {
    "production".to_string()
}
fn default_host() -> String {
    "https://cdn.contentstack.io".to_string()
}
fn default_flush_interval_secs() -> u64 {
    30
}
fn default_session_key() -> String {
    "showcase_session".to_string()
}
fn default_returning_marker_key() -> String {
    "showcase_returning_visitor".to_string()
}
fn default_log_capacity() -> usize {
    50
}

impl DeliveryConfig {
    /// Both the API key and the delivery token are present.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.delivery_token.trim().is_empty()
    }

    /// Base URL requests are issued against, without a trailing slash.
    pub fn base_url(&self) -> String {
        let host = self
            .host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(default_host);
        host.trim_end_matches('/').to_string()
    }
}

// Credentials stay out of logs.
impl std::fmt::Debug for DeliveryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryConfig")
            .field("api_key", &redact(&self.api_key))
            .field("delivery_token", &redact(&self.delivery_token))
            .field("environment", &self.environment)
            .field("host", &self.host)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            delivery_token: String::new(),
            environment: default_environment(),
            host: None,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: default_flush_interval_secs(),
            session_key: default_session_key(),
        }
    }
}

impl Default for VisitorConfig {
    fn default() -> Self {
        Self {
            returning_marker_key: default_returning_marker_key(),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("SHOWCASE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
