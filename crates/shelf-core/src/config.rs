//! Layered engine configuration.
//!
//! Defaults live in code, an optional TOML or JSON file overrides them, and
//! `SHELF_*` environment variables override the file.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Output format for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines (for production/log aggregation).
    Json,
    /// Human-readable (for development).
    #[default]
    Human,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "human" | "pretty" | "text" => Ok(Self::Human),
            other => Err(ConfigError::InvalidValue {
                key: "logging.format".into(),
                value: other.into(),
            }),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Human => write!(f, "human"),
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShelfConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub clicks: ClicksConfig,
    #[serde(default)]
    pub openfood: OpenFoodConfig,
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
    #[serde(default)]
    pub nutrition: NutritionConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind.
    pub bind: String,
    /// Deadline applied to every inbound request.
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8787".into(),
            request_timeout_ms: 10_000,
        }
    }
}

/// Cache store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL of merged product snapshots.
    pub merged_ttl_secs: u64,
    /// How often expired entries are swept from memory. 0 disables the sweep.
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            merged_ttl_secs: 14_400,
            sweep_interval_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn merged_ttl(&self) -> Duration {
        Duration::from_secs(self.merged_ttl_secs)
    }
}

/// Click ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClicksConfig {
    /// Deadline for a single actor round trip before falling back.
    pub actor_timeout_ms: u64,
    /// Recent clicks kept per key.
    pub recent_limit: usize,
    /// An actor with an empty mailbox for this long stops; it is respawned
    /// on the next click for its key.
    pub actor_idle_secs: u64,
}

impl Default for ClicksConfig {
    fn default() -> Self {
        Self {
            actor_timeout_ms: 2_000,
            recent_limit: 200,
            actor_idle_secs: 300,
        }
    }
}

/// Open product database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenFoodConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for OpenFoodConfig {
    fn default() -> Self {
        Self {
            base_url: "https://world.openfoodfacts.org".into(),
            timeout_ms: 4_000,
            user_agent: concat!("shelf/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// Marketplace search/offer API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub base_url: String,
    /// Host of the OAuth token endpoint.
    pub identity_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    pub marketplace_id: String,
    /// Affiliate campaign id appended to offer URLs when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    pub result_limit: u32,
    pub timeout_ms: u64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.ebay.com".into(),
            identity_url: "https://api.ebay.com".into(),
            client_id: None,
            client_secret: None,
            marketplace_id: "EBAY_US".into(),
            campaign_id: None,
            result_limit: 6,
            timeout_ms: 5_000,
        }
    }
}

impl MarketplaceConfig {
    /// Whether OAuth credentials are present.
    pub fn has_credentials(&self) -> bool {
        matches!((&self.client_id, &self.client_secret), (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty())
    }
}

/// Nutrition database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NutritionConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Requests allowed per client per window, kept below the upstream quota.
    pub hourly_ceiling: u32,
    pub window_secs: u64,
    /// Total attempts per call, including the first.
    pub max_attempts: u32,
    pub timeout_ms: u64,
}

impl Default for NutritionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.nal.usda.gov/fdc".into(),
            api_key: None,
            hourly_ceiling: 900,
            window_secs: 3_600,
            max_attempts: 3,
            timeout_ms: 6_000,
        }
    }
}

/// Admin surface settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Static bearer token. Admin routes are disabled when unset.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl AdminConfig {
    pub fn enabled(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Human,
            filter: "shelf=info,tower_http=info".into(),
        }
    }
}

impl ShelfConfig {
    /// Load config from a TOML or JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        if is_json {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: display,
                message: e.to_string(),
            })
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: display,
                message: e.to_string(),
            })
        }
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Overlay values from an arbitrary variable lookup.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SHELF_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = get("SHELF_REQUEST_TIMEOUT_MS") {
            self.server.request_timeout_ms = parse_var("SHELF_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("SHELF_MERGED_TTL_SECS") {
            self.cache.merged_ttl_secs = parse_var("SHELF_MERGED_TTL_SECS", &v)?;
        }
        if let Some(v) = get("SHELF_ACTOR_TIMEOUT_MS") {
            self.clicks.actor_timeout_ms = parse_var("SHELF_ACTOR_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("SHELF_ACTOR_IDLE_SECS") {
            self.clicks.actor_idle_secs = parse_var("SHELF_ACTOR_IDLE_SECS", &v)?;
        }
        if let Some(v) = get("SHELF_OPENFOOD_BASE_URL") {
            self.openfood.base_url = v;
        }
        if let Some(v) = get("SHELF_EBAY_BASE_URL") {
            self.marketplace.base_url = v;
        }
        if let Some(v) = get("SHELF_EBAY_IDENTITY_URL") {
            self.marketplace.identity_url = v;
        }
        if let Some(v) = get("SHELF_EBAY_CLIENT_ID") {
            self.marketplace.client_id = Some(v);
        }
        if let Some(v) = get("SHELF_EBAY_CLIENT_SECRET") {
            self.marketplace.client_secret = Some(v);
        }
        if let Some(v) = get("SHELF_EBAY_MARKETPLACE_ID") {
            self.marketplace.marketplace_id = v;
        }
        if let Some(v) = get("SHELF_AFFILIATE_CAMPAIGN_ID") {
            self.marketplace.campaign_id = Some(v);
        }
        if let Some(v) = get("SHELF_NUTRITION_BASE_URL") {
            self.nutrition.base_url = v;
        }
        if let Some(v) = get("SHELF_NUTRITION_API_KEY") {
            self.nutrition.api_key = Some(v);
        }
        if let Some(v) = get("SHELF_NUTRITION_HOURLY_CEILING") {
            self.nutrition.hourly_ceiling = parse_var("SHELF_NUTRITION_HOURLY_CEILING", &v)?;
        }
        if let Some(v) = get("SHELF_ADMIN_TOKEN") {
            self.admin.token = Some(v);
        }
        if let Some(v) = get("SHELF_LOG_FORMAT") {
            self.logging.format = v.parse()?;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.merged_ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache.merged_ttl_secs cannot be 0".into()));
        }
        if self.nutrition.hourly_ceiling == 0 {
            return Err(ConfigError::Invalid("nutrition.hourly_ceiling cannot be 0".into()));
        }
        if self.nutrition.window_secs == 0 {
            return Err(ConfigError::Invalid("nutrition.window_secs cannot be 0".into()));
        }
        if self.nutrition.max_attempts == 0 {
            return Err(ConfigError::Invalid("nutrition.max_attempts cannot be 0".into()));
        }
        if self.clicks.recent_limit == 0 {
            return Err(ConfigError::Invalid("clicks.recent_limit cannot be 0".into()));
        }
        if self.clicks.actor_idle_secs == 0 {
            return Err(ConfigError::Invalid("clicks.actor_idle_secs cannot be 0".into()));
        }
        if self.admin.token.as_deref() == Some("") {
            return Err(ConfigError::Invalid("admin.token is set but empty".into()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
