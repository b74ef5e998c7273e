use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::lookup::arcgis::{GEOCODE_URL, ROUTES_URL};
use crate::notify::DailySchedule;

pub const CONFIG_ENV: &str = "SWEEPWATCH_CONFIG";
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const ARCGIS_KEY_ENV: &str = "ARCGIS_API_KEY";
pub const DB_PATH_ENV: &str = "SWEEPWATCH_DB_PATH";
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub arcgis: ArcGisConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub calendar: CalendarConfig,

    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token, or a `${VAR}` reference to an environment variable
    #[serde(default = "default_bot_token")]
    pub bot_token: String,

    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_bot_token() -> String {
    format!("${{{}}}", TOKEN_ENV)
}

fn default_poll_timeout_secs() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: default_bot_token(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcGisConfig {
    /// Optional; the public endpoints work without a token
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_geocode_url")]
    pub geocode_url: String,

    #[serde(default = "default_routes_url")]
    pub routes_url: String,

    /// Geocoder candidates scoring below this are treated as not found
    #[serde(default = "default_min_score")]
    pub min_score: f64,

    #[serde(default = "default_radius_ft")]
    pub radius_ft: u32,

    #[serde(default = "default_fallback_radius_ft")]
    pub fallback_radius_ft: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_geocode_url() -> String {
    GEOCODE_URL.to_string()
}

fn default_routes_url() -> String {
    ROUTES_URL.to_string()
}

fn default_min_score() -> f64 {
    70.0
}

fn default_radius_ft() -> u32 {
    200
}

fn default_fallback_radius_ft() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for ArcGisConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            geocode_url: default_geocode_url(),
            routes_url: default_routes_url(),
            min_score: default_min_score(),
            radius_ft: default_radius_ft(),
            fallback_radius_ft: default_fallback_radius_ft(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_geocode_ttl_secs")]
    pub geocode_ttl_secs: u64,

    #[serde(default = "default_cache_capacity")]
    pub geocode_capacity: usize,

    #[serde(default = "default_routes_ttl_secs")]
    pub routes_ttl_secs: u64,

    #[serde(default = "default_routes_capacity")]
    pub routes_capacity: usize,
}

fn default_geocode_ttl_secs() -> u64 {
    7 * 24 * 60 * 60 // addresses don't move
}

fn default_routes_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_routes_capacity() -> usize {
    2048
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            geocode_ttl_secs: default_geocode_ttl_secs(),
            geocode_capacity: default_cache_capacity(),
            routes_ttl_secs: default_routes_ttl_secs(),
            routes_capacity: default_routes_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Local time of the daily reminder run (HH:MM)
    #[serde(default = "default_notify_time")]
    pub time: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_notify_time() -> String {
    "07:00".to_string()
}

fn default_timezone() -> String {
    "America/Los_Angeles".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            time: default_notify_time(),
            timezone: default_timezone(),
        }
    }
}

impl NotifyConfig {
    pub fn schedule(&self) -> Result<DailySchedule> {
        DailySchedule::parse(&self.time, &self.timezone)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Additional calendar years (TOML). A file for a built-in year replaces it.
    #[serde(default)]
    pub extra_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Serve the HTTP lookup endpoints alongside the bot
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_web_host")]
    pub host: String,

    #[serde(default = "default_web_port")]
    pub port: u16,
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    8080
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl WebConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("sweepwatch")
        .join("subscriptions.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            telegram: TelegramConfig::default(),
            arcgis: ArcGisConfig::default(),
            cache: CacheConfig::default(),
            notify: NotifyConfig::default(),
            calendar: CalendarConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl Config {
    /// Load from `explicit`, else `$SWEEPWATCH_CONFIG`, else the user config
    /// dir. A default file is written when none exists. Environment
    /// overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::config_path(),
        };

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            // Create default config
            let config = Config::default();
            config.save_to(&config_path)?;
            config
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))?;

        Ok(())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.telegram.bot_token = token;
        }
        if let Some(key) = lookup(ARCGIS_KEY_ENV).filter(|v| !v.is_empty()) {
            self.arcgis.api_key = Some(key);
        }
        if let Some(path) = lookup(DB_PATH_ENV).filter(|v| !v.is_empty()) {
            self.db_path = PathBuf::from(path);
        }
        if let Some(port) = lookup(PORT_ENV).and_then(|v| v.parse().ok()) {
            self.web.port = port;
        }
    }

    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sweepwatch")
            .join("config.toml")
    }
}
