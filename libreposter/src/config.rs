//! Configuration management for Reposter
//!
//! Credentials and target identifiers come from the environment (optionally
//! seeded from a `.env` file). Non-secret tuning lives in an optional TOML
//! file; every field there has a default.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

pub const ENV_REDDIT_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_REDDIT_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_FB_ACCESS_TOKEN: &str = "FB_ACCESS_TOKEN";
pub const ENV_FB_PAGE_ID: &str = "FB_PAGE_ID";
pub const ENV_IG_ACCOUNT_ID: &str = "IG_ACCOUNT_ID";

/// Fully resolved configuration passed to every component constructor
#[derive(Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub settings: Settings,
}

/// Secrets and account identifiers
#[derive(Debug)]
pub struct Credentials {
    pub reddit_client_id: String,
    pub reddit_client_secret: SecretString,
    pub fb_access_token: SecretString,
    pub fb_page_id: String,
    /// Required only when the Instagram target is enabled
    pub ig_account_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub feed: FeedSettings,
    pub dedup: DedupSettings,
    pub publish: PublishSettings,
    pub schedule: ScheduleSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub subreddit: String,
    pub max_scan: usize,
    pub allowed_extensions: Vec<String>,
    pub user_agent: String,
    pub auth_base: String,
    pub api_base: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            subreddit: "ProgrammerHumor".to_string(),
            max_scan: 25,
            allowed_extensions: vec![".jpg".to_string(), ".png".to_string(), ".gif".to_string()],
            user_agent: concat!("reposter/", env!("CARGO_PKG_VERSION")).to_string(),
            auth_base: "https://www.reddit.com".to_string(),
            api_base: "https://oauth.reddit.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Append-only file of published URLs
    Local,
    /// Recent captions from the Facebook Page feed
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    pub store: StoreKind,
    pub log_path: String,
    pub history_limit: usize,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            store: StoreKind::Local,
            log_path: "~/.local/share/reposter/published.log".to_string(),
            history_limit: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub graph_base: String,
    pub story: bool,
    pub instagram: bool,
    pub settle_delay: String,
    pub schedule_delay: Option<String>,
    pub request_timeout: String,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            graph_base: "https://graph.facebook.com/v21.0".to_string(),
            story: true,
            instagram: true,
            settle_delay: "5s".to_string(),
            schedule_delay: None,
            request_timeout: "30s".to_string(),
        }
    }
}

impl PublishSettings {
    pub fn settle_delay(&self) -> Result<Duration> {
        parse_duration_field("publish.settle_delay", &self.settle_delay)
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration_field("publish.request_timeout", &self.request_timeout)
    }

    pub fn schedule_delay(&self) -> Result<Option<Duration>> {
        self.schedule_delay
            .as_deref()
            .map(|s| parse_duration_field("publish.schedule_delay", s))
            .transpose()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub interval: String,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval: "6h".to_string(),
        }
    }
}

impl ScheduleSettings {
    /// Time between cycles; never zero
    pub fn interval(&self) -> Result<Duration> {
        let interval = parse_duration_field("schedule.interval", &self.interval)?;
        if interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "schedule.interval".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        Ok(interval)
    }
}

impl Settings {
    /// Load settings from the default location, falling back to defaults
    /// when no file exists
    pub fn load() -> Result<Self> {
        let path = resolve_config_path()?;
        if !path.exists() {
            tracing::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&path)
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content).map_err(ConfigError::ParseError)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check every field that is parsed lazily, so bad values fail at startup
    pub fn validate(&self) -> Result<()> {
        self.publish.settle_delay()?;
        self.publish.request_timeout()?;
        self.publish.schedule_delay()?;
        self.schedule.interval()?;

        if self.feed.max_scan == 0 {
            return Err(ConfigError::InvalidValue {
                field: "feed.max_scan".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        // Scheduled posts stay out of the Page feed until they go live, so the
        // remote history cannot see them
        if self.dedup.store == StoreKind::Remote && self.publish.schedule_delay.is_some() {
            return Err(ConfigError::InvalidValue {
                field: "publish.schedule_delay".to_string(),
                reason: "cannot be combined with dedup.store = \"remote\"".to_string(),
            }
            .into());
        }
        if self.feed.allowed_extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "feed.allowed_extensions".to_string(),
                reason: "at least one extension is required".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Local log path with `~` and environment variables expanded
    pub fn log_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.dedup.log_path).map_err(|e| {
            ConfigError::InvalidValue {
                field: "dedup.log_path".to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

impl Credentials {
    /// Read credentials from the process environment
    pub fn from_env(require_instagram: bool) -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok(), require_instagram)
    }

    /// Read credentials through an arbitrary lookup function
    ///
    /// Empty values count as missing.
    pub fn from_lookup<F>(lookup: F, require_instagram: bool) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| -> Option<String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |name: &str| -> Result<String> {
            get(name).ok_or_else(|| ConfigError::MissingEnv(name.to_string()).into())
        };

        let reddit_client_id = require(ENV_REDDIT_CLIENT_ID)?;
        let reddit_client_secret = SecretString::from(require(ENV_REDDIT_CLIENT_SECRET)?);
        let fb_access_token = SecretString::from(require(ENV_FB_ACCESS_TOKEN)?);
        let fb_page_id = require(ENV_FB_PAGE_ID)?;
        let ig_account_id = if require_instagram {
            Some(require(ENV_IG_ACCOUNT_ID)?)
        } else {
            get(ENV_IG_ACCOUNT_ID)
        };

        Ok(Self {
            reddit_client_id,
            reddit_client_secret,
            fb_access_token,
            fb_page_id,
            ig_account_id,
        })
    }
}

impl Config {
    /// Load `.env`, the settings file, and the required environment variables
    pub fn load() -> Result<Self> {
        load_env_file();

        let settings = Settings::load()?;
        let credentials = Credentials::from_env(settings.publish.instagram)?;
        Ok(Self {
            credentials,
            settings,
        })
    }
}

/// Seed the process environment from a `.env` file, if one exists
///
/// Variables already set win over the file. Call this before logging is
/// initialised so `REPOSTER_LOG_*` values in the file take effect; loading
/// twice is harmless.
pub fn load_env_file() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!("Loaded environment from {}", path.display());
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!("Ignoring unreadable .env file: {}", e);
            None
        }
    }
}

/// Resolve the settings file path, defaulting to the XDG config directory
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("REPOSTER_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("reposter").join("config.toml"))
}

fn parse_duration_field(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).map_err(|e| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' is not a duration ({})", value, e),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_REDDIT_CLIENT_ID, "client"),
            (ENV_REDDIT_CLIENT_SECRET, "secret"),
            (ENV_FB_ACCESS_TOKEN, "token"),
            (ENV_FB_PAGE_ID, "1234"),
            (ENV_IG_ACCOUNT_ID, "5678"),
        ]
    }

    #[test]
    fn test_credentials_complete() {
        let creds = Credentials::from_lookup(lookup_from(&full_env()), true).unwrap();
        assert_eq!(creds.reddit_client_id, "client");
        assert_eq!(creds.reddit_client_secret.expose_secret(), "secret");
        assert_eq!(creds.fb_access_token.expose_secret(), "token");
        assert_eq!(creds.fb_page_id, "1234");
        assert_eq!(creds.ig_account_id.as_deref(), Some("5678"));
    }

    #[test]
    fn test_credentials_missing_token_names_variable() {
        let env: Vec<_> = full_env()
            .into_iter()
            .filter(|(k, _)| *k != ENV_FB_ACCESS_TOKEN)
            .collect();
        let err = Credentials::from_lookup(lookup_from(&env), true).unwrap_err();
        assert!(err.to_string().contains("FB_ACCESS_TOKEN"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_credentials_blank_value_counts_as_missing() {
        let mut env = full_env();
        env.retain(|(k, _)| *k != ENV_FB_PAGE_ID);
        env.push((ENV_FB_PAGE_ID, "   "));
        let err = Credentials::from_lookup(lookup_from(&env), true).unwrap_err();
        assert!(err.to_string().contains("FB_PAGE_ID"));
    }

    #[test]
    fn test_instagram_account_optional_when_disabled() {
        let env: Vec<_> = full_env()
            .into_iter()
            .filter(|(k, _)| *k != ENV_IG_ACCOUNT_ID)
            .collect();
        let creds = Credentials::from_lookup(lookup_from(&env), false).unwrap();
        assert!(creds.ig_account_id.is_none());

        let err = Credentials::from_lookup(lookup_from(&env), true).unwrap_err();
        assert!(err.to_string().contains("IG_ACCOUNT_ID"));
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let creds = Credentials::from_lookup(lookup_from(&full_env()), true).unwrap();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("secret\""));
        assert!(!debug.contains("\"token\""));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.feed.subreddit, "ProgrammerHumor");
        assert_eq!(settings.dedup.store, StoreKind::Local);
        assert_eq!(settings.publish.settle_delay().unwrap(), Duration::from_secs(5));
        assert_eq!(settings.schedule.interval().unwrap(), Duration::from_secs(6 * 3600));
        assert_eq!(settings.publish.schedule_delay().unwrap(), None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
[feed]
subreddit = "memes"

[dedup]
store = "remote"

[publish]
story = false
schedule_delay = "2h"
"#,
        )
        .unwrap();

        assert_eq!(settings.feed.subreddit, "memes");
        assert_eq!(settings.feed.max_scan, 25);
        assert_eq!(settings.dedup.store, StoreKind::Remote);
        assert!(!settings.publish.story);
        assert!(settings.publish.instagram);
        assert_eq!(
            settings.publish.schedule_delay().unwrap(),
            Some(Duration::from_secs(7200))
        );
    }

    #[test]
    fn test_settings_rejects_bad_duration() {
        let err = Settings::from_toml("[schedule]\ninterval = \"soon\"\n").unwrap_err();
        assert!(err.to_string().contains("schedule.interval"));
    }

    #[test]
    fn test_settings_rejects_zero_scan() {
        let err = Settings::from_toml("[feed]\nmax_scan = 0\n").unwrap_err();
        assert!(err.to_string().contains("feed.max_scan"));
    }

    #[test]
    fn test_settings_rejects_zero_interval() {
        let err = Settings::from_toml("[schedule]\ninterval = \"0s\"\n").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("schedule.interval"));
    }

    #[test]
    fn test_scheduled_posts_need_local_store() {
        let toml = "[dedup]\nstore = \"remote\"\n\n[publish]\nschedule_delay = \"1h\"\n";
        let err = Settings::from_toml(toml).unwrap_err();
        assert!(err.to_string().contains("publish.schedule_delay"));

        let toml = "[dedup]\nstore = \"local\"\n\n[publish]\nschedule_delay = \"1h\"\n";
        let settings = Settings::from_toml(toml).unwrap();
        assert_eq!(
            settings.publish.schedule_delay().unwrap(),
            Some(Duration::from_secs(3600))
        );
    }

    #[test]
    fn test_settings_rejects_unknown_store() {
        assert!(Settings::from_toml("[dedup]\nstore = \"redis\"\n").is_err());
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_from_env() {
        std::env::set_var("REPOSTER_CONFIG", "/tmp/reposter-test/config.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("REPOSTER_CONFIG");
        assert_eq!(path, PathBuf::from("/tmp/reposter-test/config.toml"));
    }

    #[test]
    #[serial]
    fn test_settings_load_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        std::env::set_var("REPOSTER_CONFIG", &path);
        let settings = Settings::load();
        std::env::remove_var("REPOSTER_CONFIG");
        assert_eq!(settings.unwrap().feed.max_scan, 25);
    }
}
