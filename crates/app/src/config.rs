use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use gradtrack_core::model::UserId;
use services::SyncConfig;
use services::progress_sync::DEFAULT_QUIET_WINDOW;
use thiserror::Error;

pub const DEFAULT_DB_URL: &str = "sqlite://gradtrack.sqlite3";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Where application data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Backend {
    #[default]
    Sqlite,
    Rest,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "rest" | "postgrest" => Ok(Self::Rest),
            _ => Err(ConfigError::InvalidBackend(s.to_owned())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sqlite => "sqlite",
            Self::Rest => "rest",
        })
    }
}

/// Hosted database endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestSettings {
    pub url: String,
    pub api_key: String,
    /// User access token; requests fall back to the anon key without it.
    pub access_token: Option<String>,
}

/// Tracing controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Top-level configuration for the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub backend: Backend,
    pub db_url: String,
    pub rest: Option<RestSettings>,
    pub user_id: Option<UserId>,
    pub telemetry: TelemetryConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("GRADTRACK_BACKEND must be `sqlite` or `rest`, got `{0}`")]
    InvalidBackend(String),
    #[error("GRADTRACK_QUIET_WINDOW_MS must be a whole number of milliseconds, got `{0}`")]
    InvalidQuietWindow(String),
    #[error("GRADTRACK_USER_ID must be a UUID, got `{0}`")]
    InvalidUserId(String),
    #[error("{0} is required for the rest backend")]
    MissingRestSetting(&'static str),
    #[error("no user given; pass --user or set GRADTRACK_USER_ID")]
    MissingUser,
}

impl AppConfig {
    /// Read `.env` and the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is present but malformed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup; unset or blank keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a value is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = get("GRADTRACK_BACKEND")
            .map(|v| v.parse::<Backend>())
            .transpose()?
            .unwrap_or_default();

        let db_url = get("GRADTRACK_DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.to_owned());

        let rest = match (get("GRADTRACK_REST_URL"), get("GRADTRACK_REST_KEY")) {
            (Some(url), Some(api_key)) => Some(RestSettings {
                url,
                api_key,
                access_token: get("GRADTRACK_REST_TOKEN"),
            }),
            _ => None,
        };

        let user_id = get("GRADTRACK_USER_ID")
            .map(|raw| {
                raw.trim()
                    .parse::<UserId>()
                    .map_err(|_| ConfigError::InvalidUserId(raw.clone()))
            })
            .transpose()?;

        let quiet_window = get("GRADTRACK_QUIET_WINDOW_MS")
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| ConfigError::InvalidQuietWindow(raw.clone()))
            })
            .transpose()?
            .unwrap_or(DEFAULT_QUIET_WINDOW);

        let log_level = get("GRADTRACK_LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned());

        Ok(Self {
            backend,
            db_url,
            rest,
            user_id,
            telemetry: TelemetryConfig { log_level },
            sync: SyncConfig::with_quiet_window(quiet_window),
        })
    }

    /// Same as `from_lookup` over a fixed map.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a value is malformed.
    pub fn from_map(vars: &HashMap<&str, &str>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).map(|v| (*v).to_owned()))
    }

    /// # Errors
    ///
    /// Returns `ConfigError::MissingUser` when no user was configured.
    pub fn require_user(&self) -> Result<UserId, ConfigError> {
        self.user_id.ok_or(ConfigError::MissingUser)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::MissingRestSetting` naming the first absent variable.
    pub fn require_rest(&self) -> Result<&RestSettings, ConfigError> {
        self.rest
            .as_ref()
            .ok_or(ConfigError::MissingRestSetting("GRADTRACK_REST_URL and GRADTRACK_REST_KEY"))
    }
}

/// Turn a bare path into an absolute `sqlite://` URL; other forms pass through.
#[must_use]
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("sqlite::memory:")
        || trimmed.starts_with("sqlite://")
        || trimmed.starts_with("sqlite:file:")
    {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the file behind a `sqlite://` URL exists so the pool can open it.
///
/// # Errors
///
/// Returns any I/O error from creating the parent directory or the file.
pub fn prepare_sqlite_file(db_url: &str) -> std::io::Result<()> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Ok(());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = AppConfig::from_map(&HashMap::new()).unwrap();
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.db_url, DEFAULT_DB_URL);
        assert_eq!(config.rest, None);
        assert_eq!(config.user_id, None);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.sync.quiet_window, Duration::from_millis(250));
        assert_eq!(config.require_user(), Err(ConfigError::MissingUser));
    }

    #[test]
    fn reads_every_variable() {
        let vars = HashMap::from([
            ("GRADTRACK_BACKEND", "REST"),
            ("GRADTRACK_DB_URL", "sqlite://data/apps.db"),
            ("GRADTRACK_REST_URL", "https://db.example.org"),
            ("GRADTRACK_REST_KEY", "anon"),
            ("GRADTRACK_USER_ID", "6f1c1a4e-3b7a-4f53-9a7e-0c4b1a2d3e4f"),
            ("GRADTRACK_LOG_LEVEL", "gradtrack=debug"),
            ("GRADTRACK_QUIET_WINDOW_MS", "40"),
        ]);
        let config = AppConfig::from_map(&vars).unwrap();
        assert_eq!(config.backend, Backend::Rest);
        assert_eq!(config.db_url, "sqlite://data/apps.db");
        assert_eq!(config.require_rest().unwrap().api_key, "anon");
        assert_eq!(config.require_rest().unwrap().access_token, None);
        assert_eq!(
            config.require_user().unwrap().to_string(),
            "6f1c1a4e-3b7a-4f53-9a7e-0c4b1a2d3e4f"
        );
        assert_eq!(config.telemetry.log_level, "gradtrack=debug");
        assert_eq!(config.sync.quiet_window, Duration::from_millis(40));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let vars = HashMap::from([("GRADTRACK_BACKEND", "  "), ("GRADTRACK_LOG_LEVEL", "")]);
        let config = AppConfig::from_map(&vars).unwrap();
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn malformed_values_are_rejected() {
        let bad_backend = HashMap::from([("GRADTRACK_BACKEND", "mongo")]);
        assert_eq!(
            AppConfig::from_map(&bad_backend).unwrap_err(),
            ConfigError::InvalidBackend("mongo".into())
        );

        let bad_window = HashMap::from([("GRADTRACK_QUIET_WINDOW_MS", "soon")]);
        assert_eq!(
            AppConfig::from_map(&bad_window).unwrap_err(),
            ConfigError::InvalidQuietWindow("soon".into())
        );

        let bad_user = HashMap::from([("GRADTRACK_USER_ID", "alice")]);
        assert_eq!(
            AppConfig::from_map(&bad_user).unwrap_err(),
            ConfigError::InvalidUserId("alice".into())
        );
    }

    #[test]
    fn rest_token_is_optional() {
        let vars = HashMap::from([
            ("GRADTRACK_REST_URL", "https://db.example.org"),
            ("GRADTRACK_REST_KEY", "anon"),
            ("GRADTRACK_REST_TOKEN", "user-jwt"),
        ]);
        let config = AppConfig::from_map(&vars).unwrap();
        assert_eq!(
            config.require_rest().unwrap().access_token.as_deref(),
            Some("user-jwt")
        );
    }

    #[test]
    fn rest_needs_both_url_and_key() {
        let vars = HashMap::from([("GRADTRACK_REST_URL", "https://db.example.org")]);
        let config = AppConfig::from_map(&vars).unwrap();
        assert!(matches!(
            config.require_rest(),
            Err(ConfigError::MissingRestSetting(_))
        ));
    }

    #[test]
    fn sqlite_urls_are_normalized() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/a.db"),
            "sqlite:///tmp/a.db"
        );
        assert_eq!(normalize_sqlite_url("sqlite:/tmp/a.db"), "sqlite:///tmp/a.db");
        assert!(normalize_sqlite_url("apps.db").starts_with("sqlite:///"));
        assert!(normalize_sqlite_url("apps.db").ends_with("/apps.db"));
    }
}
