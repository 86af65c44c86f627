//! Configuration loading, path resolution and atomic write-back
//!
//! Priority order for the config file path:
//! 1. Command-line argument (highest priority)
//! 2. `TUNEPORT_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/tuneport/config.toml`)
//!
//! A missing file is not an error: the compiled defaults are used and a
//! warning is logged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "TUNEPORT_CONFIG";

/// Environment variable carrying a catalog access token
pub const TOKEN_ENV_VAR: &str = "TUNEPORT_ACCESS_TOKEN";

const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";

/// Tolerance used when checking that scoring weights sum to one
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Complete tuneport configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub catalog: CatalogConfig,
    pub resolver: ResolverSettings,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

/// Catalog (music service) connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    /// Web API base URL
    pub base_url: String,
    /// Bearer token used for every catalog call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Market (ISO country code) passed to searches
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    /// Client-side request quota
    pub requests_per_second: u32,
    /// Total per-request timeout
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: None,
            market: None,
            requests_per_second: 5,
            timeout_secs: 15,
        }
    }
}

/// Scoring weights, selection thresholds and search limits for the resolver
///
/// The defaults are tuning values, not derived constants; every field can be
/// overridden from the `[resolver]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverSettings {
    /// Minimum top score for automatic acceptance
    pub accept_threshold: f64,
    /// Required lead of the top score over the runner-up
    pub margin_threshold: f64,
    /// Scores below this never count as plausible
    pub floor_threshold: f64,
    /// Weight of title similarity in the final score
    pub title_weight: f64,
    /// Weight of artist similarity in the final score
    pub artist_weight: f64,
    /// Candidates requested by the narrow strategies
    pub search_limit: u32,
    /// Candidates requested by the broad fuzzy strategy
    pub broad_limit: u32,
    /// Fixed backoff before the single retry of a transient failure
    pub retry_backoff_ms: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            accept_threshold: 0.90,
            margin_threshold: 0.05,
            floor_threshold: 0.60,
            title_weight: 0.7,
            artist_weight: 0.3,
            search_limit: 5,
            broad_limit: 20,
            retry_backoff_ms: 1000,
        }
    }
}

impl ResolverSettings {
    /// Check thresholds, weights and limits for consistency
    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("accept_threshold", self.accept_threshold),
            ("margin_threshold", self.margin_threshold),
            ("floor_threshold", self.floor_threshold),
            ("title_weight", self.title_weight),
            ("artist_weight", self.artist_weight),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "resolver.{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.floor_threshold > self.accept_threshold {
            return Err(Error::Config(format!(
                "resolver.floor_threshold ({}) exceeds accept_threshold ({})",
                self.floor_threshold, self.accept_threshold
            )));
        }

        let weight_sum = self.title_weight + self.artist_weight;
        if (weight_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::Config(format!(
                "resolver.title_weight + resolver.artist_weight must equal 1.0, got {}",
                weight_sum
            )));
        }

        if self.search_limit == 0 || self.broad_limit == 0 {
            return Err(Error::Config(
                "resolver.search_limit and resolver.broad_limit must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Batch driver settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of songs resolved concurrently
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.resolver.validate()?;

        if self.batch.concurrency == 0 {
            return Err(Error::Config("batch.concurrency must be at least 1".to_string()));
        }
        if self.catalog.requests_per_second == 0 {
            return Err(Error::Config(
                "catalog.requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.catalog.base_url.trim().is_empty() {
            return Err(Error::Config("catalog.base_url must not be empty".to_string()));
        }

        Ok(())
    }

    /// Copy of this config with the access token masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.catalog.access_token.is_some() {
            copy.catalog.access_token = Some("********".to_string());
        }
        copy
    }
}

/// Resolve the config file path (CLI > ENV > platform default)
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// Platform default config path
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("tuneport").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// Load and validate a config file
///
/// Missing files degrade to [`TomlConfig::default`] with a warning.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "Config file not found, using compiled defaults"
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content).map_err(|e| Error::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    config.validate()?;

    #[cfg(unix)]
    {
        if config.catalog.access_token.is_some() && check_toml_permissions_loose(path)? {
            warn!(
                path = %path.display(),
                "Config file holds an access token but is readable by other users (expected 0600)"
            );
        }
    }

    debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Write config atomically (temp file + rename)
///
/// On Unix the file is restricted to 0600 because it may hold a token.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Internal(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(Error::Io(e));
    }

    info!(path = %path.display(), "Config written");
    Ok(())
}

/// Returns true when group/other permission bits are set
#[cfg(unix)]
pub fn check_toml_permissions_loose(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path)?.permissions().mode();
    Ok(mode & 0o077 != 0)
}

/// Token must be non-empty and non-whitespace
pub fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}

/// Resolve the catalog access token
///
/// **Priority:** CLI → ENV → TOML
pub fn resolve_access_token(cli_arg: Option<&str>, config: &TomlConfig) -> Result<String> {
    let env_token = std::env::var(TOKEN_ENV_VAR).ok();
    let toml_token = config.catalog.access_token.as_deref();

    let sources: Vec<&str> = [
        (cli_arg, "command line"),
        (env_token.as_deref(), "environment"),
        (toml_token, "TOML"),
    ]
    .iter()
    .filter(|(value, _)| value.map(is_valid_token).unwrap_or(false))
    .map(|(_, name)| *name)
    .collect();

    if sources.len() > 1 {
        warn!(
            "Access token found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    for (candidate, source) in [
        (cli_arg, "command line"),
        (env_token.as_deref(), "environment variable"),
        (toml_token, "TOML config"),
    ] {
        if let Some(token) = candidate {
            if is_valid_token(token) {
                debug!("Access token loaded from {}", source);
                return Ok(token.trim().to_string());
            }
        }
    }

    Err(Error::Config(format!(
        "Catalog access token not configured. Provide one of:\n\
         1. Command line: --token <TOKEN>\n\
         2. Environment: {}=<TOKEN>\n\
         3. TOML config: [catalog] access_token = \"<TOKEN>\"",
        TOKEN_ENV_VAR
    )))
}

/// Standard User-Agent for outgoing HTTP requests
pub fn get_user_agent() -> String {
    format!(
        "tuneport/{} (https://github.com/tuneport/tuneport)",
        env!("CARGO_PKG_VERSION")
    )
}
