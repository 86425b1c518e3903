//! Admin API connection settings.
//!
//! Settings are resolved with the precedence command-line flag, then
//! environment variable (both merged by clap before they reach this module),
//! then settings file, then built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, GatesyncError, Result};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Settings file location relative to the home directory.
const SETTINGS_DIR: &str = ".gatesync";
const SETTINGS_FILE: &str = "config.yaml";

/// Resolved admin API connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminSettings {
    /// Admin API base URL, always carrying a scheme.
    pub admin_url: String,
    /// Admin token.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Workspace prefix.
    pub workspace: Option<String>,
    /// Skip TLS certificate verification.
    pub tls_skip_verify: bool,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            admin_url: String::new(),
            token: None,
            workspace: None,
            tls_skip_verify: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    /// Admin API URL.
    pub admin_url: Option<String>,
    /// Admin token.
    pub token: Option<String>,
    /// Workspace.
    pub workspace: Option<String>,
    /// Skip TLS verification when `Some(true)`.
    pub tls_skip_verify: Option<bool>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// On-disk settings file.
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    admin_url: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    workspace: Option<String>,
    #[serde(default)]
    tls_skip_verify: Option<bool>,
    #[serde(default)]
    timeout: Option<u64>,
}

impl AdminSettings {
    /// Resolves settings from overrides and an optional settings file.
    ///
    /// When `settings_path` is `None`, `~/.gatesync/config.yaml` is read if it
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given settings file is missing, a
    /// settings file cannot be parsed, or no admin URL is configured.
    pub fn resolve(overrides: &SettingsOverrides, settings_path: Option<&Path>) -> Result<Self> {
        let file = match settings_path {
            Some(path) => {
                if !path.exists() {
                    return Err(GatesyncError::Config(ConfigError::FileNotFound {
                        path: path.to_path_buf(),
                    }));
                }
                Self::read_file(path)?
            }
            None => match default_settings_path() {
                Some(path) if path.exists() => Self::read_file(&path)?,
                _ => SettingsFile::default(),
            },
        };

        let admin_url = pick(overrides.admin_url.as_deref(), file.admin_url.as_deref())
            .ok_or_else(|| ConfigError::MissingSetting {
                name: String::from("admin_url"),
                hint: String::from(
                    "pass --admin-url, set GATESYNC_ADMIN_URL, or add admin_url to the settings file",
                ),
            })?;

        let settings = Self {
            admin_url: with_scheme(&admin_url),
            token: pick(overrides.token.as_deref(), file.token.as_deref()),
            workspace: pick(overrides.workspace.as_deref(), file.workspace.as_deref()),
            tls_skip_verify: overrides
                .tls_skip_verify
                .or(file.tls_skip_verify)
                .unwrap_or(false),
            timeout_secs: overrides
                .timeout_secs
                .or(file.timeout)
                .filter(|t| *t > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        debug!(
            "Resolved admin settings: url={}, workspace={:?}, timeout={}s",
            settings.admin_url, settings.workspace, settings.timeout_secs
        );
        Ok(settings)
    }

    fn read_file(path: &Path) -> Result<SettingsFile> {
        info!("Loading settings from: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(SettingsFile::default());
        }

        serde_yaml::from_str(&content).map_err(|e| {
            GatesyncError::Config(ConfigError::ParseError {
                message: format!("Invalid settings file: {e}"),
                location: Some(path.display().to_string()),
            })
        })
    }
}

/// Loads a `.env` file from `base` (or the working directory) if present.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be loaded.
pub fn load_dotenv(base: Option<&Path>) -> Result<()> {
    let env_path = base.map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

    if env_path.exists() {
        info!("Loading environment from: {}", env_path.display());
        dotenvy::from_path(&env_path).map_err(|e| {
            GatesyncError::Config(ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })
        })?;
    } else {
        debug!(".env file not found at: {}", env_path.display());
    }

    Ok(())
}

/// Returns the default settings file path.
#[must_use]
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(SETTINGS_DIR).join(SETTINGS_FILE))
}

/// Returns the first non-empty value.
fn pick(primary: Option<&str>, fallback: Option<&str>) -> Option<String> {
    [primary, fallback]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(String::from)
}

/// Prefixes `http://` when the URL carries no scheme.
#[must_use]
pub fn with_scheme(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}
