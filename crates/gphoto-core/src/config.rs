//! Configuration management for gphoto.
//!
//! Loads configuration from `${GPHOTO_HOME}/config.yaml` with sensible defaults,
//! then applies `GOOGLE_*` / `AUTH_METHOD` environment overrides.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::auth::{AuthConfig, AuthMethod};
use crate::error::{Error, Result};

/// Redirect URI registered for the loopback flow.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/auth/callback";

/// Read-only access to items picked through the Photos Picker.
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/photospicker.mediaitems.readonly";

/// Redirect URI used by the out-of-band (manual code) flow.
pub const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Config value selecting the loopback flow.
pub const AUTH_METHOD_SERVER: &str = "server";

/// Config value selecting the manual code flow.
pub const AUTH_METHOD_OOB: &str = "oob";

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    pub google_scope: String,
    /// `server` (loopback callback) or `oob` (paste the code manually)
    pub auth_method: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google_client_id: String::new(),
            google_client_secret: String::new(),
            google_redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            google_scope: DEFAULT_SCOPE.to_string(),
            auth_method: AUTH_METHOD_SERVER.to_string(),
        }
    }
}

impl Config {
    /// Loads the config from the default path and applies environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&paths::config_path())?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Loads the config from `path`, returning defaults if the file is missing.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.fill_defaults();
        Ok(config)
    }

    /// Saves the config to the default path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&paths::config_path())
    }

    /// Saves the config to `path` with restricted permissions (0600).
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_yaml::to_string(self)?;
        write_private(path, contents.as_bytes())
    }

    /// Applies overrides from a key lookup (the process environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = non_empty("GOOGLE_CLIENT_ID") {
            self.google_client_id = value;
        }
        if let Some(value) = non_empty("GOOGLE_CLIENT_SECRET") {
            self.google_client_secret = value;
        }
        if let Some(value) = non_empty("GOOGLE_REDIRECT_URI") {
            self.google_redirect_uri = value;
        }
        if let Some(value) = non_empty("GOOGLE_SCOPE") {
            self.google_scope = value;
        }
        if let Some(value) = non_empty("AUTH_METHOD") {
            self.auth_method = value;
        }
    }

    fn fill_defaults(&mut self) {
        let defaults = Self::default();
        if self.google_redirect_uri.trim().is_empty() {
            self.google_redirect_uri = defaults.google_redirect_uri;
        }
        if self.google_scope.trim().is_empty() {
            self.google_scope = defaults.google_scope;
        }
        if self.auth_method.trim().is_empty() {
            self.auth_method = defaults.auth_method;
        }
    }

    /// Returns true when both client id and secret are present.
    pub fn is_configured(&self) -> bool {
        !self.google_client_id.trim().is_empty() && !self.google_client_secret.trim().is_empty()
    }

    /// Resolves the configured auth method; unknown values use the loopback flow.
    pub fn auth_method(&self) -> AuthMethod {
        match self.auth_method.trim() {
            AUTH_METHOD_OOB => AuthMethod::ManualCode,
            AUTH_METHOD_SERVER => AuthMethod::LocalServer,
            other => {
                tracing::warn!(auth_method = other, "unknown auth method, using local server");
                AuthMethod::LocalServer
            }
        }
    }

    /// Builds the OAuth settings for an acquisition attempt.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the client id or secret is empty.
    pub fn auth_config(&self) -> Result<AuthConfig> {
        if !self.is_configured() {
            return Err(Error::Configuration(
                "Google OAuth client id and secret are not configured".to_string(),
            ));
        }

        Ok(AuthConfig::new(
            self.google_client_id.trim(),
            self.google_client_secret.trim(),
            self.google_redirect_uri.trim(),
            self.google_scope.trim(),
            self.auth_method(),
        ))
    }
}

/// Writes `contents` to `path` with owner-only permissions, creating parent dirs.
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // mode() only applies on creation; tighten files left behind with looser bits
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)?;
    Ok(())
}

/// Masks a secret for display, keeping the first and last four characters.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
}

pub mod paths {
    //! Path resolution for gphoto configuration and data directories.
    //!
    //! `GPHOTO_HOME` resolution order:
    //! 1. `GPHOTO_HOME` environment variable (if set)
    //! 2. `~/.gphoto-cli` (default)

    use std::path::PathBuf;

    /// Returns the gphoto home directory.
    pub fn gphoto_home() -> PathBuf {
        if let Ok(home) = std::env::var("GPHOTO_HOME")
            && !home.trim().is_empty()
        {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(|| PathBuf::from(".gphoto-cli"), |h| h.join(".gphoto-cli"))
    }

    /// Returns the path to the config.yaml file.
    pub fn config_path() -> PathBuf {
        gphoto_home().join("config.yaml")
    }

    /// Returns the path to the stored OAuth credential.
    pub fn token_path() -> PathBuf {
        gphoto_home().join("token.json")
    }

    /// Returns the scratch directory used for previews.
    pub fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join("gphoto-cli")
    }

    /// Returns the default download directory (`~/gphoto-downloads`).
    pub fn default_download_dir() -> PathBuf {
        dirs::home_dir().map_or_else(
            || PathBuf::from("gphoto-downloads"),
            |h| h.join("gphoto-downloads"),
        )
    }
}
