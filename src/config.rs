//! Configuration types for the service and its provider clients
//!
//! Configuration is layered: built-in defaults, then an optional JSON file
//! (by default `<config dir>/imaginarium/config.json`), then environment
//! variables, then command-line flags applied by the server launcher.

use crate::error::{ImaginariumError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variables read by [`AppConfig::apply_env`]
pub mod env_keys {
    pub const CLOUD_NAME: &str = "CLOUDINARY_CLOUD_NAME";
    pub const CLOUD_API_KEY: &str = "CLOUDINARY_API_KEY";
    pub const CLOUD_API_SECRET: &str = "CLOUDINARY_API_SECRET";
    pub const REMOVE_BG_API_KEY: &str = "REMOVE_BG_API_KEY";
    pub const PAYPAL_CLIENT_ID: &str = "PAYPAL_CLIENT_ID";
    pub const PAYPAL_CLIENT_SECRET: &str = "PAYPAL_CLIENT_SECRET";
    pub const PAYPAL_MODE: &str = "PAYPAL_MODE";
}

/// Image hosting provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostingConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Folder uploads land in and searches are scoped to
    pub folder: String,
    pub api_base: String,
    pub delivery_base: String,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: "imaginarium".to_string(),
            api_base: "https://api.cloudinary.com/v1_1".to_string(),
            delivery_base: "https://res.cloudinary.com".to_string(),
        }
    }
}

/// Background removal API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalApiConfig {
    pub api_key: String,
    pub endpoint: String,
}

impl Default for RemovalApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://api.remove.bg/v1.0/removebg".to_string(),
        }
    }
}

/// Payment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    #[default]
    Sandbox,
    Live,
}

impl PaymentMode {
    #[must_use]
    pub fn api_base(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://api-m.sandbox.paypal.com",
            Self::Live => "https://api-m.paypal.com",
        }
    }
}

impl std::str::FromStr for PaymentMode {
    type Err = ImaginariumError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "live" | "production" => Ok(Self::Live),
            other => Err(ImaginariumError::invalid_config(format!(
                "unknown payment mode '{other}' (expected sandbox or live)"
            ))),
        }
    }
}

/// Payment provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub client_id: String,
    pub client_secret: String,
    pub mode: PaymentMode,
    /// Overrides the mode's API base when set
    pub api_base: Option<String>,
    pub currency: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            mode: PaymentMode::default(),
            api_base: None,
            currency: "USD".to_string(),
        }
    }
}

impl PaymentConfig {
    #[must_use]
    pub fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or_else(|| self.mode.api_base())
    }
}

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub hosting: HostingConfig,
    pub removal: RemovalApiConfig,
    pub payments: PaymentConfig,

    /// Address the HTTP server binds to
    pub bind: String,

    /// Timeout for every provider request, in seconds (no retries)
    pub request_timeout_secs: u64,

    /// Debounce delay for prompt inputs, in milliseconds
    pub debounce_ms: u64,

    /// Page size for image listings
    pub page_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hosting: HostingConfig::default(),
            removal: RemovalApiConfig::default(),
            payments: PaymentConfig::default(),
            bind: "127.0.0.1:3000".to_string(),
            request_timeout_secs: 30,
            debounce_ms: 1000,
            page_size: 9,
        }
    }
}

impl AppConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imaginarium::AppConfig;
    ///
    /// let config = AppConfig::builder()
    ///     .cloud_name("demo")
    ///     .bind("0.0.0.0:8080")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.hosting.folder, "imaginarium");
    /// ```
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Default location of the config file
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("imaginarium").join("config.json"))
    }

    /// Read a JSON config file; missing fields take their defaults
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid JSON for this shape
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ImaginariumError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config '{}': {e}", path.display()),
            ))
        })?;
        let config = serde_json::from_str(&text)?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Load defaults, then the file (explicit or default location), then env
    ///
    /// An explicit path must exist; the default location is optional.
    ///
    /// # Errors
    /// - Explicit config file missing or malformed
    /// - Invalid `PAYPAL_MODE`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override credentials from environment-style lookups
    ///
    /// # Errors
    /// - Invalid payment mode value
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) -> Result<()> {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = value;
            }
        };
        set(&mut self.hosting.cloud_name, env_keys::CLOUD_NAME);
        set(&mut self.hosting.api_key, env_keys::CLOUD_API_KEY);
        set(&mut self.hosting.api_secret, env_keys::CLOUD_API_SECRET);
        set(&mut self.removal.api_key, env_keys::REMOVE_BG_API_KEY);
        set(&mut self.payments.client_id, env_keys::PAYPAL_CLIENT_ID);
        set(&mut self.payments.client_secret, env_keys::PAYPAL_CLIENT_SECRET);

        if let Some(mode) = lookup(env_keys::PAYPAL_MODE).filter(|v| !v.is_empty()) {
            self.payments.mode = mode.parse()?;
        }
        Ok(())
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Empty cloud name
    /// - Unparseable bind address
    /// - Timeout outside 1-600 seconds
    /// - Debounce above 10 seconds
    /// - Zero page size
    pub fn validate(&self) -> Result<()> {
        if self.hosting.cloud_name.trim().is_empty() {
            return Err(ImaginariumError::invalid_config(format!(
                "hosting cloud name is empty (set {} or hosting.cloud_name)",
                env_keys::CLOUD_NAME
            )));
        }

        self.bind.parse::<SocketAddr>().map_err(|e| {
            ImaginariumError::invalid_config(format!("bind address '{}': {e}", self.bind))
        })?;

        if !(1..=600).contains(&self.request_timeout_secs) {
            return Err(ImaginariumError::config_value_error(
                "request timeout",
                self.request_timeout_secs,
                "1-600",
                Some(30),
            ));
        }

        if self.debounce_ms > 10_000 {
            return Err(ImaginariumError::config_value_error(
                "debounce",
                self.debounce_ms,
                "0-10000",
                Some(1000),
            ));
        }

        if self.page_size == 0 {
            return Err(ImaginariumError::config_value_error(
                "page size",
                self.page_size,
                "1+",
                Some(9),
            ));
        }

        Ok(())
    }

    /// Names of credentials that are still empty
    #[must_use]
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for (value, key) in [
            (&self.hosting.api_key, env_keys::CLOUD_API_KEY),
            (&self.hosting.api_secret, env_keys::CLOUD_API_SECRET),
            (&self.removal.api_key, env_keys::REMOVE_BG_API_KEY),
            (&self.payments.client_id, env_keys::PAYPAL_CLIENT_ID),
            (&self.payments.client_secret, env_keys::PAYPAL_CLIENT_SECRET),
        ] {
            if value.is_empty() {
                missing.push(key);
            }
        }
        missing
    }

    #[must_use]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    /// Debouncer for prompt inputs with the configured delay
    #[must_use]
    pub fn prompt_debouncer(&self) -> crate::services::Debouncer {
        crate::services::Debouncer::new(std::time::Duration::from_millis(self.debounce_ms))
    }
}

/// Builder for `AppConfig`
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Start from an existing configuration
    #[must_use]
    pub fn from_config(config: AppConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn cloud_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.hosting.cloud_name = name.into();
        self
    }

    #[must_use]
    pub fn hosting_credentials<K: Into<String>, S: Into<String>>(mut self, key: K, secret: S) -> Self {
        self.config.hosting.api_key = key.into();
        self.config.hosting.api_secret = secret.into();
        self
    }

    #[must_use]
    pub fn folder<S: Into<String>>(mut self, folder: S) -> Self {
        self.config.hosting.folder = folder.into();
        self
    }

    #[must_use]
    pub fn removal_api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.config.removal.api_key = key.into();
        self
    }

    #[must_use]
    pub fn payment_credentials<I: Into<String>, S: Into<String>>(
        mut self,
        client_id: I,
        client_secret: S,
    ) -> Self {
        self.config.payments.client_id = client_id.into();
        self.config.payments.client_secret = client_secret.into();
        self
    }

    #[must_use]
    pub fn payment_mode(mut self, mode: PaymentMode) -> Self {
        self.config.payments.mode = mode;
        self
    }

    #[must_use]
    pub fn bind<S: Into<String>>(mut self, bind: S) -> Self {
        self.config.bind = bind.into();
        self
    }

    /// Set provider request timeout (clamped to 1-600 seconds)
    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.clamp(1, 600);
        self
    }

    #[must_use]
    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.debounce_ms = ms.min(10_000);
        self
    }

    #[must_use]
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size.max(1);
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any validation failure from [`AppConfig::validate`]
    pub fn build(self) -> Result<AppConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
