/*!
common/src/lib.rs

Shared configuration types and secret resolution for newsrewrite.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that layers an override file on top of the defaults
- Resolution of the environment-supplied secrets (provider keys, CMS credentials,
  access password hash)
*/

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// HTTP server section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    /// Directory holding `index.html` and `login.html`
    pub static_dir: Option<String>,
    /// Directory where uploaded images are staged before being proxied to the CMS
    pub upload_dir: Option<String>,
    pub max_upload_mb: Option<u64>,
}

/// OpenRouter (native async) provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Azure-style provider (GitHub Models inference endpoint, blocking client)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureConfig {
    pub endpoint: Option<String>,
    pub token_env: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

/// LLM top-level config grouping the two provider styles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub openrouter: Option<OpenRouterConfig>,
    pub azure: Option<AzureConfig>,
}

/// WordPress (CMS) settings. Credentials themselves come from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WordPressConfig {
    /// Site URL; when absent it is read from `site_url_env`
    pub site_url: Option<String>,
    pub site_url_env: Option<String>,
    pub api_token_env: Option<String>,
    pub app_password_env: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub default_post_status: Option<String>,
    /// Static category name -> id table. Empty means "look categories up live".
    #[serde(default)]
    pub categories: BTreeMap<String, i64>,
}

/// Access control
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub password_hash_env: Option<String>,
    pub session_token_file: Option<String>,
    pub session_token_file_env: Option<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub wordpress: WordPressConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for (label, path) in [("default", default_path), ("override", override_path)] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {} config: {}", label, path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse {} configuration", label))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Secrets resolved from the environment at startup.
///
/// Provider credentials are optional: a missing key only disables that provider
/// family (its calls fail as generic errors). CMS credentials and the access
/// password hash are required and abort startup when absent.
#[derive(Clone)]
pub struct Secrets {
    pub openrouter_api_key: Option<String>,
    pub github_token: Option<String>,
    pub wordpress_site_url: String,
    pub wordpress_api_token: String,
    pub wordpress_app_password: String,
    pub access_password_hash: String,
    pub session_token_file: PathBuf,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("openrouter_api_key", &mask(self.openrouter_api_key.as_deref()))
            .field("github_token", &mask(self.github_token.as_deref()))
            .field("wordpress_site_url", &self.wordpress_site_url)
            .field("wordpress_api_token", &mask(Some(&self.wordpress_api_token)))
            .field("wordpress_app_password", &mask(Some(&self.wordpress_app_password)))
            .field("session_token_file", &self.session_token_file)
            .finish()
    }
}

impl Secrets {
    /// Resolve secrets from the process environment.
    pub fn resolve(config: &Config) -> Result<Self> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve secrets through an arbitrary lookup (used by tests and by `resolve`).
    pub fn resolve_with<F>(config: &Config, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |name: &str| {
            get(name).with_context(|| format!("{} environment variable must be set", name))
        };

        let wp = &config.wordpress;
        let auth = &config.auth;

        let site_url = match wp.site_url.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(url) => url.to_string(),
            None => require(wp.site_url_env.as_deref().unwrap_or("WORDPRESS_SITE_URL"))?,
        };
        let parsed = url::Url::parse(&site_url)
            .with_context(|| format!("WordPress site URL is not a valid URL: {}", site_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("WordPress site URL must use http or https: {}", site_url);
        }

        let session_token_file = get(auth.session_token_file_env.as_deref().unwrap_or("SESSION_TOKEN_FILE"))
            .or_else(|| auth.session_token_file.clone())
            .unwrap_or_else(|| "session_token.txt".to_string());

        let app_password_env = wp.app_password_env.as_deref().unwrap_or("WORDPRESS_APP_PASSWORD");
        let wordpress_app_password = require(app_password_env)?;
        match wordpress_app_password.split_once(':') {
            Some((user, pass)) if !user.is_empty() && !pass.is_empty() => {}
            _ => bail!("{} must be `username:application-password`", app_password_env),
        }

        Ok(Self {
            openrouter_api_key: get(config.openrouter_key_env()),
            github_token: get(config.azure_token_env()),
            wordpress_site_url: site_url.trim_end_matches('/').to_string(),
            wordpress_api_token: require(wp.api_token_env.as_deref().unwrap_or("WORDPRESS_API_TOKEN"))?,
            wordpress_app_password,
            access_password_hash: require(auth.password_hash_env.as_deref().unwrap_or("ACCESS_PASSWORD_HASH"))?,
            session_token_file: PathBuf::from(session_token_file),
        })
    }
}

impl Config {
    pub fn openrouter_key_env(&self) -> &str {
        self.llm
            .openrouter
            .as_ref()
            .and_then(|o| o.api_key_env.as_deref())
            .unwrap_or("API_KEY")
    }

    pub fn azure_token_env(&self) -> &str {
        self.llm
            .azure
            .as_ref()
            .and_then(|a| a.token_env.as_deref())
            .unwrap_or("GITHUB_TOKEN")
    }
}

/// Mask a secret for logging: one `*` per character, or `N/A` when unset.
pub fn mask(secret: Option<&str>) -> String {
    match secret {
        Some(s) if !s.is_empty() => "*".repeat(s.chars().count()),
        _ => "N/A".to_string(),
    }
}
