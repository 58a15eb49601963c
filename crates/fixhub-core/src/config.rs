//! Configuration management for fixhub
//!
//! Settings are read from a TOML file (`fixhub.toml` by default) and then
//! overridden by environment variables, so secrets never have to live in the
//! file. Every field has a default; an absent file yields a usable config for
//! the commands that do not talk to GitHub or the agent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{FixhubError, Result};

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "fixhub.toml";

/// Top-level fixhub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixhubConfig {
    /// GitHub App identity and API settings
    #[serde(default)]
    pub github: GithubConfig,

    /// Agent (Responses API) settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Limits for the multi-round agent session
    #[serde(default)]
    pub session: SessionConfig,

    /// Request history storage
    #[serde(default)]
    pub store: StoreConfig,
}

/// GitHub App configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// REST API base URL
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// GitHub App id, used as the JWT issuer
    #[serde(default)]
    pub app_id: String,

    /// Inline PEM private key (PKCS#1 or PKCS#8)
    #[serde(default)]
    pub private_key: Option<String>,

    /// Path to a PEM private key, read only when `private_key` is blank
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,

    /// Installation id as configured; parsed lazily by [`GithubConfig::installation_id`]
    #[serde(default)]
    pub installation_id: Option<String>,

    /// Shared secret for `X-Hub-Signature-256` verification
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Prefix of the branches created for fixes
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_github_timeout_secs")]
    pub timeout_secs: u64,
}

/// Agent API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL; requests go to `<api_url>/v1/responses`
    #[serde(default = "default_agent_api_url")]
    pub api_url: String,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Inline API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// File holding the API key, read only when `api_key` is blank
    #[serde(default)]
    pub api_key_file: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
}

/// Bounds for the agent session loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How many file-request rounds are honoured before giving up
    #[serde(default = "default_max_file_request_cycles")]
    pub max_file_request_cycles: usize,

    /// Per-file truncation limit, in characters
    #[serde(default = "default_max_file_content_chars")]
    pub max_file_content_chars: usize,

    /// Cap on all file content appended to the task, in bytes
    #[serde(default = "default_max_appended_context_chars")]
    pub max_appended_context_chars: usize,

    /// Base branch used when the agent does not name one
    #[serde(default = "default_base_branch")]
    pub default_branch: String,
}

/// Request history storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding request records
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

// Default value providers
fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_branch_prefix() -> String {
    "fixhub/fix-".to_string()
}

fn default_github_timeout_secs() -> u64 {
    30
}

fn default_agent_api_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-5-codex".to_string()
}

fn default_agent_timeout_secs() -> u64 {
    120
}

fn default_max_file_request_cycles() -> usize {
    3
}

fn default_max_file_content_chars() -> usize {
    20_000
}

fn default_max_appended_context_chars() -> usize {
    60_000
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".fixhub/requests.json")
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            app_id: String::new(),
            private_key: None,
            private_key_file: None,
            installation_id: None,
            webhook_secret: None,
            branch_prefix: default_branch_prefix(),
            timeout_secs: default_github_timeout_secs(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_url: default_agent_api_url(),
            model: default_model(),
            api_key: None,
            api_key_file: None,
            timeout_secs: default_agent_timeout_secs(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_file_request_cycles: default_max_file_request_cycles(),
            max_file_content_chars: default_max_file_content_chars(),
            max_appended_context_chars: default_max_appended_context_chars(),
            default_branch: default_base_branch(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl FixhubConfig {
    /// Load configuration from `path` (or `fixhub.toml` in the working
    /// directory) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = Self::load_or_default(config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a TOML file, or defaults when it does not exist
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            toml::from_str(&content).map_err(|e| {
                FixhubError::Config(format!(
                    "Failed to parse config file {}: {}",
                    config_path.display(),
                    e
                ))
            })
        } else {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Write the default configuration to `config_path`
    pub fn write_default(config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| FixhubError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Override fields from environment variables
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_blank("GITHUB_API_URL") {
            self.github.api_url = v;
        }
        if let Some(v) = non_blank("GITHUB_APP_ID") {
            self.github.app_id = v;
        }
        if let Some(v) = non_blank("GITHUB_PRIVATE_KEY_PEM") {
            self.github.private_key = Some(v);
        }
        if let Some(v) = non_blank("GITHUB_PRIVATE_KEY_FILE") {
            self.github.private_key_file = Some(PathBuf::from(v));
        }
        if let Some(v) = non_blank("GITHUB_INSTALLATION_ID") {
            self.github.installation_id = Some(v);
        }
        if let Some(v) = non_blank("GITHUB_WEBHOOK_SECRET") {
            self.github.webhook_secret = Some(v);
        }
        if let Some(v) = non_blank("OPENAI_API_URL") {
            self.agent.api_url = v;
        }
        if let Some(v) = non_blank("OPENAI_API_KEY") {
            self.agent.api_key = Some(v);
        }
        if let Some(v) = non_blank("OPENAI_API_KEY_FILE") {
            self.agent.api_key_file = Some(PathBuf::from(v));
        }
        if let Some(v) = non_blank("FIXHUB_MODEL") {
            self.agent.model = v;
        }
    }
}

impl GithubConfig {
    /// Parse the configured installation id
    ///
    /// Blank and non-positive values mean "not configured" and yield `None`;
    /// the error for those surfaces when a token is first requested. A
    /// non-numeric value is rejected immediately.
    pub fn installation_id(&self) -> Result<Option<u64>> {
        let Some(raw) = self
            .installation_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            return Ok(None);
        };

        let id: i64 = raw.parse().map_err(|_| {
            FixhubError::Config(format!("GitHub installation id must be numeric: {}", raw))
        })?;
        Ok(u64::try_from(id).ok().filter(|id| *id > 0))
    }
}

impl AgentConfig {
    /// Resolve the API key from the inline value, then the key file
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_secret(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            "Agent API key is not configured (set OPENAI_API_KEY or OPENAI_API_KEY_FILE)",
        )
    }
}

/// Pick the inline secret when it is non-blank, otherwise read `file`
pub fn resolve_secret(inline: Option<&str>, file: Option<&Path>, missing: &str) -> Result<String> {
    if let Some(value) = inline.filter(|v| !v.trim().is_empty()) {
        return Ok(value.trim().to_string());
    }

    if let Some(path) = file.filter(|p| !p.as_os_str().is_empty()) {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FixhubError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if !content.trim().is_empty() {
            return Ok(content.trim().to_string());
        }
    }

    Err(FixhubError::Config(missing.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = FixhubConfig::default();
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.branch_prefix, "fixhub/fix-");
        assert_eq!(config.session.max_file_request_cycles, 3);
        assert_eq!(config.session.max_file_content_chars, 20_000);
        assert_eq!(config.session.max_appended_context_chars, 60_000);
        assert_eq!(config.session.default_branch, "main");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = FixhubConfig::load_or_default(&temp.path().join("fixhub.toml")).unwrap();
        assert_eq!(config.agent.timeout_secs, 120);
    }

    #[test]
    fn test_load_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fixhub.toml");
        std::fs::write(
            &path,
            r#"
[github]
app_id = "12345"
installation_id = "987"

[session]
max_file_request_cycles = 5
"#,
        )
        .unwrap();

        let config = FixhubConfig::load_or_default(&path).unwrap();
        assert_eq!(config.github.app_id, "12345");
        assert_eq!(config.github.installation_id().unwrap(), Some(987));
        assert_eq!(config.session.max_file_request_cycles, 5);
        assert_eq!(config.session.default_branch, "main");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fixhub.toml");
        std::fs::write(&path, "[github\napp_id = ").unwrap();

        let err = FixhubConfig::load_or_default(&path).unwrap_err();
        assert!(matches!(err, FixhubError::Config(_)));
    }

    #[test]
    fn test_write_default_round_trips() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/fixhub.toml");
        FixhubConfig::write_default(&path).unwrap();

        let config = FixhubConfig::load_or_default(&path).unwrap();
        assert_eq!(config.store.path, PathBuf::from(".fixhub/requests.json"));
    }

    #[test]
    fn test_env_overrides() {
        let env = env_map(&[
            ("GITHUB_APP_ID", "42"),
            ("GITHUB_INSTALLATION_ID", "7"),
            ("OPENAI_API_KEY", "sk-test"),
            ("FIXHUB_MODEL", "   "),
        ]);
        let mut config = FixhubConfig::default();
        config.apply_env(|k| env.get(k).cloned());

        assert_eq!(config.github.app_id, "42");
        assert_eq!(config.github.installation_id().unwrap(), Some(7));
        assert_eq!(config.agent.resolve_api_key().unwrap(), "sk-test");
        // blank values do not override
        assert_eq!(config.agent.model, "gpt-5-codex");
    }

    #[test]
    fn test_installation_id_validation() {
        let mut github = GithubConfig::default();
        assert_eq!(github.installation_id().unwrap(), None);

        github.installation_id = Some("abc".to_string());
        assert!(matches!(
            github.installation_id(),
            Err(FixhubError::Config(_))
        ));

        github.installation_id = Some("0".to_string());
        assert_eq!(github.installation_id().unwrap(), None);

        github.installation_id = Some("-4".to_string());
        assert_eq!(github.installation_id().unwrap(), None);

        github.installation_id = Some(" 31337 ".to_string());
        assert_eq!(github.installation_id().unwrap(), Some(31337));
    }

    #[test]
    fn test_resolve_secret_prefers_inline() {
        let temp = TempDir::new().unwrap();
        let key_file = temp.path().join("key.txt");
        std::fs::write(&key_file, "from-file\n").unwrap();

        let inline = resolve_secret(Some("inline"), Some(&key_file), "missing").unwrap();
        assert_eq!(inline, "inline");

        let from_file = resolve_secret(Some("  "), Some(&key_file), "missing").unwrap();
        assert_eq!(from_file, "from-file");

        let err = resolve_secret(None, None, "missing").unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: missing");
    }
}
