//! Configuration management for ollamacode
//!
//! TOML file with one table per concern; every table and field falls back
//! to its default, so a partial file is valid.
//! Location: ~/.ollamacode/config.toml

use crate::correction::DEFAULT_MAX_ATTEMPTS;
use crate::dispatch::DispatchSettings;
use crate::errors::{AgentError, Result};
use crate::search::{SearchSettings, DEFAULT_SEARX_INSTANCES};
use crate::streaming::{DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::tools::process::DEFAULT_TIMEOUT_SECS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory under the home directory holding config, history and projects
pub const STATE_DIR: &str = "~/.ollamacode";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub correction: CorrectionConfig,
    pub search: SearchConfig,
    pub shell: ShellConfig,
    pub writes: WritesConfig,
    pub telemetry: TelemetryConfig,
    pub paths: PathsConfig,
}

/// Ollama connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub port: u16,
    pub default_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Validations per artifact, the first one included
    pub max_attempts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub enabled: bool,
    pub max_results: usize,
    pub max_pages: usize,
    pub min_relevance: f64,
    pub page_char_limit: usize,
    pub context_char_limit: usize,
    pub timeout_secs: u64,
    pub searx_instances: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Interpreter named in the tool instructions for running Python files
    pub python_command: String,
    /// Prefix of commands that open a new terminal and are not awaited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_launcher: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WritesConfig {
    /// Preview and ask before every mutation
    pub confirm: bool,
}

/// Telemetry display configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub default_verbosity: String,
    pub show_spinner: bool,
    pub color_output: bool,
}

/// File system paths configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub state_dir: String,
    pub history_file: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 11434,
            default_model: DEFAULT_MODEL.to_string(),
            temperature: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        let limits = SearchSettings::default();
        Self {
            enabled: true,
            max_results: limits.max_results,
            max_pages: limits.max_pages,
            min_relevance: limits.min_relevance,
            page_char_limit: limits.page_char_limit,
            context_char_limit: limits.context_char_limit,
            timeout_secs: 10,
            searx_instances: DEFAULT_SEARX_INSTANCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            python_command: "python3".to_string(),
            terminal_launcher: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for WritesConfig {
    fn default() -> Self {
        Self { confirm: true }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_verbosity: "normal".to_string(),
            show_spinner: true,
            color_output: true,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: STATE_DIR.to_string(),
            history_file: format!("{}/history.txt", STATE_DIR),
        }
    }
}

impl Config {
    /// Load from `path`, or from the standard location, or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load_default(),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AgentError::ConfigError(format!("Failed to read config {}: {}", path.display(), e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| AgentError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Standard location if present, built-in defaults otherwise
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            return Self::load_from_file(&path);
        }
        Ok(Config::default())
    }

    pub fn default_path() -> PathBuf {
        Self::expand_path(STATE_DIR).join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        if self.ollama.default_model.trim().is_empty() {
            return Err(AgentError::ConfigError("default_model must not be empty".to_string()));
        }

        if self.ollama.request_timeout_secs == 0 || self.shell.timeout_secs == 0 {
            return Err(AgentError::ConfigError("timeouts must be greater than 0".to_string()));
        }

        if let Some(temperature) = self.ollama.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(AgentError::ConfigError(
                    "temperature must be between 0.0 and 2.0".to_string(),
                ));
            }
        }

        if self.correction.max_attempts == 0 {
            return Err(AgentError::ConfigError(
                "correction.max_attempts must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.search.min_relevance) {
            return Err(AgentError::ConfigError(
                "search.min_relevance must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.search.max_results == 0 || self.search.page_char_limit == 0 {
            return Err(AgentError::ConfigError(
                "search.max_results and search.page_char_limit must be greater than 0".to_string(),
            ));
        }

        if self.search.context_char_limit < self.search.page_char_limit {
            return Err(AgentError::ConfigError(
                "search.context_char_limit must be at least search.page_char_limit".to_string(),
            ));
        }

        if self.search.enabled && self.search.searx_instances.iter().any(|u| url::Url::parse(u).is_err()) {
            return Err(AgentError::ConfigError(
                "search.searx_instances must be absolute URLs".to_string(),
            ));
        }

        match self.telemetry.default_verbosity.as_str() {
            "quiet" | "normal" | "verbose" | "very_verbose" => {}
            other => {
                return Err(AgentError::ConfigError(format!("Invalid verbosity level: {}", other)))
            }
        }

        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| AgentError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AgentError::ConfigError(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| AgentError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AgentError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    /// Expand a leading `~/`
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    pub fn state_dir(&self) -> PathBuf {
        Self::expand_path(&self.paths.state_dir)
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.state_dir().join("projects")
    }

    pub fn history_path(&self) -> PathBuf {
        Self::expand_path(&self.paths.history_file)
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            max_results: self.search.max_results,
            max_pages: self.search.max_pages,
            min_relevance: self.search.min_relevance,
            page_char_limit: self.search.page_char_limit,
            context_char_limit: self.search.context_char_limit,
            ..SearchSettings::default()
        }
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            max_attempts: self.correction.max_attempts,
            confirm_writes: self.writes.confirm,
            search: self.search_settings(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ollama.host, "127.0.0.1");
        assert_eq!(config.ollama.port, 11434);
        assert_eq!(config.correction.max_attempts, 3);
        assert!(config.writes.confirm);
        assert!(config.search.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            "[ollama]\ndefault_model = \"llama3\"\n\n[search]\nenabled = false\n",
        )
        .unwrap();
        assert_eq!(config.ollama.default_model, "llama3");
        assert_eq!(config.ollama.port, 11434);
        assert!(!config.search.enabled);
        assert_eq!(config.search.max_pages, 3);
        assert_eq!(config.shell.python_command, "python3");
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let mut config = Config::default();
        config.correction.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_relevance() {
        let mut config = Config::default();
        config.search.min_relevance = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_instance_url() {
        let mut config = Config::default();
        config.search.searx_instances = vec!["not a url".to_string()];
        assert!(config.validate().is_err());

        config.search.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_verbosity() {
        let mut config = Config::default();
        config.telemetry.default_verbosity = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.shell.terminal_launcher = Some("gnome-terminal --".to_string());
        config.ollama.temperature = Some(0.2);

        config.save(&path).unwrap();
        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_dispatch_settings_follow_sections() {
        let mut config = Config::default();
        config.writes.confirm = false;
        config.correction.max_attempts = 5;
        config.search.page_char_limit = 1000;

        let settings = config.dispatch_settings();
        assert!(!settings.confirm_writes);
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.search.page_char_limit, 1000);
    }

    #[test]
    fn test_ollama_url() {
        assert_eq!(Config::default().ollama_url(), "http://127.0.0.1:11434");
    }

    #[test]
    fn test_expand_path() {
        assert!(!Config::expand_path("~/.ollamacode").to_string_lossy().contains('~'));
        assert_eq!(Config::expand_path("/absolute/path"), PathBuf::from("/absolute/path"));
    }
}
