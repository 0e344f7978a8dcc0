//! Configuration management for QA Base.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.qabase/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with all state stored in `.qabase/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".qabase";

/// Embedding providers the knowledge crate knows how to build.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 2] = ["trigram", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .qabase/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// SQLite database override (defaults to .qabase/qa.sqlite)
    pub database: Option<PathBuf>,

    /// Vector store directory override (defaults to .qabase/vector_store)
    pub vector_store: Option<PathBuf>,

    /// Index behaviour
    pub index: IndexSettings,

    /// Embedding provider selection
    pub embedding: EmbeddingSettings,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub json_logs: bool,
}

/// Query and registry tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    /// Maximum distance for a hit to be returned. Zero or negative disables the cut.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,

    /// Default number of hits per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Soft bound on the number of indices kept in memory
    #[serde(default = "default_max_loaded_indices")]
    pub max_loaded_indices: usize,

    /// Treat an update that finds no index entry as a not-found error
    #[serde(default)]
    pub strict_updates: bool,
}

fn default_score_threshold() -> f32 {
    1.0
}

fn default_top_k() -> usize {
    5
}

fn default_max_loaded_indices() -> usize {
    64
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
            top_k: default_top_k(),
            max_loaded_indices: default_max_loaded_indices(),
            strict_updates: false,
        }
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// Provider name: "trigram" or "ollama"
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Provider endpoint (Ollama base URL)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-call timeout in seconds; `None` disables the timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,
}

fn default_embedding_provider() -> String {
    "trigram".to_string()
}

fn default_embedding_model() -> String {
    "trigram-v1".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_timeout_secs() -> Option<u64> {
    Some(30)
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    storage: Option<StorageConfig>,
    index: Option<IndexSettings>,
    embedding: Option<EmbeddingSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageConfig {
    database: Option<PathBuf>,
    vector_store: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            database: None,
            vector_store: None,
            index: IndexSettings::default(),
            embedding: EmbeddingSettings::default(),
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// `workspace` and `config_file` come from the command line and win over
    /// their environment counterparts.
    ///
    /// Environment variables:
    /// - `QABASE_WORKSPACE`: Override workspace path
    /// - `QABASE_CONFIG`: Path to config file
    /// - `QABASE_DATABASE`: SQLite database path
    /// - `QABASE_VECTOR_STORE`: Directory holding persisted indices
    /// - `QABASE_SCORE_THRESHOLD`: Query distance cut-off
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use qabase_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None, None).expect("Failed to load config");
    /// println!("Vector store: {:?}", config.vector_store_dir());
    /// ```
    pub fn load(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        } else if let Ok(workspace) = std::env::var("QABASE_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Some(config_file) = config_file {
            config.config_file = Some(config_file);
        } else if let Ok(config_file) = std::env::var("QABASE_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        // Validate workspace exists
        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.state_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
            tracing::debug!("Merged config file {:?}", config_path);
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(database) = std::env::var("QABASE_DATABASE") {
            config.database = Some(PathBuf::from(database));
        }

        if let Ok(vector_store) = std::env::var("QABASE_VECTOR_STORE") {
            config.vector_store = Some(PathBuf::from(vector_store));
        }

        if let Ok(threshold) = std::env::var("QABASE_SCORE_THRESHOLD") {
            config.index.score_threshold = threshold.parse().map_err(|e| {
                AppError::Config(format!(
                    "Invalid QABASE_SCORE_THRESHOLD '{}': {}",
                    threshold, e
                ))
            })?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(storage) = config_file.storage {
            if let Some(database) = storage.database {
                result.database = Some(database);
            }
            if let Some(vector_store) = storage.vector_store {
                result.vector_store = Some(vector_store);
            }
        }

        if let Some(index) = config_file.index {
            result.index = index;
        }

        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.json_logs = json;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and the
    /// config file.
    pub fn with_overrides(
        mut self,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        json_logs: bool,
    ) -> Self {
        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if json_logs {
            self.json_logs = true;
        }

        self
    }

    /// Get the path to the .qabase directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Ensure the .qabase directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let state_dir = self.state_dir();
        if !state_dir.exists() {
            std::fs::create_dir_all(&state_dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", STATE_DIR, e))
            })?;
        }
        Ok(())
    }

    /// SQLite database holding the question/answer records.
    pub fn database_path(&self) -> PathBuf {
        match &self.database {
            Some(path) => self.resolve(path),
            None => self.state_dir().join("qa.sqlite"),
        }
    }

    /// Directory holding the persisted vector indices.
    pub fn vector_store_dir(&self) -> PathBuf {
        match &self.vector_store {
            Some(path) => self.resolve(path),
            None => self.state_dir().join("vector_store"),
        }
    }

    /// Relative paths are taken relative to the workspace.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    /// Validate the resolved configuration.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.embedding.provider.as_str();
        if !KNOWN_EMBEDDING_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.index.top_k == 0 {
            return Err(AppError::Config(
                "index.topK must be greater than zero".to_string(),
            ));
        }

        if self.index.max_loaded_indices == 0 {
            return Err(AppError::Config(
                "index.maxLoadedIndices must be greater than zero".to_string(),
            ));
        }

        if !self.index.score_threshold.is_finite() {
            return Err(AppError::Config(
                "index.scoreThreshold must be a finite number".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.embedding.provider, "trigram");
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.index.top_k, 5);
        assert_eq!(config.index.score_threshold, 1.0);
        assert!(!config.index.strict_updates);
        assert!(!config.verbose);
        assert!(!config.no_color);
    }

    #[test]
    fn test_default_paths_live_in_state_dir() {
        let config = AppConfig {
            workspace: PathBuf::from("/srv/qa"),
            ..Default::default()
        };
        assert_eq!(config.state_dir(), PathBuf::from("/srv/qa/.qabase"));
        assert_eq!(
            config.database_path(),
            PathBuf::from("/srv/qa/.qabase/qa.sqlite")
        );
        assert_eq!(
            config.vector_store_dir(),
            PathBuf::from("/srv/qa/.qabase/vector_store")
        );
    }

    #[test]
    fn test_relative_overrides_resolve_against_workspace() {
        let config = AppConfig {
            workspace: PathBuf::from("/srv/qa"),
            vector_store: Some(PathBuf::from("vector_store")),
            database: Some(PathBuf::from("/var/lib/qa.sqlite")),
            ..Default::default()
        };
        assert_eq!(
            config.vector_store_dir(),
            PathBuf::from("/srv/qa/vector_store")
        );
        assert_eq!(config.database_path(), PathBuf::from("/var/lib/qa.sqlite"));
    }

    #[test]
    fn test_merge_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
storage:
  vectorStore: indices
index:
  scoreThreshold: 0.8
  topK: 3
  strictUpdates: true
embedding:
  provider: ollama
  model: nomic-embed-text
  dimensions: 768
logging:
  level: debug
  color: false
"#,
        )
        .unwrap();

        let base = AppConfig {
            workspace: temp.path().to_path_buf(),
            ..Default::default()
        };
        let merged = base.merge_yaml(&path).unwrap();

        assert_eq!(merged.vector_store_dir(), temp.path().join("indices"));
        assert_eq!(merged.index.score_threshold, 0.8);
        assert_eq!(merged.index.top_k, 3);
        assert_eq!(merged.index.max_loaded_indices, 64);
        assert!(merged.index.strict_updates);
        assert_eq!(merged.embedding.provider, "ollama");
        assert_eq!(merged.embedding.timeout_secs, Some(30));
        assert_eq!(merged.log_level, Some("debug".to_string()));
        assert!(merged.no_color);
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(None, true, false, true);

        assert!(overridden.verbose);
        assert!(overridden.json_logs);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.embedding.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_capacity() {
        let mut config = AppConfig::default();
        config.index.max_loaded_indices = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_defaults() {
        assert!(AppConfig::default().validate().is_ok());
    }
}
