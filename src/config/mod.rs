//! Configuration management for Sift
//!
//! Settings are read from a TOML file, then environment overrides (`SIFT_SECTION__KEY`)
//! and an optional named profile are applied, and the result is validated as a whole.

use crate::embedding::{IndexKind, IndexOptions};
use crate::error::{Result, SiftError};
use crate::retrieval::{PipelineOptions, DEFAULT_INITIAL_K, DEFAULT_TOP_K};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

const ENV_PREFIX: &str = "SIFT_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub corpus: CorpusConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub reranker: RerankerConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Document collection to index at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// arXiv metadata file (JSON array or JSON lines)
    pub path: PathBuf,
}

/// Query and document encoder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    /// Model download cache; FastEmbed's default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

/// Vector index construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub kind: IndexKind,
    pub hnsw_m: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_ef_search: usize,
}

/// Cross-encoder used for the second stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    pub model: String,
    pub batch_size: usize,
}

/// Request defaults and execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub default_initial_k: usize,
    /// Per-query deadline such as "30s" or "500ms"; "0" disables it
    pub query_timeout: String,
    /// Concurrent queries allowed; 0 means unlimited
    pub max_in_flight: usize,
    pub serialize_model_calls: bool,
}

/// IPC server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reranker_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_kind: Option<IndexKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corpus_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SiftError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| SiftError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| SiftError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self.profiles.get(profile).cloned().ok_or_else(|| {
            SiftError::Config(format!("Unknown profile '{}'", profile))
        })?;

        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(model) = overrides.reranker_model {
            self.reranker.model = model;
        }
        if let Some(kind) = overrides.index_kind {
            self.index.kind = kind;
        }
        if let Some(path) = overrides.corpus_path {
            self.corpus.path = path;
        }

        tracing::debug!("Applied profile '{}'", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: SIFT_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply `SIFT_`-prefixed overrides from any key/value source
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "CORPUS__PATH" => self.corpus.path = PathBuf::from(value),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse_value(path, value)?,
            "EMBEDDING__CACHE_DIR" => self.embedding.cache_dir = Some(PathBuf::from(value)),
            "INDEX__KIND" => {
                self.index.kind = value.parse().map_err(|e| SiftError::InvalidConfigValue {
                    path: path.to_string(),
                    message: format!("{}", e),
                })?;
            }
            "RERANKER__MODEL" => self.reranker.model = value.to_string(),
            "RERANKER__BATCH_SIZE" => self.reranker.batch_size = parse_value(path, value)?,
            "RETRIEVAL__QUERY_TIMEOUT" => self.retrieval.query_timeout = value.to_string(),
            "RETRIEVAL__MAX_IN_FLIGHT" => self.retrieval.max_in_flight = parse_value(path, value)?,
            "RETRIEVAL__SERIALIZE_MODEL_CALLS" => {
                self.retrieval.serialize_model_calls = parse_value(path, value)?
            }
            "SERVER__SOCKET_PATH" => self.server.socket_path = PathBuf::from(value),
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Index construction options
    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            kind: self.index.kind,
            hnsw_m: self.index.hnsw_m,
            hnsw_ef_construction: self.index.hnsw_ef_construction,
            hnsw_ef_search: self.index.hnsw_ef_search,
        }
    }

    /// Pipeline execution limits
    pub fn pipeline_options(&self) -> Result<PipelineOptions> {
        let timeout = parse_duration(&self.retrieval.query_timeout).ok_or_else(|| {
            SiftError::InvalidConfigValue {
                path: "retrieval.query_timeout".to_string(),
                message: format!("Invalid duration format: {}", self.retrieval.query_timeout),
            }
        })?;

        Ok(PipelineOptions {
            query_timeout: (!timeout.is_zero()).then_some(timeout),
            max_in_flight: (self.retrieval.max_in_flight > 0).then_some(self.retrieval.max_in_flight),
            serialize_model_calls: self.retrieval.serialize_model_calls,
        })
    }

    /// Corpus file with `~` expanded
    pub fn corpus_path(&self) -> Result<PathBuf> {
        expand_path(&self.corpus.path)
    }

    /// Socket path with `~` expanded
    pub fn socket_path(&self) -> Result<PathBuf> {
        expand_path(&self.server.socket_path)
    }

    /// Model cache directory with `~` expanded
    pub fn cache_dir(&self) -> Result<Option<PathBuf>> {
        self.embedding
            .cache_dir
            .as_deref()
            .map(expand_path)
            .transpose()
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SiftError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("sift").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| SiftError::Config("Cannot determine home directory".to_string()))?;

        Ok(home_dir.join(".sift"))
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("~/.sift");

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            corpus: CorpusConfig {
                path: data_dir.join("arxiv-metadata.json"),
            },
            embedding: EmbeddingConfig {
                model: "all-MiniLM-L6-v2".to_string(),
                batch_size: 32,
                cache_dir: None,
            },
            index: IndexConfig {
                kind: IndexKind::Flat,
                hnsw_m: 16,
                hnsw_ef_construction: 200,
                hnsw_ef_search: 64,
            },
            reranker: RerankerConfig {
                model: "bge-reranker-base".to_string(),
                batch_size: 32,
            },
            retrieval: RetrievalConfig {
                default_top_k: DEFAULT_TOP_K,
                default_initial_k: DEFAULT_INITIAL_K,
                query_timeout: "30s".to_string(),
                max_in_flight: 0,
                serialize_model_calls: false,
            },
            server: ServerConfig {
                socket_path: data_dir.join("sift.sock"),
            },
            profiles: default_profiles(),
        }
    }
}

fn default_profiles() -> HashMap<String, ProfileOverrides> {
    let mut profiles = HashMap::new();
    profiles.insert(
        "offline".to_string(),
        ProfileOverrides {
            embedding_model: Some("hashing-384".to_string()),
            reranker_model: Some("term-overlap".to_string()),
            ..Default::default()
        },
    );
    profiles.insert(
        "fast".to_string(),
        ProfileOverrides {
            index_kind: Some(IndexKind::Hnsw),
            reranker_model: Some("jina-reranker-v1-turbo-en".to_string()),
            ..Default::default()
        },
    );
    profiles.insert(
        "accuracy".to_string(),
        ProfileOverrides {
            embedding_model: Some("bge-base-en-v1.5".to_string()),
            reranker_model: Some("bge-reranker-v2-m3".to_string()),
            ..Default::default()
        },
    );
    profiles
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| SiftError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

/// Parse duration strings such as "30s", "500ms", "5m", "1h" or bare seconds
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();

    // Check "ms" before "s" because "ms" ends with "s"
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else {
        s.parse().ok().map(Duration::from_secs)
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| SiftError::Config("Cannot determine home directory".to_string()))?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_parse_duration_rejects_overflow() {
        assert_eq!(parse_duration("999999999999999999h"), None);
        assert_eq!(parse_duration("999999999999999999m"), None);
        assert_eq!(
            parse_duration("5124095576030431h"),
            Some(Duration::from_secs(5124095576030431 * 3600))
        );
    }

    #[test]
    fn test_expand_path() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_path(Path::new("~/.sift")).unwrap(), home.join(".sift"));
        assert_eq!(
            expand_path(Path::new("/tmp/sift")).unwrap(),
            PathBuf::from("/tmp/sift")
        );
    }

    #[test]
    fn test_pipeline_options() {
        let mut config = Config::default();
        let options = config.pipeline_options().unwrap();
        assert_eq!(options.query_timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.max_in_flight, None);
        assert!(!options.serialize_model_calls);

        config.retrieval.query_timeout = "0".to_string();
        config.retrieval.max_in_flight = 4;
        let options = config.pipeline_options().unwrap();
        assert_eq!(options.query_timeout, None);
        assert_eq!(options.max_in_flight, Some(4));

        config.retrieval.query_timeout = "later".to_string();
        assert!(config.pipeline_options().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(vec![
            ("SIFT_EMBEDDING__MODEL".to_string(), "hashing-64".to_string()),
            ("SIFT_INDEX__KIND".to_string(), "hnsw".to_string()),
            ("SIFT_RETRIEVAL__MAX_IN_FLIGHT".to_string(), "8".to_string()),
            ("SIFT_EMBEDDING__BATCH_SIZE".to_string(), "lots".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ]);

        assert_eq!(config.embedding.model, "hashing-64");
        assert_eq!(config.index.kind, IndexKind::Hnsw);
        assert_eq!(config.retrieval.max_in_flight, 8);
        // Unparseable values are skipped
        assert_eq!(config.embedding.batch_size, 32);
    }

    #[test]
    fn test_apply_profile() {
        let mut config = Config::default();
        config.apply_profile("offline").unwrap();
        assert_eq!(config.embedding.model, "hashing-384");
        assert_eq!(config.reranker.model, "term-overlap");
        assert_eq!(config.index.kind, IndexKind::Flat);

        assert!(config.apply_profile("missing").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let content = toml::to_string_pretty(&config).unwrap();
        assert!(content.contains("[_meta]"));
        assert!(content.contains("kind = \"flat\""));

        let parsed: Config = toml::from_str(&content).unwrap();
        assert_eq!(parsed.reranker.model, config.reranker.model);
        assert_eq!(parsed.profiles.len(), 3);
    }
}
