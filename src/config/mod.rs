use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub corpus: CorpusConfig,
    pub classifier: ClassifierConfig,
    pub scoring: ScoringConfig,
    pub ranking: RankingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Flat CSV file with one row per POI
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Directory containing the pretrained classification artifact
    pub model_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// API key for the scoring backend; empty disables the backend entirely
    pub api_key: Option<String>,
    /// Generative model used for batch scoring
    pub model: String,
    /// Base URL of the generative API
    pub endpoint: String,
    /// POIs per scoring call
    pub batch_size: usize,
    /// Pause between consecutive batch calls, to respect rate limits
    pub cooldown_seconds: u64,
    /// Timeout for a single batch call
    pub request_timeout_seconds: u64,
    /// Optional wall-clock budget for the whole scoring stage; batches that
    /// would start past the deadline are skipped and keep neutral scores
    pub request_deadline_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Weight of the specificity score
    pub alpha: f64,
    /// Weight of the distance score
    pub beta: f64,
    /// Results kept after sorting
    pub top_n: usize,
    /// Optional hard radius cutoff applied before ranking
    pub max_radius_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub max_files: usize,
    pub log_directory: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = get_data_directory();

        Self {
            corpus: CorpusConfig {
                path: data_dir.join("corpus.csv"),
            },
            classifier: ClassifierConfig {
                model_dir: data_dir.join("model"),
            },
            scoring: ScoringConfig {
                api_key: None,
                model: "gemini-2.5-flash".to_string(),
                endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                batch_size: 20,
                cooldown_seconds: 3,
                request_timeout_seconds: 30,
                request_deadline_seconds: None,
            },
            ranking: RankingConfig {
                alpha: 0.8,
                beta: 0.2,
                top_n: 10,
                max_radius_km: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_enabled: true,
                console_enabled: true,
                max_files: 5,
                log_directory: crate::logging::default_log_directory(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, creating it on first run
    pub async fn load() -> Result<Self> {
        let config_path = get_config_path();

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            info!("No configuration file found, using defaults");
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub async fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut config: AppConfig = toml::from_str(&content)?;

        ConfigOverrides::apply(&mut config);
        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to the default location
    pub async fn save(&self) -> Result<()> {
        let config_path = get_config_path();

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(&config_path, content).await?;

        info!("Configuration saved to: {}", config_path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scoring.batch_size == 0 {
            return Err(anyhow::anyhow!("Scoring batch_size must be > 0"));
        }

        if self.scoring.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Scoring request_timeout_seconds must be > 0"));
        }

        if self.ranking.alpha < 0.0 || self.ranking.beta < 0.0 {
            return Err(anyhow::anyhow!("Ranking weights must be non-negative"));
        }

        // Specificity must dominate distance; a perfect category match should
        // outrank a perfect distance match.
        if self.ranking.alpha <= self.ranking.beta {
            return Err(anyhow::anyhow!(
                "Ranking alpha ({}) must exceed beta ({})",
                self.ranking.alpha,
                self.ranking.beta
            ));
        }

        if self.ranking.top_n == 0 {
            return Err(anyhow::anyhow!("Ranking top_n must be > 0"));
        }

        if let Some(radius) = self.ranking.max_radius_km {
            if radius <= 0.0 {
                return Err(anyhow::anyhow!("Ranking max_radius_km must be > 0"));
            }
        }

        Ok(())
    }
}

/// Get the default data directory
fn get_data_directory() -> PathBuf {
    directories::ProjectDirs::from("io", "placerank", "placerank")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("data"))
}

/// Get the configuration file path
fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("io", "placerank", "placerank")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("config.toml"))
}

/// Environment-based configuration overrides
pub struct ConfigOverrides;

impl ConfigOverrides {
    /// Apply environment variable overrides to configuration
    pub fn apply(config: &mut AppConfig) {
        if let Ok(corpus_path) = std::env::var("PR_CORPUS_PATH") {
            config.corpus.path = PathBuf::from(corpus_path);
        }

        if let Ok(model_dir) = std::env::var("PR_CLASSIFIER_DIR") {
            config.classifier.model_dir = PathBuf::from(model_dir);
        }

        if let Ok(api_key) = std::env::var("PR_SCORING_API_KEY") {
            if !api_key.is_empty() {
                config.scoring.api_key = Some(api_key);
            }
        }

        if let Ok(batch_str) = std::env::var("PR_SCORING_BATCH_SIZE") {
            if let Ok(batch) = batch_str.parse::<usize>() {
                config.scoring.batch_size = batch;
            }
        }

        if let Ok(cooldown_str) = std::env::var("PR_SCORING_COOLDOWN") {
            if let Ok(cooldown) = cooldown_str.parse::<u64>() {
                config.scoring.cooldown_seconds = cooldown;
            }
        }

        if let Ok(alpha_str) = std::env::var("PR_RANKING_ALPHA") {
            if let Ok(alpha) = alpha_str.parse::<f64>() {
                config.ranking.alpha = alpha;
            }
        }

        if let Ok(beta_str) = std::env::var("PR_RANKING_BETA") {
            if let Ok(beta) = beta_str.parse::<f64>() {
                config.ranking.beta = beta;
            }
        }

        if let Ok(log_level) = std::env::var("PR_LOG_LEVEL") {
            config.logging.level = log_level;
        }
    }
}
