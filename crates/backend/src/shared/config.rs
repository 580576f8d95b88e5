use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub extraction: ExtractionConfig,
    pub matching: MatchingConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    pub api_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    pub batch_api_url: String,
    pub single_api_url: String,
    pub default_limit: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Модель для разметки полей; ключ берётся из OPENAI_API_KEY
    pub model: String,
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[database]
path = "target/db/app.db"

[extraction]
api_url = "https://plankton-app-qajlk.ondigitalocean.app/extraction_api"

[matching]
batch_api_url = "https://endeavor-interview-api-gzwki.ondigitalocean.app/match/batch"
single_api_url = "https://endeavor-interview-api-gzwki.ondigitalocean.app/match"
default_limit = 5

[llm]
model = "gpt-4o-mini"
"#;

static CONFIG: OnceCell<Config> = OnceCell::new();

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    // Try to find config.toml next to the executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                let contents = std::fs::read_to_string(&config_path)?;
                let config: Config = toml::from_str(&contents)?;
                return Ok(config);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    // Fall back to default config
    tracing::info!("Using default embedded configuration");
    let config: Config = toml::from_str(DEFAULT_CONFIG)?;
    Ok(config)
}

/// Конфигурация процесса; загружается один раз и кэшируется
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Failed to load config.toml ({}), using embedded defaults", e);
            toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
        }
    })
}

/// Get the database file path from configuration
/// Resolves relative paths relative to the executable directory
pub fn get_database_path(config: &Config) -> anyhow::Result<PathBuf> {
    let db_path_str = &config.database.path;
    let db_path = Path::new(db_path_str);

    // If absolute path, use as is
    if db_path.is_absolute() {
        return Ok(db_path.to_path_buf());
    }

    // If relative path, resolve it relative to the executable directory
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let resolved_path = exe_dir.join(db_path);
            return Ok(resolved_path);
        }
    }

    // Fallback: use relative to current directory
    Ok(PathBuf::from(db_path_str))
}
