use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use accordo::generator::Strategy;
use accordo::llm::ChatConfig;
use accordo::llm::chat::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL};
use accordo::session::{DEFAULT_MAX_ATTEMPTS, RepairConfig};
use accordo::validation::{CliConfig, DEFAULT_TARGET};

/// Overrides the configured model name
pub const MODEL_ENV: &str = "ACCORDO_MODEL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub validator: ValidatorConfig,
    pub generation: GenerationConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            max_tokens: 4096,
            temperature: 0.1,
            timeout_ms: 120000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout_ms: u64,
    pub target: String,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            args: vec!["concerto".to_string()],
            working_dir: None,
            timeout_ms: 30000,
            target: DEFAULT_TARGET.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_attempts: u32,
    pub strategy: Strategy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            strategy: Strategy::Hybrid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./output"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            validator: ValidatorConfig::default(),
            generation: GenerationConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply environment overrides on top of the loaded file
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_model_override(std::env::var(MODEL_ENV).ok());
        self
    }

    fn apply_model_override(&mut self, model: Option<String>) {
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            log::info!("Model overridden by {}: {}", MODEL_ENV, model);
            self.llm.model = model;
        }
    }

    /// Whether the configured API key variable is set and non-empty
    pub fn has_api_key(&self) -> bool {
        std::env::var(&self.llm.api_key_env)
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            base_url: self.llm.base_url.clone(),
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            timeout: Duration::from_millis(self.llm.timeout_ms),
            api_key_env: self.llm.api_key_env.clone(),
        }
    }

    pub fn cli_config(&self) -> CliConfig {
        let mut config = CliConfig::new(&self.validator.program)
            .with_args(self.validator.args.iter().cloned())
            .with_timeout(Duration::from_millis(self.validator.timeout_ms));
        if let Some(dir) = &self.validator.working_dir {
            config = config.with_working_dir(dir);
        }
        config
    }

    pub fn repair_config(&self) -> RepairConfig {
        RepairConfig::default()
            .with_max_attempts(self.generation.max_attempts)
            .with_target(&self.validator.target)
    }
}
