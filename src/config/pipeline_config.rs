use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

pub const ENV_MOVIES_PATH: &str = "PIPELINE_MOVIES_PATH";
pub const ENV_REVIEWS_PATH: &str = "PIPELINE_REVIEWS_PATH";
pub const ENV_OUTPUT_DIR: &str = "PIPELINE_OUTPUT_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub input: InputSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub text: TextSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSection {
    pub movies: PathBuf,
    pub reviews: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    pub dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextSection {
    /// Replaces the built-in English stopwords when set
    pub stopwords_file: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline config file: {}", path))?;

        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse pipeline config file: {}", path))?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Environment variables win over the file, so one config can serve several datasets.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(movies) = env::var(ENV_MOVIES_PATH) {
            self.input.movies = PathBuf::from(movies);
        }
        if let Ok(reviews) = env::var(ENV_REVIEWS_PATH) {
            self.input.reviews = PathBuf::from(reviews);
        }
        if let Ok(dir) = env::var(ENV_OUTPUT_DIR) {
            self.output.dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input.movies.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("input.movies cannot be empty"));
        }

        if self.input.reviews.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("input.reviews cannot be empty"));
        }

        if self.output.dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("output.dir cannot be empty"));
        }

        Ok(())
    }
}
