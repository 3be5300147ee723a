use buildfeed::config::{
    DEFAULT_API_BASE, MirrorConfig, ValidationError, default_mirrors, validate_mirrors,
};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    pub sentry_dsn: Option<String>,
}

fn default_level() -> String {
    "info".into()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct GitHubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// `owner/project` identifiers, in display order
    pub repos: Vec<String>,
    pub contributors_repo: Option<String>,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
pub struct CacheConfig {
    /// Directory for durable cache entries. Without it the cache lives in memory.
    pub dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LocaleSetting {
    #[default]
    En,
    Zh,
    /// Pick by IP geolocation
    Auto,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub github: GitHubConfig,
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<MirrorConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub locale: LocaleSetting,
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let repos = self.github.repos.iter().chain(self.github.contributors_repo.iter());
        for repo in repos {
            match repo.split_once('/') {
                Some((owner, project)) if !owner.is_empty() && !project.is_empty() => {}
                _ => return Err(ConfigError::InvalidRepo(repo.clone())),
            }
        }

        validate_mirrors(&self.mirrors)?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("repository must be owner/project: {0}")]
    InvalidRepo(String),
    #[error("invalid mirror list: {0}")]
    Mirrors(#[from] ValidationError),
}
