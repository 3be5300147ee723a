use serde::Deserialize;
use std::collections::HashSet;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Empty mirror name")]
    EmptyMirrorName,

    #[error("Duplicate mirror name: {0}")]
    DuplicateMirror(String),

    #[error("Invalid URL for mirror {name}: {url}")]
    InvalidMirrorUrl { name: String, url: String },
}

/// A backup endpoint holding a copy of the release data.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MirrorConfig {
    /// Unique label, used in logs and metric tags
    pub name: String,
    /// Primary JSON document
    pub url: String,
    /// Previous generation of the document, tried when `url` fails
    #[serde(default)]
    pub old_url: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl MirrorConfig {
    pub fn new<N, U>(name: N, url: U, old_url: Option<&str>) -> Self
    where
        N: Into<String>,
        U: Into<String>,
    {
        MirrorConfig {
            name: name.into(),
            url: url.into(),
            old_url: old_url.map(String::from),
            disabled: false,
        }
    }
}

/// Built-in mirror list, in failover order.
pub fn default_mirrors() -> Vec<MirrorConfig> {
    vec![
        MirrorConfig::new(
            "Cache_American",
            "https://api.luminolmc.cache-build-data.blue-millennium.fun/github_releases.json",
            Some("https://api.luminolmc.cache-build-data.blue-millennium.fun/github_releases.old.json"),
        ),
        MirrorConfig::new(
            "Cache_China",
            "https://36.50.226.140/github_releases.json",
            Some("https://36.50.226.140/github_releases.old.json"),
        ),
        MirrorConfig::new(
            "Cache_Swiss",
            "https://nnnn.baby/github_releases.json",
            Some("https://nnnn.baby/github_releases.old.json"),
        ),
    ]
}

/// Checks names are present and unique and every URL parses.
pub fn validate_mirrors(mirrors: &[MirrorConfig]) -> Result<(), ValidationError> {
    let mut names = HashSet::new();
    for mirror in mirrors {
        if mirror.name.is_empty() {
            return Err(ValidationError::EmptyMirrorName);
        }
        if !names.insert(&mirror.name) {
            return Err(ValidationError::DuplicateMirror(mirror.name.clone()));
        }

        for url in std::iter::once(&mirror.url).chain(mirror.old_url.iter()) {
            if Url::parse(url).is_err() {
                return Err(ValidationError::InvalidMirrorUrl {
                    name: mirror.name.clone(),
                    url: url.clone(),
                });
            }
        }
    }
    Ok(())
}
