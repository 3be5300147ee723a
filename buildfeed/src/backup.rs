//! The backup chain lets release data be read from mirrored copies when the
//! primary API is unavailable. Mirrors are tried strictly in configured order
//! and the first one that answers wins.
use crate::config::MirrorConfig;
use crate::counter;
use crate::metrics_defs::{MIRROR_FAILURE, MIRROR_SUCCESS};
use crate::normalize::NormalizeError;
use crate::structure::{STRUCTURES, find_release_array};
use reqwest::StatusCode;
use serde_json::Value;

#[derive(thiserror::Error, Debug)]
pub enum MirrorError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status: {0}")]
    Status(StatusCode),

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

pub struct BackupChain {
    client: reqwest::Client,
    mirrors: Vec<MirrorConfig>,
}

impl BackupChain {
    pub fn new(client: reqwest::Client, mirrors: Vec<MirrorConfig>) -> Self {
        BackupChain { client, mirrors }
    }

    async fn fetch_document(&self, url: &str) -> Result<Value, MirrorError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(MirrorError::Status(response.status()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Filters the payload down to the items of `project_name` and maps them
    /// through `transform`. Items rejected by `transform` are skipped.
    fn extract<T, F>(payload: &Value, project_name: &str, transform: &mut F) -> Vec<T>
    where
        F: FnMut(&Value) -> Result<T, NormalizeError>,
    {
        let needle = project_name.to_lowercase();

        find_release_array(payload, STRUCTURES)
            .iter()
            .filter(|item| {
                item.get("source_repo")
                    .and_then(Value::as_str)
                    .is_some_and(|repo| repo.to_lowercase().contains(&needle))
            })
            .filter_map(|item| match transform(item) {
                Ok(mapped) => Some(mapped),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping invalid mirror item");
                    None
                }
            })
            .collect()
    }

    /// Walks the enabled mirrors in order, falling back to a mirror's
    /// `old_url` when its `url` fails.
    ///
    /// Returns `None` when every mirror failed. `Some(vec![])` means a mirror
    /// answered but had no matching releases; the chain stops there.
    pub async fn fetch_from_backups<T, F>(
        &self,
        project_name: &str,
        mut transform: F,
    ) -> Option<Vec<T>>
    where
        F: FnMut(&Value) -> Result<T, NormalizeError>,
    {
        for mirror in self.mirrors.iter().filter(|m| !m.disabled) {
            let candidates = std::iter::once(mirror.url.as_str()).chain(mirror.old_url.as_deref());

            for url in candidates {
                match self.fetch_document(url).await {
                    Ok(payload) => {
                        counter!(MIRROR_SUCCESS, "mirror" => mirror.name.clone()).increment(1);
                        let records = Self::extract(&payload, project_name, &mut transform);
                        tracing::debug!(
                            mirror = %mirror.name,
                            url,
                            count = records.len(),
                            "loaded releases from mirror"
                        );
                        return Some(records);
                    }
                    Err(e) => {
                        counter!(MIRROR_FAILURE, "mirror" => mirror.name.clone()).increment(1);
                        tracing::warn!(mirror = %mirror.name, url, error = %e, "mirror unavailable");
                    }
                }
            }
        }

        None
    }
}
