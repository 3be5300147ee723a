use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Release,
    Prerelease,
}

impl ReleaseType {
    pub fn from_prerelease_flag(prerelease: bool) -> Self {
        if prerelease {
            ReleaseType::Prerelease
        } else {
            ReleaseType::Release
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::Release => "release",
            ReleaseType::Prerelease => "prerelease",
        }
    }
}

/// Canonical representation of a published release, independent of the
/// source it was read from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRecord {
    pub id: u64,
    pub project_name: String,
    pub version: String,
    pub build_number: u64,
    pub release_type: ReleaseType,
    // Both timestamps are the publish time, there is no build duration upstream.
    pub start_time: String,
    pub end_time: String,
    pub duration: u64,
    pub commit_hash: String,
    pub branch: String,
    pub trigger_by: String,
    pub commit_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_count: Option<u64>,
    /// True when the record came from a mirror rather than the primary API.
    #[serde(default)]
    pub from_cache: bool,
}

/// Release object as returned by the GitHub releases endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct GitHubRelease {
    pub id: u64,
    pub tag_name: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
    #[serde(default)]
    pub author: Option<GitHubAuthor>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub target_commitish: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GitHubAsset {
    #[serde(default)]
    pub browser_download_url: Option<String>,
    #[serde(default)]
    pub download_count: Option<u64>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GitHubAuthor {
    pub login: String,
}
