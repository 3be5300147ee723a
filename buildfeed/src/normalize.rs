//! Mapping of raw release shapes into `BuildRecord`.
use crate::types::{BuildRecord, GitHubAsset, GitHubRelease, ReleaseType};
use serde_json::Value;

const COMMIT_MESSAGE_MARKER: &str = "### Commit Message\n> ";
const BRANCH_MARKER: &str = "### Branch Info\n> ";
const ACTIONS_MARKER: &str = "automatically compiled by GitHub Actions";
const PRERELEASE_KEYWORDS: &[&str] = &["beta", "alpha", "rc", "snapshot", "dev"];

pub const DEFAULT_BRANCH: &str = "main";
pub const UNKNOWN_TRIGGER: &str = "Unknown";
pub const ACTIONS_TRIGGER: &str = "GitHub Actions";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum NormalizeError {
    #[error("item is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("could not derive a project name from `{0}`")]
    EmptyProjectName(String),
}

/// `1.21.8-cba8cbd12` -> `cba8cbd1`. Tags without a `-` carry no hash.
pub fn commit_hash_from_tag(tag: &str) -> String {
    match tag.rsplit_once('-') {
        Some((_, last)) => last.chars().take(8).collect(),
        None => String::new(),
    }
}

/// Project part of an `owner/project` identifier.
pub fn project_name_from_repo(repo: &str) -> String {
    repo.rsplit('/').next().unwrap_or(repo).to_string()
}

/// First line following the `### Commit Message` marker of a release body.
pub fn extract_commit_message(body: &str) -> String {
    let Some((_, rest)) = body.split_once(COMMIT_MESSAGE_MARKER) else {
        return String::new();
    };
    rest.split(['\n', '\r']).next().unwrap_or_default().to_string()
}

/// Branch name following the `### Branch Info` marker of a release body.
pub fn extract_branch(body: &str) -> Option<String> {
    let (_, rest) = body.split_once(BRANCH_MARKER)?;
    let branch: String = rest
        .chars()
        .take_while(|&c| c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '-' | '.'))
        .collect();

    (!branch.is_empty()).then_some(branch)
}

/// Case-insensitive keyword scan used when a mirror item carries no explicit
/// release type.
pub fn release_type_from_tag(tag: &str) -> ReleaseType {
    let tag = tag.to_lowercase();
    let prerelease = PRERELEASE_KEYWORDS.iter().any(|kw| tag.contains(kw));
    ReleaseType::from_prerelease_flag(prerelease)
}

fn is_binary_asset(asset: &GitHubAsset) -> bool {
    let Some(url) = asset.browser_download_url.as_deref() else {
        return false;
    };
    if url.is_empty() || url.contains("/source.") {
        return false;
    }

    asset
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.contains("application/"))
        || asset.name.ends_with(".jar")
}

/// Prefers the first binary artifact, then any asset at all.
pub fn select_download_asset(assets: &[GitHubAsset]) -> Option<&GitHubAsset> {
    assets
        .iter()
        .find(|asset| is_binary_asset(asset))
        .or_else(|| assets.first())
}

/// Normalizes a release from the primary API. `repo` is the `owner/project`
/// identifier it was requested under.
pub fn normalize_release(
    release: &GitHubRelease,
    repo: &str,
) -> Result<BuildRecord, NormalizeError> {
    if release.tag_name.is_empty() {
        return Err(NormalizeError::MissingField("tag_name"));
    }
    let project_name = project_name_from_repo(repo);
    if project_name.is_empty() {
        return Err(NormalizeError::EmptyProjectName(repo.to_string()));
    }

    let body = release.body.as_deref().unwrap_or_default();
    let branch = extract_branch(body)
        .or_else(|| release.target_commitish.clone())
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

    let (download_url, download_count) = match select_download_asset(&release.assets) {
        Some(asset) => (
            Some(asset.browser_download_url.clone().unwrap_or_default()),
            Some(asset.download_count.unwrap_or(0)),
        ),
        None => (None, None),
    };

    let published_at = release.published_at.clone().unwrap_or_default();

    Ok(BuildRecord {
        id: release.id,
        project_name,
        version: release.tag_name.clone(),
        build_number: release.id,
        release_type: ReleaseType::from_prerelease_flag(release.prerelease),
        start_time: published_at.clone(),
        end_time: published_at,
        duration: 0,
        commit_hash: commit_hash_from_tag(&release.tag_name),
        branch,
        trigger_by: release
            .author
            .as_ref()
            .map(|author| author.login.clone())
            .unwrap_or_else(|| UNKNOWN_TRIGGER.to_string()),
        commit_message: extract_commit_message(body),
        download_url,
        download_count,
        from_cache: false,
    })
}

fn non_empty_str<'a>(item: &'a Value, field: &'static str) -> Result<&'a str, NormalizeError> {
    item.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(NormalizeError::MissingField(field))
}

fn backup_release_type(item: &Value, tag: &str) -> ReleaseType {
    let explicit = item
        .get("releaseType")
        .cloned()
        .and_then(|v| serde_json::from_value::<ReleaseType>(v).ok());

    explicit
        .or_else(|| {
            item.get("prerelease")
                .and_then(Value::as_bool)
                .map(ReleaseType::from_prerelease_flag)
        })
        .unwrap_or_else(|| release_type_from_tag(tag))
}

/// Normalizes one entry of a mirror payload.
///
/// Mirror entries are loosely typed, so the item is read field by field
/// rather than deserialized. `source_repo` and `tag_name` are the minimum
/// needed to identify a record; anything else falls back to a default.
pub fn normalize_backup_item<F>(
    item: &Value,
    project_name_of: F,
) -> Result<BuildRecord, NormalizeError>
where
    F: Fn(&str) -> String,
{
    let source_repo = non_empty_str(item, "source_repo")?;
    let tag = non_empty_str(item, "tag_name")?;

    let project_name = project_name_of(source_repo);
    if project_name.is_empty() {
        return Err(NormalizeError::EmptyProjectName(source_repo.to_string()));
    }

    let body = item.get("body").and_then(Value::as_str).unwrap_or_default();

    let trigger_by = if body.contains(ACTIONS_MARKER) {
        ACTIONS_TRIGGER
    } else {
        UNKNOWN_TRIGGER
    };

    let first_asset = item
        .get("assets")
        .and_then(Value::as_array)
        .and_then(|assets| assets.first());
    let (download_url, download_count) = match first_asset {
        Some(asset) => (
            Some(
                asset
                    .get("download_url")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            Some(asset.get("download_count").and_then(Value::as_u64).unwrap_or(0)),
        ),
        None => (None, None),
    };

    // Mirror records are display-only, a synthetic id is never used as a key.
    let id = item
        .get("id")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| rand::random_range(0..1_000_000));

    let published_at = item
        .get("published_at")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        });

    Ok(BuildRecord {
        id,
        project_name,
        version: tag.to_string(),
        build_number: id,
        release_type: backup_release_type(item, tag),
        start_time: published_at.clone(),
        end_time: published_at,
        duration: item.get("duration").and_then(Value::as_u64).unwrap_or(0),
        commit_hash: commit_hash_from_tag(tag),
        branch: extract_branch(body).unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        trigger_by: trigger_by.to_string(),
        commit_message: extract_commit_message(body),
        download_url,
        download_count,
        from_cache: true,
    })
}
