use crate::backup::BackupChain;
use crate::cache::CacheStore;
use crate::counter;
use crate::metrics_defs::{COOLDOWN_SKIP, FEED_UNAVAILABLE};
use crate::normalize::{normalize_backup_item, project_name_from_repo};
use crate::primary::GitHubSource;
use crate::types::BuildRecord;
use serde::Serialize;
use std::collections::HashSet;

const CACHE_KEY_PREFIX: &str = "build_records";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Cache,
    Primary,
    Mirror,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Builds {
    pub records: Vec<BuildRecord>,
    pub origin: Origin,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FeedOutcome {
    Available(Builds),
    /// Every source failed, or the cooldown blocked the attempt.
    /// Callers should render an empty or stale state.
    Unavailable { cooling_down: bool },
}

/// Entry point for consumers: resolves build records from the cache, the
/// primary API or the mirror chain, in that order.
pub struct BuildFeed {
    primary: GitHubSource,
    backups: BackupChain,
    cache: CacheStore,
}

impl BuildFeed {
    pub fn new(primary: GitHubSource, backups: BackupChain, cache: CacheStore) -> Self {
        BuildFeed {
            primary,
            backups,
            cache,
        }
    }

    pub fn cache_key(repos: &[String]) -> String {
        format!("{CACHE_KEY_PREFIX}:{}", repos.join(","))
    }

    pub async fn builds(&self, repos: &[String]) -> FeedOutcome {
        let key = Self::cache_key(repos);

        if let Some(records) = self.cache.get::<Vec<BuildRecord>>(&key) {
            return FeedOutcome::Available(Builds {
                records,
                origin: Origin::Cache,
            });
        }

        if self.cache.is_in_cooldown() {
            counter!(COOLDOWN_SKIP).increment(1);
            tracing::info!(key, "skipping fetch during error cooldown");
            return FeedOutcome::Unavailable { cooling_down: true };
        }

        let records = self.primary.fetch_releases(repos).await;
        if !records.is_empty() {
            self.cache.put(&key, &records);
            return FeedOutcome::Available(Builds {
                records,
                origin: Origin::Primary,
            });
        }

        tracing::warn!(key, "primary source returned nothing, trying mirrors");
        if let Some(records) = self.fetch_from_mirrors(repos).await {
            self.cache.put(&key, &records);
            return FeedOutcome::Available(Builds {
                records,
                origin: Origin::Mirror,
            });
        }

        counter!(FEED_UNAVAILABLE).increment(1);
        tracing::error!(key, "all release sources failed");
        self.cache.mark_error();
        FeedOutcome::Unavailable {
            cooling_down: false,
        }
    }

    /// Runs the backup chain per repository. `None` only when no repository
    /// could be served by any mirror.
    async fn fetch_from_mirrors(&self, repos: &[String]) -> Option<Vec<BuildRecord>> {
        let mut records: Option<Vec<BuildRecord>> = None;
        let mut seen = HashSet::new();

        for repo in repos {
            let project_name = project_name_from_repo(repo);
            let fetched = self
                .backups
                .fetch_from_backups(&project_name, |item| {
                    normalize_backup_item(item, project_name_from_repo)
                })
                .await;

            let Some(fetched) = fetched else {
                continue;
            };
            // The mirror match is a substring match on `owner/project`, so a
            // sibling project under the same owner can slip through.
            let matching = fetched.into_iter().filter(|record| {
                record.project_name.eq_ignore_ascii_case(&project_name)
                    && seen.insert((record.project_name.clone(), record.version.clone()))
            });
            records.get_or_insert_with(Vec::new).extend(matching);
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CACHE_DURATION, COOLDOWN_DURATION, MemoryStore};
    use crate::config::MirrorConfig;
    use crate::testutils::{ManualClock, github_releases, mirror_item};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REPO: &str = "LuminolMC/Luminol";

    fn feed(server: &MockServer, clock: Arc<ManualClock>) -> BuildFeed {
        let client = reqwest::Client::new();
        let mirrors = vec![MirrorConfig::new(
            "mirror",
            format!("{}/mirror.json", server.uri()),
            None,
        )];

        BuildFeed::new(
            GitHubSource::new(client.clone(), &format!("{}/api", server.uri())),
            BackupChain::new(client, mirrors),
            CacheStore::with_clock(Arc::new(MemoryStore::new()), clock),
        )
    }

    fn repos() -> Vec<String> {
        vec![REPO.to_string()]
    }

    #[tokio::test]
    async fn test_primary_then_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/repos/{REPO}/releases")))
            .respond_with(ResponseTemplate::new(200).set_body_json(github_releases(1, 2)))
            .expect(1)
            .mount(&server)
            .await;

        let feed = feed(&server, Arc::new(ManualClock::new()));

        let FeedOutcome::Available(first) = feed.builds(&repos()).await else {
            panic!("expected builds");
        };
        assert_eq!(first.origin, Origin::Primary);
        assert_eq!(first.records.len(), 2);

        // Served from cache, the mock only allows one request
        let FeedOutcome::Available(second) = feed.builds(&repos()).await else {
            panic!("expected builds");
        };
        assert_eq!(second.origin, Origin::Cache);
        assert_eq!(second.records, first.records);
    }

    #[tokio::test]
    async fn test_mirror_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/repos/{REPO}/releases")))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mirror.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([mirror_item(REPO, "1.21.8-cba8cbd12")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let feed = feed(&server, Arc::new(ManualClock::new()));
        let FeedOutcome::Available(builds) = feed.builds(&repos()).await else {
            panic!("expected builds");
        };
        assert_eq!(builds.origin, Origin::Mirror);
        assert_eq!(builds.records.len(), 1);
        assert!(builds.records[0].from_cache);
    }

    #[tokio::test]
    async fn test_unavailable_starts_cooldown() {
        let server = MockServer::start().await;
        // Primary and mirror both fail once, the cooldown prevents a second round
        Mock::given(method("GET"))
            .and(path(format!("/api/repos/{REPO}/releases")))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mirror.json"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new());
        let feed = feed(&server, clock.clone());

        assert_eq!(
            feed.builds(&repos()).await,
            FeedOutcome::Unavailable {
                cooling_down: false
            }
        );
        assert_eq!(
            feed.builds(&repos()).await,
            FeedOutcome::Unavailable { cooling_down: true }
        );

        clock.advance(COOLDOWN_DURATION);
        assert_eq!(
            feed.builds(&repos()).await,
            FeedOutcome::Unavailable {
                cooling_down: false
            }
        );
    }

    #[tokio::test]
    async fn test_cache_expiry_triggers_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/api/repos/{REPO}/releases")))
            .respond_with(ResponseTemplate::new(200).set_body_json(github_releases(1, 1)))
            .expect(2)
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new());
        let feed = feed(&server, clock.clone());

        feed.builds(&repos()).await;
        clock.advance(CACHE_DURATION);

        let FeedOutcome::Available(builds) = feed.builds(&repos()).await else {
            panic!("expected builds");
        };
        assert_eq!(builds.origin, Origin::Primary);
    }

    #[tokio::test]
    async fn test_mirror_fallback_keeps_sibling_projects_apart() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/repos/.+/releases$"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mirror.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                mirror_item("LuminolMC/Luminol", "1.21.8-aaaa"),
                mirror_item("LuminolMC/Lophine", "1.21.8-bbbb"),
            ])))
            .mount(&server)
            .await;

        let feed = feed(&server, Arc::new(ManualClock::new()));
        let repos = vec!["LuminolMC/Luminol".to_string(), "LuminolMC/Lophine".to_string()];
        let FeedOutcome::Available(builds) = feed.builds(&repos).await else {
            panic!("expected builds");
        };

        let versions: Vec<_> = builds
            .records
            .iter()
            .map(|r| (r.project_name.as_str(), r.version.as_str()))
            .collect();
        assert_eq!(builds.origin, Origin::Mirror);
        assert_eq!(versions, vec![("Luminol", "1.21.8-aaaa"), ("Lophine", "1.21.8-bbbb")]);
    }

    #[test]
    fn test_cache_key() {
        let repos = vec!["LuminolMC/Luminol".to_string(), "LuminolMC/Lophine".to_string()];
        assert_eq!(
            BuildFeed::cache_key(&repos),
            "build_records:LuminolMC/Luminol,LuminolMC/Lophine"
        );
    }
}
