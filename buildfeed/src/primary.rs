use crate::counter;
use crate::metrics_defs::PRIMARY_PAGE;
use crate::normalize::normalize_release;
use crate::types::{BuildRecord, GitHubRelease};
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use url::Url;

/// Largest page size the releases endpoint accepts. A shorter page is the last one.
pub const PER_PAGE: usize = 100;

#[derive(thiserror::Error, Debug)]
pub enum PrimaryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(StatusCode),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Reads releases from a GitHub compatible REST API.
pub struct GitHubSource {
    client: reqwest::Client,
    api_base: String,
}

impl GitHubSource {
    pub fn new(client: reqwest::Client, api_base: &str) -> Self {
        GitHubSource {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn releases_url(&self, repo: &str, page: u32) -> Result<Url, PrimaryError> {
        let mut url = Url::parse(&format!("{}/repos/{repo}/releases", self.api_base))
            .map_err(|e| PrimaryError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("per_page", &PER_PAGE.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    async fn fetch_page(&self, repo: &str, page: u32) -> Result<Vec<GitHubRelease>, PrimaryError> {
        let url = self.releases_url(repo, page)?;
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PrimaryError::Status(response.status()));
        }

        let releases = response.json::<Vec<GitHubRelease>>().await?;
        counter!(PRIMARY_PAGE).increment(1);
        Ok(releases)
    }

    /// Fetches every release page of each `owner/project` in `repos`, in
    /// order. Pagination for a repository ends at the first short page or at
    /// the first failed request; records gathered before that are kept.
    pub async fn fetch_releases(&self, repos: &[String]) -> Vec<BuildRecord> {
        let mut records = Vec::new();

        for repo in repos {
            let mut page = 1;

            loop {
                let releases = match self.fetch_page(repo, page).await {
                    Ok(releases) => releases,
                    // A non-success status is read as "no more pages". This can hide a
                    // transient outage behind a truncated list.
                    Err(PrimaryError::Status(status)) => {
                        tracing::debug!(repo, page, %status, "stopping pagination");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(repo, page, error = %e, "error fetching releases");
                        break;
                    }
                };

                let fetched = releases.len();
                for release in &releases {
                    match normalize_release(release, repo) {
                        Ok(record) => records.push(record),
                        Err(e) => tracing::warn!(repo, id = release.id, error = %e, "skipping release"),
                    }
                }

                if fetched < PER_PAGE {
                    break;
                }
                page += 1;
            }

            tracing::debug!(repo, pages = page, "fetched releases");
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{TestRecorder, github_releases};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_page(server: &MockServer, repo: &str, page: u32, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/repos/{repo}/releases")))
            .and(query_param("per_page", "100"))
            .and(query_param("page", page.to_string()))
            .respond_with(response)
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_pagination_stops_on_short_page() {
        let server = MockServer::start().await;
        let repo = "LuminolMC/Luminol";

        let full = ResponseTemplate::new(200).set_body_json(github_releases(0, 100));
        let short = ResponseTemplate::new(200).set_body_json(github_releases(100, 40));
        mount_page(&server, repo, 1, full).await;
        mount_page(&server, repo, 2, short).await;
        // Never requested
        Mock::given(method("GET"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(github_releases(140, 1)))
            .expect(0)
            .mount(&server)
            .await;

        let recorder = TestRecorder::default();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let source = GitHubSource::new(reqwest::Client::new(), &server.uri());
        let records = source.fetch_releases(&[repo.to_string()]).await;

        assert_eq!(records.len(), 140);
        assert_eq!(records[0].id, 0);
        assert_eq!(records[139].id, 139);
        assert!(records.iter().all(|r| r.project_name == "Luminol" && !r.from_cache));
        assert_eq!(records[0].branch, "ver/1.21.8");
        assert_eq!(recorder.counter(PRIMARY_PAGE.name), 2);
    }

    #[tokio::test]
    async fn test_failed_page_keeps_partial_results() {
        let server = MockServer::start().await;

        let luminol = ResponseTemplate::new(200).set_body_json(github_releases(0, 100));
        let lophine = ResponseTemplate::new(200).set_body_json(github_releases(500, 3));
        mount_page(&server, "LuminolMC/Luminol", 1, luminol).await;
        mount_page(&server, "LuminolMC/Luminol", 2, ResponseTemplate::new(502)).await;
        mount_page(&server, "LuminolMC/Lophine", 1, lophine).await;

        let source = GitHubSource::new(reqwest::Client::new(), &server.uri());
        let repos = vec!["LuminolMC/Luminol".to_string(), "LuminolMC/Lophine".to_string()];
        let records = source.fetch_releases(&repos).await;

        assert_eq!(records.len(), 103);
        // Repositories are concatenated in request order
        assert_eq!(records[99].project_name, "Luminol");
        assert_eq!(records[100].project_name, "Lophine");
        assert_eq!(records[100].id, 500);
    }

    #[tokio::test]
    async fn test_malformed_page_ends_pagination() {
        let server = MockServer::start().await;
        let html = ResponseTemplate::new(200).set_body_string("<html>");
        mount_page(&server, "LuminolMC/Luminol", 1, html).await;

        let recorder = TestRecorder::default();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let source = GitHubSource::new(reqwest::Client::new(), &server.uri());
        let records = source.fetch_releases(&["LuminolMC/Luminol".to_string()]).await;
        assert!(records.is_empty());
        assert_eq!(recorder.counter(PRIMARY_PAGE.name), 0);
    }

    #[tokio::test]
    async fn test_unreachable_api() {
        let source = GitHubSource::new(reqwest::Client::new(), "http://127.0.0.1:1");
        let records = source.fetch_releases(&["LuminolMC/Luminol".to_string()]).await;
        assert!(records.is_empty());
    }
}
