use parking_lot::RwLock;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MAJOR_CONTRIBUTIONS: u64 = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub html_url: String,
    pub contributions: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Contributor {
    fn is_human(&self) -> bool {
        self.kind == "User" && !self.login.contains("bot") && !self.login.contains("dependabot")
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ContributorError {
    #[error("GitHub API error: {0}")]
    Status(StatusCode),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Default)]
struct ContributorState {
    contributors: Vec<Contributor>,
    is_loading: bool,
    error: Option<String>,
}

/// Shared contributor list. Clones refer to the same state, so one store
/// created at startup can be handed to every consumer.
#[derive(Clone)]
pub struct ContributorStore {
    client: reqwest::Client,
    url: String,
    state: Arc<RwLock<ContributorState>>,
}

impl ContributorStore {
    pub fn new(client: reqwest::Client, api_base: &str, repo: &str) -> Self {
        ContributorStore {
            client,
            url: format!(
                "{}/repos/{repo}/contributors?per_page=100",
                api_base.trim_end_matches('/')
            ),
            state: Arc::new(RwLock::new(ContributorState::default())),
        }
    }

    pub fn contributors(&self) -> Vec<Contributor> {
        self.state.read().contributors.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    async fn request(&self) -> Result<Vec<Contributor>, ContributorError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ContributorError::Status(response.status()));
        }

        let contributors = response.json::<Vec<Contributor>>().await?;
        Ok(contributors.into_iter().filter(Contributor::is_human).collect())
    }

    /// Returns the cached list, loading it on first use. Failures are recorded
    /// in `error()` and produce an empty list.
    pub async fn fetch_contributors(&self) -> Vec<Contributor> {
        {
            let mut state = self.state.write();
            if !state.contributors.is_empty() {
                return state.contributors.clone();
            }
            state.is_loading = true;
            state.error = None;
        }

        let result = self.request().await;

        let mut state = self.state.write();
        state.is_loading = false;
        match result {
            Ok(contributors) => {
                state.contributors = contributors.clone();
                contributors
            }
            Err(e) => {
                tracing::error!(error = %e, "error fetching contributors");
                state.error = Some(e.to_string());
                Vec::new()
            }
        }
    }
}

pub fn major_contributors(contributors: &[Contributor]) -> Vec<&Contributor> {
    contributors
        .iter()
        .filter(|c| c.contributions >= MAJOR_CONTRIBUTIONS)
        .collect()
}

pub fn minor_contributors(contributors: &[Contributor]) -> Vec<&Contributor> {
    contributors
        .iter()
        .filter(|c| c.contributions < MAJOR_CONTRIBUTIONS)
        .collect()
}
