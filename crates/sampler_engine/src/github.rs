use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, warn};
use reqwest::header::{HeaderMap, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::StatusCode;
use sampler_core::SizeRange;
use serde::Deserialize;

use crate::error::HarvestError;
use crate::governor::RateGovernor;
use crate::provider::{SearchProvider, SearchQuery};
use crate::types::{CommitRecord, QuotaSignal, RepoInfo, ResultRecord, SearchPage};

#[derive(Debug, Clone)]
pub struct GithubSettings {
    pub api_base: String,
    /// Host serving raw file content; not subject to the API quota.
    pub raw_base: String,
    pub token: Option<String>,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            raw_base: "https://raw.githubusercontent.com".to_string(),
            token: None,
            user_agent: "code-search-sampler".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Bounded exponential backoff for transient provider failures.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

/// Windowed-search provider backed by the GitHub REST API.
///
/// Every API call goes through the shared [`RateGovernor`]; rate-limit
/// responses (403/429) are absorbed as scheduling signals and retried
/// without consuming the transient retry budget.
pub struct GithubProvider {
    http: reqwest::Client,
    settings: GithubSettings,
    retry: RetrySettings,
    governor: Arc<RateGovernor>,
    api_calls: AtomicU64,
}

impl GithubProvider {
    pub fn new(
        settings: GithubSettings,
        retry: RetrySettings,
        governor: Arc<RateGovernor>,
    ) -> Result<Self, HarvestError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| HarvestError::InvalidConfig(format!("http client: {err}")))?;
        Ok(Self {
            http,
            settings,
            retry,
            governor,
            api_calls: AtomicU64::new(0),
        })
    }

    /// Total number of quota-limited API calls issued so far.
    pub fn api_calls(&self) -> u64 {
        self.api_calls.load(Ordering::Relaxed)
    }

    /// Governed GET against the API with retry and rate-limit handling.
    async fn get_api(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, HarvestError> {
        let mut attempts = 0u32;
        let mut backoff = self.retry.initial_backoff;
        loop {
            self.governor.acquire().await;

            let mut request = self
                .http
                .get(url)
                .query(params)
                .header(USER_AGENT, &self.settings.user_agent);
            if let Some(token) = &self.settings.token {
                request = request.header(AUTHORIZATION, format!("token {token}"));
            }

            self.api_calls.fetch_add(1, Ordering::Relaxed);
            match request.send().await {
                Ok(response) => {
                    let signal = quota_signal(response.headers());
                    self.governor.update(signal).await;

                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status == StatusCode::FORBIDDEN
                        || status == StatusCode::TOO_MANY_REQUESTS
                    {
                        // Rate limited. Not an error: hand the wait to the
                        // governor and go again.
                        let wait = signal
                            .retry_after
                            .or(signal.reset_in)
                            .unwrap_or(Duration::from_secs(60));
                        warn!("rate limited on {url}, backing off {}s", wait.as_secs());
                        self.governor.exhaust(wait).await;
                        continue;
                    }
                    if status == StatusCode::UNPROCESSABLE_ENTITY {
                        return Err(HarvestError::TooBroad);
                    }
                    attempts += 1;
                    if !status.is_server_error() || attempts >= self.retry.max_attempts {
                        return Err(HarvestError::Transient {
                            attempts,
                            message: format!("{url} answered {status}"),
                        });
                    }
                    debug!("{url} answered {status}, retrying in {backoff:?}");
                }
                Err(err) => {
                    attempts += 1;
                    if attempts >= self.retry.max_attempts {
                        return Err(HarvestError::Transient {
                            attempts,
                            message: err.to_string(),
                        });
                    }
                    debug!("request to {url} failed ({err}), retrying in {backoff:?}");
                }
            }
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }

    /// Fetch the file content at one commit from the raw host. Failures
    /// are tolerated: the commit is stored without content.
    async fn fetch_raw_content(
        &self,
        repo_full_name: &str,
        commit_sha: &str,
        path: &str,
    ) -> Option<String> {
        let url = format!(
            "{}/{}/{}/{}",
            self.settings.raw_base,
            repo_full_name,
            commit_sha,
            path.replace('#', "%23")
        );
        let response = self
            .http
            .get(&url)
            .header(USER_AGENT, &self.settings.user_agent)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.text().await.ok()
    }
}

#[async_trait::async_trait]
impl SearchProvider for GithubProvider {
    async fn search_page(
        &self,
        query: &SearchQuery,
        range: SizeRange,
        page: u32,
    ) -> Result<SearchPage, HarvestError> {
        let url = format!("{}/search/code", self.settings.api_base);
        let mut q = format!("{} size:{}", query.terms, range);
        if query.include_forks {
            q.push_str(" fork:true");
        }
        let params = [
            ("q", q),
            ("sort", "indexed".to_string()),
            ("order", "asc".to_string()),
            ("per_page", query.per_page.to_string()),
            ("page", page.to_string()),
        ];
        let response = self.get_api(&url, &params).await?;
        let has_next = link_has_next(response.headers());
        let payload: SearchResponse =
            response.json().await.map_err(|err| HarvestError::Transient {
                attempts: 1,
                message: format!("search response body: {err}"),
            })?;

        Ok(SearchPage {
            total_count: payload.total_count,
            next_page: has_next.then_some(page + 1),
            records: payload.items.into_iter().map(ResultRecord::from).collect(),
        })
    }

    async fn commit_history(
        &self,
        repo_full_name: &str,
        path: &str,
    ) -> Result<Vec<CommitRecord>, HarvestError> {
        let url = format!("{}/repos/{}/commits", self.settings.api_base, repo_full_name);
        let mut commits = Vec::new();
        let mut page = 1u32;
        loop {
            let params = [
                ("path", path.to_string()),
                ("per_page", "100".to_string()),
                ("page", page.to_string()),
            ];
            let response = self.get_api(&url, &params).await?;
            let has_next = link_has_next(response.headers());
            let payload: Vec<CommitPayload> =
                response.json().await.map_err(|err| HarvestError::Transient {
                    attempts: 1,
                    message: format!("commit list body: {err}"),
                })?;

            for entry in payload {
                let content = self
                    .fetch_raw_content(repo_full_name, &entry.sha, path)
                    .await;
                commits.push(CommitRecord {
                    sha: entry.sha,
                    message: entry.commit.message,
                    committed_at: entry
                        .commit
                        .committer
                        .map(|c| c.date)
                        .unwrap_or_default(),
                    parents: entry.parents.into_iter().map(|p| p.sha).collect(),
                    content,
                });
            }
            if !has_next {
                return Ok(commits);
            }
            page += 1;
        }
    }
}

/// Parse the provider's rate-limit headers into a relative signal.
fn quota_signal(headers: &HeaderMap) -> QuotaSignal {
    let header_u64 = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
    };

    let reset_in = header_u64("x-ratelimit-reset").map(|reset_epoch| {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Duration::from_secs(reset_epoch.saturating_sub(now))
    });

    QuotaSignal {
        remaining: header_u64("x-ratelimit-remaining"),
        reset_in,
        retry_after: header_u64("retry-after").map(Duration::from_secs),
    }
}

fn link_has_next(headers: &HeaderMap) -> bool {
    headers
        .get(LINK)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("rel=\"next\""))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    total_count: u64,
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    name: String,
    path: String,
    sha: String,
    repository: RepoPayload,
}

#[derive(Debug, Deserialize)]
struct RepoPayload {
    id: i64,
    name: String,
    full_name: String,
    description: Option<String>,
    url: String,
    #[serde(default)]
    fork: bool,
    owner: OwnerPayload,
}

#[derive(Debug, Deserialize)]
struct OwnerPayload {
    id: i64,
    login: String,
}

impl From<SearchItem> for ResultRecord {
    fn from(item: SearchItem) -> Self {
        ResultRecord {
            name: item.name,
            path: item.path,
            sha: item.sha,
            repo: RepoInfo {
                id: item.repository.id,
                name: item.repository.name,
                full_name: item.repository.full_name,
                description: item.repository.description,
                url: item.repository.url,
                fork: item.repository.fork,
                owner_id: item.repository.owner.id,
                owner_login: item.repository.owner.login,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommitPayload {
    sha: String,
    commit: CommitInner,
    #[serde(default)]
    parents: Vec<ParentPayload>,
}

#[derive(Debug, Deserialize)]
struct CommitInner {
    message: String,
    committer: Option<CommitterInner>,
}

#[derive(Debug, Deserialize)]
struct CommitterInner {
    date: String,
}

#[derive(Debug, Deserialize)]
struct ParentPayload {
    sha: String,
}
