use std::time::Duration;

/// Repository metadata attached to every search hit, mirroring the
/// provider's response shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub url: String,
    pub fork: bool,
    pub owner_id: i64,
    pub owner_login: String,
}

/// One deduplicated unit of discovered data: a file hit from the search
/// endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub repo: RepoInfo,
    pub name: String,
    pub path: String,
    pub sha: String,
}

impl ResultRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            repo_id: self.repo.id,
            path: self.path.clone(),
            sha: self.sha.clone(),
        }
    }
}

/// Stable unique key for a result record. A key, once persisted, is never
/// persisted twice, even across process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub repo_id: i64,
    pub path: String,
    pub sha: String,
}

/// One entry of a file's commit history, with the file content at that
/// commit when it could be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub sha: String,
    pub message: String,
    pub committed_at: String,
    pub parents: Vec<String>,
    pub content: Option<String>,
}

/// One bounded page of search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    pub records: Vec<ResultRecord>,
    pub total_count: u64,
    pub next_page: Option<u32>,
}

/// Rate-limit fields reported by the provider on every response.
///
/// `reset_in` is relative rather than an absolute wall-clock timestamp so
/// the governor can schedule against the monotonic clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaSignal {
    pub remaining: Option<u64>,
    pub reset_in: Option<Duration>,
    pub retry_after: Option<Duration>,
}
