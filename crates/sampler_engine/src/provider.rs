use sampler_core::SizeRange;

use crate::error::HarvestError;
use crate::types::{CommitRecord, SearchPage};

/// Search query parameters, without the size qualifier (that comes from
/// the stratum being walked).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub terms: String,
    pub include_forks: bool,
    pub per_page: u32,
}

/// Abstract windowed-search provider.
///
/// The orchestrator depends only on this contract; the concrete transport
/// lives in [`crate::GithubProvider`]. Implementations are responsible for
/// their own throttling and retries, so callers never see a quota error.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// Fetch one page of results for a size-bounded query. Pages are
    /// numbered from 1; `SearchPage::next_page` is `None` once the window
    /// is exhausted.
    async fn search_page(
        &self,
        query: &SearchQuery,
        range: SizeRange,
        page: u32,
    ) -> Result<SearchPage, HarvestError>;

    /// Full commit history of one file, oldest page last, with the file
    /// content at each commit when available.
    async fn commit_history(
        &self,
        repo_full_name: &str,
        path: &str,
    ) -> Result<Vec<CommitRecord>, HarvestError>;
}
