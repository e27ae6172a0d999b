//! Sampler engine: provider access, throttling, checkpointing and
//! persistence around the pure sampling core.
mod checkpoint;
mod config;
mod error;
mod github;
mod governor;
mod orchestrator;
mod provider;
mod sink;
mod types;

pub use checkpoint::{CheckpointEntry, CheckpointStore, EntryState};
pub use config::{HarvestConfig, MAX_SEARCHABLE_FILE_SIZE};
pub use error::HarvestError;
pub use github::{GithubProvider, GithubSettings, RetrySettings};
pub use governor::{GovernorSettings, QuotaWindow, RateGovernor};
pub use orchestrator::{run_harvest, HarvestReport};
pub use provider::{SearchProvider, SearchQuery};
pub use sink::{RecordSink, SqliteSink, StoreOutcome};
pub use types::{
    CommitRecord, QuotaSignal, RecordKey, RepoInfo, ResultRecord, SearchPage,
};
