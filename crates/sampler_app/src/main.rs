//! Command-line front end for the stratified code-search sampler.

mod logging;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use log::{info, warn};
use sampler_core::SamplingPlanner;
use sampler_engine::{
    run_harvest, CheckpointStore, GithubProvider, GithubSettings, GovernorSettings,
    HarvestConfig, RateGovernor, RetrySettings, SqliteSink, MAX_SEARCHABLE_FILE_SIZE,
};
use tokio_util::sync::CancellationToken;

/// Exhaustively sample the GitHub Code Search API.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Search query, without size qualifiers.
    query: String,

    /// Search results database file.
    #[arg(long, value_name = "FILE", default_value = "results.db")]
    database: PathBuf,

    /// Sampling checkpoint file; delete it to force a full re-walk.
    #[arg(long, value_name = "FILE", default_value = "sampling.jsonl")]
    checkpoint: PathBuf,

    /// Minimum code file size.
    #[arg(long, value_name = "BYTES", default_value_t = 1)]
    min_size: u64,

    /// Maximum code file size.
    #[arg(long, value_name = "BYTES", default_value_t = MAX_SEARCHABLE_FILE_SIZE)]
    max_size: u64,

    /// Length of the file-size ranges into which the population is
    /// partitioned.
    #[arg(long, value_name = "BYTES", default_value_t = 1)]
    stratum_size: u64,

    /// Disable request throttling.
    #[arg(long = "no-throttle")]
    no_throttle: bool,

    /// Include forked repositories.
    #[arg(long)]
    include_forks: bool,

    /// Personal access token for GitHub.
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.verbose);

    let runtime = tokio::runtime::Runtime::new().context("tokio runtime")?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(token) = cli.github_token else {
        bail!("missing GitHub token: pass --github-token or set GITHUB_TOKEN");
    };

    let mut config = HarvestConfig::new(cli.query);
    config.min_size = cli.min_size;
    config.max_size = cli.max_size;
    config.stratum_size = cli.stratum_size;
    config.throttle = !cli.no_throttle;
    config.include_forks = cli.include_forks;
    config.checkpoint_path = cli.checkpoint;
    config.database_path = cli.database;
    config.validate()?;

    let mut checkpoint = CheckpointStore::load(&config.checkpoint_path)?;
    let mut planner = if checkpoint.is_empty() {
        SamplingPlanner::new(config.bounds(), config.stratum_size)
    } else {
        info!("continuing previous search from {:?}", config.checkpoint_path);
        SamplingPlanner::resume(
            config.bounds(),
            config.stratum_size,
            &checkpoint.planner_seed(),
        )
    };
    info!("{} strata queued", planner.pending_len());

    let governor = Arc::new(RateGovernor::new(GovernorSettings {
        enabled: config.throttle,
        ..GovernorSettings::default()
    }));
    let provider = GithubProvider::new(
        GithubSettings {
            token: Some(token),
            ..GithubSettings::default()
        },
        RetrySettings::default(),
        governor,
    )?;
    let sink = SqliteSink::open(config.database_path.clone()).await?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing the current page before stopping");
            interrupt.cancel();
        }
    });

    let started = Instant::now();
    let report = run_harvest(
        &mut planner,
        &provider,
        &mut checkpoint,
        &sink,
        &config,
        &cancel,
    )
    .await?;

    info!(
        "harvest {}: {} strata done, {} split, {} files stored, {} commits stored",
        if report.cancelled { "interrupted" } else { "finished" },
        report.strata_done,
        report.strata_split,
        report.records_stored,
        report.commits_stored,
    );
    for range in &report.overflowed {
        warn!("stratum {range} exceeded the result ceiling; coverage there is partial");
    }
    for range in &report.strata_failed {
        warn!("stratum {range} failed to persist and was left incomplete; re-run to retry");
    }
    info!(
        "{} API calls in {:?}",
        provider.api_calls(),
        started.elapsed()
    );

    if !report.strata_failed.is_empty() {
        bail!("{} strata failed to persist; the sample is incomplete", report.strata_failed.len());
    }
    Ok(())
}
