use std::collections::HashSet;

use log::{info, warn};
use sampler_core::{should_split, SamplingPlanner, SizeRange, StratumState};
use tokio_util::sync::CancellationToken;

use crate::checkpoint::CheckpointStore;
use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::provider::SearchProvider;
use crate::sink::RecordSink;
use crate::types::{RecordKey, ResultRecord};

/// What a completed (or interrupted) run looked like.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub records_stored: u64,
    pub commits_stored: u64,
    pub strata_done: u64,
    pub strata_split: u64,
    /// Strata whose sink writes failed; left non-Done in the checkpoint so
    /// an operator knows the sample is incomplete.
    pub strata_failed: Vec<SizeRange>,
    /// Unit ranges whose population exceeded the ceiling; coverage of
    /// those exact sizes is partial by design.
    pub overflowed: Vec<SizeRange>,
    pub cancelled: bool,
}

/// Top-level driver: walks the planner's strata, fetching and re-splitting
/// until the whole size population is drained.
///
/// Strata are processed strictly sequentially; the provider's governor is
/// the only throttling point. Cancellation is honored between pages, never
/// mid-page, and always leaves the active stratum non-Done.
pub async fn run_harvest(
    planner: &mut SamplingPlanner,
    provider: &dyn SearchProvider,
    checkpoint: &mut CheckpointStore,
    sink: &dyn RecordSink,
    config: &HarvestConfig,
    cancel: &CancellationToken,
) -> Result<HarvestReport, HarvestError> {
    let query = config.search_query();
    let mut seen: HashSet<RecordKey> = sink.known_keys().await?;
    let mut report = HarvestReport::default();

    while let Some(stratum) = planner.next() {
        let range = stratum.range;
        if cancel.is_cancelled() {
            planner.release(range);
            report.cancelled = true;
            break;
        }
        checkpoint.record(range, StratumState::InProgress, false)?;
        info!("querying stratum {range}");

        let first = match provider.search_page(&query, range, 1).await {
            Ok(page) => page,
            Err(HarvestError::TooBroad) => {
                // The provider itself says the window is too wide; same
                // treatment as a count over the ceiling.
                if range.is_unit() {
                    mark_overflowed(planner, checkpoint, &mut report, range, 0)?;
                } else {
                    split_stratum(planner, checkpoint, &mut report, range)?;
                }
                continue;
            }
            Err(err) => return Err(err),
        };

        let mut total = first.total_count;
        if should_split(total, config.ceiling) && !range.is_unit() {
            // Abandon pagination right away; paging a window we are about
            // to discard would waste quota.
            split_stratum(planner, checkpoint, &mut report, range)?;
            continue;
        }
        let mut overflowed = should_split(total, config.ceiling);
        if overflowed {
            warn!(
                "stratum {range} holds {total} results at a single size, \
                 more than the {} the provider can return; accepting partial coverage",
                config.ceiling
            );
        }

        // Drain every page of the window.
        enum PageWalk {
            Drained,
            Interrupted,
            TooBroad,
        }
        let mut records: Vec<ResultRecord> = Vec::new();
        let mut page = first;
        let walk = loop {
            records.extend(page.records);
            // Counts drift between pages; keep the conservative maximum.
            total = total.max(page.total_count);
            let Some(next) = page.next_page else {
                break PageWalk::Drained;
            };
            if cancel.is_cancelled() {
                break PageWalk::Interrupted;
            }
            match provider.search_page(&query, range, next).await {
                Ok(next_page) => page = next_page,
                Err(HarvestError::TooBroad) => break PageWalk::TooBroad,
                Err(err) => return Err(err),
            }
        };
        match walk {
            PageWalk::Drained => {}
            PageWalk::Interrupted => {
                planner.release(range);
                report.cancelled = true;
                break;
            }
            PageWalk::TooBroad => {
                if range.is_unit() {
                    // Cannot narrow further; keep the pages already drained
                    // and finish the stratum as partial coverage.
                    warn!(
                        "unit stratum {range} cannot be narrowed further; \
                         accepting partial coverage"
                    );
                    overflowed = true;
                } else {
                    split_stratum(planner, checkpoint, &mut report, range)?;
                    continue;
                }
            }
        }

        // Collect detail for everything drained and hand it to the sink.
        let mut sink_failed = false;
        for record in &records {
            let key = record.key();
            if seen.contains(&key) {
                continue;
            }
            let commits = match provider
                .commit_history(&record.repo.full_name, &record.path)
                .await
            {
                Ok(commits) => commits,
                Err(HarvestError::Transient { message, .. }) => {
                    // Same policy as the search originals: a file whose
                    // history cannot be fetched is skipped, not fatal.
                    warn!(
                        "skipping {}:{} ({message})",
                        record.repo.full_name, record.path
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };
            match sink.store(record, &commits).await {
                Ok(outcome) => {
                    seen.insert(key);
                    if outcome.inserted {
                        report.records_stored += 1;
                    }
                    report.commits_stored += outcome.commits_inserted;
                }
                Err(err) => {
                    warn!("sink write failed for stratum {range}: {err}");
                    sink_failed = true;
                    break;
                }
            }
        }
        if sink_failed {
            // Leave the checkpoint row InProgress so a resume retries the
            // whole stratum; keep harvesting the rest.
            planner.mark_failed(range);
            report.strata_failed.push(range);
            continue;
        }

        planner.mark_done(range, total, overflowed);
        checkpoint.record(range, StratumState::Done, overflowed)?;
        if overflowed {
            report.overflowed.push(range);
        }
        report.strata_done += 1;
    }

    Ok(report)
}

fn split_stratum(
    planner: &mut SamplingPlanner,
    checkpoint: &mut CheckpointStore,
    report: &mut HarvestReport,
    range: SizeRange,
) -> Result<(), HarvestError> {
    let (lower, upper) = planner.mark_split(range);
    info!("stratum {range} over the ceiling, split into {lower} and {upper}");
    checkpoint.record_split(range, lower, upper)?;
    report.strata_split += 1;
    Ok(())
}

fn mark_overflowed(
    planner: &mut SamplingPlanner,
    checkpoint: &mut CheckpointStore,
    report: &mut HarvestReport,
    range: SizeRange,
    total: u64,
) -> Result<(), HarvestError> {
    warn!("unit stratum {range} cannot be narrowed further; accepting partial coverage");
    planner.mark_done(range, total, true);
    checkpoint.record(range, StratumState::Done, true)?;
    report.overflowed.push(range);
    report.strata_done += 1;
    Ok(())
}
