use std::collections::VecDeque;

use crate::range::{partition, SizeRange};

/// Lifecycle of a stratum. `Done` and `Split` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StratumState {
    Pending,
    InProgress,
    Split,
    Done,
}

/// One contiguous size-range slice of the search population, queried as a
/// unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stratum {
    pub range: SizeRange,
    pub state: StratumState,
    pub result_count: Option<u64>,
    /// Set on a unit range whose population exceeded the result ceiling;
    /// coverage of that exact size is partial.
    pub overflowed: bool,
}

/// Owns the worklist of strata covering the requested size bounds and
/// tracks per-stratum completion.
///
/// The walk is deterministic: `next` hands out strata in ascending range
/// order, and split children are re-queued at the front so a size region is
/// fully resolved before the walk moves past it.
pub struct SamplingPlanner {
    worklist: VecDeque<SizeRange>,
    in_progress: Option<SizeRange>,
    resolved: Vec<Stratum>,
}

impl SamplingPlanner {
    /// Fresh plan: contiguous `width`-sized strata covering `bounds`.
    pub fn new(bounds: SizeRange, width: u64) -> Self {
        Self {
            worklist: partition(bounds, width).into(),
            in_progress: None,
            resolved: Vec::new(),
        }
    }

    /// Rebuild a plan from checkpoint rows.
    ///
    /// `Done` rows are kept as resolved and never re-queried. `Split` rows
    /// are skipped because their children appear as separate rows.
    /// `Pending`/`InProgress` rows are retried from scratch; only
    /// whole-stratum completion is durable. A non-terminal row that strictly
    /// contains another row is a stale split parent (the process stopped
    /// before the parent row was terminalized) and is dropped in favor of
    /// its children. Finally, any part of the requested bounds not covered
    /// by a kept row is re-queued along the fresh partition's boundaries,
    /// so the worklist plus the resolved strata always tile the bounds
    /// exactly, whatever state the checkpoint was left in.
    pub fn resume(
        bounds: SizeRange,
        width: u64,
        seed: &[(SizeRange, StratumState, bool)],
    ) -> Self {
        let mut resolved = Vec::new();
        let mut pending: Vec<SizeRange> = Vec::new();
        for (i, (range, state, overflowed)) in seed.iter().enumerate() {
            match state {
                StratumState::Done => resolved.push(Stratum {
                    range: *range,
                    state: StratumState::Done,
                    result_count: None,
                    overflowed: *overflowed,
                }),
                StratumState::Split => {}
                StratumState::Pending | StratumState::InProgress => {
                    let is_stale_parent = seed
                        .iter()
                        .enumerate()
                        .any(|(j, (other, _, _))| i != j && range.contains(other));
                    if !is_stale_parent {
                        pending.push(*range);
                    }
                }
            }
        }

        // Everything kept so far, in range order. Rows come from repeated
        // bisection of disjoint strata, so they are disjoint.
        let mut covered: Vec<SizeRange> = resolved
            .iter()
            .map(|stratum| stratum.range)
            .chain(pending.iter().copied())
            .collect();
        covered.sort();

        // Re-queue whatever the kept rows leave uncovered: untouched
        // strata, and the remainder of any dropped stale parent.
        for stratum in partition(bounds, width) {
            pending.extend(uncovered_within(stratum, &covered));
        }

        pending.sort();
        pending.dedup();
        Self {
            worklist: pending.into(),
            in_progress: None,
            resolved,
        }
    }

    /// Next unresolved stratum in ascending range order, marked in
    /// progress. Returns `None` once the plan is complete.
    pub fn next(&mut self) -> Option<Stratum> {
        debug_assert!(self.in_progress.is_none(), "previous stratum unresolved");
        let range = self.worklist.pop_front()?;
        self.in_progress = Some(range);
        Some(Stratum {
            range,
            state: StratumState::InProgress,
            result_count: None,
            overflowed: false,
        })
    }

    /// The in-progress stratum reported more matches than can be paginated:
    /// bisect it and queue both halves at the front of the worklist.
    pub fn mark_split(&mut self, range: SizeRange) -> (SizeRange, SizeRange) {
        debug_assert_eq!(self.in_progress, Some(range));
        self.in_progress = None;
        let (lower, upper) = range.bisect();
        self.worklist.push_front(upper);
        self.worklist.push_front(lower);
        self.resolved.push(Stratum {
            range,
            state: StratumState::Split,
            result_count: None,
            overflowed: false,
        });
        (lower, upper)
    }

    /// The in-progress stratum has been fully drained.
    pub fn mark_done(&mut self, range: SizeRange, result_count: u64, overflowed: bool) {
        debug_assert_eq!(self.in_progress, Some(range));
        self.in_progress = None;
        self.resolved.push(Stratum {
            range,
            state: StratumState::Done,
            result_count: Some(result_count),
            overflowed,
        });
    }

    /// The in-progress stratum was interrupted; put it back at the front so
    /// a later retry (or resume) picks it up first.
    pub fn release(&mut self, range: SizeRange) {
        debug_assert_eq!(self.in_progress, Some(range));
        self.in_progress = None;
        self.worklist.push_front(range);
    }

    /// The in-progress stratum failed durably for this run. It is dropped
    /// from the worklist but never marked done, so a resume retries it.
    pub fn mark_failed(&mut self, range: SizeRange) {
        debug_assert_eq!(self.in_progress, Some(range));
        self.in_progress = None;
    }

    pub fn pending_len(&self) -> usize {
        self.worklist.len()
    }

    pub fn is_complete(&self) -> bool {
        self.worklist.is_empty() && self.in_progress.is_none()
    }

    /// Resolved strata (`Done` and `Split`) in completion order.
    pub fn resolved(&self) -> impl Iterator<Item = &Stratum> {
        self.resolved.iter()
    }
}

/// Parts of `stratum` not covered by any of `covered`, which must be
/// sorted and pairwise disjoint.
fn uncovered_within(stratum: SizeRange, covered: &[SizeRange]) -> Vec<SizeRange> {
    let mut gaps = Vec::new();
    let mut cursor = stratum.low;
    for range in covered {
        if range.high < cursor || range.low > stratum.high {
            continue;
        }
        if range.low > cursor {
            gaps.push(SizeRange::new(cursor, range.low - 1));
        }
        cursor = cursor.max(range.high.saturating_add(1));
        if cursor > stratum.high {
            break;
        }
    }
    if cursor <= stratum.high {
        gaps.push(SizeRange::new(cursor, stratum.high));
    }
    gaps
}
