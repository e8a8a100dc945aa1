//! Epoch Shard Driver
//!
//! Splits `[0, duration)` into contiguous epoch ranges, one per worker
//! thread. Each worker owns a clone of the pipeline and diffs every epoch
//! against the previous one it computed; the first epoch of a shard is a
//! full dump.
//!
//! A fatal error in one shard raises a shared flag and the other shards stop
//! before their next epoch. `finished.txt` is written only when every shard
//! succeeds.

use crate::delta::{self, EpochState};
use crate::pipeline::EpochPipeline;
use crate::{DynamicStateError, Result};
use orbital_mechanics::GeometryProvider;
use std::fs;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Contiguous epoch range handled by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardPlan {
    pub index: usize,
    pub first_epoch: usize,
    pub num_epochs: usize,
}

impl ShardPlan {
    pub fn epochs(&self) -> Range<usize> {
        self.first_epoch..self.first_epoch + self.num_epochs
    }

    pub fn start_ns(&self, time_step_ns: i64) -> i64 {
        self.first_epoch as i64 * time_step_ns
    }

    pub fn end_ns(&self, time_step_ns: i64) -> i64 {
        (self.first_epoch + self.num_epochs) as i64 * time_step_ns
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub epochs: usize,
    pub shards: usize,
    pub elapsed: Duration,
}

/// `floor(duration / step)`
pub fn epoch_count(duration_ns: i64, time_step_ns: i64) -> usize {
    if duration_ns <= 0 || time_step_ns <= 0 {
        return 0;
    }
    (duration_ns / time_step_ns) as usize
}

/// The first `total % shards` shards take one extra epoch
pub fn plan_shards(total_epochs: usize, shards: usize) -> Vec<ShardPlan> {
    let shards = shards.max(1);
    let base = total_epochs / shards;
    let with_extra = total_epochs % shards;

    let mut next = 0;
    (0..shards)
        .map(|index| {
            let num_epochs = base + usize::from(index < with_extra);
            let plan = ShardPlan {
                index,
                first_epoch: next,
                num_epochs,
            };
            next += num_epochs;
            plan
        })
        .collect()
}

/// Raises the cancel flag unless disarmed, including while unwinding
struct CancelOnDrop<'a> {
    flag: &'a AtomicBool,
    armed: bool,
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::Release);
        }
    }
}

fn run_shard<P: GeometryProvider>(
    pipeline: EpochPipeline<P>,
    plan: ShardPlan,
    time_step_ns: i64,
    cancel: &AtomicBool,
) -> Result<usize> {
    let mut guard = CancelOnDrop {
        flag: cancel,
        armed: true,
    };

    if plan.first_epoch > 0 {
        warn!(
            "Shard {} starts mid-run at t={}ns; its first epoch is written in full",
            plan.index,
            plan.start_ns(time_step_ns)
        );
    }

    let progress_every = (plan.num_epochs / 10).max(1);
    let mut previous: Option<EpochState> = None;

    for (done, epoch) in plan.epochs().enumerate() {
        if cancel.load(Ordering::Acquire) {
            guard.armed = false;
            return Err(DynamicStateError::ShardCancelled { shard: plan.index });
        }

        let t_ns = epoch as i64 * time_step_ns;
        match pipeline.run_epoch(t_ns, previous.as_ref()) {
            Ok(state) => previous = Some(state),
            Err(e) => {
                error!("Shard {} failed at t={}ns: {}", plan.index, t_ns, e);
                return Err(e);
            }
        }

        if (done + 1) % progress_every == 0 || done + 1 == plan.num_epochs {
            info!(
                "Shard {}: {}/{} epochs ({:.0}%)",
                plan.index,
                done + 1,
                plan.num_epochs,
                100.0 * (done + 1) as f64 / plan.num_epochs as f64
            );
        }
    }

    guard.armed = false;
    Ok(plan.num_epochs)
}

/// Run every non-empty shard on its own thread and wait for all of them.
///
/// Returns the first failure in shard order, preferring the error that
/// caused cancellation over the cancellations it triggered.
pub fn run_shards<P: GeometryProvider>(
    pipeline: &EpochPipeline<P>,
    plans: &[ShardPlan],
    time_step_ns: i64,
) -> Result<RunSummary> {
    let started = Instant::now();
    let cancel = AtomicBool::new(false);

    let results: Vec<(usize, Result<usize>)> = thread::scope(|scope| {
        let handles: Vec<_> = plans
            .iter()
            .filter(|plan| plan.num_epochs > 0)
            .map(|&plan| {
                let pipeline = pipeline.clone();
                let cancel = &cancel;
                let handle = scope.spawn(move || run_shard(pipeline, plan, time_step_ns, cancel));
                (plan.index, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(shard, handle)| {
                let result = handle
                    .join()
                    .unwrap_or(Err(DynamicStateError::WorkerPanicked { shard }));
                (shard, result)
            })
            .collect()
    });

    let shards = results.len();
    let mut epochs = 0;
    let mut first_cancelled = None;
    for (_, result) in results {
        match result {
            Ok(n) => epochs += n,
            Err(e @ DynamicStateError::ShardCancelled { .. }) => {
                first_cancelled.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }
    if let Some(e) = first_cancelled {
        return Err(e);
    }

    Ok(RunSummary {
        epochs,
        shards,
        elapsed: started.elapsed(),
    })
}

/// Full run: prepare the output directory, run all shards, then write the
/// `finished.txt` marker
pub fn generate_dynamic_state<P: GeometryProvider>(
    pipeline: &EpochPipeline<P>,
    duration_ns: i64,
    time_step_ns: i64,
    threads: usize,
) -> Result<RunSummary> {
    let layout = pipeline.layout();
    layout.create_dirs()?;

    let finished = layout.finished_file();
    if finished.exists() {
        fs::remove_file(&finished).map_err(|e| DynamicStateError::io(&finished, e))?;
    }

    let total = epoch_count(duration_ns, time_step_ns);
    let plans = plan_shards(total, threads);
    info!(
        "Generating {} epochs of {}ms into {:?} on {} shard(s)",
        total,
        time_step_ns / 1_000_000,
        layout.root(),
        plans.len()
    );
    for plan in &plans {
        info!(
            "Shard {} does interval [{:.2} ms, {:.2} ms)",
            plan.index,
            plan.start_ns(time_step_ns) as f64 / 1e6,
            plan.end_ns(time_step_ns) as f64 / 1e6
        );
    }

    let summary = run_shards(pipeline, &plans, time_step_ns)?;
    delta::write_finished(layout)?;

    info!(
        "Dynamic state complete: {} epochs on {} shard(s) in {:.2}s",
        summary.epochs,
        summary.shards,
        summary.elapsed.as_secs_f64()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_count() {
        assert_eq!(epoch_count(200_000_000_000, 100_000_000), 2_000);
        assert_eq!(epoch_count(1_000, 300), 3);
        assert_eq!(epoch_count(1_000, 0), 0);
        assert_eq!(epoch_count(0, 100), 0);
    }

    #[test]
    fn test_plan_shards_remainder_goes_first() {
        let plans = plan_shards(10, 3);
        let sizes: Vec<usize> = plans.iter().map(|p| p.num_epochs).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_eq!(plans[1].first_epoch, 4);
        assert_eq!(plans[2].epochs(), 7..10);
    }

    #[test]
    fn test_plan_shards_contiguous_cover() {
        for total in 0..40 {
            for shards in 1..9 {
                let plans = plan_shards(total, shards);
                assert_eq!(plans.len(), shards);
                let mut next = 0;
                for plan in &plans {
                    assert_eq!(plan.first_epoch, next);
                    next += plan.num_epochs;
                }
                assert_eq!(next, total);
            }
        }
    }

    #[test]
    fn test_more_shards_than_epochs() {
        let sizes: Vec<usize> = plan_shards(2, 4).iter().map(|p| p.num_epochs).collect();
        assert_eq!(sizes, vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_shard_interval_ns() {
        let plan = ShardPlan {
            index: 1,
            first_epoch: 4,
            num_epochs: 3,
        };
        assert_eq!(plan.start_ns(100), 400);
        assert_eq!(plan.end_ns(100), 700);
    }
}
