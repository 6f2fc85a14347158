//! Work scheduling: a work channel, a result channel, and `nprocs` workers in
//! between.
//!
//! ```text
//!   enqueue()            run()                       results
//!  ──────────▶ [work] ──▶ worker 0 ┐
//!                     ──▶ worker 1 ├──▶ [result] ──▶ Receiver<WorkResult>
//!                     ──▶   ...    ┘
//! ```
//!
//! The work sender is dropped when [`Scheduler::run`] starts, so workers
//! drain until the channel disconnects; no emptiness polling. Results arrive
//! in completion order, which is unspecified when `nprocs > 1`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use super::interrupt::Interrupt;
use crate::error::BatchError;
use crate::trajectory::{Simulated, Trajectory};

/// A trajectory waiting to run, tagged with its sample index.
pub struct WorkItem<T> {
    pub index: usize,
    pub trajectory: T,
}

/// What one worker produced for one work item.
#[derive(Debug)]
pub struct WorkResult {
    pub index: usize,
    pub outcome: Result<Simulated>,
}

/// Two-channel pipeline with a configurable worker count.
pub struct Scheduler<T> {
    work_tx: Sender<WorkItem<T>>,
    work_rx: Receiver<WorkItem<T>>,
    nprocs: usize,
    enqueued: usize,
    interrupt: Interrupt,
}

impl<T: Trajectory> Scheduler<T> {
    /// `nprocs` below one is treated as one.
    pub fn new(nprocs: usize, interrupt: Interrupt) -> Self {
        let (work_tx, work_rx) = unbounded();
        Self {
            work_tx,
            work_rx,
            nprocs: nprocs.max(1),
            enqueued: 0,
            interrupt,
        }
    }

    /// Queue a trajectory. Indices follow enqueue order.
    pub fn enqueue(&mut self, trajectory: T) -> Result<()> {
        let item = WorkItem {
            index: self.enqueued,
            trajectory,
        };
        self.work_tx
            .send(item)
            .map_err(|_| anyhow!("work queue closed"))?;
        self.enqueued += 1;
        Ok(())
    }

    pub fn enqueued(&self) -> usize {
        self.enqueued
    }

    /// Close the work queue and drain it with `nprocs` blocking workers.
    ///
    /// Returns the result receiver once every worker has exited; iterating it
    /// yields each result exactly once and then stops. A panic inside a
    /// trajectory is resumed on the caller.
    pub async fn run(self) -> Result<Receiver<WorkResult>> {
        let Self {
            work_tx,
            work_rx,
            nprocs,
            enqueued,
            interrupt,
        } = self;
        drop(work_tx);

        let (result_tx, result_rx) = unbounded();
        let workers = nprocs.min(enqueued.max(1));
        let completed = Arc::new(AtomicUsize::new(0));
        let halt = Arc::new(AtomicBool::new(false));

        debug!(workers, enqueued, "starting workers");

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let work = work_rx.clone();
                let results = result_tx.clone();
                let ctx = WorkerContext {
                    worker,
                    interrupt: interrupt.clone(),
                    completed: Arc::clone(&completed),
                    halt: Arc::clone(&halt),
                };
                tokio::task::spawn_blocking(move || drain(work, results, ctx))
            })
            .collect();
        drop(result_tx);
        drop(work_rx);

        for handle in handles {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
                return Err(anyhow!(e).context("trajectory worker was cancelled"));
            }
        }

        debug!(completed = completed.load(Ordering::SeqCst), "workers finished");
        Ok(result_rx)
    }
}

struct WorkerContext {
    worker: usize,
    interrupt: Interrupt,
    completed: Arc<AtomicUsize>,
    /// Set once any worker hit an error, so the others stop early.
    halt: Arc<AtomicBool>,
}

/// Worker loop: pull until the work channel disconnects or the batch stops.
fn drain<T: Trajectory>(work: Receiver<WorkItem<T>>, results: Sender<WorkResult>, ctx: WorkerContext) {
    for WorkItem {
        index,
        mut trajectory,
    } in work.iter()
    {
        if ctx.interrupt.is_triggered() {
            let completed = ctx.completed.load(Ordering::SeqCst);
            let _ = results.send(WorkResult {
                index,
                outcome: Err(BatchError::Interrupted { completed }.into()),
            });
            ctx.halt.store(true, Ordering::SeqCst);
            break;
        }
        if ctx.halt.load(Ordering::SeqCst) {
            break;
        }

        let outcome = trajectory.simulate();
        if outcome.is_err() {
            ctx.halt.store(true, Ordering::SeqCst);
        } else {
            ctx.completed.fetch_add(1, Ordering::SeqCst);
        }

        // The receiver outlives every worker, so a failed send means the
        // caller is gone and there is nobody left to report to.
        if results.send(WorkResult { index, outcome }).is_err() {
            break;
        }
    }
    debug!(worker = ctx.worker, "worker exiting");
}
