//! Level-by-level execution of the resolved task graph.
//!
//! The executor runs each level on a thread pool and only moves on once the
//! whole level has settled. The algorithm works as follows:
//!
//! 1. The resolver produces the level sequence for the target task.
//! 2. For every level, work units are spawned onto the Rayon pool, at most
//!    `parallelism` at a time (unbounded by default).
//! 3. The coordinating thread sits on an mpsc channel, waiting for results;
//!    it never blocks inside a work unit itself.
//! 4. When a task settles, the next queued task of the level is spawned.
//! 5. On failure no further level starts; whether the rest of the failing
//!    level still runs is governed by [`FailurePolicy`].
//!
//! There is no mid-task cancellation: a started work unit always runs to
//! completion or failure. Hung work units block their level indefinitely.

use std::num::NonZeroUsize;
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::Environment;
use crate::error::{BuildError, MillraceError};
use crate::registry::{Registry, TaskId};
use crate::resolver::resolve;

/// What to do with the rest of a level once one of its tasks has failed.
///
/// Subsequent levels never start either way; the policy only concerns the
/// siblings of the failing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Let work already in flight settle, but spawn nothing further.
    #[default]
    SettleInFlight,
    /// Run every task of the failing level before aborting.
    FinishLevel,
}

/// Knobs for a single run.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Cap on concurrently running tasks within a level. `None` launches the
    /// whole level at once.
    pub parallelism: Option<NonZeroUsize>,
    pub failure_policy: FailurePolicy,
}

/// Execution metrics for a single task.
#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub start: Instant,
    pub duration: Duration,
}

/// Per-run performance metrics, returned by a successful run and discarded
/// with it.
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// Task names paired with their execution metrics, in settle order.
    pub execution_times: Vec<(String, TaskExecution)>,
}

impl Diagnostics {
    /// Total time attributed to tasks (sum of durations, not wall clock).
    pub fn total(&self) -> Duration {
        self.execution_times.iter().map(|(_, t)| t.duration).sum()
    }

    /// Tasks ordered from slowest to fastest.
    pub fn slowest_first(&self) -> Vec<(&str, Duration)> {
        let mut times: Vec<_> = self
            .execution_times
            .iter()
            .map(|(name, t)| (name.as_str(), t.duration))
            .collect();
        times.sort_by(|a, b| b.1.cmp(&a.1));
        times
    }
}

/// Execute `target` and everything it depends on.
pub(crate) fn run(
    registry: &Registry,
    target: &str,
    env: &Environment,
    options: &Options,
) -> Result<Diagnostics, MillraceError> {
    let levels = resolve(registry, target)?;
    let total: usize = levels.iter().map(Vec::len).sum();

    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .expect("invalid progress bar template")
            .progress_chars("=>-"),
    );
    bar.set_message(format!("Building '{target}'..."));

    let mut diagnostics = Diagnostics::default();

    for level in &levels {
        run_level(registry, level, env, options, &mut diagnostics, &bar)?;
    }

    bar.finish_with_message("Build complete!");
    Ok(diagnostics)
}

/// Run one level to settlement. Tasks within a level are independent by
/// construction, so no ordering between them is guaranteed or needed.
fn run_level(
    registry: &Registry,
    level: &[TaskId],
    env: &Environment,
    options: &Options,
    diagnostics: &mut Diagnostics,
    bar: &ProgressBar,
) -> Result<(), BuildError> {
    let limit = options
        .parallelism
        .map_or(level.len(), NonZeroUsize::get)
        .max(1);

    let (result_sender, result_receiver) =
        channel::<(String, anyhow::Result<()>, Instant, Duration)>();

    let mut failure: Option<BuildError> = None;

    rayon::scope(|s| {
        // Move the receiver into the scope closure. The closure passed to
        // `rayon::scope` must be `Send`, and `Receiver` is `Send` but not
        // `Sync`, so it has to be captured by value rather than by shared
        // reference.
        let result_receiver = result_receiver;

        // A helper closure to spawn a task
        let spawn_task = |id: TaskId| {
            let task = registry.get(id);
            let name = task.name().to_string();
            let work = task.work().clone();
            let sender = result_sender.clone();

            s.spawn(move |_| {
                tracing::debug!("running task '{name}'");
                let start = Instant::now();

                // We use AssertUnwindSafe because a panicking work unit only
                // ever owns cloned or immutable data; it cannot corrupt
                // state shared with other tasks.
                let result = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    work.call(env)
                })) {
                    Ok(result) => result,
                    Err(panic) => {
                        let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                            format!("Task panicked: {s}")
                        } else if let Some(s) = panic.downcast_ref::<String>() {
                            format!("Task panicked: {s}")
                        } else {
                            String::from("Task panicked with unknown payload")
                        };

                        Err(anyhow::anyhow!(msg))
                    }
                };

                let duration = start.elapsed();

                // Send result back to the coordinating thread
                sender.send((name, result, start, duration)).unwrap();
            });
        };

        let mut queue = level.iter().copied();
        let mut in_flight = 0;

        // Seed up to the parallelism limit
        for id in queue.by_ref().take(limit) {
            spawn_task(id);
            in_flight += 1;
        }

        // Scheduler loop
        // The coordinating thread sits here while Rayon workers execute tasks.
        while in_flight > 0 {
            let (name, result, start, duration) = result_receiver.recv().unwrap();
            in_flight -= 1;
            bar.inc(1);

            diagnostics
                .execution_times
                .push((name.clone(), TaskExecution { start, duration }));

            if let Err(err) = result {
                tracing::error!("task '{name}' failed");
                if failure.is_none() {
                    failure = Some(BuildError::Task(name, err));
                }
            }

            // The first failure stops the spawning of queued siblings unless
            // the policy asks for the level to finish.
            if failure.is_none() || options.failure_policy == FailurePolicy::FinishLevel {
                if let Some(id) = queue.next() {
                    spawn_task(id);
                    in_flight += 1;
                }
            }
        }
    });

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
