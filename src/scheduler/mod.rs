//! Cadence table and the background jobs that drive each refresh task.
//!
//! Time-of-day cadences are cron jobs registered with `tokio-cron-scheduler`
//! and evaluated in the display zone; fixed-rate cadences are plain tokio
//! interval loops. A firing spawns the refresh on a fresh unit of work, so a
//! slow run never delays another category. A firing that finds the previous
//! run of the same task still in flight is skipped.

use crate::error::{AggregatorError, Result};
use crate::refresh::{Aggregator, Task};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

/// Coins + global during the active window: `:00`, `:23`, `:46` from 08:00 to 21:59.
pub const MARKETS_ACTIVE_CRON: &str = "0 */23 8-21 * * *";

/// Coins + global outside the active window: `:00` and `:30`.
pub const MARKETS_IDLE_CRON: &str = "0 */30 22-23,0-7 * * *";

/// Metadata: the 1st of every month at 03:00.
pub const METADATA_CRON: &str = "0 0 3 1 * *";

#[derive(Debug, Clone, PartialEq)]
pub enum Cadence {
    /// Six-field cron expressions (seconds first) evaluated in `zone`. The task
    /// fires whenever any of them matches.
    Cron { expressions: Vec<&'static str>, zone: Tz },
    /// Fixed rate.
    Every(Duration),
}

/// One row of the cadence table.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub task: Task,
    pub cadence: Cadence,
    /// Fire once immediately before following the cadence.
    pub run_at_start: bool,
}

/// The production cadence table, with cron expressions evaluated in `zone`.
pub fn cadence_table(zone: Tz, warm_start: bool) -> Vec<Schedule> {
    vec![
        Schedule {
            task: Task::Markets,
            cadence: Cadence::Cron {
                expressions: vec![MARKETS_ACTIVE_CRON, MARKETS_IDLE_CRON],
                zone,
            },
            run_at_start: warm_start,
        },
        Schedule {
            task: Task::Trending,
            cadence: Cadence::Every(Duration::from_secs(6 * 60 * 60)),
            run_at_start: true,
        },
        Schedule {
            task: Task::Metadata,
            cadence: Cadence::Cron {
                expressions: vec![METADATA_CRON],
                zone,
            },
            run_at_start: false,
        },
        Schedule {
            task: Task::News,
            cadence: Cadence::Every(Duration::from_secs(60 * 60)),
            run_at_start: true,
        },
    ]
}

/// Owns the cron scheduler and the interval loops.
pub struct Scheduler {
    aggregator: Arc<Aggregator>,
    cron: JobScheduler,
    cron_jobs: usize,
    loops: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Creates an idle scheduler; nothing fires until `start`.
    ///
    /// # Errors
    /// Returns `AggregatorError::Scheduler` if the cron scheduler cannot be created.
    pub async fn new(aggregator: Arc<Aggregator>) -> Result<Self> {
        let cron = JobScheduler::new()
            .await
            .map_err(|e| AggregatorError::Scheduler(format!("failed to create cron scheduler: {}", e)))?;

        Ok(Self {
            aggregator,
            cron,
            cron_jobs: 0,
            loops: Vec::new(),
        })
    }

    /// Registers one row of the cadence table.
    ///
    /// All cron expressions of a row share one in-flight guard, so the two
    /// markets expressions never run coins and global twice at once.
    ///
    /// # Errors
    /// Returns `AggregatorError::Scheduler` for an invalid cron expression or a
    /// failed registration.
    pub async fn spawn(&mut self, schedule: Schedule) -> Result<()> {
        info!("Scheduling {} ({:?})", schedule.task, schedule.cadence);
        let running = Arc::new(AtomicBool::new(false));
        let task = schedule.task;

        match schedule.cadence {
            Cadence::Every(period) => {
                let aggregator = Arc::clone(&self.aggregator);
                self.loops
                    .push(tokio::spawn(drive_every(aggregator, task, period, schedule.run_at_start, running)));
            }
            Cadence::Cron { expressions, zone } => {
                for expression in expressions {
                    let job = cron_job(expression, zone, Arc::clone(&self.aggregator), task, Arc::clone(&running))?;
                    self.cron.add(job).await.map_err(|e| {
                        AggregatorError::Scheduler(format!("failed to register `{}`: {}", expression, e))
                    })?;
                    self.cron_jobs += 1;
                }

                if schedule.run_at_start {
                    fire(&self.aggregator, task, &running);
                }
            }
        }

        Ok(())
    }

    pub async fn spawn_all(&mut self, table: Vec<Schedule>) -> Result<()> {
        for schedule in table {
            self.spawn(schedule).await?;
        }
        Ok(())
    }

    /// Number of cron jobs registered so far.
    pub fn cron_job_count(&self) -> usize {
        self.cron_jobs
    }

    /// Starts firing the registered cron jobs.
    ///
    /// # Errors
    /// Returns `AggregatorError::Scheduler` if the cron scheduler fails to start.
    pub async fn start(&mut self) -> Result<()> {
        self.cron
            .start()
            .await
            .map_err(|e| AggregatorError::Scheduler(format!("failed to start cron scheduler: {}", e)))
    }

    /// Stops every schedule. Runs already in flight are left to finish or die
    /// with the runtime.
    pub async fn shutdown(mut self) {
        for handle in self.loops.drain(..) {
            handle.abort();
        }
        if let Err(e) = self.cron.shutdown().await {
            warn!("Cron scheduler did not shut down cleanly: {}", e);
        }
    }
}

fn cron_job(
    expression: &str,
    zone: Tz,
    aggregator: Arc<Aggregator>,
    task: Task,
    running: Arc<AtomicBool>,
) -> Result<Job> {
    Job::new_async_tz(expression, zone, move |_id, _scheduler| {
        fire(&aggregator, task, &running);
        Box::pin(async {})
    })
    .map_err(|e| AggregatorError::Scheduler(format!("invalid cron expression `{}`: {}", expression, e)))
}

async fn drive_every(
    aggregator: Arc<Aggregator>,
    task: Task,
    period: Duration,
    run_at_start: bool,
    running: Arc<AtomicBool>,
) {
    let first = if run_at_start {
        Instant::now()
    } else {
        Instant::now() + period
    };
    let mut ticker = tokio::time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        fire(&aggregator, task, &running);
    }
}

/// Clears the in-flight flag when a run ends, including by panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Starts one run of `task` unless the previous one is still going.
fn fire(aggregator: &Arc<Aggregator>, task: Task, running: &Arc<AtomicBool>) -> Option<JoinHandle<()>> {
    if running.swap(true, Ordering::AcqRel) {
        warn!("Skipping {} run, previous run still in flight", task);
        return None;
    }

    let guard = RunningGuard(Arc::clone(running));
    let aggregator = Arc::clone(aggregator);

    Some(tokio::spawn(async move {
        let _guard = guard;
        aggregator.execute(task).await;
    }))
}
