//! Ties the scheduler, the worker pool, and a couple of illustrative
//! commands together into something runnable. Deliberately thin: the
//! actual key/signing policy logic is out of scope here.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::command::{Command, CommandRegistry};
use crate::config::EnforcerConfig;
use crate::schedule::Schedule;
use crate::task::{Context, Identity, Task};
use crate::worker::WorkerPool;

/// A no-op command used to give the illustrative engine something to
/// dispatch to; real deployments register their own `Command`
/// implementations in place of this.
pub struct NoopCommand;

impl Command for NoopCommand {
    fn run(&self, task: &Task, _context: Option<&Context>) -> anyhow::Result<()> {
        tracing::debug!(identity = ?task.identity(), "noop command ran");
        Ok(())
    }
}

/// The identity the illustrative recurring heartbeat is admitted under.
pub fn heartbeat_identity() -> Identity {
    Identity::new("engine", "heartbeat", "daemon")
}

/// Illustrative recurring command: re-admits itself `poll_interval_secs`
/// after every run, for as long as the engine keeps running. Stands in for
/// the kind of periodic housekeeping (zone re-checks, key rollovers) a
/// real enforcer command would drive off the same mechanism.
pub struct HeartbeatCommand {
    schedule: Arc<Schedule>,
    interval: crate::clock::Seconds,
}

impl Command for HeartbeatCommand {
    fn run(&self, task: &Task, _context: Option<&Context>) -> anyhow::Result<()> {
        tracing::debug!(identity = ?task.identity(), "heartbeat");
        let next_due = self.schedule.now() + self.interval;
        self.schedule
            .schedule(Task::new(task.identity().clone(), next_due))?;
        Ok(())
    }
}

/// Owns the scheduler and (optionally) a running worker pool.
pub struct Engine {
    schedule: Arc<Schedule>,
    registry: Arc<CommandRegistry>,
    config: EnforcerConfig,
}

impl Engine {
    pub fn new(config: EnforcerConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let schedule = Arc::new(Schedule::new(clock));

        let mut registry = CommandRegistry::new();
        registry.register("noop", Arc::new(NoopCommand));
        registry.register(
            heartbeat_identity().task_type.clone(),
            Arc::new(HeartbeatCommand {
                schedule: schedule.clone(),
                interval: config.poll_interval_secs,
            }),
        );

        let due = schedule.now();
        schedule
            .schedule(Task::new(heartbeat_identity(), due))
            .expect("seeding the heartbeat task cannot fail at startup");

        Self {
            schedule,
            registry: Arc::new(registry),
            config,
        }
    }

    pub fn schedule(&self) -> Arc<Schedule> {
        self.schedule.clone()
    }

    /// Run every task that is due as of right now, executing each one
    /// inline on the calling thread, then stop. Mirrors the original
    /// single-run mode; no worker threads are started.
    ///
    /// `pop_immediate` is unconditional (it has no notion of "due"), so
    /// this checks `peek_first_time` against a time snapshot taken once
    /// at the start: a command that re-schedules itself into the future
    /// (like the heartbeat) must not be picked back up in the same run.
    pub fn run_single(&self) {
        let now = self.schedule.now();
        while matches!(self.schedule.peek_first_time(), Some(due) if due <= now) {
            let Some(task) = self.schedule.pop_immediate() else {
                break;
            };
            let identity = task.identity().clone();
            let lock = task.lock().cloned();
            let _guard = lock.as_ref().map(|l| l.lock());
            match self.registry.get(&identity.task_type) {
                Some(command) => {
                    if let Err(err) = command.run(&task, task.context()) {
                        tracing::error!(identity = ?identity, error = %err, "command failed");
                    }
                }
                None => {
                    tracing::error!(identity = ?identity, "no command registered for task type");
                }
            }
        }
    }

    /// Start the worker pool, install a Ctrl-C handler, and block until
    /// shutdown. Drains any remaining tasks with `purge` afterward.
    pub fn run_daemon(&self) -> anyhow::Result<()> {
        let count = self.config.resolved_worker_threads();
        tracing::info!(worker_threads = count, "starting worker pool");
        let pool = WorkerPool::spawn(self.schedule.clone(), self.registry.clone(), count);

        let stop = pool.stop_flag();
        let schedule_for_signal = self.schedule.clone();
        ctrlc::set_handler(move || {
            tracing::info!("received shutdown signal");
            stop.store(true, Ordering::SeqCst);
            schedule_for_signal.release_all();
        })?;

        // Block until the stop flag flips; the Ctrl-C handler above is the
        // only thing that sets it in this shell.
        while !pool.stop_flag().load(Ordering::SeqCst) {
            std::thread::sleep(std::time::Duration::from_millis(200));
        }

        pool.shutdown(&self.schedule);
        self.schedule.purge();
        Ok(())
    }

    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }
}
