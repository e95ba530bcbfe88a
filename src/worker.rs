//! Worker thread pool: the thread-side half of the scheduling contract.
//!
//! Each worker repeats: check the stop flag, pop a task, acquire its
//! identity lock, dispatch to the registered command, drop the lock. The
//! identity lock is never held while a task is queued, only during
//! execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::command::CommandRegistry;
use crate::schedule::Schedule;

/// A running pool of worker threads bound to one `Schedule`.
pub struct WorkerPool {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` OS threads pulling from `schedule` and dispatching
    /// through `registry`.
    pub fn spawn(schedule: Arc<Schedule>, registry: Arc<CommandRegistry>, count: usize) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(count);

        for worker_id in 0..count {
            let schedule = schedule.clone();
            let registry = registry.clone();
            let stop = stop.clone();
            let handle = std::thread::Builder::new()
                .name(format!("enforcerd-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, schedule, registry, stop))
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }

        Self { stop, handles }
    }

    /// Signal every worker to stop after its current task, wake any
    /// parked workers, and block until all threads have exited.
    pub fn shutdown(self, schedule: &Schedule) {
        self.stop.store(true, Ordering::SeqCst);
        schedule.release_all();
        for handle in self.handles {
            let _ = handle.join();
        }
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }
}

fn worker_loop(
    worker_id: usize,
    schedule: Arc<Schedule>,
    registry: Arc<CommandRegistry>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::SeqCst) {
        let Some(task) = schedule.pop() else {
            continue;
        };

        let identity = task.identity().clone();
        let lock = task.lock().cloned();
        let _guard = lock.as_ref().map(|l| l.lock());

        match registry.get(&identity.task_type) {
            Some(command) => {
                if let Err(err) = command.run(&task, task.context()) {
                    tracing::error!(worker_id, identity = ?identity, error = %err, "command failed");
                }
            }
            None => {
                tracing::error!(worker_id, identity = ?identity, "no command registered for task type");
            }
        }
    }
}
