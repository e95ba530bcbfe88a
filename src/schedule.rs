//! The scheduler core: a time-ordered queue with a synchronized identity
//! index and per-identity execution locks.
//!
//! All mutation goes through `Inner`, guarded by a single `parking_lot`
//! mutex, with a paired condition variable used to park and wake workers.
//! No external callback (a task's release hook) is ever invoked while that
//! mutex is held — see the concurrency rules this module implements.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::clock::{Clock, Seconds};
use crate::error::ScheduleError;
use crate::task::{Context, Identity, ReleaseHook, Task};

/// State guarded by `Schedule`'s mutex. `pub(crate)` so `Clock`
/// implementations can name the guard type they park on, without exposing
/// any of its fields outside this module.
pub(crate) struct Inner {
    ready_by_time: BTreeSet<(Seconds, Identity)>,
    ready_by_identity: HashMap<Identity, Task>,
    locks_by_identity: HashMap<Identity, Arc<Mutex<()>>>,
    num_waiting: usize,
}

impl Inner {
    fn new() -> Self {
        Self {
            ready_by_time: BTreeSet::new(),
            ready_by_identity: HashMap::new(),
            locks_by_identity: HashMap::new(),
            num_waiting: 0,
        }
    }
}

/// The synchronized task queue shared by the engine and every worker
/// thread.
pub struct Schedule {
    clock: Arc<dyn Clock>,
    lock: Mutex<Inner>,
    cond: Condvar,
}

impl Schedule {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            lock: Mutex::new(Inner::new()),
            cond: Condvar::new(),
        }
    }

    /// Coalescing insertion. See the module-level docs and `SPEC_FULL.md`
    /// §4.1 for the exact merge semantics.
    pub fn schedule(&self, mut task: Task) -> Result<(), ScheduleError> {
        let identity = task.identity.clone();
        let mut deferred: Option<(Context, ReleaseHook)> = None;

        let mut inner = self.lock.lock();
        if let Some(existing) = inner.ready_by_identity.get_mut(&identity) {
            let old_key = (existing.due_date, identity.clone());
            let new_due = existing.due_date.min(task.due_date);
            let due_changed = new_due != existing.due_date;

            let (old_ctx, old_hook) =
                existing.replace_payload(task.context.take(), task.release_context.take());
            existing.due_date = new_due;

            if due_changed {
                inner.ready_by_time.remove(&old_key);
                inner.ready_by_time.insert((new_due, identity.clone()));
            }
            if let (Some(ctx), Some(hook)) = (old_ctx, old_hook) {
                deferred = Some((ctx, hook));
            }
        } else {
            let lock_handle = inner
                .locks_by_identity
                .entry(identity.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            task.lock = Some(lock_handle);
            inner.ready_by_time.insert((task.due_date, identity.clone()));
            inner.ready_by_identity.insert(identity, task);
        }

        self.log_rearm(&inner);
        drop(inner);
        self.cond.notify_all();

        if let Some((ctx, hook)) = deferred {
            hook(ctx);
        }
        Ok(())
    }

    /// Blocking pop: parks the caller at most once if nothing is
    /// immediately due. Returns `None` on a spurious or deliberate wake —
    /// the worker loop re-invokes `pop` to try again.
    pub fn pop(&self) -> Option<Task> {
        let mut inner = self.lock.lock();
        if let Some(task) = self.take_head_if_due(&mut inner) {
            return Some(task);
        }

        let deadline = inner.ready_by_time.iter().next().map(|(due, _)| *due);

        inner.num_waiting += 1;
        match deadline {
            Some(deadline) => {
                self.clock.wait_until(&self.cond, &mut inner, deadline);
            }
            None => {
                self.cond.wait(&mut inner);
            }
        }
        inner.num_waiting -= 1;

        self.take_head_if_due(&mut inner)
    }

    /// Non-blocking variant used during shutdown drain and single-run
    /// mode. Unlike `pop`, removes and returns the head unconditionally —
    /// even if its due date has not arrived yet — mirroring the original
    /// `schedule_pop_first_task`, which never checks `due_date` at all.
    pub fn pop_immediate(&self) -> Option<Task> {
        let mut inner = self.lock.lock();
        self.take_head_unconditional(&mut inner)
    }

    /// Current time as seen by this schedule's clock.
    pub fn now(&self) -> Seconds {
        self.clock.now()
    }

    /// Clone of the per-identity lock handle for `identity`, if one has
    /// ever been admitted, regardless of whether a task for that identity
    /// is currently queued. Exposed for callers (and tests) that need to
    /// observe lock retention across `purge_owner`/`flush_*`.
    pub fn identity_lock(&self, identity: &Identity) -> Option<Arc<Mutex<()>>> {
        self.lock.lock().locks_by_identity.get(identity).cloned()
    }

    pub fn peek_first_time(&self) -> Option<Seconds> {
        let inner = self.lock.lock();
        inner.ready_by_time.iter().next().map(|(due, _)| *due)
    }

    pub fn taskcount(&self) -> usize {
        self.lock.lock().ready_by_time.len()
    }

    pub fn num_waiting(&self) -> usize {
        self.lock.lock().num_waiting
    }

    /// Force every queued task runnable now.
    pub fn flush_all(&self) {
        tracing::debug!("flush all tasks");
        let mut inner = self.lock.lock();
        let old_keys = std::mem::take(&mut inner.ready_by_time);
        let mut new_keys = BTreeSet::new();
        for (_, identity) in old_keys {
            if let Some(task) = inner.ready_by_identity.get_mut(&identity) {
                task.due_date = 0;
            }
            new_keys.insert((0, identity));
        }
        inner.ready_by_time = new_keys;
        drop(inner);
        self.cond.notify_all();
    }

    /// Force every queued task matching `class`/`task_type` runnable now.
    /// Matching is byte equality, not identity/pointer equality. Returns
    /// the number of tasks flushed.
    pub fn flush_type(&self, class: &str, task_type: &str) -> usize {
        tracing::debug!(class, task_type, "flush task");
        let mut inner = self.lock.lock();
        let matching: Vec<Identity> = inner
            .ready_by_identity
            .iter()
            .filter(|(id, _)| id.class == class && id.task_type == task_type)
            .map(|(id, _)| id.clone())
            .collect();

        for identity in &matching {
            if let Some(task) = inner.ready_by_identity.get_mut(identity) {
                let old_key = (task.due_date, identity.clone());
                inner.ready_by_time.remove(&old_key);
                task.due_date = 0;
                inner.ready_by_time.insert((0, identity.clone()));
            }
        }
        let count = matching.len();
        drop(inner);
        self.cond.notify_all();
        count
    }

    /// Terminal cleanup. Drops every queued task (releasing contexts) and
    /// every per-identity lock. Must not be called while workers are still
    /// running.
    pub fn purge(&self) {
        tracing::debug!("cleanup schedule");
        let mut inner = self.lock.lock();
        inner.ready_by_time.clear();
        let tasks: Vec<Task> = inner.ready_by_identity.drain().map(|(_, t)| t).collect();
        inner.locks_by_identity.clear();
        drop(inner);
        drop(tasks);
    }

    /// Remove every queued task with the given `class`/`owner`. Lock
    /// entries for those identities are retained. Returns the number
    /// removed.
    pub fn purge_owner(&self, class: &str, owner: &str) -> usize {
        let mut inner = self.lock.lock();
        let matching: Vec<Identity> = inner
            .ready_by_identity
            .iter()
            .filter(|(id, _)| id.class == class && id.owner == owner)
            .map(|(id, _)| id.clone())
            .collect();

        let mut removed = Vec::with_capacity(matching.len());
        for identity in &matching {
            if let Some(task) = inner.ready_by_identity.remove(identity) {
                inner.ready_by_time.remove(&(task.due_date, identity.clone()));
                removed.push(task);
            }
        }
        let count = removed.len();
        drop(inner);
        drop(removed);
        count
    }

    /// Wake every parked worker without changing any state. Used at
    /// shutdown so workers observe an external stop flag.
    pub fn release_all(&self) {
        let _inner = self.lock.lock();
        self.cond.notify_all();
    }

    /// Remove and return the head only if its due date has arrived. Used
    /// by `pop`, both before parking and after waking.
    fn take_head_if_due(&self, inner: &mut Inner) -> Option<Task> {
        let now = self.clock.now();
        match inner.ready_by_time.iter().next() {
            Some((due, _)) if *due <= now => self.take_head_unconditional(inner),
            _ => None,
        }
    }

    /// Remove and return the head regardless of due date. Used by
    /// `pop_immediate`, which the spec defines as unconditional.
    fn take_head_unconditional(&self, inner: &mut Inner) -> Option<Task> {
        loop {
            let head = inner.ready_by_time.iter().next().cloned();
            let (due, identity) = head?;
            inner.ready_by_time.remove(&(due, identity.clone()));
            match inner.ready_by_identity.remove(&identity) {
                Some(task) => return Some(task),
                None => {
                    tracing::error!(
                        identity = ?identity,
                        critical = true,
                        "Could not reschedule task after flush. A task has been lost!"
                    );
                    debug_assert!(
                        false,
                        "ready_by_time entry with no matching ready_by_identity entry"
                    );
                    continue;
                }
            }
        }
    }

    fn log_rearm(&self, inner: &Inner) {
        match inner.ready_by_time.iter().next() {
            None => tracing::debug!("no alarm set"),
            Some((due, _)) => {
                if *due <= self.clock.now() {
                    tracing::debug!("signal now");
                } else {
                    tracing::debug!(due_date = due, "wakeup scheduled");
                }
            }
        }
    }
}
