//! Task identity and the task record itself.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::Seconds;

/// Opaque payload carried by a task. The scheduler never inspects it, only
/// moves it around and releases it via [`ReleaseHook`].
pub type Context = Box<dyn Any + Send>;

/// Callback invoked exactly once when a context is replaced or a task is
/// dropped by the scheduler. Never called with the schedule lock held.
pub type ReleaseHook = Box<dyn FnOnce(Context) + Send>;

/// Stable identity of a task: `(class, type, owner)`.
///
/// Two tasks with equal identity are the same task as far as the scheduler
/// is concerned; scheduling one coalesces into the other (see
/// [`crate::schedule::Schedule::schedule`]).
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Identity {
    pub class: String,
    pub task_type: String,
    pub owner: String,
}

impl Identity {
    pub fn new(
        class: impl Into<String>,
        task_type: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            class: class.into(),
            task_type: task_type.into(),
            owner: owner.into(),
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.class, self.task_type, self.owner)
    }
}

/// A schedulable unit of work.
///
/// The `lock` handle is assigned by the scheduler on first admission of an
/// identity and is carried by every subsequent instance sharing that
/// identity. It is not held while the task is queued, only while a worker
/// executes it.
pub struct Task {
    pub(crate) identity: Identity,
    pub(crate) due_date: Seconds,
    pub(crate) context: Option<Context>,
    pub(crate) release_context: Option<ReleaseHook>,
    pub(crate) lock: Option<Arc<Mutex<()>>>,
}

impl Task {
    /// Build a new task. `lock` is left unset; the scheduler assigns one on
    /// admission.
    pub fn new(identity: Identity, due_date: Seconds) -> Self {
        Self {
            identity,
            due_date,
            context: None,
            release_context: None,
            lock: None,
        }
    }

    pub fn with_context(mut self, context: Context, release: ReleaseHook) -> Self {
        self.context = Some(context);
        self.release_context = Some(release);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn due_date(&self) -> Seconds {
        self.due_date
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    /// Take ownership of the context, leaving the task's own slot empty so
    /// `Drop` does not release it a second time.
    pub fn take_context(&mut self) -> Option<Context> {
        self.release_context.take();
        self.context.take()
    }

    /// The per-identity lock this task was admitted under. `None` only for
    /// a freshly constructed task that has never passed through
    /// `Schedule::schedule`.
    pub fn lock(&self) -> Option<&Arc<Mutex<()>>> {
        self.lock.as_ref()
    }

    pub(crate) fn release_in_place(&mut self) {
        if let (Some(ctx), Some(hook)) = (self.context.take(), self.release_context.take()) {
            hook(ctx);
        }
    }

    /// Swap in a new context/hook pair, returning the old pair without
    /// invoking it. The caller is responsible for running the returned
    /// hook (outside of any lock the scheduler holds).
    pub(crate) fn replace_payload(
        &mut self,
        context: Option<Context>,
        hook: Option<ReleaseHook>,
    ) -> (Option<Context>, Option<ReleaseHook>) {
        let old = (self.context.take(), self.release_context.take());
        self.context = context;
        self.release_context = hook;
        old
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.release_in_place();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("identity", &self.identity)
            .field("due_date", &self.due_date)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}
