//! The engine-level dispatch table from a task's `type` to the code a
//! worker runs after popping it.
//!
//! This stands in for the original daemon's per-command handler tables
//! (`handled_xxxx_cmd_type`); it is intentionally small since command
//! bodies themselves are outside this core's scope.

use std::collections::HashMap;
use std::sync::Arc;

use crate::task::{Context, Task};

/// Work invoked by a worker thread once it has popped a task and acquired
/// its identity lock.
pub trait Command: Send + Sync {
    /// Run the command body. `context` is the task's payload, if any.
    /// Fire-and-forget: the scheduler does not look at the return value to
    /// decide anything about the task's future. A command that wants to
    /// run again later must call `Schedule::schedule` itself (typically
    /// with its own identity and an advanced `due_date`) before returning.
    fn run(&self, task: &Task, context: Option<&Context>) -> anyhow::Result<()>;
}

/// Maps a task's `type` string to the `Command` that handles it.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task_type: impl Into<String>, command: Arc<dyn Command>) {
        self.commands.insert(task_type.into(), command);
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(task_type).cloned()
    }
}
