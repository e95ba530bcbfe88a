//! Key and signing policy enforcer daemon: scheduler core plus a thin
//! engine shell.

pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod schedule;
pub mod task;
pub mod worker;

pub use clock::{Clock, Seconds, SystemClock, VirtualClock};
pub use command::{Command, CommandRegistry};
pub use config::EnforcerConfig;
pub use engine::Engine;
pub use error::ScheduleError;
pub use schedule::Schedule;
pub use task::{Context, Identity, ReleaseHook, Task};
pub use worker::WorkerPool;
