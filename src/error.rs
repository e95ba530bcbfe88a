//! Error taxonomy for the scheduler core.
//!
//! Structural failures are returned to the caller. Invariant breaches are
//! logged as bugs (see `schedule.rs`) rather than threaded through `Result`,
//! since by definition the caller did nothing wrong to cause them.

use thiserror::Error;

/// Failures `Schedule` can report to a caller.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Could not admit a new per-identity lock for a task being scheduled
    /// for the first time.
    #[error("unable to schedule task: no schedule")]
    LockInit,
}
