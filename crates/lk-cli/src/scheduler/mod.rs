//! Periodic monitoring jobs for `lk serve`
//!
//! Split into submodules:
//! - `jobs` - the job trait and the health, gap, and dead-tuple jobs
//! - `runner` - the tick loop, per-run deadlines, and the job run log

mod jobs;
mod runner;

pub(crate) use jobs::{DeadTupleSweepJob, GapDetectionJob, HealthRefreshJob, Job};
pub(crate) use runner::Scheduler;
