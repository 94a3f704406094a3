//! Background job scheduler and job implementations.

mod pool_metrics;
mod scheduler;
mod tombstone_prune;

pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{run_job, Job, JobFrequency, JobScheduler};
pub use tombstone_prune::TombstonePruneJob;
