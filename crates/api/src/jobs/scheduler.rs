//! Interval scheduler for background maintenance jobs.

use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// How often a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFrequency {
    Seconds(u64),
    Minutes(u64),
    Hourly,
    Daily,
}

impl JobFrequency {
    pub fn duration(&self) -> Duration {
        match self {
            JobFrequency::Seconds(secs) => Duration::from_secs(*secs),
            JobFrequency::Minutes(mins) => Duration::from_secs(*mins * 60),
            JobFrequency::Hourly => Duration::from_secs(3600),
            JobFrequency::Daily => Duration::from_secs(86400),
        }
    }
}

/// A periodic background task.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &'static str;

    fn frequency(&self) -> JobFrequency;

    /// Whether a run should be logged at info. Chatty jobs log at debug.
    fn verbose(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<(), String>;
}

/// Runs a job once, recording duration and outcome. Returns whether it succeeded.
pub async fn run_job(job: &dyn Job) -> bool {
    let name = job.name();
    let start = Instant::now();
    let result = job.execute().await;
    let elapsed = start.elapsed();

    histogram!("chama_job_duration_seconds", "job" => name).record(elapsed.as_secs_f64());
    match result {
        Ok(()) => {
            counter!("chama_job_runs_total", "job" => name, "status" => "ok").increment(1);
            if job.verbose() {
                info!(job = name, elapsed_ms = elapsed.as_millis(), "Job completed");
            } else {
                debug!(job = name, elapsed_ms = elapsed.as_millis(), "Job completed");
            }
            true
        }
        Err(e) => {
            counter!("chama_job_runs_total", "job" => name, "status" => "error").increment(1);
            error!(job = name, elapsed_ms = elapsed.as_millis(), error = %e, "Job failed");
            false
        }
    }
}

/// Owns the spawned job loops and their shutdown signal.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    /// Spawns one loop per job. The first run happens one period after start.
    pub fn start(&mut self) {
        info!(jobs = self.jobs.len(), "Starting job scheduler");

        for job in &self.jobs {
            let job = Arc::clone(job);
            let mut shutdown_rx = self.shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                let name = job.name();
                let frequency = job.frequency();
                let mut interval = tokio::time::interval(frequency.duration());
                // A slow run must not trigger a burst of catch-up runs.
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                interval.tick().await;

                info!(job = name, frequency = ?frequency, "Job scheduled");

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            run_job(job.as_ref()).await;
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                debug!(job = name, "Job loop stopping");
                                break;
                            }
                        }
                    }
                }
            });

            self.handles.push(handle);
        }
    }

    /// Signals every loop to stop. Returns immediately.
    pub fn shutdown(&self) {
        info!("Stopping job scheduler");
        let _ = self.shutdown_tx.send(true);
    }

    /// Waits for the loops to exit, giving up after `timeout`.
    pub async fn wait_for_shutdown(self, timeout: Duration) {
        let handles = self.handles;
        let drain = async move {
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Job task panicked");
                }
            }
        };

        match tokio::time::timeout(timeout, drain).await {
            Ok(()) => info!("Job scheduler stopped"),
            Err(_) => warn!(timeout = ?timeout, "Job scheduler shutdown timed out"),
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}
