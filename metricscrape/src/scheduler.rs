use std::sync::Arc;

use tokio::{
    sync::Semaphore,
    task::JoinSet,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{fetcher::TargetFetcher, job::ScrapeJob};

/// Drives one polling loop per job.
///
/// Every tick spawns one task per target and moves on without waiting for
/// them, so a slow target can be scraped by overlapping tasks; whichever
/// finishes last wins in the registry. Fan-out is unbounded unless
/// [`with_concurrency_limit`](Self::with_concurrency_limit) is used.
#[derive(Debug)]
pub struct ScrapeScheduler {
    fetcher: Arc<TargetFetcher>,
    jobs: Vec<Arc<ScrapeJob>>,
    limit: Option<Arc<Semaphore>>,
}

impl ScrapeScheduler {
    pub fn new(fetcher: Arc<TargetFetcher>, jobs: Vec<ScrapeJob>) -> Self {
        Self {
            fetcher,
            jobs: jobs.into_iter().map(Arc::new).collect(),
            limit: None,
        }
    }

    /// Caps the number of fetches in flight across all jobs. A target that
    /// finds the limit reached is skipped for that tick, so no work piles up
    /// while targets are slow.
    pub fn with_concurrency_limit(mut self, max_in_flight: usize) -> Self {
        self.limit = Some(Arc::new(Semaphore::new(max_in_flight.max(1))));
        self
    }

    /// Spawns the job loops. They run until `token` is cancelled; fetches
    /// already started are left to finish or time out on their own.
    pub fn start(&self, token: CancellationToken) -> JoinSet<()> {
        let mut loops = JoinSet::new();
        for job in &self.jobs {
            loops.spawn(run_job(
                Arc::clone(&self.fetcher),
                Arc::clone(job),
                self.limit.clone(),
                token.clone(),
            ));
        }
        loops
    }
}

async fn run_job(
    fetcher: Arc<TargetFetcher>,
    job: Arc<ScrapeJob>,
    limit: Option<Arc<Semaphore>>,
    token: CancellationToken,
) {
    tracing::info!(
        job = %job.name,
        targets = job.targets.len(),
        interval = ?job.interval,
        "starting scrape loop"
    );

    // The first tick completes immediately.
    let mut ticker = time::interval(job.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!(job = %job.name, "scrape loop stopped");
                break;
            }
            _ = ticker.tick() => scrape_job(&fetcher, &job, limit.as_ref()),
        }
    }
}

fn scrape_job(fetcher: &Arc<TargetFetcher>, job: &Arc<ScrapeJob>, limit: Option<&Arc<Semaphore>>) {
    for (index, target) in job.targets.iter().enumerate() {
        // Take the permit before spawning so that nothing queues behind a
        // full limit; a busy target is picked up again on a later tick.
        let permit = match limit.map(|semaphore| Arc::clone(semaphore).try_acquire_owned()) {
            None => None,
            Some(Ok(permit)) => Some(permit),
            Some(Err(_)) => {
                tracing::debug!(
                    job = %job.name,
                    target = %target.address,
                    "scrape limit reached, skipping target this tick"
                );
                continue;
            }
        };
        let fetcher = Arc::clone(fetcher);
        let job = Arc::clone(job);
        tokio::spawn(async move {
            let _permit = permit;
            fetcher
                .scrape(&job.name, &job.targets[index], job.timeout)
                .await;
        });
    }
}
