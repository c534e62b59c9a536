use crate::jobs::{run_guarded, Job};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Runs each registered job on its own fixed cadence
///
/// The first run happens one period after `start`. A job never overlaps
/// itself: a cycle that outlasts its period causes the missed ticks to be
/// skipped rather than queued.
#[derive(Default)]
pub struct Scheduler {
    entries: Vec<(Duration, Arc<dyn Job>)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn every(mut self, period: Duration, job: Arc<dyn Job>) -> Self {
        self.entries.push((period, job));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(_, job)| job.name()).collect()
    }

    pub fn start(self) -> SchedulerHandle {
        let tasks = self
            .entries
            .into_iter()
            .map(|(period, job)| {
                info!("Scheduling job {} every {:?}", job.name(), period);
                tokio::spawn(run_every(period, job))
            })
            .collect();

        SchedulerHandle { tasks }
    }
}

async fn run_every(period: Duration, job: Arc<dyn Job>) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        debug!("Running job {}", job.name());
        run_guarded(Arc::clone(&job)).await;
    }
}

/// Stops the scheduled jobs when shut down or dropped
pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn shutdown(mut self) {
        self.abort_all();
        info!("Scheduler stopped");
    }

    fn abort_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        runs: AtomicUsize,
        panic_on_first: bool,
    }

    impl Counting {
        fn new(panic_on_first: bool) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                panic_on_first,
            })
        }
    }

    #[async_trait]
    impl Job for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self) -> Result<()> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_first && run == 0 {
                panic!("first run fails");
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_run_after_one_period() {
        let job = Counting::new(false);
        let handle = Scheduler::new()
            .every(Duration::from_secs(10), job.clone())
            .start();

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_job_keeps_its_schedule() {
        let job = Counting::new(true);
        let handle = Scheduler::new()
            .every(Duration::from_secs(1), job.clone())
            .start();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_jobs() {
        let job = Counting::new(false);
        let handle = Scheduler::new()
            .every(Duration::from_secs(1), job.clone())
            .start();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.shutdown();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_job_names() {
        let scheduler = Scheduler::new()
            .every(Duration::from_secs(1), Counting::new(false))
            .every(Duration::from_secs(2), Counting::new(false));

        assert_eq!(scheduler.len(), 2);
        assert_eq!(scheduler.job_names(), vec!["counting", "counting"]);
    }
}
