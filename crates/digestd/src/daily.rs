//! Daily wall-clock scheduling of the harvest jobs.

use std::future::Future;
use std::time::Duration;

use chrono::Timelike;
use digest_lib::sync::Shutdown;
use tokio::task::JoinHandle;

/// A job that fires once per day at a fixed local wall-clock hour.
///
/// One worker task per instance: it sleeps until the next firing, runs the
/// job, runs the callback, and loops, so a job running longer than a day
/// delays the next firing instead of stacking a second execution.
/// [`DailyJob::stop`] interrupts the pre-fire sleep cooperatively; a job
/// already executing runs to completion. A job error terminates the worker
/// without running the callback.
pub struct DailyJob {
    name: &'static str,
    shutdown: Shutdown,
    worker: JoinHandle<()>,
}

impl DailyJob {
    /// Spawns the worker for the job `name`, firing every day at `hour`
    /// (normalized into `0..24` by modulo).
    pub fn spawn<J, JFut>(hour: i32, name: &'static str, job: J) -> Self
    where
        J: Fn() -> JFut + Send + 'static,
        JFut: Future<Output = anyhow::Result<()>> + Send,
    {
        Self::spawn_with_callback(hour, name, job, noop_callback)
    }

    /// Like [`DailyJob::spawn`], additionally running `callback` after every
    /// normal job completion.
    pub fn spawn_with_callback<J, JFut, C, CFut>(
        hour: i32,
        name: &'static str,
        job: J,
        callback: C,
    ) -> Self
    where
        J: Fn() -> JFut + Send + 'static,
        JFut: Future<Output = anyhow::Result<()>> + Send,
        C: Fn() -> CFut + Send + 'static,
        CFut: Future<Output = ()> + Send,
    {
        let normalized = normalize_hour(hour);
        if i64::from(hour) != i64::from(normalized) {
            tracing::warn!("Job {name}: hour {hour} is out of bounds, normalized to {normalized}");
        }

        let (shutdown, mut listener) = Shutdown::new();
        tracing::info!("Running job {name} at every {normalized}th hour");

        let worker = tokio::spawn(async move {
            loop {
                let sleep_for = duration_until_hour(normalized, &chrono::Local::now());
                tracing::info!(
                    "Job {name}: sleeping for {:.1} hours before running",
                    sleep_for.as_secs_f64() / 3600.0
                );
                tokio::select! {
                    biased;
                    _ = listener.wait() => {
                        tracing::info!("Job {name}: stopping");
                        break;
                    }
                    _ = tokio::time::sleep(sleep_for) => {}
                }

                tracing::info!("Job {name}: beginning execution");
                if let Err(e) = job().await {
                    tracing::error!("Job {name} failed: {e:#}");
                    break;
                }
                tracing::info!("Job {name}: executing completion callback");
                callback().await;
            }
        });

        Self {
            name,
            shutdown,
            worker,
        }
    }

    /// Interrupts the pre-fire sleep and stops the worker.
    pub fn stop(&self) {
        self.shutdown.shutdown();
    }

    /// Waits for the worker to exit.
    pub async fn join(self) {
        tracing::debug!("Waiting for job {} to exit", self.name);
        let _ = self.worker.await;
    }
}

async fn noop_callback() {}

fn normalize_hour(hour: i32) -> u32 {
    hour.rem_euclid(24) as u32
}

/// How long to sleep until the next instant whose wall-clock hour is `hour`
/// and minute is zero, strictly in the future: asked for the current hour,
/// the job fires a day later.
fn duration_until_hour(hour: u32, now: &impl Timelike) -> Duration {
    let mut hours_until = (i64::from(hour) - i64::from(now.hour())).rem_euclid(24);
    if hours_until == 0 {
        hours_until = 24;
    }
    let minutes_until = hours_until * 60 - i64::from(now.minute());
    Duration::from_secs((minutes_until * 60) as u64)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;

    #[test]
    fn out_of_range_hours_normalize_by_modulo() {
        assert_eq!(normalize_hour(-1), 23);
        assert_eq!(normalize_hour(24), 0);
        assert_eq!(normalize_hour(-25), 23);
        assert_eq!(normalize_hour(5), 5);
    }

    #[test]
    fn next_firing_is_strictly_in_the_future() {
        let now = NaiveTime::from_hms_opt(14, 30, 0).unwrap();
        assert_eq!(
            duration_until_hour(15, &now),
            Duration::from_secs(30 * 60)
        );
        // Same hour fires a day later.
        assert_eq!(
            duration_until_hour(14, &now),
            Duration::from_secs((24 * 60 - 30) * 60)
        );
        // Earlier hour wraps to tomorrow.
        assert_eq!(
            duration_until_hour(13, &now),
            Duration::from_secs((23 * 60 - 30) * 60)
        );

        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        assert_eq!(
            duration_until_hour(0, &midnight),
            Duration::from_secs(24 * 60 * 60)
        );
    }
}
