//! Periodic background update checks.
//!
//! Update cycles are blocking, so each check runs on tokio's blocking pool while the
//! timer lives on the async side. The task ends on its own once there is nothing left
//! to do: after a successful update (the process should restart into the new binary),
//! when the running build is a development build, or when a swap failed so badly that
//! the executable could not be restored.

use crate::config::UpdaterConfig;
use crate::core::{Result, SelfswapError};
use crate::updater::{UpdateStatus, Updater};
use rand::Rng;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const HOUR: Duration = Duration::from_secs(60 * 60);

/// When to run checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Base delay between checks; zero runs a single check.
    pub check_interval: Duration,
    /// Upper bound of the random delay added to each interval.
    pub randomize: Duration,
}

impl Schedule {
    /// Check every `check_interval` with no jitter.
    pub fn every(check_interval: Duration) -> Self {
        Self {
            check_interval,
            randomize: Duration::ZERO,
        }
    }

    /// Add up to `randomize` of jitter to each interval.
    pub fn with_randomize(mut self, randomize: Duration) -> Self {
        self.randomize = randomize;
        self
    }

    /// Schedule from `check_interval_hours` and `randomize_hours`.
    pub fn from_config(config: &UpdaterConfig) -> Self {
        Self {
            check_interval: HOUR * u32::try_from(config.check_interval_hours).unwrap_or(u32::MAX),
            randomize: HOUR * u32::try_from(config.randomize_hours).unwrap_or(u32::MAX),
        }
    }

    /// Delay before the next check.
    pub fn next_delay(&self) -> Duration {
        next_delay(self.check_interval, self.randomize)
    }
}

/// `check_interval` plus a uniformly random jitter in `[0, randomize]`.
pub fn next_delay(check_interval: Duration, randomize: Duration) -> Duration {
    if randomize.is_zero() {
        return check_interval;
    }

    let jitter_ms = rand::thread_rng().gen_range(0..=randomize.as_millis());
    check_interval.saturating_add(Duration::from_millis(
        u64::try_from(jitter_ms).unwrap_or(u64::MAX),
    ))
}

/// Run [`Updater::run_in_background`] now and then on `schedule`.
///
/// Non-fatal failures are logged and retried at the next tick. The handle resolves once
/// an update was installed, updating is disabled, or (for a zero interval) the single
/// check finished. A [`SelfswapError::FatalSwap`] ends the task immediately with that
/// error: the executable may be gone and someone has to repair it by hand.
///
/// Must be called within a tokio runtime.
pub fn spawn_periodic(updater: Updater, schedule: Schedule) -> JoinHandle<Result<UpdateStatus>> {
    tokio::spawn(async move {
        let single_check = schedule.check_interval.is_zero();
        let mut updater = updater;

        loop {
            // The updater is dropped on the blocking pool once the task is done with
            // it; its HTTP client must not be dropped inside the async runtime.
            let (returned, result) = tokio::task::spawn_blocking(move || {
                let result = updater.run_in_background();
                let keep = !single_check
                    && match &result {
                        Ok(UpdateStatus::UpToDate { .. }) => true,
                        Ok(_) => false,
                        Err(e) => !e.is_fatal(),
                    };
                (keep.then_some(updater), result)
            })
            .await
            .map_err(|e| SelfswapError::Other {
                message: format!("background update task panicked: {e}"),
            })?;

            match &result {
                Ok(UpdateStatus::Updated { to, .. }) => {
                    info!("Update to {} installed, stopping background checks", to);
                }
                Ok(UpdateStatus::Disabled) => {
                    debug!("Updates disabled, stopping background checks");
                }
                Ok(UpdateStatus::UpToDate { .. }) => {}
                Err(e) if e.is_fatal() => {
                    error!("Background update left the executable in a broken state: {}", e);
                }
                Err(e) => warn!("Background update check failed: {}", e),
            }

            let Some(returned) = returned else {
                return result;
            };
            updater = returned;

            let delay = schedule.next_delay();
            debug!("Next update check in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    })
}
