// Background maintenance: VACUUM on a configurable schedule (cron expression or fixed interval).
// Purging happens inside the collection cycle; this only reclaims the space it frees.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::store::Store;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Optional cron expression for VACUUM (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    pub vacuum_schedule: Option<String>,
    /// Run VACUUM every N seconds when vacuum_schedule is not set.
    pub vacuum_interval_secs: u64,
}

/// When the next VACUUM is due.
#[derive(Debug, Clone)]
pub enum VacuumSchedule {
    Cron(Box<cron::Schedule>),
    Every(Duration),
}

impl VacuumSchedule {
    /// Cron takes precedence; an unparsable expression disables VACUUM (None).
    pub fn from_config(config: &MaintenanceConfig) -> Option<Self> {
        match &config.vacuum_schedule {
            Some(expr) => match cron::Schedule::from_str(expr) {
                Ok(schedule) => Some(VacuumSchedule::Cron(Box::new(schedule))),
                Err(e) => {
                    warn!(error = %e, cron = %expr, "invalid vacuum_schedule; VACUUM will not run");
                    None
                }
            },
            None => Some(VacuumSchedule::Every(Duration::from_secs(
                config.vacuum_interval_secs,
            ))),
        }
    }

    /// Delay until the next run. None when a cron schedule has no future occurrence.
    pub fn next_delay(&self) -> Option<Duration> {
        match self {
            VacuumSchedule::Cron(schedule) => until_next(schedule),
            VacuumSchedule::Every(interval) => Some(*interval),
        }
    }
}

pub fn spawn(store: Arc<Store>, config: MaintenanceConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(store, config))
}

#[instrument(skip(store), fields(vacuum_interval_secs = config.vacuum_interval_secs))]
async fn run(store: Arc<Store>, config: MaintenanceConfig) {
    let Some(schedule) = VacuumSchedule::from_config(&config) else {
        return;
    };
    while let Some(delay) = schedule.next_delay() {
        tokio::time::sleep(delay).await;
        match store.vacuum().await {
            Ok(()) => info!(operation = "vacuum", "vacuum complete"),
            Err(e) => warn!(error = %e, operation = "vacuum", "vacuum failed"),
        }
    }
    warn!(operation = "vacuum", "vacuum schedule has no future run; maintenance stopped");
}

/// Time until the next cron occurrence, in local time. None if the schedule has no future run.
pub fn until_next(schedule: &cron::Schedule) -> Option<Duration> {
    let now = chrono::Local::now();
    let next = schedule.after(&now).next()?;
    Some((next - now).to_std().unwrap_or(Duration::from_secs(1)))
}
