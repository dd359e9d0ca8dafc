use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use super::cache::ResponseCache;
use crate::db::{MaintenanceReport, StoreError, VideoStore};

/// Store retention, index compaction and cache sweeping in one pass.
#[derive(Clone)]
pub struct Maintenance {
    store: Arc<dyn VideoStore>,
    cache: ResponseCache,
}

impl Maintenance {
    #[must_use]
    pub fn new(store: Arc<dyn VideoStore>, cache: ResponseCache) -> Self {
        Self { store, cache }
    }

    pub async fn run_now(&self) -> Result<MaintenanceReport, StoreError> {
        let start = std::time::Instant::now();
        info!(event = "job_started", job_name = "maintenance", "Starting maintenance");

        let mut report = self.store.run_maintenance().await?;
        report.swept_cache_entries = self.cache.sweep().await;

        info!(
            event = "job_finished",
            job_name = "maintenance",
            pruned_videos = report.pruned_videos,
            pruned_searches = report.pruned_searches,
            swept_cache_entries = report.swept_cache_entries,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Maintenance finished"
        );
        Ok(report)
    }
}

pub struct MaintenanceScheduler {
    maintenance: Maintenance,
    interval_hours: u32,
    inner: RwLock<Option<JobScheduler>>,
}

impl MaintenanceScheduler {
    #[must_use]
    pub fn new(maintenance: Maintenance, interval_hours: u32) -> Self {
        Self {
            maintenance,
            interval_hours,
            inner: RwLock::new(None),
        }
    }

    /// Registers the maintenance job. An interval of zero leaves it disabled.
    pub async fn start(&self) -> Result<()> {
        if self.interval_hours == 0 {
            info!("Scheduled maintenance is disabled in config");
            return Ok(());
        }

        let cron = maintenance_cron(self.interval_hours);
        let sched = JobScheduler::new().await?;

        let maintenance = self.maintenance.clone();
        let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let maintenance = maintenance.clone();
            Box::pin(async move {
                if let Err(e) = maintenance.run_now().await {
                    error!(event = "job_failed", job_name = "maintenance", error = %e, "Scheduled maintenance failed");
                }
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;
        info!("Maintenance scheduled: {}", cron);

        *self.inner.write().await = Some(sched);
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        if let Some(mut sched) = self.inner.write().await.take() {
            info!("Stopping scheduler...");
            sched.shutdown().await?;
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.inner.read().await.is_some()
    }
}

fn maintenance_cron(hours: u32) -> String {
    if hours >= 24 {
        "0 0 0 * * *".to_string()
    } else {
        format!("0 0 */{hours} * * *")
    }
}
