//! Retention sweep for finished tasks.
//!
//! Terminal tasks stay queryable for `finished_task_seconds` after their
//! last update, then a background sweep drops them from the registry.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::orchestrator::task_manager::TaskManager;

const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the finished-task purge background task.
///
/// The task runs every minute. On each tick it removes tasks that reached
/// a terminal state longer than `retention` ago.
#[must_use]
pub fn spawn_retention_task(
    tasks: Arc<TaskManager>,
    retention: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("retention task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    purge(&tasks, retention).await;
                }
            }
        }
    })
}

/// Remove tasks finished more than `retention` ago; returns the count.
pub async fn purge(tasks: &TaskManager, retention: Duration) -> usize {
    let Some(cutoff) = cutoff(retention) else {
        return 0;
    };
    let removed = tasks.purge_finished(cutoff).await;
    if removed > 0 {
        info!(removed, "retention purge completed");
    } else {
        debug!("retention purge found nothing to remove");
    }
    removed
}

fn cutoff(retention: Duration) -> Option<DateTime<Utc>> {
    let age = chrono::Duration::from_std(retention).ok()?;
    Utc::now().checked_sub_signed(age)
}
