//! Single-runner task dispatcher (§4.E: "at most one task is in running state at any
//! time (dispatcher enforces)").
//!
//! Polls `TaskManager::next_pending` on a fixed interval; when a task is picked up it
//! is transitioned to `Running`, handed to the `CollectionEngine` with the sources its
//! config names (or every active source), and transitioned to `Completed`/`Failed`
//! once the engine returns. The engine itself is what re-reads task status at page
//! boundaries to honor pause/cancel, so this loop only needs to react once per task.

use std::sync::Arc;
use std::time::Duration;

use catalog_core::bootstrap::services::Services;
use catalog_core::models::{SourceId, Task};
use catalog_core::service::CollectionContext;
use tracing::{error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub async fn run(services: Arc<Services>) {
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = dispatch_next(&services).await {
            error!(error = %e, "task dispatch failed");
        }
    }
}

async fn dispatch_next(services: &Services) -> catalog_core::Result<()> {
    if services.task_manager.has_running().await? {
        return Ok(());
    }

    let Some(task) = services.task_manager.next_pending().await? else {
        return Ok(());
    };

    let ctx = build_context(services, &task).await?;
    let task = services.task_manager.start(&task.id).await?;

    info!(task_id = %task.id.as_str(), kind = ?task.kind, "dispatching collection task");

    match services.collection_engine.run(&task, ctx).await {
        Ok(outcome) => {
            info!(
                task_id = %task.id.as_str(),
                processed = outcome.processed,
                new = outcome.new,
                updated = outcome.updated,
                skipped = outcome.skipped,
                errored = outcome.errored,
                "collection task finished"
            );
            // The engine itself leaves a task in Paused/Cancelled if it observed that
            // status mid-run; only a task still Running here actually completed.
            if let Some(current) = services.task_manager.get(&task.id).await? {
                if current.status == catalog_core::models::TaskStatus::Running {
                    services.task_manager.complete(&task.id).await?;
                }
            }
        }
        Err(e) => {
            warn!(task_id = %task.id.as_str(), error = %e, "collection task failed");
            services.task_manager.fail(&task.id, &e.to_string()).await?;
        }
    }

    Ok(())
}

async fn build_context(services: &Services, task: &Task) -> catalog_core::Result<CollectionContext> {
    let sources = match &task.config.source_ids {
        Some(ids) => {
            let mut sources = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(source) = services.sources.get_by_id(&SourceId(id.clone())).await? {
                    sources.push(source);
                }
            }
            sources
        }
        None => services.sources.list_active().await?,
    };

    let category_ids = task
        .config
        .category_ids
        .clone()
        .unwrap_or_default()
        .into_iter()
        .map(Some)
        .collect::<Vec<_>>();
    let category_ids = if category_ids.is_empty() { vec![None] } else { category_ids };

    Ok(CollectionContext { sources, category_ids })
}
