//! Collection engine: the core crawl loop (§4.F).
//!
//! Walks `sources × categories × pages`, bounded to `BATCH_SIZE` concurrent page
//! fetches via a semaphore, parsing/cleaning/classifying/ingesting each returned
//! video and checkpointing progress after every page so a paused or crashed task
//! resumes from where it left off rather than re-walking from page 1.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tokio::sync::Semaphore;

use crate::config::CollectionConfig;
use crate::models::{Checkpoint, CollectLogEntry, LogLevel, Source, Task, TaskId, TaskProgress, TaskStatus};
use crate::repository::{CollectLogRepository, TaskRepository};
use crate::service::catalog_store::CatalogStore;
use crate::service::classifier::Classifier;
use crate::service::data_cleaner::DataCleaner;
use crate::service::response_parser::ResponseParser;
use crate::Result;

/// Everything a single collection run needs, gathered up so `run` takes one argument.
pub struct CollectionContext {
    pub sources: Vec<Source>,
    pub category_ids: Vec<Option<String>>,
}

/// Tally of what one run actually did, returned to the caller for logging/metrics.
#[derive(Debug, Clone, Default)]
pub struct CollectionOutcome {
    pub processed: i64,
    pub new: i64,
    pub updated: i64,
    pub skipped: i64,
    pub errored: i64,
}

pub struct CollectionEngine {
    tasks: Arc<TaskRepository>,
    logs: Arc<CollectLogRepository>,
    catalog: Arc<CatalogStore>,
    classifier: Arc<Classifier>,
    config: CollectionConfig,
}

impl CollectionEngine {
    #[must_use]
    pub fn new(
        tasks: Arc<TaskRepository>,
        logs: Arc<CollectLogRepository>,
        catalog: Arc<CatalogStore>,
        classifier: Arc<Classifier>,
        config: CollectionConfig,
    ) -> Self {
        Self { tasks, logs, catalog, classifier, config }
    }

    /// Run (or resume) a collection task to completion, pause, or cancellation.
    ///
    /// §4.F: before starting each page, re-reads the task's status; a `Paused` or
    /// `Cancelled` status observed mid-run stops the loop immediately, leaving the
    /// checkpoint where it is so a later `resume` picks up at the same page.
    pub async fn run(&self, task: &Task, ctx: CollectionContext) -> Result<CollectionOutcome> {
        let processed = Arc::new(AtomicI64::new(0));
        let new = Arc::new(AtomicI64::new(0));
        let updated = Arc::new(AtomicI64::new(0));
        let skipped = Arc::new(AtomicI64::new(0));
        let errored = Arc::new(AtomicI64::new(0));

        let semaphore = Arc::new(Semaphore::new(self.config.batch_size as usize));

        let start_source_index = task.checkpoint.as_ref().map_or(0, |c| c.source_index);
        let page_start = task.config.page_start.unwrap_or(1).max(1) as u32;
        let page_end = task.config.page_end.unwrap_or(-1);

        let categories: Vec<Option<String>> = if ctx.category_ids.is_empty() {
            vec![None]
        } else {
            ctx.category_ids.clone()
        };

        'sources: for (source_index, source) in ctx.sources.iter().enumerate().skip(start_source_index) {
            let is_resumed_source = source_index == start_source_index && task.checkpoint.is_some();

            for category_id in &categories {
                let mut page = if is_resumed_source {
                    task.checkpoint.as_ref().map_or(page_start, |c| c.page.max(page_start))
                } else {
                    page_start
                };

                loop {
                    if self.should_stop(&task.id).await? {
                        break 'sources;
                    }

                    let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
                    let fetch_result = self.fetch_page_with_retry(source, page, category_id.as_deref()).await;
                    drop(permit);

                    let parsed = match fetch_result {
                        Ok(p) => p,
                        Err(e) => {
                            errored.fetch_add(1, Ordering::Relaxed);
                            self.log(&task.id, LogLevel::Error, "fetch_page", &e, Some(&source.name)).await?;
                            break;
                        }
                    };

                    for raw in &parsed.videos {
                        processed.fetch_add(1, Ordering::Relaxed);

                        let cleaned = DataCleaner::clean(&source.name, raw);
                        if cleaned.name.is_empty() {
                            skipped.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }

                        let classify_result = self
                            .classifier
                            .auto_classify(source.id.as_str(), raw.upstream_type_id, raw.upstream_type_name.as_deref(), &cleaned)
                            .await?;

                        match self
                            .catalog
                            .ingest(
                                cleaned,
                                source.weight,
                                classify_result.type_id.as_i16(),
                                classify_result.sub_type_id,
                                classify_result.sub_type_name.clone(),
                            )
                            .await
                        {
                            Ok((video, is_new)) => {
                                if is_new {
                                    new.fetch_add(1, Ordering::Relaxed);
                                } else {
                                    updated.fetch_add(1, Ordering::Relaxed);
                                }
                                let _ = video;
                            }
                            Err(e) => {
                                errored.fetch_add(1, Ordering::Relaxed);
                                self.log(&task.id, LogLevel::Error, "ingest", &e.to_string(), Some(&source.name)).await?;
                            }
                        }

                        if let Some(max) = task.config.max_videos {
                            if processed.load(Ordering::Relaxed) >= max {
                                break 'sources;
                            }
                        }
                    }

                    self.checkpoint(&task.id, source_index, page, &processed, &new, &updated, &skipped, &errored, parsed.pagecount)
                        .await?;

                    let exhausted = page_end != -1 && page as i32 >= page_end;
                    let upstream_exhausted = parsed.pagecount > 0 && page >= parsed.pagecount;
                    if exhausted || upstream_exhausted {
                        break;
                    }
                    page += 1;

                    tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;
                }
            }

            tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
        }

        Ok(CollectionOutcome {
            processed: processed.load(Ordering::Relaxed),
            new: new.load(Ordering::Relaxed),
            updated: updated.load(Ordering::Relaxed),
            skipped: skipped.load(Ordering::Relaxed),
            errored: errored.load(Ordering::Relaxed),
        })
    }

    async fn should_stop(&self, task_id: &TaskId) -> Result<bool> {
        let current = self.tasks.get(task_id).await?;
        Ok(match current {
            Some(t) => matches!(t.status, TaskStatus::Paused | TaskStatus::Cancelled | TaskStatus::Failed),
            None => true,
        })
    }

    async fn fetch_page_with_retry(
        &self,
        source: &Source,
        page: u32,
        category_id: Option<&str>,
    ) -> std::result::Result<crate::service::response_parser::ParsedVideoList, String> {
        let url = source.list_url(page, category_id);
        let max_retries = self.config.max_retries;
        let timeout_ms = self.config.request_timeout_ms;

        let fetch = || async {
            let client = reqwest::Client::new();
            let response = tokio::time::timeout(Duration::from_millis(timeout_ms), client.get(&url).send())
                .await
                .map_err(|_| "request timed out".to_string())?
                .map_err(|e| e.to_string())?;

            if !response.status().is_success() {
                return Err(format!("HTTP {}", response.status()));
            }
            let body = response.text().await.map_err(|e| e.to_string())?;
            ResponseParser::parse(&body).map_err(|e| e.0)
        };

        fetch
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(5))
                    .with_max_times(max_retries as usize),
            )
            .when(|e: &String| !e.starts_with("HTTP 4"))
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn checkpoint(
        &self,
        task_id: &TaskId,
        source_index: usize,
        page: u32,
        processed: &AtomicI64,
        new: &AtomicI64,
        updated: &AtomicI64,
        skipped: &AtomicI64,
        errored: &AtomicI64,
        total_pages: u32,
    ) -> Result<()> {
        let mut progress = TaskProgress {
            current_page: page,
            total_pages,
            processed: processed.load(Ordering::Relaxed),
            new: new.load(Ordering::Relaxed),
            updated: updated.load(Ordering::Relaxed),
            skipped: skipped.load(Ordering::Relaxed),
            errored: errored.load(Ordering::Relaxed),
            ..Default::default()
        };
        progress.recompute_percentage();

        let checkpoint = Checkpoint {
            source_index,
            page,
            last_video_id: None,
            timestamp: chrono::Utc::now(),
        };

        self.tasks.update_progress(task_id, &progress, Some(&checkpoint)).await
    }

    async fn log(&self, task_id: &TaskId, level: LogLevel, action: &str, message: &str, source_name: Option<&str>) -> Result<()> {
        let mut entry = CollectLogEntry::new(task_id.clone(), level, action, message);
        if let Some(name) = source_name {
            entry = entry.with_source(name);
        }
        self.logs.insert_batch(std::slice::from_ref(&entry)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_outcome_defaults_to_zero() {
        let outcome = CollectionOutcome::default();
        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.errored, 0);
    }
}
