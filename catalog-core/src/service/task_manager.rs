//! Task lifecycle management (§4.E).
//!
//! A thin layer over `TaskRepository` that enforces `TaskStatus::can_transition_to`
//! before any status write lands, so an illegal transition fails here rather than
//! corrupting the state machine in the database (§8 P9).

use std::sync::Arc;

use crate::models::{Checkpoint, Task, TaskConfig, TaskKind, TaskProgress, TaskStatus};
use crate::repository::TaskRepository;
use crate::validation::TaskConfigValidator;
use crate::{Error, Result};

pub struct TaskManager {
    repository: Arc<TaskRepository>,
}

impl TaskManager {
    #[must_use]
    pub fn new(repository: Arc<TaskRepository>) -> Self {
        Self { repository }
    }

    /// Validate and persist a new task in `Pending` status.
    pub async fn create(&self, kind: TaskKind, priority: i16, config: TaskConfig) -> Result<Task> {
        TaskConfigValidator::validate_page_range(config.page_start.unwrap_or(1), config.page_end.unwrap_or(-1))
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        TaskConfigValidator::validate_max_videos(config.max_videos).map_err(|e| Error::InvalidInput(e.to_string()))?;

        let task = Task::new(kind, priority, config);
        self.repository.create(&task).await
    }

    pub async fn get(&self, id: &crate::models::TaskId) -> Result<Option<Task>> {
        self.repository.get(id).await
    }

    pub async fn list(
        &self,
        status: Option<TaskStatus>,
        kind: Option<TaskKind>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<Task>, i64)> {
        self.repository.list(status, kind, page, page_size).await
    }

    /// The next pending task, highest priority first, for the scheduler/dispatcher to pick up.
    pub async fn next_pending(&self) -> Result<Option<Task>> {
        self.repository.next_pending().await
    }

    pub async fn has_running(&self) -> Result<bool> {
        self.repository.has_running().await
    }

    async fn transition(&self, id: &crate::models::TaskId, to: TaskStatus, error: Option<&str>) -> Result<Task> {
        let task = self
            .repository
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {id} not found")))?;

        if !task.status.can_transition_to(to) {
            return Err(Error::InvalidInput(format!(
                "cannot transition task {id} from {:?} to {to:?}",
                task.status
            )));
        }

        self.repository.update_status(id, to, error).await
    }

    pub async fn start(&self, id: &crate::models::TaskId) -> Result<Task> {
        self.transition(id, TaskStatus::Running, None).await
    }

    pub async fn pause(&self, id: &crate::models::TaskId) -> Result<Task> {
        self.transition(id, TaskStatus::Paused, None).await
    }

    /// Resume a paused task back to `Pending` so the dispatcher can pick it up again.
    pub async fn resume(&self, id: &crate::models::TaskId) -> Result<Task> {
        self.transition(id, TaskStatus::Pending, None).await
    }

    pub async fn complete(&self, id: &crate::models::TaskId) -> Result<Task> {
        self.transition(id, TaskStatus::Completed, None).await
    }

    pub async fn fail(&self, id: &crate::models::TaskId, error: &str) -> Result<Task> {
        self.transition(id, TaskStatus::Failed, Some(error)).await
    }

    pub async fn cancel(&self, id: &crate::models::TaskId) -> Result<Task> {
        self.transition(id, TaskStatus::Cancelled, None).await
    }

    pub async fn update_progress(
        &self,
        id: &crate::models::TaskId,
        progress: &TaskProgress,
        checkpoint: Option<&Checkpoint>,
    ) -> Result<()> {
        self.repository.update_progress(id, progress, checkpoint).await
    }

    /// Delete terminal tasks older than `older_than_days`, returning the count removed.
    pub async fn cleanup_old(&self, older_than_days: i64) -> Result<usize> {
        self.repository.cleanup_old(older_than_days).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_rejected_before_persist() {
        let config = TaskConfig {
            page_start: Some(5),
            page_end: Some(1),
            ..Default::default()
        };
        assert!(TaskConfigValidator::validate_page_range(
            config.page_start.unwrap(),
            config.page_end.unwrap()
        )
        .is_err());
    }
}
