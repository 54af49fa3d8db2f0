use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{Checkpoint, Task, TaskConfig, TaskId, TaskKind, TaskProgress, TaskStatus},
    Result,
};

#[derive(Clone)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, task: &Task) -> Result<Task> {
        let row = self.insert_row(task, &self.pool).await?;
        Self::row_to_task(row)
    }

    async fn insert_row<'e, E>(&self, task: &Task, executor: E) -> Result<PgRow>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let config_json = serde_json::to_value(&task.config)?;
        let progress_json = serde_json::to_value(&task.progress)?;
        let checkpoint_json = serde_json::to_value(&task.checkpoint)?;

        sqlx::query(
            r"
            INSERT INTO tasks (
                id, kind, status, priority, config, progress, checkpoint,
                created_at, started_at, paused_at, completed_at, last_error
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            ",
        )
        .bind(task.id.as_str())
        .bind(Self::kind_str(task.kind))
        .bind(Self::status_str(task.status))
        .bind(task.priority)
        .bind(&config_json)
        .bind(&progress_json)
        .bind(&checkpoint_json)
        .bind(task.created_at)
        .bind(task.started_at)
        .bind(task.paused_at)
        .bind(task.completed_at)
        .bind(&task.last_error)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_task).transpose()
    }

    pub async fn list(&self, status: Option<TaskStatus>, kind: Option<TaskKind>, page: i64, page_size: i64) -> Result<(Vec<Task>, i64)> {
        let offset = (page.max(1) - 1) * page_size;
        let status_filter = status.map(Self::status_str);
        let kind_filter = kind.map(Self::kind_str);

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM tasks
            WHERE ($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR kind = $2)
            ",
        )
        .bind(status_filter)
        .bind(kind_filter)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(
            r"
            SELECT * FROM tasks
            WHERE ($1::text IS NULL OR status = $1) AND ($2::text IS NULL OR kind = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(status_filter)
        .bind(kind_filter)
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let items = rows.into_iter().map(Self::row_to_task).collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }

    /// Is any task currently `running`? (§8 P10 dispatcher exclusivity.)
    pub async fn has_running(&self) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE status = 'running'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Highest-priority, oldest `pending` task, or `None` if a task is already running
    /// (§4.E `next_pending`).
    pub async fn next_pending(&self) -> Result<Option<Task>> {
        if self.has_running().await? {
            return Ok(None);
        }

        let row = sqlx::query(
            r"
            SELECT * FROM tasks WHERE status = 'pending'
            ORDER BY priority DESC, created_at ASC
            LIMIT 1
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_task).transpose()
    }

    /// Persist a status transition. Caller is responsible for validating the
    /// transition against `TaskStatus::can_transition_to` first.
    pub async fn update_status(&self, id: &TaskId, status: TaskStatus, error: Option<&str>) -> Result<Task> {
        let now = chrono::Utc::now();
        let row = sqlx::query(
            r"
            UPDATE tasks SET
                status = $2,
                last_error = COALESCE($3, last_error),
                started_at = CASE WHEN $2 = 'running' AND started_at IS NULL THEN $4 ELSE started_at END,
                paused_at = CASE WHEN $2 = 'paused' THEN $4 ELSE paused_at END,
                completed_at = CASE WHEN $2 IN ('completed','failed','cancelled') THEN $4 ELSE completed_at END
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id.as_str())
        .bind(Self::status_str(status))
        .bind(error)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_task(row)
    }

    pub async fn update_progress(&self, id: &TaskId, progress: &TaskProgress, checkpoint: Option<&Checkpoint>) -> Result<()> {
        let progress_json = serde_json::to_value(progress)?;
        let checkpoint_json = serde_json::to_value(checkpoint)?;

        sqlx::query("UPDATE tasks SET progress = $2, checkpoint = $3 WHERE id = $1")
            .bind(id.as_str())
            .bind(&progress_json)
            .bind(&checkpoint_json)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete completed/failed/cancelled tasks older than `older_than_days` (§4.E `cleanup_old`).
    pub async fn cleanup_old(&self, older_than_days: i64) -> Result<usize> {
        let result = sqlx::query(
            r"
            DELETE FROM tasks
            WHERE status IN ('completed','failed','cancelled')
              AND completed_at < now() - ($1 || ' days')::interval
            ",
        )
        .bind(older_than_days.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as usize)
    }

    const fn kind_str(kind: TaskKind) -> &'static str {
        match kind {
            TaskKind::Full => "full",
            TaskKind::Incremental => "incremental",
            TaskKind::Category => "category",
            TaskKind::Source => "source",
            TaskKind::Shorts => "shorts",
        }
    }

    const fn status_str(status: TaskStatus) -> &'static str {
        match status {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    fn row_to_task(row: PgRow) -> Result<Task> {
        let kind_str: String = row.try_get("kind")?;
        let kind = match kind_str.as_str() {
            "incremental" => TaskKind::Incremental,
            "category" => TaskKind::Category,
            "source" => TaskKind::Source,
            "shorts" => TaskKind::Shorts,
            _ => TaskKind::Full,
        };

        let status_str: String = row.try_get("status")?;
        let status = match status_str.as_str() {
            "running" => TaskStatus::Running,
            "paused" => TaskStatus::Paused,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            "cancelled" => TaskStatus::Cancelled,
            _ => TaskStatus::Pending,
        };

        let config_json: serde_json::Value = row.try_get("config")?;
        let progress_json: serde_json::Value = row.try_get("progress")?;
        let checkpoint_json: Option<serde_json::Value> = row.try_get("checkpoint")?;

        Ok(Task {
            id: TaskId::from_string(row.try_get("id")?),
            kind,
            status,
            priority: row.try_get("priority")?,
            config: serde_json::from_value(config_json).unwrap_or_default(),
            progress: serde_json::from_value(progress_json).unwrap_or_default(),
            checkpoint: checkpoint_json.and_then(|v| serde_json::from_value::<Option<Checkpoint>>(v).ok().flatten()),
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            paused_at: row.try_get("paused_at")?,
            completed_at: row.try_get("completed_at")?,
            last_error: row.try_get("last_error")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_status_round_trip_strings() {
        assert_eq!(TaskRepository::kind_str(TaskKind::Shorts), "shorts");
        assert_eq!(TaskRepository::status_str(TaskStatus::Running), "running");
    }
}
