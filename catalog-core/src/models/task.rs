use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::TaskId;

/// Task kinds (§3 Task).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Full,
    Incremental,
    Category,
    Source,
    Shorts,
}

/// Task status machine (§3 Task, §8 P9): `pending → running → (paused → pending |
/// completed | failed | cancelled)`. Terminal states do not transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal states admit no further transition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Is `to` a legal transition from `self`?
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, to),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Cancelled)
                | (Self::Running, Self::Paused)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Cancelled)
                | (Self::Paused, Self::Pending)
                | (Self::Paused, Self::Cancelled)
        )
    }
}

/// Operator-supplied task configuration (§3 Task).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    pub source_ids: Option<Vec<String>>,
    pub category_ids: Option<Vec<String>>,
    pub page_start: Option<i32>,
    /// -1 means "all pages" (clamped to the source's reported `pagecount`).
    pub page_end: Option<i32>,
    pub max_videos: Option<i64>,
    pub skip_existing: bool,
}

/// Resumable position within a running task (§3 Task, GLOSSARY Checkpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub source_index: usize,
    pub page: u32,
    pub last_video_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Live progress counters (§3 Task).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskProgress {
    pub current_source: Option<String>,
    pub current_source_id: Option<String>,
    pub current_page: u32,
    pub total_pages: u32,
    pub processed: i64,
    pub new: i64,
    pub updated: i64,
    pub skipped: i64,
    pub errored: i64,
    pub percentage: f64,
}

impl TaskProgress {
    pub fn recompute_percentage(&mut self) {
        self.percentage = if self.total_pages == 0 {
            0.0
        } else {
            f64::from(self.current_page) / f64::from(self.total_pages) * 100.0
        };
    }
}

/// A collection task (§3 Task).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub priority: i16,
    pub config: TaskConfig,
    pub progress: TaskProgress,
    pub checkpoint: Option<Checkpoint>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Task {
    #[must_use]
    pub fn new(kind: TaskKind, priority: i16, config: TaskConfig) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            status: TaskStatus::Pending,
            priority: priority.clamp(1, 10),
            config,
            progress: TaskProgress::default(),
            checkpoint: None,
            created_at: Utc::now(),
            started_at: None,
            paused_at: None,
            completed_at: None,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Paused));
        assert!(TaskStatus::Paused.can_transition_to(TaskStatus::Pending));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn test_illegal_transitions_from_terminal() {
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Running));
    }

    #[test]
    fn test_illegal_direct_jumps() {
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Paused.can_transition_to(TaskStatus::Running));
    }
}
