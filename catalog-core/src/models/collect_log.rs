use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::id::{LogId, TaskId};

/// Severity of a `CollectLog` entry (§3 CollectLog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Append-only structured log entry keyed by task id (§3 CollectLog).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectLogEntry {
    pub id: LogId,
    pub task_id: TaskId,
    pub level: LogLevel,
    pub action: String,
    pub message: String,
    pub source_name: Option<String>,
    pub video_id: Option<String>,
    pub video_name: Option<String>,
    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl CollectLogEntry {
    #[must_use]
    pub fn new(task_id: TaskId, level: LogLevel, action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: LogId::new(),
            task_id,
            level,
            action: action.into(),
            message: message.into(),
            source_name: None,
            video_id: None,
            video_name: None,
            details: JsonValue::Null,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    #[must_use]
    pub fn with_video(mut self, video_id: impl Into<String>, video_name: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self.video_name = Some(video_name.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = details;
        self
    }
}
