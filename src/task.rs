//! Task records.
//!
//! Tasks are the only authoritative state the aggregation engine reads. Every
//! derived number on stages and projects is recomputed from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};

const TASK_ID_PREFIX: &str = "task";

/// Workflow status of a task.
///
/// Values outside the known set deserialize to [`TaskStatus::Unknown`] so a
/// single bad record never fails a bulk read.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Backlog,
    Todo,
    InProgress,
    Done,
    #[default]
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub const KNOWN: [TaskStatus; 4] = [
        TaskStatus::Backlog,
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Done,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "inProgress",
            TaskStatus::Done => "done",
            TaskStatus::Unknown => "unknown",
        }
    }

    /// Parse a user-supplied status, accepting `in_progress` and `in-progress`.
    pub fn parse(value: &str) -> Result<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "backlog" => Ok(TaskStatus::Backlog),
            "todo" => Ok(TaskStatus::Todo),
            "inprogress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(Error::InvalidArgument(format!(
                "invalid status '{}' (expected backlog|todo|inProgress|done)",
                value.trim()
            ))),
        }
    }

    pub fn is_done(self) -> bool {
        self == TaskStatus::Done
    }

    /// Started but not finished.
    pub fn is_on_track(self) -> bool {
        matches!(self, TaskStatus::Todo | TaskStatus::InProgress)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of the employee a task is assigned to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssigneeRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    /// Estimated effort in hours.
    #[serde(default)]
    pub estimated_duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<AssigneeRef>,
}

impl Task {
    pub fn new(title: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            id: generate_task_id(),
            title: title.into(),
            project_id: project_id.into(),
            stage_id: None,
            status: TaskStatus::Backlog,
            estimated_duration: 0.0,
            due_date: None,
            assignee: None,
        }
    }

    /// Stage id, treating blank values as absent.
    pub fn stage(&self) -> Option<&str> {
        self.stage_id
            .as_deref()
            .map(str::trim)
            .filter(|stage| !stage.is_empty())
    }

    /// Estimated hours clamped to a finite, non-negative value.
    pub fn hours(&self) -> f64 {
        if self.estimated_duration.is_finite() {
            self.estimated_duration.max(0.0)
        } else {
            0.0
        }
    }

    /// Past due and not done as of `now`.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_done() && self.due_date.is_some_and(|due| due < now)
    }

    /// Reject tasks the recomputer cannot place.
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(Error::MalformedTask {
                task_id: self.id.clone(),
                reason: "project_id is empty".to_string(),
            });
        }
        Ok(())
    }
}

pub fn generate_task_id() -> String {
    format!("{}-{}", TASK_ID_PREFIX, Ulid::new().to_string().to_lowercase())
}
