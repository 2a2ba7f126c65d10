//! Post-mutation hook run after a task's primary write has succeeded.
//!
//! Rollup failures are reported alongside the mutation, never as its error:
//! the task write is already durable and is not rolled back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::rollup::{recompute_rollups_at, RollupOutcome};
use crate::store::AggregateStore;
use crate::task::Task;

/// A task write that has already been persisted.
#[derive(Debug, Clone)]
pub enum TaskMutation {
    Created(Task),
    Updated { previous: Task, current: Task },
    Deleted(Task),
}

impl TaskMutation {
    pub fn task(&self) -> &Task {
        match self {
            TaskMutation::Created(task) | TaskMutation::Deleted(task) => task,
            TaskMutation::Updated { current, .. } => current,
        }
    }

    /// Placements whose rollups the mutation may have changed.
    ///
    /// An update that moved the task to another stage or project also
    /// touches the placement it left.
    pub fn affected(&self) -> Vec<&Task> {
        match self {
            TaskMutation::Created(task) | TaskMutation::Deleted(task) => vec![task],
            TaskMutation::Updated { previous, current } => {
                let moved = previous.project_id != current.project_id
                    || previous.stage() != current.stage();
                if moved {
                    vec![current, previous]
                } else {
                    vec![current]
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RollupFailure {
    pub project_id: String,
    pub message: String,
    pub code: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MutationReport {
    pub task_id: String,
    pub rollups: Vec<RollupOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<RollupFailure>,
}

impl MutationReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
            && self
                .rollups
                .iter()
                .all(|outcome| matches!(outcome, RollupOutcome::Applied(_)))
    }
}

pub fn apply_task_mutation<S>(store: &S, mutation: &TaskMutation) -> MutationReport
where
    S: AggregateStore + ?Sized,
{
    apply_task_mutation_at(store, mutation, Utc::now())
}

pub fn apply_task_mutation_at<S>(
    store: &S,
    mutation: &TaskMutation,
    now: DateTime<Utc>,
) -> MutationReport
where
    S: AggregateStore + ?Sized,
{
    let mut rollups = Vec::new();
    let mut failures = Vec::new();

    for task in mutation.affected() {
        match recompute_rollups_at(store, task, now) {
            Ok(outcome) => rollups.push(outcome),
            Err(err) => {
                warn!(task_id = %task.id, project_id = %task.project_id, error = %err, "rollup recompute failed");
                failures.push(RollupFailure {
                    project_id: task.project_id.clone(),
                    message: err.to_string(),
                    code: err.exit_code(),
                });
            }
        }
    }

    MutationReport {
        task_id: mutation.task().id.clone(),
        rollups,
        failures,
    }
}
