//! Stage and project rollup recomputation.
//!
//! Every recompute re-reads all tasks of the project and replaces the whole
//! derived block in one write. Nothing is incremented in place, so concurrent
//! recomputes of the same project can only leave a stale result (last writer
//! wins), never an internally inconsistent one. The next mutation heals it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::contribution::{weighted_hours, weighted_progress};
use crate::error::{Error, Result};
use crate::project::{derive_current_stage, Project, ProjectFields, ProjectRollup, Stage, StageRollup};
use crate::store::AggregateStore;
use crate::task::Task;

/// How the stage entry was written.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageUpsert {
    /// Existing entry's derived fields replaced in place.
    Updated,
    /// Project did not list the stage; a minimal entry was appended.
    Created,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StageChange {
    pub stage_id: String,
    pub upsert: StageUpsert,
    pub rollup: StageRollup,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RollupReport {
    pub project_id: String,
    pub stages: Vec<StageChange>,
    pub fields: ProjectFields,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RollupOutcome {
    Applied(RollupReport),
    /// Nothing written; the task mutation itself still stands.
    ProjectNotFound { project_id: String },
}

impl RollupOutcome {
    pub fn report(&self) -> Option<&RollupReport> {
        match self {
            RollupOutcome::Applied(report) => Some(report),
            RollupOutcome::ProjectNotFound { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
struct Totals {
    tasks: usize,
    completed: usize,
    hours: f64,
    weighted: f64,
}

impl Totals {
    fn add(&mut self, task: &Task) {
        self.tasks += 1;
        if task.status.is_done() {
            self.completed += 1;
        }
        self.hours += task.hours();
        self.weighted += weighted_hours(task);
    }

    fn progress(&self) -> u8 {
        weighted_progress(self.weighted, self.hours)
    }
}

/// Hour-weighted totals for the given stage tasks.
pub fn stage_rollup<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> StageRollup {
    let mut totals = Totals::default();
    for task in tasks {
        totals.add(task);
    }
    StageRollup {
        total_tasks: totals.tasks,
        completed_tasks: totals.completed,
        total_hours: totals.hours,
        weighted_completed_hours: totals.weighted,
        progress: totals.progress(),
    }
}

/// Hour-weighted totals over every task of a project as of `now`.
pub fn project_rollup<'a>(tasks: impl IntoIterator<Item = &'a Task>, now: DateTime<Utc>) -> ProjectRollup {
    let mut totals = Totals::default();
    let mut overdue_tasks = 0;
    let mut on_track_tasks = 0;
    for task in tasks {
        totals.add(task);
        if task.is_overdue(now) {
            overdue_tasks += 1;
        }
        if task.status.is_on_track() {
            on_track_tasks += 1;
        }
    }
    ProjectRollup {
        total_tasks: totals.tasks,
        completed_tasks: totals.completed,
        incomplete_tasks: totals.tasks - totals.completed,
        total_hours: totals.hours,
        weighted_completed_hours: totals.weighted,
        progress: totals.progress(),
        overdue_tasks,
        on_track_tasks,
    }
}

/// Write `rollup` onto the stage with `stage_id`, appending a minimal entry
/// when the list does not contain it.
pub fn upsert_stage(stages: &mut Vec<Stage>, stage_id: &str, rollup: StageRollup) -> StageUpsert {
    match stages.iter_mut().find(|stage| stage.id == stage_id) {
        Some(stage) => {
            stage.rollup = rollup;
            StageUpsert::Updated
        }
        None => {
            stages.push(Stage::minimal(stage_id, rollup));
            StageUpsert::Created
        }
    }
}

/// Recompute the mutated task's stage and project and persist them.
pub fn recompute_rollups<S>(store: &S, task: &Task) -> Result<RollupOutcome>
where
    S: AggregateStore + ?Sized,
{
    recompute_rollups_at(store, task, Utc::now())
}

/// [`recompute_rollups`] with an explicit clock for overdue counting.
pub fn recompute_rollups_at<S>(store: &S, task: &Task, now: DateTime<Utc>) -> Result<RollupOutcome>
where
    S: AggregateStore + ?Sized,
{
    task.validate()?;
    let project_id = task.project_id.as_str();
    debug!(task_id = %task.id, project_id, stage_id = ?task.stage(), "recomputing rollups");

    let Some(project) = store.get_project(project_id)? else {
        return Ok(project_not_found(project_id));
    };
    let tasks = store.list_tasks_by_project(project_id)?;

    let mut stages = project.stages.clone();
    let mut changes = Vec::new();
    if let Some(stage_id) = task.stage() {
        changes.push(recompute_stage(&mut stages, stage_id, &tasks));
    }

    persist(store, &project, stages, changes, &tasks, now)
}

/// Recompute every stage of a project, including stages its tasks reference
/// but the project does not list, then the project totals.
pub fn recompute_project<S>(store: &S, project_id: &str) -> Result<RollupOutcome>
where
    S: AggregateStore + ?Sized,
{
    recompute_project_at(store, project_id, Utc::now())
}

pub fn recompute_project_at<S>(store: &S, project_id: &str, now: DateTime<Utc>) -> Result<RollupOutcome>
where
    S: AggregateStore + ?Sized,
{
    if project_id.trim().is_empty() {
        return Err(Error::InvalidArgument("project id cannot be empty".to_string()));
    }
    debug!(project_id, "recomputing all project rollups");

    let Some(project) = store.get_project(project_id)? else {
        return Ok(project_not_found(project_id));
    };
    let tasks = store.list_tasks_by_project(project_id)?;

    let mut seen = HashSet::new();
    let mut stage_ids: Vec<String> = Vec::new();
    let listed = project.stages.iter().map(|stage| stage.id.as_str());
    let referenced = tasks.iter().filter_map(Task::stage);
    for stage_id in listed.chain(referenced) {
        if seen.insert(stage_id) {
            stage_ids.push(stage_id.to_string());
        }
    }

    let mut stages = project.stages.clone();
    let changes = stage_ids
        .iter()
        .map(|stage_id| recompute_stage(&mut stages, stage_id, &tasks))
        .collect();

    persist(store, &project, stages, changes, &tasks, now)
}

fn recompute_stage(stages: &mut Vec<Stage>, stage_id: &str, tasks: &[Task]) -> StageChange {
    let rollup = stage_rollup(tasks.iter().filter(|task| task.stage() == Some(stage_id)));
    let upsert = upsert_stage(stages, stage_id, rollup.clone());
    if upsert == StageUpsert::Created {
        debug!(stage_id, "stage missing from project; created minimal entry");
    }
    StageChange {
        stage_id: stage_id.to_string(),
        upsert,
        rollup,
    }
}

fn persist<S>(
    store: &S,
    project: &Project,
    stages: Vec<Stage>,
    changes: Vec<StageChange>,
    tasks: &[Task],
    now: DateTime<Utc>,
) -> Result<RollupOutcome>
where
    S: AggregateStore + ?Sized,
{
    let fields = ProjectFields {
        rollup: project_rollup(tasks, now),
        current_stage: derive_current_stage(&stages),
    };

    match store.replace_project_aggregates(&project.id, &stages, &fields) {
        Ok(()) => {}
        Err(Error::ProjectNotFound(_)) => return Ok(project_not_found(&project.id)),
        Err(err) => {
            warn!(project_id = %project.id, error = %err, "failed to persist rollups");
            return Err(Error::PersistenceWriteFailed {
                project_id: project.id.clone(),
                reason: err.to_string(),
            });
        }
    }

    debug!(
        project_id = %project.id,
        progress = fields.rollup.progress,
        total_tasks = fields.rollup.total_tasks,
        "rollups persisted"
    );
    Ok(RollupOutcome::Applied(RollupReport {
        project_id: project.id.clone(),
        stages: changes,
        fields,
    }))
}

fn project_not_found(project_id: &str) -> RollupOutcome {
    warn!(project_id, "project not found; skipping rollup recompute");
    RollupOutcome::ProjectNotFound {
        project_id: project_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use chrono::Duration;

    fn task(project: &str, stage: Option<&str>, hours: f64, status: TaskStatus) -> Task {
        let mut task = Task::new("t", project);
        task.stage_id = stage.map(str::to_string);
        task.estimated_duration = hours;
        task.status = status;
        task
    }

    #[test]
    fn stage_rollup_weights_by_status() {
        let tasks = vec![
            task("p", Some("s"), 2.0, TaskStatus::Done),
            task("p", Some("s"), 2.0, TaskStatus::InProgress),
            task("p", Some("s"), 4.0, TaskStatus::Todo),
            task("p", Some("s"), 2.0, TaskStatus::Backlog),
        ];
        let rollup = stage_rollup(&tasks);
        assert_eq!(rollup.total_tasks, 4);
        assert_eq!(rollup.completed_tasks, 1);
        assert_eq!(rollup.total_hours, 10.0);
        assert_eq!(rollup.weighted_completed_hours, 4.0);
        assert_eq!(rollup.progress, 40);
    }

    #[test]
    fn empty_stage_has_zero_progress() {
        let rollup = stage_rollup(std::iter::empty());
        assert_eq!(rollup, StageRollup::default());
    }

    #[test]
    fn project_rollup_counts_overdue_and_on_track() {
        let now = Utc::now();
        let mut late = task("p", None, 1.0, TaskStatus::Todo);
        late.due_date = Some(now - Duration::hours(1));
        let mut late_done = task("p", None, 1.0, TaskStatus::Done);
        late_done.due_date = Some(now - Duration::hours(1));
        let active = task("p", Some("s"), 1.0, TaskStatus::InProgress);
        let idle = task("p", Some("s"), 1.0, TaskStatus::Backlog);

        let rollup = project_rollup(&[late, late_done, active, idle], now);
        assert_eq!(rollup.total_tasks, 4);
        assert_eq!(rollup.completed_tasks, 1);
        assert_eq!(rollup.incomplete_tasks, 3);
        assert_eq!(rollup.overdue_tasks, 1);
        assert_eq!(rollup.on_track_tasks, 2);
        assert_eq!(rollup.weighted_completed_hours, 1.75);
        assert_eq!(rollup.progress, 44);
    }

    #[test]
    fn upsert_stage_updates_in_place_or_appends() {
        let mut stages = vec![Stage::new("plan", "Plan"), Stage::new("build", "Build")];
        let rollup = StageRollup {
            total_tasks: 1,
            ..StageRollup::default()
        };

        assert_eq!(upsert_stage(&mut stages, "plan", rollup.clone()), StageUpsert::Updated);
        assert_eq!(stages[0].name, "Plan");
        assert_eq!(stages[0].rollup.total_tasks, 1);

        assert_eq!(upsert_stage(&mut stages, "qa", rollup), StageUpsert::Created);
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[2].id, "qa");
        assert_eq!(stages[2].name, "qa");
    }

    #[test]
    fn weighted_hours_never_exceed_total() {
        let statuses = [
            TaskStatus::Done,
            TaskStatus::InProgress,
            TaskStatus::Todo,
            TaskStatus::Backlog,
            TaskStatus::Unknown,
        ];
        let tasks: Vec<Task> = (0..50)
            .map(|i| task("p", Some("s"), (i as f64) * 0.37, statuses[i % statuses.len()]))
            .collect();
        let rollup = stage_rollup(&tasks);
        assert!(rollup.weighted_completed_hours <= rollup.total_hours);
        assert!(rollup.completed_tasks <= rollup.total_tasks);
        assert!(rollup.progress <= 100);
    }
}
