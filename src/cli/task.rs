//! tally task command implementations.
//!
//! Every write lands in the store first; rollups are recomputed afterwards and
//! their failures are reported as warnings on an otherwise successful command.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::cli::{format_hours, load_context, non_blank, push_rollup_outcome};
use crate::error::{Error, Result};
use crate::mutation::{apply_task_mutation, MutationReport, RollupFailure, TaskMutation};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::{AggregateStore, FileStore};
use crate::task::{AssigneeRef, Task, TaskStatus};

pub struct AddOptions {
    pub title: String,
    pub project: String,
    pub id: Option<String>,
    pub stage: Option<String>,
    pub status: String,
    pub hours: f64,
    pub due: Option<String>,
    pub assignee: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct UpdateOptions {
    pub id: String,
    pub title: Option<String>,
    pub project: Option<String>,
    pub stage: Option<String>,
    pub clear_stage: bool,
    pub status: Option<String>,
    pub hours: Option<f64>,
    pub due: Option<String>,
    pub clear_due: bool,
    pub assignee: Option<String>,
    pub clear_assignee: bool,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct DeleteOptions {
    pub id: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ListOptions {
    pub project: Option<String>,
    pub status: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct TaskChangeOutput<'a> {
    action: &'static str,
    task: &'a Task,
    #[serde(flatten)]
    mutation: &'a MutationReport,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<Task>,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let title = non_blank("task title", &options.title)?;
    let status = TaskStatus::parse(&options.status)?;
    let hours = parse_hours(options.hours)?;
    let due_date = parse_due(options.due.as_deref())?;
    let ctx = load_context(options.root)?;

    let mut task = Task::new(title, options.project.trim());
    if let Some(id) = options.id {
        task.id = non_blank("task id", &id)?;
    }
    task.stage_id = options.stage.filter(|stage| !stage.trim().is_empty());
    task.status = status;
    task.estimated_duration = hours;
    task.due_date = due_date;
    task.assignee = match options.assignee {
        Some(id) => Some(resolve_assignee(&ctx.store, &id)?),
        None => None,
    };
    task.validate()?;

    if ctx.store.get_task(&task.id)?.is_some() {
        return Err(Error::InvalidArgument(format!("task already exists: {}", task.id)));
    }
    ctx.store.upsert_task(task.clone())?;

    let mutation = TaskMutation::Created(task);
    emit_change(
        &ctx.store,
        &mutation,
        "created",
        "task add",
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
    )
}

pub fn run_update(options: UpdateOptions) -> Result<()> {
    let ctx = load_context(options.root)?;
    let previous = ctx
        .store
        .get_task(&options.id)?
        .ok_or_else(|| Error::TaskNotFound(options.id.clone()))?;

    let mut task = previous.clone();
    if let Some(title) = options.title {
        task.title = non_blank("task title", &title)?;
    }
    if let Some(project) = options.project {
        task.project_id = project.trim().to_string();
    }
    if options.clear_stage {
        task.stage_id = None;
    } else if let Some(stage) = options.stage {
        task.stage_id = Some(non_blank("stage id", &stage)?);
    }
    if let Some(status) = options.status {
        task.status = TaskStatus::parse(&status)?;
    }
    if let Some(hours) = options.hours {
        task.estimated_duration = parse_hours(hours)?;
    }
    if options.clear_due {
        task.due_date = None;
    } else if options.due.is_some() {
        task.due_date = parse_due(options.due.as_deref())?;
    }
    if options.clear_assignee {
        task.assignee = None;
    } else if let Some(id) = options.assignee {
        task.assignee = Some(resolve_assignee(&ctx.store, &id)?);
    }
    task.validate()?;

    let previous = ctx.store.upsert_task(task.clone())?.unwrap_or(previous);
    let mutation = TaskMutation::Updated {
        previous,
        current: task,
    };
    emit_change(
        &ctx.store,
        &mutation,
        "updated",
        "task update",
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
    )
}

pub fn run_delete(options: DeleteOptions) -> Result<()> {
    let ctx = load_context(options.root)?;
    let task = ctx.store.delete_task(&options.id)?;
    let mutation = TaskMutation::Deleted(task);
    emit_change(
        &ctx.store,
        &mutation,
        "deleted",
        "task delete",
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
    )
}

pub fn run_list(options: ListOptions) -> Result<()> {
    let status = options
        .status
        .as_deref()
        .map(TaskStatus::parse)
        .transpose()?;
    let ctx = load_context(options.root)?;

    let tasks: Vec<Task> = ctx
        .store
        .list_all_tasks()?
        .into_iter()
        .filter(|task| {
            options
                .project
                .as_deref()
                .map_or(true, |project| task.project_id == project)
        })
        .filter(|task| status.map_or(true, |status| task.status == status))
        .collect();

    let mut human = HumanOutput::new(format!("Tasks ({})", tasks.len()));
    for task in &tasks {
        let placement = match task.stage() {
            Some(stage) => format!("{}/{stage}", task.project_id),
            None => task.project_id.clone(),
        };
        human.push_detail(format!(
            "{} [{}] {} ({}, {})",
            task.id,
            task.status,
            task.title,
            placement,
            format_hours(task.hours())
        ));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "task list",
        &TaskListOutput {
            total: tasks.len(),
            tasks,
        },
        Some(&human),
    )
}

fn emit_change(
    store: &FileStore,
    mutation: &TaskMutation,
    action: &'static str,
    command: &str,
    options: OutputOptions,
) -> Result<()> {
    let report = apply_task_mutation(store, mutation);
    let task = mutation.task();

    let mut human = HumanOutput::new(format!("Task {action}"));
    human.push_summary("id", task.id.clone());
    human.push_summary("title", task.title.clone());
    human.push_summary("project", task.project_id.clone());
    if let Some(stage) = task.stage() {
        human.push_summary("stage", stage.to_string());
    }
    human.push_summary("status", task.status.to_string());
    human.push_summary("hours", format_hours(task.hours()));
    for outcome in &report.rollups {
        push_rollup_outcome(&mut human, outcome);
    }
    push_rollup_failures(&mut human, &report.failures);

    emit_success(
        options,
        command,
        &TaskChangeOutput {
            action,
            task,
            mutation: &report,
        },
        Some(&human),
    )
}

fn push_rollup_failures(human: &mut HumanOutput, failures: &[RollupFailure]) {
    for failure in failures {
        human.push_warning(format!("rollup failed: {}", failure.message));
        // A blank project id has nothing to recompute.
        if !failure.project_id.trim().is_empty() {
            human.push_next_step(format!("tally recompute {}", failure.project_id));
        }
    }
}

fn resolve_assignee(store: &FileStore, id: &str) -> Result<AssigneeRef> {
    let id = non_blank("assignee", id)?;
    let employee = store
        .list_all_employees()?
        .into_iter()
        .find(|employee| employee.id == id);
    Ok(match employee {
        Some(employee) => AssigneeRef {
            id: employee.id,
            name: Some(employee.name),
            role: employee.role,
        },
        None => AssigneeRef {
            id,
            name: None,
            role: None,
        },
    })
}

fn parse_hours(hours: f64) -> Result<f64> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(Error::InvalidArgument(format!(
            "hours must be a non-negative number, got {hours}"
        )));
    }
    Ok(hours)
}

/// Accept RFC 3339 timestamps or plain dates, which fall due at the end of
/// that day in UTC.
fn parse_due(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(value) = value.map(str::trim) else {
        return Ok(None);
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    let invalid = || Error::InvalidArgument(format!("invalid due date '{value}'"));
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid())?;
    let end_of_day = date.and_hms_opt(23, 59, 59).ok_or_else(invalid)?;
    Ok(Some(Utc.from_utc_datetime(&end_of_day)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parse_due_accepts_dates_and_timestamps() {
        let due = parse_due(Some("2024-03-01")).unwrap().unwrap();
        assert_eq!((due.year(), due.month(), due.day()), (2024, 3, 1));
        assert_eq!(due.hour(), 23);

        let due = parse_due(Some("2024-03-01T08:00:00+02:00")).unwrap().unwrap();
        assert_eq!(due.hour(), 6);

        assert!(parse_due(None).unwrap().is_none());
        assert!(matches!(
            parse_due(Some("next week")),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn blank_project_failure_has_no_recompute_hint() {
        let failure = |project_id: &str| RollupFailure {
            project_id: project_id.to_string(),
            message: "Malformed task t1: project_id is empty".to_string(),
            code: 2,
        };
        let mut human = HumanOutput::new("Task updated");
        push_rollup_failures(&mut human, &[failure(""), failure("web")]);

        let text = human.to_string();
        assert_eq!(text.matches("rollup failed").count(), 2);
        assert!(text.contains("- tally recompute web"));
        assert_eq!(text.matches("tally recompute").count(), 1);
    }

    #[test]
    fn parse_hours_rejects_negative() {
        assert_eq!(parse_hours(2.5).unwrap(), 2.5);
        assert!(parse_hours(-1.0).is_err());
        assert!(parse_hours(f64::NAN).is_err());
    }
}
