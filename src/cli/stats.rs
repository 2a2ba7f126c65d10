//! tally stats command implementation.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::{format_hours, load_context};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::stats::{load_statistics, ResourceUtilization, StatsSnapshot};

pub struct StatsOptions {
    pub top: Option<usize>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    #[serde(flatten)]
    snapshot: &'a StatsSnapshot,
    top_resources: Vec<&'a ResourceUtilization>,
}

pub fn run(options: StatsOptions) -> Result<()> {
    if options.top == Some(0) {
        return Err(Error::InvalidArgument("--top must be > 0".to_string()));
    }
    let ctx = load_context(options.root)?;
    let top = options.top.unwrap_or(ctx.config.stats.top_resources);

    let snapshot = load_statistics(&ctx.store)?;
    let output = StatsOutput {
        snapshot: &snapshot,
        top_resources: snapshot.top_utilized_resources(top),
    };

    let mut human = HumanOutput::new("tally stats");
    human.push_summary(
        "projects",
        format!(
            "{} ({} on track, {} off track, {} complete)",
            snapshot.total_projects,
            snapshot.on_track_projects,
            snapshot.off_track_projects,
            snapshot.completed_projects
        ),
    );
    human.push_summary(
        "tasks",
        format!(
            "{} (backlog {}, todo {}, in progress {}, done {})",
            snapshot.total_tasks,
            snapshot.task_statuses.backlog,
            snapshot.task_statuses.todo,
            snapshot.task_statuses.in_progress,
            snapshot.task_statuses.done
        ),
    );
    human.push_summary(
        "average progress",
        format!("{:.2}%", snapshot.average_project_progress),
    );
    human.push_summary(
        "completion rate",
        format!("{:.2}%", snapshot.project_completion_rate),
    );
    human.push_summary(
        "weighted progress",
        format!(
            "{}% ({} of {} hours)",
            snapshot.weighted_progress,
            format_hours(snapshot.weighted_completed_hours),
            format_hours(snapshot.total_hours)
        ),
    );
    human.push_summary(
        "tasks per project",
        format!("{:.2}", snapshot.average_tasks_per_project),
    );
    human.push_summary("employees", snapshot.total_employees.to_string());

    for resource in &output.top_resources {
        let label = resource.name.as_deref().unwrap_or(resource.resource_id.as_str());
        human.push_detail(format!(
            "{label}: {:.2}% ({} of {} projects)",
            resource.utilization_pct, resource.projects, snapshot.total_projects
        ));
    }

    if snapshot.task_statuses.unknown > 0 {
        human.push_warning(format!(
            "{} task(s) with unrecognized status",
            snapshot.task_statuses.unknown
        ));
    }
    if snapshot.duplicate_projects > 0 {
        human.push_warning(format!(
            "{} project record(s) repeat an existing id and were skipped",
            snapshot.duplicate_projects
        ));
    }
    if snapshot.orphaned_tasks > 0 {
        human.push_warning(format!(
            "{} task(s) reference missing projects",
            snapshot.orphaned_tasks
        ));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "stats",
        &output,
        Some(&human),
    )
}
