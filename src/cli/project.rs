//! tally project command implementations.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::{format_hours, load_context, non_blank, push_rollup_outcome};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::project::{Project, Stage};
use crate::rollup::{recompute_project, RollupOutcome};
use crate::store::AggregateStore;

pub struct AddOptions {
    pub name: String,
    pub id: Option<String>,
    pub manager: Option<String>,
    pub resources: Vec<String>,
    pub stages: Vec<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub struct ShowOptions {
    pub id: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct ProjectAddOutput {
    project: Project,
    #[serde(skip_serializing_if = "Option::is_none")]
    rollup: Option<RollupOutcome>,
}

#[derive(Serialize)]
struct ProjectListOutput {
    total: usize,
    projects: Vec<Project>,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let name = options.name.trim();
    if name.is_empty() {
        return Err(Error::InvalidArgument("project name cannot be empty".to_string()));
    }
    let ctx = load_context(options.root)?;

    let mut project = Project::new(name);
    if let Some(id) = options.id {
        project.id = non_blank("project id", &id)?;
    }
    project.manager = options
        .manager
        .map(|manager| manager.trim().to_string())
        .filter(|manager| !manager.is_empty());
    project.resources = options
        .resources
        .iter()
        .map(|resource| resource.trim().to_string())
        .filter(|resource| !resource.is_empty())
        .collect();
    project.stages = parse_stages(&options.stages)?;

    if ctx.store.get_project(&project.id)?.is_some() {
        return Err(Error::InvalidArgument(format!(
            "project already exists: {}",
            project.id
        )));
    }
    ctx.store.upsert_project(project.clone())?;

    let mut human = HumanOutput::new("Project added");
    human.push_summary("id", project.id.clone());
    human.push_summary("name", project.name.clone());
    human.push_summary("stages", project.stages.len().to_string());
    // Tasks may already reference this id.
    let rollup = match recompute_project(&ctx.store, &project.id) {
        Ok(outcome) => {
            push_rollup_outcome(&mut human, &outcome);
            if outcome.report().is_some() {
                if let Some(stored) = ctx.store.get_project(&project.id)? {
                    project = stored;
                }
            }
            Some(outcome)
        }
        Err(err) => {
            human.push_warning(format!("rollup recompute failed: {err}"));
            human.push_next_step(format!("tally recompute {}", project.id));
            None
        }
    };
    human.push_next_step(format!("tally task add <title> --project {}", project.id));

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "project add",
        &ProjectAddOutput { project, rollup },
        Some(&human),
    )
}

pub fn run_show(options: ShowOptions) -> Result<()> {
    let ctx = load_context(options.root)?;
    let project = ctx
        .store
        .get_project(&options.id)?
        .ok_or_else(|| Error::ProjectNotFound(options.id.clone()))?;

    let mut human = HumanOutput::new(format!("Project {} ({})", project.name, project.id));
    human.push_summary("progress", format!("{}%", project.rollup.progress));
    human.push_summary(
        "tasks",
        format!(
            "{} total, {} done, {} overdue",
            project.rollup.total_tasks, project.rollup.completed_tasks, project.rollup.overdue_tasks
        ),
    );
    human.push_summary("hours", format_hours(project.rollup.total_hours));
    if let Some(manager) = project.manager_id() {
        human.push_summary("manager", manager.to_string());
    }
    if let Some(current) = &project.current_stage {
        human.push_summary("current stage", current.clone());
    }
    if !project.resources.is_empty() {
        human.push_summary("resources", project.resources.join(", "));
    }
    for stage in &project.stages {
        human.push_detail(format!(
            "{} ({}): {}% ({}/{} tasks, {})",
            stage.id,
            stage.name,
            stage.rollup.progress,
            stage.rollup.completed_tasks,
            stage.rollup.total_tasks,
            format_hours(stage.rollup.total_hours)
        ));
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "project show",
        &project,
        Some(&human),
    )
}

pub fn run_list(root: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let ctx = load_context(root)?;
    let projects = ctx.store.list_all_projects()?;

    let mut human = HumanOutput::new(format!("Projects ({})", projects.len()));
    for project in &projects {
        human.push_detail(format!(
            "{} {}: {}% ({} tasks)",
            project.id, project.name, project.rollup.progress, project.rollup.total_tasks
        ));
    }
    if projects.is_empty() {
        human.push_next_step("tally project add <name>");
    }

    emit_success(
        OutputOptions { json, quiet },
        "project list",
        &ProjectListOutput {
            total: projects.len(),
            projects,
        },
        Some(&human),
    )
}

/// Parse `id` or `id:Name` stage arguments, rejecting duplicate ids.
fn parse_stages(values: &[String]) -> Result<Vec<Stage>> {
    let mut stages: Vec<Stage> = Vec::with_capacity(values.len());
    for value in values {
        let (id, name) = match value.split_once(':') {
            Some((id, name)) => (id.trim(), name.trim()),
            None => (value.trim(), value.trim()),
        };
        let id = non_blank("stage id", id)?;
        if stages.iter().any(|stage| stage.id == id) {
            return Err(Error::InvalidArgument(format!("duplicate stage id: {id}")));
        }
        let name = if name.is_empty() { id.clone() } else { name.to_string() };
        stages.push(Stage::new(id, name));
    }
    Ok(stages)
}
