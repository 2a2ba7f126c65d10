//! Command-line interface for tally
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::HumanOutput;
use crate::rollup::{RollupOutcome, StageUpsert};
use crate::storage::Storage;
use crate::store::FileStore;

mod employee;
mod init;
mod project;
mod recompute;
mod stats;
mod task;

/// tally - hierarchical progress aggregation
///
/// Tracks projects, their stages and tasks, keeps stage and project
/// progress in sync with task status, and reports portfolio statistics.
#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Workspace root holding `.tally.toml` (defaults to current directory)
    #[arg(long, global = true, env = "TALLY_ROOT")]
    pub root: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create `.tally.toml` and the record store
    Init,

    /// Project management
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Employee management
    #[command(subcommand)]
    Employee(EmployeeCommands),

    /// Task management (writes trigger rollup recomputation)
    #[command(subcommand)]
    Task(TaskCommands),

    /// Recompute every stage and the totals of one project
    Recompute {
        /// Project ID
        project: String,
    },

    /// Portfolio statistics and resource utilization
    Stats {
        /// Number of most utilized resources to show
        #[arg(long)]
        top: Option<usize>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Add a project
    Add {
        /// Project name
        name: String,

        /// Explicit project ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Manager employee ID
        #[arg(long)]
        manager: Option<String>,

        /// Resource employee ID (repeatable)
        #[arg(long = "resource")]
        resources: Vec<String>,

        /// Stage as `id` or `id:Name` (repeatable, in order)
        #[arg(long = "stage")]
        stages: Vec<String>,
    },

    /// Show a project with its stages and rollups
    Show {
        /// Project ID
        id: String,
    },

    /// List projects
    List,
}

#[derive(Subcommand, Debug)]
pub enum EmployeeCommands {
    /// Add an employee
    Add {
        /// Employee name
        name: String,

        /// Explicit employee ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Role label
        #[arg(long)]
        role: Option<String>,
    },

    /// List employees
    List,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Add a task
    Add {
        /// Task title
        title: String,

        /// Owning project ID
        #[arg(long)]
        project: String,

        /// Explicit task ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Stage ID within the project
        #[arg(long)]
        stage: Option<String>,

        /// Status: backlog, todo, inProgress, done
        #[arg(long, default_value = "backlog")]
        status: String,

        /// Estimated duration in hours
        #[arg(long, default_value_t = 0.0)]
        hours: f64,

        /// Due date (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        /// Assignee employee ID
        #[arg(long)]
        assignee: Option<String>,
    },

    /// Update a task
    Update {
        /// Task ID
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// Move to another project
        #[arg(long)]
        project: Option<String>,

        /// Move to another stage
        #[arg(long, conflicts_with = "clear_stage")]
        stage: Option<String>,

        /// Remove the stage assignment
        #[arg(long)]
        clear_stage: bool,

        /// New status
        #[arg(long)]
        status: Option<String>,

        /// New estimated duration in hours
        #[arg(long)]
        hours: Option<f64>,

        /// New due date (RFC 3339 or YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,

        /// New assignee employee ID
        #[arg(long, conflicts_with = "clear_assignee")]
        assignee: Option<String>,

        /// Remove the assignee
        #[arg(long)]
        clear_assignee: bool,
    },

    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },

    /// List tasks
    List {
        /// Only tasks of this project
        #[arg(long)]
        project: Option<String>,

        /// Only tasks with this status
        #[arg(long)]
        status: Option<String>,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => init::run(self.root, self.json, self.quiet),
            Commands::Project(cmd) => match cmd {
                ProjectCommands::Add {
                    name,
                    id,
                    manager,
                    resources,
                    stages,
                } => project::run_add(project::AddOptions {
                    name,
                    id,
                    manager,
                    resources,
                    stages,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                ProjectCommands::Show { id } => project::run_show(project::ShowOptions {
                    id,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                ProjectCommands::List => project::run_list(self.root, self.json, self.quiet),
            },
            Commands::Employee(cmd) => match cmd {
                EmployeeCommands::Add { name, id, role } => {
                    employee::run_add(employee::AddOptions {
                        name,
                        id,
                        role,
                        root: self.root,
                        json: self.json,
                        quiet: self.quiet,
                    })
                }
                EmployeeCommands::List => employee::run_list(self.root, self.json, self.quiet),
            },
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    title,
                    project,
                    id,
                    stage,
                    status,
                    hours,
                    due,
                    assignee,
                } => task::run_add(task::AddOptions {
                    title,
                    project,
                    id,
                    stage,
                    status,
                    hours,
                    due,
                    assignee,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TaskCommands::Update {
                    id,
                    title,
                    project,
                    stage,
                    clear_stage,
                    status,
                    hours,
                    due,
                    clear_due,
                    assignee,
                    clear_assignee,
                } => task::run_update(task::UpdateOptions {
                    id,
                    title,
                    project,
                    stage,
                    clear_stage,
                    status,
                    hours,
                    due,
                    clear_due,
                    assignee,
                    clear_assignee,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TaskCommands::Delete { id } => task::run_delete(task::DeleteOptions {
                    id,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
                TaskCommands::List { project, status } => task::run_list(task::ListOptions {
                    project,
                    status,
                    root: self.root,
                    json: self.json,
                    quiet: self.quiet,
                }),
            },
            Commands::Recompute { project } => recompute::run(recompute::RecomputeOptions {
                project,
                root: self.root,
                json: self.json,
                quiet: self.quiet,
            }),
            Commands::Stats { top } => stats::run(stats::StatsOptions {
                top,
                root: self.root,
                json: self.json,
                quiet: self.quiet,
            }),
        }
    }
}

/// Loaded workspace shared by every command except `init`.
struct Context {
    config: Config,
    store: FileStore,
}

fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()?),
    }
}

fn load_context(root: Option<PathBuf>) -> Result<Context> {
    let root = resolve_root(root)?;
    let config = Config::load_from_root(&root);
    let storage = Storage::from_config(&root, &config);
    if !storage.is_initialized() {
        return Err(Error::NotInitialized(storage.store_dir().to_path_buf()));
    }
    Ok(Context {
        config,
        store: FileStore::new(storage),
    })
}

fn non_blank(label: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(format!("{label} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn format_hours(hours: f64) -> String {
    format!("{hours:.1}h")
}

/// Summarize one rollup outcome for human output.
fn push_rollup_outcome(human: &mut HumanOutput, outcome: &RollupOutcome) {
    match outcome {
        RollupOutcome::Applied(report) => {
            for change in &report.stages {
                let created = match change.upsert {
                    StageUpsert::Created => " (created)",
                    StageUpsert::Updated => "",
                };
                human.push_detail(format!(
                    "stage {}{created}: {}% ({}/{} tasks)",
                    change.stage_id,
                    change.rollup.progress,
                    change.rollup.completed_tasks,
                    change.rollup.total_tasks
                ));
            }
            human.push_detail(format!(
                "project {}: {}% ({}/{} tasks, {} overdue)",
                report.project_id,
                report.fields.rollup.progress,
                report.fields.rollup.completed_tasks,
                report.fields.rollup.total_tasks,
                report.fields.rollup.overdue_tasks
            ));
        }
        RollupOutcome::ProjectNotFound { project_id } => {
            human.push_warning(format!("project {project_id} not found; rollups skipped"));
        }
    }
}
