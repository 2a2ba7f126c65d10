use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::contribution::{count_progress, weighted_hours, weighted_progress};
use crate::employee::Employee;
use crate::error::{Error, Result};
use crate::project::Project;
use crate::store::AggregateStore;
use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub backlog: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
    pub unknown: usize,
}

impl StatusCounts {
    fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Backlog => self.backlog += 1,
            TaskStatus::Todo => self.todo += 1,
            TaskStatus::InProgress => self.in_progress += 1,
            TaskStatus::Done => self.done += 1,
            TaskStatus::Unknown => self.unknown += 1,
        }
    }

    pub fn get(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Backlog => self.backlog,
            TaskStatus::Todo => self.todo,
            TaskStatus::InProgress => self.in_progress,
            TaskStatus::Done => self.done,
            TaskStatus::Unknown => self.unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProjectProgress {
    pub project_id: String,
    pub name: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// Task-count completion, not hour-weighted.
    pub progress: f64,
    pub total_hours: f64,
    pub weighted_completed_hours: f64,
    /// Same rule as the stored project rollup, computed from the input tasks.
    pub weighted_progress: u8,
    pub overdue_tasks: usize,
    pub on_track: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResourceUtilization {
    pub resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// +1 per project managed, +1 per project listing it as a resource.
    pub appearances: usize,
    /// Distinct projects the resource appears in.
    pub projects: usize,
    /// Share of all projects the resource appears in.
    pub utilization_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub generated_at: DateTime<Utc>,
    /// Distinct project ids; repeats of an id are counted in `duplicate_projects`.
    pub total_projects: usize,
    pub duplicate_projects: usize,
    pub on_track_projects: usize,
    pub off_track_projects: usize,
    pub completed_projects: usize,
    pub total_tasks: usize,
    pub orphaned_tasks: usize,
    pub task_statuses: StatusCounts,
    pub average_project_progress: f64,
    pub project_completion_rate: f64,
    pub average_tasks_per_project: f64,
    /// Hours over tasks attributed to a project.
    pub total_hours: f64,
    pub weighted_completed_hours: f64,
    pub weighted_progress: u8,
    pub total_employees: usize,
    pub projects: Vec<ProjectProgress>,
    /// In first-appearance order; unreferenced employees last.
    pub resource_utilization: Vec<ResourceUtilization>,
}

impl StatsSnapshot {
    /// The `n` most utilized resources, ties kept in mapping order.
    pub fn top_utilized_resources(&self, n: usize) -> Vec<&ResourceUtilization> {
        let mut ranked: Vec<&ResourceUtilization> = self.resource_utilization.iter().collect();
        ranked.sort_by(|left, right| right.utilization_pct.total_cmp(&left.utilization_pct));
        ranked.truncate(n);
        ranked
    }
}

#[derive(Debug, Default)]
struct ProjectTally {
    total: usize,
    completed: usize,
    overdue: usize,
    hours: f64,
    weighted: f64,
}

pub fn compute_statistics(projects: &[Project], tasks: &[Task], employees: &[Employee]) -> StatsSnapshot {
    compute_statistics_at(projects, tasks, employees, Utc::now())
}

pub fn compute_statistics_at(
    projects: &[Project],
    tasks: &[Task],
    employees: &[Employee],
    now: DateTime<Utc>,
) -> StatsSnapshot {
    let input_projects = projects.len();
    // First record of an id wins.
    let mut seen_ids = HashSet::new();
    let projects: Vec<&Project> = projects
        .iter()
        .filter(|project| seen_ids.insert(project.id.as_str()))
        .collect();
    let total_projects = projects.len();
    let duplicate_projects = input_projects - total_projects;

    let mut tallies: HashMap<&str, ProjectTally> = projects
        .iter()
        .map(|project| (project.id.as_str(), ProjectTally::default()))
        .collect();

    let mut task_statuses = StatusCounts::default();
    let mut orphaned_tasks = 0;
    for task in tasks {
        task_statuses.record(task.status);
        match tallies.get_mut(task.project_id.as_str()) {
            Some(tally) => {
                tally.total += 1;
                if task.status.is_done() {
                    tally.completed += 1;
                }
                if task.is_overdue(now) {
                    tally.overdue += 1;
                }
                tally.hours += task.hours();
                tally.weighted += weighted_hours(task);
            }
            None => orphaned_tasks += 1,
        }
    }

    let project_progress: Vec<ProjectProgress> = projects
        .iter()
        .map(|project| {
            let tally = tallies.remove(project.id.as_str()).unwrap_or_default();
            ProjectProgress {
                project_id: project.id.clone(),
                name: project.name.clone(),
                total_tasks: tally.total,
                completed_tasks: tally.completed,
                progress: count_progress(tally.completed, tally.total),
                total_hours: tally.hours,
                weighted_completed_hours: tally.weighted,
                weighted_progress: weighted_progress(tally.weighted, tally.hours),
                overdue_tasks: tally.overdue,
                on_track: tally.overdue == 0,
            }
        })
        .collect();

    let on_track_projects = project_progress.iter().filter(|p| p.on_track).count();
    let completed_projects = project_progress
        .iter()
        .filter(|p| p.progress >= 100.0)
        .count();
    let progress_sum: f64 = project_progress.iter().map(|p| p.progress).sum();
    let attributed_tasks = tasks.len() - orphaned_tasks;
    let total_hours: f64 = project_progress.iter().map(|p| p.total_hours).sum();
    let weighted_completed_hours: f64 = project_progress
        .iter()
        .map(|p| p.weighted_completed_hours)
        .sum();

    let resource_utilization = resource_utilization(&projects, employees);

    debug!(
        projects = total_projects,
        tasks = tasks.len(),
        orphaned_tasks,
        duplicate_projects,
        "computed statistics"
    );

    StatsSnapshot {
        generated_at: now,
        total_projects,
        duplicate_projects,
        on_track_projects,
        off_track_projects: total_projects - on_track_projects,
        completed_projects,
        total_tasks: tasks.len(),
        orphaned_tasks,
        task_statuses,
        average_project_progress: mean(progress_sum, total_projects),
        project_completion_rate: ratio_pct(completed_projects, total_projects),
        average_tasks_per_project: mean(attributed_tasks as f64, total_projects),
        total_hours,
        weighted_completed_hours,
        weighted_progress: weighted_progress(weighted_completed_hours, total_hours),
        total_employees: employees.len(),
        projects: project_progress,
        resource_utilization,
    }
}

/// Bulk-read everything and compute a snapshot.
///
/// Any failed read fails the whole snapshot.
pub fn load_statistics<S>(store: &S) -> Result<StatsSnapshot>
where
    S: AggregateStore + ?Sized,
{
    let unavailable = |err: Error| Error::StatisticsUnavailable(Box::new(err));
    let projects = store.list_all_projects().map_err(unavailable)?;
    let tasks = store.list_all_tasks().map_err(unavailable)?;
    let employees = store.list_all_employees().map_err(unavailable)?;
    Ok(compute_statistics(&projects, &tasks, &employees))
}

fn resource_utilization(projects: &[&Project], employees: &[Employee]) -> Vec<ResourceUtilization> {
    let employee_by_id: HashMap<&str, &Employee> = employees
        .iter()
        .map(|employee| (employee.id.as_str(), employee))
        .collect();

    let mut index_by_id: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<ResourceUtilization> = Vec::new();
    let mut entry_for = |resource_id: &str, entries: &mut Vec<ResourceUtilization>| -> usize {
        *index_by_id.entry(resource_id.to_string()).or_insert_with(|| {
            let employee = employee_by_id.get(resource_id);
            entries.push(ResourceUtilization {
                resource_id: resource_id.to_string(),
                name: employee.map(|e| e.name.clone()).filter(|name| !name.is_empty()),
                role: employee.and_then(|e| e.role.clone()),
                appearances: 0,
                projects: 0,
                utilization_pct: 0.0,
            });
            entries.len() - 1
        })
    };

    for project in projects {
        let mut in_project: HashSet<&str> = HashSet::new();

        if let Some(manager) = project.manager_id() {
            let idx = entry_for(manager, &mut entries);
            entries[idx].appearances += 1;
            in_project.insert(manager);
        }

        let mut listed: HashSet<&str> = HashSet::new();
        for resource in project.resources.iter().map(|r| r.trim()) {
            if resource.is_empty() || !listed.insert(resource) {
                continue;
            }
            let idx = entry_for(resource, &mut entries);
            entries[idx].appearances += 1;
            in_project.insert(resource);
        }

        for resource in in_project {
            let idx = entry_for(resource, &mut entries);
            entries[idx].projects += 1;
        }
    }

    for employee in employees {
        entry_for(employee.id.as_str(), &mut entries);
    }

    let total_projects = projects.len();
    for entry in &mut entries {
        entry.utilization_pct = ratio_pct(entry.projects, total_projects);
    }
    entries
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        round2(sum / count as f64)
    }
}

fn ratio_pct(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        round2(numerator as f64 / denominator as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
