use tally::employee::Employee;
use tally::error::{exit_codes, Error, Result};
use tally::project::{Project, ProjectFields, Stage};
use tally::stats::{compute_statistics, load_statistics};
use tally::storage::Storage;
use tally::store::{AggregateStore, FileStore, MemoryStore};
use tally::task::{Task, TaskStatus};
use tempfile::TempDir;

fn project(id: &str, manager: Option<&str>, resources: &[&str]) -> Project {
    let mut project = Project::new(format!("Project {id}"));
    project.id = id.to_string();
    project.manager = manager.map(str::to_string);
    project.resources = resources.iter().map(|r| r.to_string()).collect();
    project
}

fn tasks(project_id: &str, statuses: &[TaskStatus]) -> Vec<Task> {
    statuses
        .iter()
        .map(|status| {
            let mut task = Task::new("t", project_id);
            task.status = *status;
            task
        })
        .collect()
}

#[test]
fn averages_follow_count_based_progress() {
    let projects = vec![project("a", None, &[]), project("b", None, &[]), project("c", None, &[])];
    let mut all = tasks("a", &[TaskStatus::Done, TaskStatus::Done]);
    all.extend(tasks("b", &[TaskStatus::Done, TaskStatus::Todo]));
    all.extend(tasks("c", &[TaskStatus::Backlog, TaskStatus::InProgress]));

    let snapshot = compute_statistics(&projects, &all, &[]);
    let progress: Vec<f64> = snapshot.projects.iter().map(|p| p.progress).collect();
    assert_eq!(progress, vec![100.0, 50.0, 0.0]);
    assert_eq!(snapshot.average_project_progress, 50.0);
    assert_eq!(snapshot.completed_projects, 1);
    assert_eq!(snapshot.project_completion_rate, 33.33);
    assert_eq!(snapshot.average_tasks_per_project, 2.0);
    assert_eq!(snapshot.task_statuses.done, 3);
    assert_eq!(snapshot.task_statuses.backlog, 1);
}

#[test]
fn empty_portfolio_has_zero_rates() {
    let snapshot = compute_statistics(&[], &[], &[]);
    assert_eq!(snapshot.total_projects, 0);
    assert_eq!(snapshot.average_project_progress, 0.0);
    assert_eq!(snapshot.project_completion_rate, 0.0);
    assert_eq!(snapshot.average_tasks_per_project, 0.0);
    assert!(snapshot.top_utilized_resources(3).is_empty());
}

#[test]
fn project_without_tasks_has_zero_progress() {
    let snapshot = compute_statistics(&[project("a", None, &[])], &[], &[]);
    assert_eq!(snapshot.projects[0].progress, 0.0);
    assert_eq!(snapshot.completed_projects, 0);
    assert!(snapshot.projects[0].on_track);
}

#[test]
fn top_resources_rank_by_utilization_with_stable_ties() {
    // A and B each appear in 4 of 10 projects, C in 1.
    let mut projects = Vec::new();
    for i in 0..10 {
        let id = format!("p{i}");
        let project = match i {
            0..=3 => project(&id, Some("A"), &["B"]),
            4 => project(&id, None, &["C"]),
            _ => project(&id, None, &[]),
        };
        projects.push(project);
    }

    let snapshot = compute_statistics(&projects, &[], &[]);
    let pct: Vec<(&str, f64)> = snapshot
        .resource_utilization
        .iter()
        .map(|r| (r.resource_id.as_str(), r.utilization_pct))
        .collect();
    assert_eq!(pct, vec![("A", 40.0), ("B", 40.0), ("C", 10.0)]);

    let top: Vec<&str> = snapshot
        .top_utilized_resources(2)
        .into_iter()
        .map(|r| r.resource_id.as_str())
        .collect();
    assert_eq!(top, vec!["A", "B"]);
    assert_eq!(snapshot.top_utilized_resources(10).len(), 3);
}

#[test]
fn utilization_carries_employee_details() {
    let projects = vec![project("p1", Some("emp-1"), &[]), project("p2", None, &[])];
    let employees = vec![Employee {
        id: "emp-1".to_string(),
        name: "Ada".to_string(),
        role: Some("lead".to_string()),
    }];

    let snapshot = compute_statistics(&projects, &[], &employees);
    let ada = &snapshot.resource_utilization[0];
    assert_eq!(ada.name.as_deref(), Some("Ada"));
    assert_eq!(ada.role.as_deref(), Some("lead"));
    assert_eq!(ada.utilization_pct, 50.0);
    assert_eq!(snapshot.total_employees, 1);
}

#[test]
fn load_statistics_reads_file_store() -> Result<()> {
    let temp = TempDir::new()?;
    let storage = Storage::for_root(temp.path().to_path_buf());
    storage.init()?;
    let store = FileStore::new(storage);

    store.upsert_project(project("p1", None, &[]))?;
    for task in tasks("p1", &[TaskStatus::Done, TaskStatus::Todo]) {
        store.upsert_task(task)?;
    }

    let snapshot = load_statistics(&store)?;
    assert_eq!(snapshot.total_projects, 1);
    assert_eq!(snapshot.total_tasks, 2);
    assert_eq!(snapshot.projects[0].progress, 50.0);
    Ok(())
}

#[test]
fn unreadable_store_makes_statistics_unavailable() -> Result<()> {
    let temp = TempDir::new()?;
    let storage = Storage::for_root(temp.path().to_path_buf());
    storage.init()?;
    std::fs::write(storage.tasks_file(), "not json")?;
    let store = FileStore::new(storage);

    let err = load_statistics(&store).expect_err("corrupt document");
    assert!(matches!(err, Error::StatisticsUnavailable(_)));
    assert_eq!(err.exit_code(), exit_codes::OPERATION_FAILED);
    Ok(())
}

#[test]
fn memory_store_statistics_ignore_stored_rollups() -> Result<()> {
    let store = MemoryStore::with_records(vec![project("p1", None, &[])], tasks("p1", &[TaskStatus::Done]), Vec::new());
    // Stale cached aggregates must not leak into count-based stats.
    store.replace_project_aggregates("p1", &[Stage::new("s", "S")], &ProjectFields::default())?;

    let snapshot = load_statistics(&store)?;
    assert_eq!(snapshot.projects[0].progress, 100.0);
    Ok(())
}
