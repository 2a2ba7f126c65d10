//! Persistence interface consumed by the aggregation engine.
//!
//! The engine only needs per-project task scans, project lookup, a single
//! aggregate replace, and bulk reads. [`FileStore`] backs the CLI;
//! [`MemoryStore`] is for embedding and tests.

use std::sync::{Mutex, MutexGuard};

use crate::employee::Employee;
use crate::error::{Error, Result};
use crate::project::{Project, ProjectFields, Stage};
use crate::storage::Storage;
use crate::task::Task;

/// Record store the rollup recomputer and statistics loader run against.
pub trait AggregateStore {
    /// Every task whose `project_id` equals `project_id`.
    fn list_tasks_by_project(&self, project_id: &str) -> Result<Vec<Task>>;

    fn get_project(&self, project_id: &str) -> Result<Option<Project>>;

    /// Replace the stage list and project-level derived fields in one write.
    fn replace_project_aggregates(
        &self,
        project_id: &str,
        stages: &[Stage],
        fields: &ProjectFields,
    ) -> Result<()>;

    fn list_all_projects(&self) -> Result<Vec<Project>>;

    fn list_all_tasks(&self) -> Result<Vec<Task>>;

    fn list_all_employees(&self) -> Result<Vec<Employee>>;
}

// =============================================================================
// File-backed store
// =============================================================================

#[derive(Debug, Clone)]
pub struct FileStore {
    storage: Storage,
}

impl FileStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        let tasks: Vec<Task> = self.storage.read_records(&self.storage.tasks_file())?;
        Ok(tasks.into_iter().find(|task| task.id == task_id))
    }

    /// Insert or replace a task, returning the previous version.
    pub fn upsert_task(&self, task: Task) -> Result<Option<Task>> {
        self.storage
            .update_records(&self.storage.tasks_file(), |tasks: &mut Vec<Task>| {
                Ok(upsert_by(tasks, task, |t| t.id.as_str()))
            })
    }

    pub fn delete_task(&self, task_id: &str) -> Result<Task> {
        self.storage
            .update_records(&self.storage.tasks_file(), |tasks: &mut Vec<Task>| {
                let index = tasks
                    .iter()
                    .position(|task| task.id == task_id)
                    .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
                Ok(tasks.remove(index))
            })
    }

    pub fn upsert_project(&self, project: Project) -> Result<Option<Project>> {
        self.storage
            .update_records(&self.storage.projects_file(), |projects: &mut Vec<Project>| {
                Ok(upsert_by(projects, project, |p| p.id.as_str()))
            })
    }

    pub fn upsert_employee(&self, employee: Employee) -> Result<Option<Employee>> {
        self.storage
            .update_records(&self.storage.employees_file(), |employees: &mut Vec<Employee>| {
                Ok(upsert_by(employees, employee, |e| e.id.as_str()))
            })
    }
}

impl AggregateStore for FileStore {
    fn list_tasks_by_project(&self, project_id: &str) -> Result<Vec<Task>> {
        let tasks: Vec<Task> = self
            .storage
            .read_records_lenient(&self.storage.tasks_file())?;
        Ok(tasks
            .into_iter()
            .filter(|task| task.project_id == project_id)
            .collect())
    }

    fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        let projects: Vec<Project> = self.storage.read_records(&self.storage.projects_file())?;
        Ok(projects.into_iter().find(|project| project.id == project_id))
    }

    fn replace_project_aggregates(
        &self,
        project_id: &str,
        stages: &[Stage],
        fields: &ProjectFields,
    ) -> Result<()> {
        self.storage
            .update_records(&self.storage.projects_file(), |projects: &mut Vec<Project>| {
                let project = projects
                    .iter_mut()
                    .find(|project| project.id == project_id)
                    .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;
                project.apply_aggregates(stages, fields);
                Ok(())
            })
    }

    fn list_all_projects(&self) -> Result<Vec<Project>> {
        self.storage
            .read_records_lenient(&self.storage.projects_file())
    }

    fn list_all_tasks(&self) -> Result<Vec<Task>> {
        self.storage.read_records_lenient(&self.storage.tasks_file())
    }

    fn list_all_employees(&self) -> Result<Vec<Employee>> {
        self.storage
            .read_records_lenient(&self.storage.employees_file())
    }
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    projects: Vec<Project>,
    tasks: Vec<Task>,
    employees: Vec<Employee>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(projects: Vec<Project>, tasks: Vec<Task>, employees: Vec<Employee>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                projects,
                tasks,
                employees,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn upsert_task(&self, task: Task) -> Option<Task> {
        upsert_by(&mut self.state().tasks, task, |t| t.id.as_str())
    }

    pub fn delete_task(&self, task_id: &str) -> Option<Task> {
        let mut state = self.state();
        let index = state.tasks.iter().position(|task| task.id == task_id)?;
        Some(state.tasks.remove(index))
    }

    pub fn upsert_project(&self, project: Project) -> Option<Project> {
        upsert_by(&mut self.state().projects, project, |p| p.id.as_str())
    }

    pub fn upsert_employee(&self, employee: Employee) -> Option<Employee> {
        upsert_by(&mut self.state().employees, employee, |e| e.id.as_str())
    }
}

impl AggregateStore for MemoryStore {
    fn list_tasks_by_project(&self, project_id: &str) -> Result<Vec<Task>> {
        Ok(self
            .state()
            .tasks
            .iter()
            .filter(|task| task.project_id == project_id)
            .cloned()
            .collect())
    }

    fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        Ok(self
            .state()
            .projects
            .iter()
            .find(|project| project.id == project_id)
            .cloned())
    }

    fn replace_project_aggregates(
        &self,
        project_id: &str,
        stages: &[Stage],
        fields: &ProjectFields,
    ) -> Result<()> {
        let mut state = self.state();
        let project = state
            .projects
            .iter_mut()
            .find(|project| project.id == project_id)
            .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;
        project.apply_aggregates(stages, fields);
        Ok(())
    }

    fn list_all_projects(&self) -> Result<Vec<Project>> {
        Ok(self.state().projects.clone())
    }

    fn list_all_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.state().tasks.clone())
    }

    fn list_all_employees(&self) -> Result<Vec<Employee>> {
        Ok(self.state().employees.clone())
    }
}

/// Replace the record with the same key in place, or append it.
fn upsert_by<T, F>(records: &mut Vec<T>, record: T, key: F) -> Option<T>
where
    F: Fn(&T) -> &str,
{
    match records.iter().position(|existing| key(existing) == key(&record)) {
        Some(index) => Some(std::mem::replace(&mut records[index], record)),
        None => {
            records.push(record);
            None
        }
    }
}
