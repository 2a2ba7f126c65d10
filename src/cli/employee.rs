//! tally employee command implementations.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::{load_context, non_blank};
use crate::employee::Employee;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::store::AggregateStore;

pub struct AddOptions {
    pub name: String,
    pub id: Option<String>,
    pub role: Option<String>,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Serialize)]
struct EmployeeListOutput {
    total: usize,
    employees: Vec<Employee>,
}

pub fn run_add(options: AddOptions) -> Result<()> {
    let name = non_blank("employee name", &options.name)?;
    let ctx = load_context(options.root)?;

    let role = options
        .role
        .map(|role| role.trim().to_string())
        .filter(|role| !role.is_empty());
    let mut employee = Employee::new(name, role);
    if let Some(id) = options.id {
        employee.id = non_blank("employee id", &id)?;
    }

    let exists = ctx
        .store
        .list_all_employees()?
        .iter()
        .any(|existing| existing.id == employee.id);
    if exists {
        return Err(Error::InvalidArgument(format!(
            "employee already exists: {}",
            employee.id
        )));
    }
    ctx.store.upsert_employee(employee.clone())?;

    let mut human = HumanOutput::new("Employee added");
    human.push_summary("id", employee.id.clone());
    human.push_summary("name", employee.name.clone());
    if let Some(role) = &employee.role {
        human.push_summary("role", role.clone());
    }

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "employee add",
        &employee,
        Some(&human),
    )
}

pub fn run_list(root: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let ctx = load_context(root)?;
    let employees = ctx.store.list_all_employees()?;

    let mut human = HumanOutput::new(format!("Employees ({})", employees.len()));
    for employee in &employees {
        match &employee.role {
            Some(role) => human.push_detail(format!("{} {} [{role}]", employee.id, employee.name)),
            None => human.push_detail(format!("{} {}", employee.id, employee.name)),
        }
    }

    emit_success(
        OutputOptions { json, quiet },
        "employee list",
        &EmployeeListOutput {
            total: employees.len(),
            employees,
        },
        Some(&human),
    )
}
