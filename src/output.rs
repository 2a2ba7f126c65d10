//! Output for tally CLI commands.
//!
//! With `--json` every command prints one envelope on stdout:
//!
//! ```text
//! { "schema_version": "tally.v1", "command": "task add", "status": "success",
//!   "data": { ... }, "warnings": [...], "next_steps": [...] }
//! ```
//!
//! Failures use the same envelope with `"status": "error"` and an `error`
//! object in place of `data`. Without `--json`, commands render a
//! [`HumanOutput`] unless `--quiet` is set; errors always go to stderr.

use std::fmt;

use serde::Serialize;

use crate::error::{exit_codes, Error, Result};

pub const SCHEMA_VERSION: &str = "tally.v1";

/// Top-level commands that take a subcommand, reported as `"group sub"`.
const COMMAND_GROUPS: [&str; 3] = ["project", "employee", "task"];

/// Global flags whose value is a separate argument.
const VALUE_FLAGS: [&str; 1] = ["--root"];

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Human-readable rendering of a command result.
#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, line: impl Into<String>) {
        self.details.push(line.into());
    }

    pub fn push_warning(&mut self, line: impl Into<String>) {
        self.warnings.push(line.into());
    }

    pub fn push_next_step(&mut self, line: impl Into<String>) {
        self.next_steps.push(line.into());
    }
}

impl fmt::Display for HumanOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header)?;

        if !self.summary.is_empty() {
            f.write_str("\n\nSummary:")?;
            for (key, value) in &self.summary {
                if value.is_empty() {
                    write!(f, "\n- {key}")?;
                } else {
                    write!(f, "\n- {key}: {value}")?;
                }
            }
        }

        let sections = [
            ("Details", &self.details),
            ("Warnings", &self.warnings),
            ("Next steps", &self.next_steps),
        ];
        for (title, lines) in sections {
            if lines.is_empty() {
                continue;
            }
            write!(f, "\n\n{title}:")?;
            for line in lines {
                write!(f, "\n- {line}")?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Success,
    Error,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        let kind = if err.exit_code() == exit_codes::USER_ERROR {
            "user_error"
        } else {
            "operation_failed"
        };
        Self {
            message: err.to_string(),
            code: err.exit_code(),
            kind,
            details: err.details(),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "no_lines")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "no_lines")]
    next_steps: &'a [String],
}

fn no_lines(lines: &&[String]) -> bool {
    lines.is_empty()
}

impl<T: Serialize> Envelope<'_, T> {
    fn print(&self) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    match (options.json, human) {
        (true, human) => {
            let (warnings, next_steps): (&[String], &[String]) = match human {
                Some(human) => (&human.warnings, &human.next_steps),
                None => (&[], &[]),
            };
            Envelope {
                schema_version: SCHEMA_VERSION,
                command,
                status: Status::Success,
                data: Some(data),
                error: None,
                warnings,
                next_steps,
            }
            .print()
        }
        (false, Some(human)) if !options.quiet => {
            println!("{human}");
            Ok(())
        }
        (false, _) => Ok(()),
    }
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let hint = recovery_hint(err);

    if json {
        let next_steps: Vec<String> = hint.into_iter().collect();
        return Envelope::<()> {
            schema_version: SCHEMA_VERSION,
            command,
            status: Status::Error,
            data: None,
            error: Some(ErrorBody::from(err)),
            warnings: &[],
            next_steps: &next_steps,
        }
        .print();
    }

    eprintln!("error: {err}");
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

/// Command name for error envelopes, read from the raw process arguments
/// since argument parsing may be what failed.
pub fn infer_command_name_from_args() -> String {
    command_name_from(std::env::args().skip(1))
}

fn command_name_from(args: impl IntoIterator<Item = String>) -> String {
    let mut positional = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            args.next();
        } else if !arg.starts_with('-') {
            positional.push(arg);
        }
    }

    match positional.as_slice() {
        [] => "tally".to_string(),
        [group, sub, ..] if COMMAND_GROUPS.contains(&group.as_str()) => format!("{group} {sub}"),
        [command, ..] => command.clone(),
    }
}

fn recovery_hint(err: &Error) -> Option<String> {
    let hint = match err {
        Error::PersistenceWriteFailed { project_id, .. } => format!("tally recompute {project_id}"),
        Error::ProjectNotFound(_) => "tally project list".to_string(),
        Error::TaskNotFound(_) => "tally task list".to_string(),
        Error::NotInitialized(_) => "tally init".to_string(),
        Error::InvalidConfig(_) => "fix .tally.toml then retry".to_string(),
        Error::LockFailed(_) => "retry once the other writer finishes".to_string(),
        _ => return None,
    };
    Some(hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn command_name_includes_subcommand_for_groups() {
        assert_eq!(command_name_from(args(&["--json", "task", "add", "x"])), "task add");
        assert_eq!(command_name_from(args(&["stats", "--top", "3"])), "stats");
        assert_eq!(command_name_from(args(&["task"])), "task");
        assert_eq!(command_name_from(args(&[])), "tally");
        assert_eq!(
            command_name_from(args(&["--root", "/tmp/ws", "project", "show", "p1"])),
            "project show"
        );
    }

    #[test]
    fn human_output_skips_empty_sections() {
        let mut human = HumanOutput::new("tally stats");
        human.push_summary("projects", "3");
        human.push_warning("1 orphaned task");

        assert_eq!(
            human.to_string(),
            "tally stats\n\nSummary:\n- projects: 3\n\nWarnings:\n- 1 orphaned task"
        );
        assert_eq!(HumanOutput::new("tally init: nothing to do").to_string(), "tally init: nothing to do");
    }

    #[test]
    fn error_body_classifies_by_exit_code() {
        let missing = ErrorBody::from(&Error::ProjectNotFound("p9".to_string()));
        assert_eq!(missing.kind, "user_error");
        assert_eq!(missing.code, exit_codes::USER_ERROR);
        assert_eq!(missing.details.expect("details")["project_id"], "p9");

        let write = Error::PersistenceWriteFailed {
            project_id: "web".to_string(),
            reason: "disk full".to_string(),
        };
        assert_eq!(ErrorBody::from(&write).kind, "operation_failed");
        assert_eq!(recovery_hint(&write).as_deref(), Some("tally recompute web"));
        assert!(recovery_hint(&Error::InvalidArgument("x".to_string())).is_none());
    }
}
