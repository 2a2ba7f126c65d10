//! tally recompute command implementation.

use std::path::PathBuf;

use crate::cli::{load_context, push_rollup_outcome};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::rollup::{recompute_project, RollupOutcome};

pub struct RecomputeOptions {
    pub project: String,
    pub root: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

pub fn run(options: RecomputeOptions) -> Result<()> {
    let ctx = load_context(options.root)?;
    let outcome = recompute_project(&ctx.store, &options.project)?;
    let report = match &outcome {
        RollupOutcome::Applied(report) => report,
        RollupOutcome::ProjectNotFound { project_id } => {
            return Err(Error::ProjectNotFound(project_id.clone()));
        }
    };

    let mut human = HumanOutput::new(format!("Recomputed {}", report.project_id));
    human.push_summary("progress", format!("{}%", report.fields.rollup.progress));
    human.push_summary("stages", report.stages.len().to_string());
    if let Some(current) = &report.fields.current_stage {
        human.push_summary("current stage", current.clone());
    }
    push_rollup_outcome(&mut human, &outcome);

    emit_success(
        OutputOptions {
            json: options.json,
            quiet: options.quiet,
        },
        "recompute",
        &outcome,
        Some(&human),
    )
}
