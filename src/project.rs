//! Project and stage records.
//!
//! Stages are embedded in their project document. The rollup fields on both
//! are a cache over task records and are replaced wholesale on recompute.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

const PROJECT_ID_PREFIX: &str = "prj";

/// Derived totals for one stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageRollup {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub total_hours: f64,
    pub weighted_completed_hours: f64,
    /// Hour-weighted completion, 0..=100.
    pub progress: u8,
}

/// Derived totals for a whole project.
///
/// Computed over every task referencing the project, including tasks with no
/// stage, so these need not equal the sum over the project's stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectRollup {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub incomplete_tasks: usize,
    pub total_hours: f64,
    pub weighted_completed_hours: f64,
    /// Hour-weighted completion, 0..=100.
    pub progress: u8,
    pub overdue_tasks: usize,
    pub on_track_tasks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stage {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rollup: StageRollup,
}

impl Stage {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rollup: StageRollup::default(),
        }
    }

    /// Entry created when a task names a stage its project does not list.
    pub fn minimal(id: &str, rollup: StageRollup) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            rollup,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.rollup.progress >= 100
    }
}

/// Project-level fields written by one aggregate replace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectFields {
    pub rollup: ProjectRollup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Employee id of the project manager.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
    /// Employee ids assigned to the project.
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub rollup: ProjectRollup,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_project_id(),
            name: name.into(),
            manager: None,
            resources: Vec::new(),
            stages: Vec::new(),
            current_stage: None,
            rollup: ProjectRollup::default(),
        }
    }

    pub fn stage(&self, stage_id: &str) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.id == stage_id)
    }

    /// Manager id, treating blank values as absent.
    pub fn manager_id(&self) -> Option<&str> {
        self.manager
            .as_deref()
            .map(str::trim)
            .filter(|manager| !manager.is_empty())
    }

    /// Apply the output of an aggregate replace.
    pub fn apply_aggregates(&mut self, stages: &[Stage], fields: &ProjectFields) {
        self.stages = stages.to_vec();
        self.rollup = fields.rollup.clone();
        self.current_stage = fields.current_stage.clone();
    }

    pub fn fields(&self) -> ProjectFields {
        ProjectFields {
            rollup: self.rollup.clone(),
            current_stage: self.current_stage.clone(),
        }
    }
}

/// First stage, in list order, that is not yet complete; the last stage once
/// all are complete.
pub fn derive_current_stage(stages: &[Stage]) -> Option<String> {
    stages
        .iter()
        .find(|stage| !stage.is_complete())
        .or_else(|| stages.last())
        .map(|stage| stage.id.clone())
}

pub fn generate_project_id() -> String {
    format!("{}-{}", PROJECT_ID_PREFIX, Ulid::new().to_string().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_at(id: &str, progress: u8) -> Stage {
        Stage {
            id: id.to_string(),
            name: id.to_string(),
            rollup: StageRollup {
                progress,
                ..StageRollup::default()
            },
        }
    }

    #[test]
    fn current_stage_is_first_incomplete() {
        let stages = vec![stage_at("plan", 100), stage_at("build", 40), stage_at("ship", 0)];
        assert_eq!(derive_current_stage(&stages).as_deref(), Some("build"));
    }

    #[test]
    fn current_stage_is_last_when_all_complete() {
        let stages = vec![stage_at("plan", 100), stage_at("ship", 100)];
        assert_eq!(derive_current_stage(&stages).as_deref(), Some("ship"));
        assert_eq!(derive_current_stage(&[]), None);
    }

    #[test]
    fn missing_rollup_fields_default_to_zero() {
        let project: Project =
            serde_json::from_str(r#"{"id":"p1","stages":[{"id":"s1"}]}"#).unwrap();
        assert_eq!(project.rollup, ProjectRollup::default());
        assert_eq!(project.stages[0].rollup, StageRollup::default());
        assert!(project.resources.is_empty());
        assert!(project.manager_id().is_none());
    }

    #[test]
    fn apply_aggregates_replaces_stages_and_fields() {
        let mut project = Project::new("Website");
        project.stages.push(Stage::new("s1", "Design"));

        let stages = vec![Stage::minimal("s2", StageRollup::default())];
        let fields = ProjectFields {
            rollup: ProjectRollup {
                total_tasks: 3,
                ..ProjectRollup::default()
            },
            current_stage: Some("s2".to_string()),
        };
        project.apply_aggregates(&stages, &fields);

        assert_eq!(project.stages, stages);
        assert_eq!(project.fields(), fields);
    }
}
