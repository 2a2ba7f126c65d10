//! Status-weighted contribution of a task to completed effort.
//!
//! Both the rollup recomputer and the statistics pass go through
//! [`contribution`]; neither keeps its own status table.

use crate::task::{Task, TaskStatus};

/// Fraction of a task's estimated hours that counts as delivered.
pub fn contribution(status: TaskStatus) -> f64 {
    match status {
        TaskStatus::Done => 1.0,
        TaskStatus::InProgress => 0.5,
        TaskStatus::Todo => 0.25,
        TaskStatus::Backlog | TaskStatus::Unknown => 0.0,
    }
}

/// Delivered hours for one task.
pub fn weighted_hours(task: &Task) -> f64 {
    task.hours() * contribution(task.status)
}

/// Hour-weighted completion percentage, rounded to an integer in 0..=100.
///
/// Zero total hours yields 0.
pub fn weighted_progress(weighted_hours: f64, total_hours: f64) -> u8 {
    if total_hours <= 0.0 || !total_hours.is_finite() {
        return 0;
    }
    let pct = (100.0 * weighted_hours / total_hours).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Task-count completion percentage, unrounded.
///
/// Used by the statistics pass; rollups use [`weighted_progress`].
pub fn count_progress(completed_tasks: usize, total_tasks: usize) -> f64 {
    if total_tasks == 0 {
        return 0.0;
    }
    completed_tasks as f64 / total_tasks as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_status_weights() {
        assert_eq!(contribution(TaskStatus::Done), 1.0);
        assert_eq!(contribution(TaskStatus::InProgress), 0.5);
        assert_eq!(contribution(TaskStatus::Todo), 0.25);
        assert_eq!(contribution(TaskStatus::Backlog), 0.0);
        assert_eq!(contribution(TaskStatus::Unknown), 0.0);
    }

    #[test]
    fn contribution_is_monotonic_over_workflow() {
        let factors: Vec<f64> = TaskStatus::KNOWN.iter().map(|s| contribution(*s)).collect();
        assert!(factors.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(factors.iter().all(|f| (0.0..=1.0).contains(f)));
    }

    #[test]
    fn zero_duration_contributes_nothing() {
        let mut task = Task::new("Spike", "p1");
        task.status = TaskStatus::Done;
        assert_eq!(weighted_hours(&task), 0.0);
        assert_eq!(weighted_progress(0.0, 0.0), 0);
    }

    #[test]
    fn weighted_progress_rounds_half_up() {
        assert_eq!(weighted_progress(4.0, 10.0), 40);
        assert_eq!(weighted_progress(1.0, 3.0), 33);
        assert_eq!(weighted_progress(2.0, 3.0), 67);
        assert_eq!(weighted_progress(1.0, 8.0), 13);
        assert_eq!(weighted_progress(10.0, 10.0), 100);
    }

    #[test]
    fn count_progress_handles_empty() {
        assert_eq!(count_progress(0, 0), 0.0);
        assert_eq!(count_progress(1, 2), 50.0);
        assert_eq!(count_progress(3, 3), 100.0);
    }
}
