// src/shift_validation.rs
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::break_calc::validate_break;
use crate::error::ValidationError;
use crate::model::{
    normalize_assigned_users, Assignment, TaskKind, TaskType, TaskTypeId, Workday,
};
use crate::time_interval::Interval;

// --- Activity Windows ---

/// Time windows of the ACTIVITY assignments on a workday that have both ends set.
/// `exclude_id` leaves out the assignment being updated.
pub fn activity_windows(
    workday: &Workday,
    task_types: &HashMap<TaskTypeId, TaskType>,
    exclude_id: Option<&str>,
) -> Vec<Interval> {
    workday
        .assignments
        .iter()
        .filter(|a| exclude_id.map_or(true, |id| id.is_empty() || a.id != id))
        .filter(|a| match task_types.get(&a.task_type_id) {
            Some(task_type) => task_type.kind == TaskKind::Activity,
            None => {
                warn!(
                    "Workday {}: assignment {} references unknown task type {}",
                    workday.id, a.id, a.task_type_id
                );
                false
            }
        })
        .filter_map(Assignment::interval)
        .collect()
}

// --- Shift Window Check ---

/// Checks a shift against the activity windows of its workday.
///
/// Start and end are tested independently: each must fall inside *some* window, not
/// necessarily the same one. A shift running from inside one activity into the next
/// is accepted even if no single window covers it whole.
pub fn validate_shift_window(
    workday_id: &str,
    activities: &[Interval],
    shift: &Interval,
) -> Result<(), ValidationError> {
    if activities.is_empty() {
        return Err(ValidationError::NoActivityDefined {
            workday_id: workday_id.to_string(),
        });
    }

    let start_ok = activities.iter().any(|a| a.contains_point(shift.start));
    let end_ok = activities.iter().any(|a| a.contains_point(shift.end));

    match (start_ok, end_ok) {
        (true, true) => Ok(()),
        (false, false) => Err(ValidationError::CompletelyOutOfRange {
            start: shift.start,
            end: shift.end,
        }),
        (true, false) => Err(ValidationError::EndOutOfRange { end: shift.end }),
        (false, true) => Err(ValidationError::StartOutOfRange { start: shift.start }),
    }
}

// --- Assignment Write Check ---

/// Validates an assignment before it is created or updated on `workday`, returning the
/// normalized assignment to persist. Nothing is written on rejection.
pub fn validate_assignment(
    draft: Assignment,
    workday: &Workday,
    task_types: &HashMap<TaskTypeId, TaskType>,
) -> Result<Assignment, ValidationError> {
    let task_type =
        task_types
            .get(&draft.task_type_id)
            .ok_or_else(|| ValidationError::UnknownTaskType {
                task_type_id: draft.task_type_id.clone(),
            })?;

    if task_type.kind == TaskKind::Shift {
        let shift = draft.interval().ok_or(ValidationError::ShiftTimesMissing)?;
        if shift.is_empty() {
            return Err(ValidationError::EmptyShiftInterval {
                start: shift.start,
                end: shift.end,
            });
        }
        let activities = activity_windows(workday, task_types, Some(&draft.id));
        validate_shift_window(&workday.id, &activities, &shift)?;
    }

    if let Some(brk) = &draft.scheduled_break {
        let own = draft.interval().ok_or(ValidationError::BreakTimesMissing)?;
        validate_break(&own, brk)?;
    }

    debug!(
        "Assignment {} ({}) validated on workday {}",
        draft.id, task_type.name, workday.id
    );
    Ok(Assignment {
        workday_id: workday.id.clone(),
        assigned_users: normalize_assigned_users(draft.assigned_users),
        ..draft
    })
}
