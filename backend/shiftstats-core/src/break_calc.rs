// src/break_calc.rs
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::ValidationError;
use crate::model::{Assignment, ScheduledBreak, TaskType};
use crate::time_interval::Interval;

// --- Break Validation ---

/// Checks a scheduled break against the shift that contains it. Both are placed on the
/// shift's own timeline (shift start = day zero) so overnight shifts and breaks after
/// midnight compare correctly.
pub fn validate_break(shift: &Interval, brk: &ScheduledBreak) -> Result<Interval, ValidationError> {
    let brk = brk.interval().ok_or(ValidationError::BreakTimesMissing)?;

    let shift_start = shift.start.minutes();
    let shift_end = shift.wrapped_end();
    let break_start = shift.normalize(brk.start);
    let break_end = shift.normalize(brk.end);

    // A start before the shift wraps to the next day and lands past the shift end.
    if break_start < shift_start || break_start > shift_end || break_end > shift_end {
        return Err(ValidationError::BreakOutsideShiftRange {
            break_start: brk.start,
            break_end: brk.end,
            shift_start: shift.start,
            shift_end: shift.end,
        });
    }
    if break_end <= break_start {
        return Err(ValidationError::BreakEndNotAfterStart {
            break_start: brk.start,
            break_end: brk.end,
        });
    }

    debug!("Break {} accepted within shift {}", brk, shift);
    Ok(brk)
}

// --- Break Measurement ---

pub fn break_hours(brk: &Interval) -> Decimal {
    brk.hours()
}

/// Hours of the assignment's scheduled break, zero when it has none or its bounds are
/// incomplete.
pub fn scheduled_break_hours(assignment: &Assignment) -> Decimal {
    assignment
        .break_interval()
        .map(|b| break_hours(&b))
        .unwrap_or(Decimal::ZERO)
}

/// Break time counts as worked time only for hourly services, and only when the
/// caller asks for it. Shift-based services never count it.
pub fn break_counts_as_worked(task_type: &TaskType, include_breaks_hourly: bool) -> bool {
    task_type.is_hourly_service && include_breaks_hourly
}
