// src/error.rs
use serde::Serialize;
use thiserror::Error;

use crate::time_interval::ClockTime;

// --- Error Types ---

/// Write-side validation failures. The read/aggregation path never produces these;
/// it degrades malformed data to "empty" and keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid time format '{value}': expected HH:MM with hours 00-23 and minutes 00-59")]
    InvalidTimeFormat { value: String },

    #[error("No activity with both start and end time is defined for workday {workday_id}")]
    NoActivityDefined { workday_id: String },

    #[error("Shift start {start} is not inside any activity window")]
    StartOutOfRange { start: ClockTime },

    #[error("Shift end {end} is not inside any activity window")]
    EndOutOfRange { end: ClockTime },

    #[error("Shift {start}-{end} is completely outside the activity windows")]
    CompletelyOutOfRange { start: ClockTime, end: ClockTime },

    #[error("Scheduled break is enabled but its start or end time is missing")]
    BreakTimesMissing,

    #[error("Break {break_start}-{break_end} is outside the shift range {shift_start}-{shift_end}")]
    BreakOutsideShiftRange {
        break_start: ClockTime,
        break_end: ClockTime,
        shift_start: ClockTime,
        shift_end: ClockTime,
    },

    #[error("Break end {break_end} must be after break start {break_start}")]
    BreakEndNotAfterStart {
        break_start: ClockTime,
        break_end: ClockTime,
    },

    #[error("Task type not found: {task_type_id}")]
    UnknownTaskType { task_type_id: String },

    #[error("Shift requires both a start and an end time")]
    ShiftTimesMissing,

    #[error("Shift {start}-{end} has zero length")]
    EmptyShiftInterval { start: ClockTime, end: ClockTime },
}

impl ValidationError {
    /// Stable machine-readable name of the failure, used by callers to map statuses.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::InvalidTimeFormat { .. } => "InvalidTimeFormat",
            ValidationError::NoActivityDefined { .. } => "NoActivityDefined",
            ValidationError::StartOutOfRange { .. } => "StartOutOfRange",
            ValidationError::EndOutOfRange { .. } => "EndOutOfRange",
            ValidationError::CompletelyOutOfRange { .. } => "CompletelyOutOfRange",
            ValidationError::BreakTimesMissing => "BreakTimesMissing",
            ValidationError::BreakOutsideShiftRange { .. } => "BreakOutsideShiftRange",
            ValidationError::BreakEndNotAfterStart { .. } => "BreakEndNotAfterStart",
            ValidationError::UnknownTaskType { .. } => "UnknownTaskType",
            ValidationError::ShiftTimesMissing => "ShiftTimesMissing",
            ValidationError::EmptyShiftInterval { .. } => "EmptyShiftInterval",
        }
    }

    pub fn rejection(&self) -> Rejection {
        Rejection {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// Structured rejection handed back to the write-side caller. Nothing is persisted
/// when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub kind: String,
    pub message: String,
}

impl From<ValidationError> for Rejection {
    fn from(err: ValidationError) -> Self {
        err.rejection()
    }
}
