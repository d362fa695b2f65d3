// src/model.rs
use chrono::NaiveDate;
use rust_decimal::prelude::*;
use serde::de::DeserializeOwned;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

use crate::error::ValidationError;
use crate::time_interval::{ClockTime, Interval};

// --- Identifiers ---

pub type AssignmentId = String;
pub type WorkdayId = String;
pub type TaskTypeId = String;
pub type DutyId = String;
pub type UserId = String;
pub type CompanyId = String;
pub type EventId = String;

/// Duty key used when a participant has no known duty.
pub const UNSPECIFIED_DUTY: &str = "";

// Stored records use numeric ids in some places and string ids in others.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Number(i64),
}

impl From<IdRepr> for String {
    fn from(id: IdRepr) -> Self {
        match id {
            IdRepr::Text(s) => s,
            IdRepr::Number(n) => n.to_string(),
        }
    }
}

pub(crate) fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    IdRepr::deserialize(deserializer).map(String::from)
}

// Hours arrive as numbers or as numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum HoursRepr {
    Number(f64),
    Text(String),
}

fn de_opt_hours<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<HoursRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(HoursRepr::Number(h)) => Ok(Some(h)),
        Some(HoursRepr::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(HoursRepr::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid hoursWorked '{}'", s))),
    }
}

pub(crate) fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<IdRepr>::deserialize(deserializer)?
        .map(String::from)
        .filter(|id| !id.is_empty()))
}

// --- Reference Data ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Shift,
    Activity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskType {
    #[serde(deserialize_with = "de_id")]
    pub id: TaskTypeId,
    pub name: String,
    pub kind: TaskKind,
    /// `true`: raw hours are accounted. `false`: shifts plus overtime against `shift_hours`.
    #[serde(default)]
    pub is_hourly_service: bool,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub shift_hours: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Duty {
    #[serde(deserialize_with = "de_id")]
    pub id: DutyId,
    pub name: String,
    #[serde(default)]
    pub code: String,
}

// --- Assignment Sub-structures ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedUser {
    #[serde(deserialize_with = "de_id")]
    pub user_id: UserId,
    #[serde(default, alias = "mansionId", deserialize_with = "de_opt_id")]
    pub duty_id: Option<DutyId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonnelRequest {
    #[serde(alias = "mansionId", deserialize_with = "de_id")]
    pub duty_id: DutyId,
    #[serde(default)]
    pub count: u32,
}

/// Outcome of reading a list stored as JSON, possibly string-encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonList<T> {
    Missing,
    Malformed(String),
    Parsed(Vec<T>),
}

impl<T: DeserializeOwned> JsonList<T> {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => JsonList::Missing,
            Some(Value::String(s)) if s.trim().is_empty() => JsonList::Missing,
            Some(Value::String(s)) => match serde_json::from_str::<Vec<T>>(s) {
                Ok(items) => JsonList::Parsed(items),
                Err(e) => JsonList::Malformed(e.to_string()),
            },
            Some(array) if array.is_array() => match Vec::<T>::deserialize(array) {
                Ok(items) => JsonList::Parsed(items),
                Err(e) => JsonList::Malformed(e.to_string()),
            },
            Some(other) => JsonList::Malformed(format!("expected a list, found {}", other)),
        }
    }
}

impl<T> JsonList<T> {
    pub fn is_malformed(&self) -> bool {
        matches!(self, JsonList::Malformed(_))
    }

    /// Parsed items, or nothing when the field was missing or malformed.
    pub fn into_items(self) -> Vec<T> {
        match self {
            JsonList::Parsed(items) => items,
            JsonList::Missing | JsonList::Malformed(_) => Vec::new(),
        }
    }
}

/// Keeps the first binding per user.
pub fn normalize_assigned_users(users: Vec<AssignedUser>) -> Vec<AssignedUser> {
    let mut seen = HashSet::new();
    users
        .into_iter()
        .filter(|u| seen.insert(u.user_id.clone()))
        .collect()
}

// --- Raw Records (as stored) ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTimeEntry {
    #[serde(deserialize_with = "de_id")]
    pub user_id: UserId,
    #[serde(default)]
    pub actual_start_time: Option<String>,
    #[serde(default)]
    pub actual_end_time: Option<String>,
    #[serde(default, deserialize_with = "de_opt_hours")]
    pub hours_worked: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAssignment {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<AssignmentId>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub workday_id: Option<WorkdayId>,
    #[serde(deserialize_with = "de_id")]
    pub task_type_id: TaskTypeId,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub has_scheduled_break: bool,
    #[serde(default)]
    pub scheduled_break_start_time: Option<String>,
    #[serde(default)]
    pub scheduled_break_end_time: Option<String>,
    #[serde(default)]
    pub assigned_users: Option<Value>,
    #[serde(default)]
    pub personnel_requests: Option<Value>,
    /// Parsed entry by entry; see [`RawAssignment::time_entry_items`].
    #[serde(default)]
    pub time_entries: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWorkday {
    #[serde(deserialize_with = "de_id")]
    pub id: WorkdayId,
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub event_id: Option<EventId>,
    #[serde(default)]
    pub assignments: Vec<RawAssignment>,
}

// --- Typed Records ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub user_id: UserId,
    pub actual_start_time: Option<ClockTime>,
    pub actual_end_time: Option<ClockTime>,
    #[serde(with = "rust_decimal::serde::float")]
    pub hours_worked: Decimal,
}

impl TimeEntry {
    pub fn actual_interval(&self) -> Option<Interval> {
        Interval::from_bounds(self.actual_start_time, self.actual_end_time)
    }
}

/// Break bounds as entered; only present when the break flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledBreak {
    pub start: Option<ClockTime>,
    pub end: Option<ClockTime>,
}

impl ScheduledBreak {
    pub fn interval(&self) -> Option<Interval> {
        Interval::from_bounds(self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: AssignmentId,
    pub workday_id: WorkdayId,
    pub task_type_id: TaskTypeId,
    pub user_id: Option<UserId>,
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
    pub scheduled_break: Option<ScheduledBreak>,
    pub assigned_users: Vec<AssignedUser>,
    pub personnel_requests: Vec<PersonnelRequest>,
    pub time_entries: Vec<TimeEntry>,
}

impl RawAssignment {
    /// Time entries that deserialize; a bad entry is logged and skipped without
    /// touching its siblings.
    pub fn time_entry_items(&self) -> Vec<RawTimeEntry> {
        lenient_items(
            self.time_entries.as_ref(),
            self.id.as_deref().unwrap_or_default(),
            "timeEntries",
        )
    }

    /// Every clock value that takes part in validation, as entered.
    fn clock_values<'r>(
        &'r self,
        entries: &'r [RawTimeEntry],
    ) -> impl Iterator<Item = &'r str> + 'r {
        let break_values = if self.has_scheduled_break {
            vec![
                self.scheduled_break_start_time.as_deref(),
                self.scheduled_break_end_time.as_deref(),
            ]
        } else {
            Vec::new()
        };
        [self.start_time.as_deref(), self.end_time.as_deref()]
            .into_iter()
            .chain(break_values)
            .chain(entries.iter().flat_map(|e| {
                [e.actual_start_time.as_deref(), e.actual_end_time.as_deref()]
            }))
            .flatten()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

impl Assignment {
    /// Read-path conversion: malformed data is logged and treated as absent.
    pub fn from_raw(raw: RawAssignment) -> Self {
        let entries = raw.time_entry_items();
        Self::assemble(raw, entries)
    }

    /// Write-path conversion: malformed clock values are rejected.
    pub fn try_from_raw(raw: RawAssignment) -> Result<Self, ValidationError> {
        let entries = raw.time_entry_items();
        for value in raw.clock_values(&entries) {
            value.parse::<ClockTime>()?;
        }
        Ok(Self::assemble(raw, entries))
    }

    fn assemble(raw: RawAssignment, entries: Vec<RawTimeEntry>) -> Self {
        let id = raw.id.unwrap_or_default();
        let clock = |value: Option<&str>, field: &str| parse_clock(value, &id, field);

        let start_time = clock(raw.start_time.as_deref(), "startTime");
        let end_time = clock(raw.end_time.as_deref(), "endTime");
        let scheduled_break = raw.has_scheduled_break.then(|| ScheduledBreak {
            start: clock(raw.scheduled_break_start_time.as_deref(), "scheduledBreakStartTime"),
            end: clock(raw.scheduled_break_end_time.as_deref(), "scheduledBreakEndTime"),
        });

        let time_entries = entries
            .into_iter()
            .map(|entry| TimeEntry {
                actual_start_time: clock(entry.actual_start_time.as_deref(), "actualStartTime"),
                actual_end_time: clock(entry.actual_end_time.as_deref(), "actualEndTime"),
                hours_worked: hours_from_f64(entry.hours_worked, &id, &entry.user_id),
                user_id: entry.user_id,
            })
            .collect();

        let assigned_users =
            lenient_list::<AssignedUser>(raw.assigned_users.as_ref(), &id, "assignedUsers");
        let personnel_requests = lenient_list::<PersonnelRequest>(
            raw.personnel_requests.as_ref(),
            &id,
            "personnelRequests",
        );

        Assignment {
            workday_id: raw.workday_id.unwrap_or_default(),
            task_type_id: raw.task_type_id,
            user_id: raw.user_id,
            start_time,
            end_time,
            scheduled_break,
            assigned_users: normalize_assigned_users(assigned_users),
            personnel_requests,
            time_entries,
            id,
        }
    }

    pub fn interval(&self) -> Option<Interval> {
        Interval::from_bounds(self.start_time, self.end_time)
    }

    pub fn break_interval(&self) -> Option<Interval> {
        self.scheduled_break.and_then(|b| b.interval())
    }

    pub fn has_scheduled_break(&self) -> bool {
        self.scheduled_break.is_some()
    }
}

fn parse_clock(value: Option<&str>, assignment_id: &str, field: &str) -> Option<ClockTime> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    match value.parse::<ClockTime>() {
        Ok(time) => Some(time),
        Err(e) => {
            warn!(
                "Assignment {}: ignoring malformed {} ({})",
                assignment_id, field, e
            );
            None
        }
    }
}

/// Largest magnitude accepted for a single entry's `hoursWorked`.
pub const MAX_ENTRY_HOURS: f64 = 10_000.0;

fn hours_from_f64(hours: Option<f64>, assignment_id: &str, user_id: &str) -> Decimal {
    let Some(h) = hours else {
        return Decimal::ZERO;
    };
    let converted = (h.is_finite() && h.abs() <= MAX_ENTRY_HOURS)
        .then(|| Decimal::from_f64(h))
        .flatten();
    converted.unwrap_or_else(|| {
        warn!(
            "Assignment {}: unusable hoursWorked {} for user {}, counting 0",
            assignment_id, h, user_id
        );
        Decimal::ZERO
    })
}

fn lenient_list<T: DeserializeOwned>(
    value: Option<&Value>,
    assignment_id: &str,
    field: &str,
) -> Vec<T> {
    let list = JsonList::<T>::from_value(value);
    if let JsonList::Malformed(reason) = &list {
        warn!(
            "Assignment {}: malformed {} treated as empty ({})",
            assignment_id, field, reason
        );
    }
    list.into_items()
}

fn lenient_items<T: DeserializeOwned>(
    value: Option<&Value>,
    assignment_id: &str,
    field: &str,
) -> Vec<T> {
    lenient_list::<Value>(value, assignment_id, field)
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match T::deserialize(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(
                    "Assignment {}: skipping {}[{}] ({})",
                    assignment_id, field, index, e
                );
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workday {
    pub id: WorkdayId,
    pub date: NaiveDate,
    pub event_id: Option<EventId>,
    pub assignments: Vec<Assignment>,
}

impl Workday {
    pub fn from_raw(raw: RawWorkday) -> Self {
        let workday_id = raw.id;
        let assignments = raw
            .assignments
            .into_iter()
            .map(|a| {
                let mut assignment = Assignment::from_raw(a);
                if assignment.workday_id.is_empty() {
                    assignment.workday_id = workday_id.clone();
                }
                assignment
            })
            .collect();
        Workday {
            id: workday_id,
            date: raw.date,
            event_id: raw.event_id,
            assignments,
        }
    }
}

#[cfg(test)]
mod model_tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn raw(value: Value) -> RawAssignment {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn assigned_users_accepts_array_and_string_encoded_json() {
        let from_array = JsonList::<AssignedUser>::from_value(Some(&json!([
            {"userId": 1, "dutyId": 7}
        ])));
        let from_string = JsonList::<AssignedUser>::from_value(Some(&json!(
            "[{\"userId\":\"1\",\"mansionId\":\"7\"}]"
        )));
        let expected = vec![AssignedUser {
            user_id: "1".into(),
            duty_id: Some("7".into()),
        }];
        assert_eq!(from_array, JsonList::Parsed(expected.clone()));
        assert_eq!(from_string, JsonList::Parsed(expected));
    }

    #[test]
    fn malformed_list_is_flagged_and_yields_no_items() {
        let list = JsonList::<AssignedUser>::from_value(Some(&json!("[{not json")));
        assert!(list.is_malformed());
        assert!(list.into_items().is_empty());

        let wrong_shape = JsonList::<PersonnelRequest>::from_value(Some(&json!({"dutyId": 1})));
        assert!(wrong_shape.is_malformed());
        assert_eq!(JsonList::<AssignedUser>::from_value(None), JsonList::Missing);
    }

    #[test]
    fn duplicate_assigned_users_keep_first_binding() {
        let assignment = Assignment::from_raw(raw(json!({
            "id": "a1",
            "taskTypeId": "t1",
            "assignedUsers": [
                {"userId": "u1", "dutyId": "d1"},
                {"userId": "u2", "dutyId": "d2"},
                {"userId": "u1", "dutyId": "d3"}
            ]
        })));
        let bindings: Vec<_> = assignment
            .assigned_users
            .iter()
            .map(|u| (u.user_id.as_str(), u.duty_id.as_deref()))
            .collect();
        assert_eq!(bindings, vec![("u1", Some("d1")), ("u2", Some("d2"))]);
    }

    #[test]
    fn lenient_conversion_drops_bad_times_but_strict_rejects_them() {
        let value = json!({
            "id": 12,
            "taskTypeId": 3,
            "startTime": "25:00",
            "endTime": "17:00",
            "timeEntries": [{"userId": 9, "hoursWorked": 7.5}]
        });
        let lenient = Assignment::from_raw(raw(value.clone()));
        assert_eq!(lenient.id, "12");
        assert_eq!(lenient.start_time, None);
        assert_eq!(lenient.end_time, Some(ClockTime::from_hm(17, 0).unwrap()));
        assert_eq!(lenient.time_entries[0].hours_worked, dec!(7.5));

        let strict = Assignment::try_from_raw(raw(value));
        assert_eq!(
            strict.unwrap_err(),
            ValidationError::InvalidTimeFormat {
                value: "25:00".into()
            }
        );
    }

    #[test]
    fn bad_time_entry_is_skipped_without_dropping_its_siblings() {
        let assignment = Assignment::from_raw(raw(json!({
            "id": "a1",
            "taskTypeId": "t",
            "timeEntries": [
                {"userId": null, "hoursWorked": 3},
                {"userId": "u1", "hoursWorked": "7.5"},
                {"userId": "u2", "hoursWorked": "seven"},
                {"userId": "u3", "hoursWorked": ""}
            ]
        })));
        let entries: Vec<_> = assignment
            .time_entries
            .iter()
            .map(|e| (e.user_id.as_str(), e.hours_worked))
            .collect();
        assert_eq!(entries, vec![("u1", dec!(7.5)), ("u3", dec!(0))]);

        let encoded = Assignment::from_raw(raw(json!({
            "taskTypeId": "t",
            "timeEntries": "[{\"userId\": 4, \"hoursWorked\": \" 2.25 \"}]"
        })));
        assert_eq!(encoded.time_entries[0].hours_worked, dec!(2.25));
    }

    #[test]
    fn strict_conversion_checks_clock_values_of_parsed_entries() {
        let value = json!({
            "taskTypeId": "t",
            "timeEntries": [
                {"userId": null, "actualStartTime": "99:99"},
                {"userId": "u1", "actualStartTime": "08:00", "actualEndTime": "8:6x"}
            ]
        });
        assert_eq!(
            Assignment::try_from_raw(raw(value)).unwrap_err(),
            ValidationError::InvalidTimeFormat {
                value: "8:6x".into()
            }
        );
    }

    #[test]
    fn out_of_range_hours_count_as_zero() {
        let assignment = Assignment::from_raw(raw(json!({
            "taskTypeId": "t",
            "timeEntries": [
                {"userId": "u1", "hoursWorked": 7.9e28},
                {"userId": "u2", "hoursWorked": -1e300},
                {"userId": "u3", "hoursWorked": 12}
            ]
        })));
        let hours: Vec<Decimal> = assignment.time_entries.iter().map(|e| e.hours_worked).collect();
        assert_eq!(hours, vec![dec!(0), dec!(0), dec!(12)]);
    }

    #[test]
    fn break_is_only_present_when_flagged() {
        let without = Assignment::from_raw(raw(json!({
            "taskTypeId": "t",
            "scheduledBreakStartTime": "12:00",
            "scheduledBreakEndTime": "12:30"
        })));
        assert!(!without.has_scheduled_break());

        let with = Assignment::from_raw(raw(json!({
            "taskTypeId": "t",
            "hasScheduledBreak": true,
            "scheduledBreakStartTime": "12:00"
        })));
        assert_eq!(
            with.scheduled_break,
            Some(ScheduledBreak {
                start: ClockTime::from_hm(12, 0),
                end: None
            })
        );
        assert_eq!(with.break_interval(), None);
    }

    #[test]
    fn workday_assignments_inherit_workday_id() {
        let workday: RawWorkday = serde_json::from_value(json!({
            "id": 4,
            "date": "2024-03-09",
            "eventId": "ev",
            "assignments": [{"id": "a", "taskTypeId": "t"}]
        }))
        .unwrap();
        let workday = Workday::from_raw(workday);
        assert_eq!(workday.assignments[0].workday_id, "4");
        assert_eq!(workday.event_id.as_deref(), Some("ev"));
    }
}
