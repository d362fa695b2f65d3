// src/hours_aggregation.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::break_calc::{break_counts_as_worked, scheduled_break_hours};
use crate::model::{
    Assignment, DutyId, EventId, ScheduledBreak, TaskKind, TaskType, TaskTypeId, TimeEntry,
    UserId, UNSPECIFIED_DUTY,
};
use crate::snapshot::{Lookups, WorkdayInfo};
use crate::time_interval::{ClockTime, HOURS_DP};

// --- Options & Filters ---

/// Which hours a report counts: recorded time entries, or the scheduled interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HoursType {
    #[default]
    #[serde(rename = "actual")]
    Actual,
    #[serde(rename = "previsto", alias = "planned")]
    Planned,
}

impl FromStr for HoursType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "actual" => Ok(HoursType::Actual),
            "previsto" | "planned" => Ok(HoursType::Planned),
            other => Err(format!(
                "unknown hours type '{}', expected 'actual' or 'previsto'",
                other
            )),
        }
    }
}

impl fmt::Display for HoursType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoursType::Actual => f.write_str("actual"),
            HoursType::Planned => f.write_str("previsto"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub hours_type: HoursType,
    /// Adds scheduled break time back for hourly services. Shift-based services
    /// ignore it.
    pub include_breaks_hourly: bool,
    pub show_break_times: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            hours_type: HoursType::Actual,
            include_breaks_hourly: true,
            show_break_times: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub company_id: Option<String>,
    pub event_id: Option<String>,
    pub duty_id: Option<String>,
    pub client_id: Option<String>,
    pub location_id: Option<String>,
    pub user_id: Option<String>,
}

impl ReportFilter {
    pub fn accepts_workday(&self, workday: &WorkdayInfo<'_>, lookups: &Lookups) -> bool {
        if self.start_date.is_some_and(|start| workday.date < start)
            || self.end_date.is_some_and(|end| workday.date > end)
        {
            return false;
        }
        if let Some(event_id) = &self.event_id {
            if workday.event_id != Some(event_id.as_str()) {
                return false;
            }
        }
        if self.client_id.is_none() && self.location_id.is_none() {
            return true;
        }

        let Some(event) = workday.event_id.and_then(|id| lookups.events.get(id)) else {
            return false;
        };
        let same = |wanted: &Option<String>, actual: &Option<String>| {
            wanted.is_none() || wanted == actual
        };
        same(&self.client_id, &event.client_id) && same(&self.location_id, &event.location_id)
    }

    /// A user filter never matches a participation without a user.
    pub fn accepts_participant(
        &self,
        user_id: Option<&str>,
        duty_id: &str,
        company_id: Option<&str>,
    ) -> bool {
        self.user_id.as_deref().map_or(true, |u| user_id == Some(u))
            && self.duty_id.as_deref().map_or(true, |d| d == duty_id)
            && self
                .company_id
                .as_deref()
                .map_or(true, |c| company_id == Some(c))
    }
}

// --- Totals ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    #[serde(with = "rust_decimal::serde::float")]
    pub hours: Decimal,
    pub shifts: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub overtime_hours: Decimal,
}

impl Totals {
    pub fn hours_only(hours: Decimal) -> Self {
        Self {
            hours,
            ..Self::default()
        }
    }
}

impl AddAssign for Totals {
    fn add_assign(&mut self, rhs: Self) {
        self.hours += rhs.hours;
        self.shifts += rhs.shifts;
        self.overtime_hours += rhs.overtime_hours;
    }
}

impl Add for Totals {
    type Output = Totals;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl Sum for Totals {
    fn sum<I: Iterator<Item = Totals>>(iter: I) -> Self {
        iter.fold(Totals::default(), |acc, t| acc + t)
    }
}

// --- Shift / Overtime Derivation ---

/// Splits one person's hours on a shift-based service into a credited shift plus
/// overtime. Without a positive shift length every hour is overtime and no shift is
/// credited.
pub fn shift_and_overtime(hours_per_person: Decimal, shift_hours: Option<Decimal>) -> (u32, Decimal) {
    match shift_hours {
        Some(length) if length > Decimal::ZERO => {
            if hours_per_person <= length {
                (1, Decimal::ZERO)
            } else {
                (1, hours_per_person - length)
            }
        }
        _ => (0, hours_per_person),
    }
}

fn account(hours: Decimal, task_type: &TaskType) -> Totals {
    if task_type.is_hourly_service {
        return Totals::hours_only(hours);
    }
    let (shifts, overtime_hours) = shift_and_overtime(hours, task_type.shift_hours);
    Totals {
        hours,
        shifts,
        overtime_hours,
    }
}

// --- Duty Resolution ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DutyBinding {
    pub user_id: UserId,
    pub duty_id: DutyId,
}

/// Maps each participant of an assignment to a duty, first rule that applies wins:
/// explicit `assignedUsers` bindings; otherwise the first requested duty for every
/// user with a time entry; finally the assignment's own `userId`, if still unbound,
/// under the unspecified duty.
pub fn resolve_duties(assignment: &Assignment) -> Vec<DutyBinding> {
    let mut bindings = Vec::new();
    let mut bound = HashSet::new();

    if !assignment.assigned_users.is_empty() {
        for user in &assignment.assigned_users {
            if bound.insert(user.user_id.as_str()) {
                bindings.push(DutyBinding {
                    user_id: user.user_id.clone(),
                    duty_id: user.duty_id.clone().unwrap_or_default(),
                });
            }
        }
    } else if let Some(request) = assignment.personnel_requests.first() {
        // One duty assumed for the whole assignment.
        for entry in &assignment.time_entries {
            if bound.insert(entry.user_id.as_str()) {
                bindings.push(DutyBinding {
                    user_id: entry.user_id.clone(),
                    duty_id: request.duty_id.clone(),
                });
            }
        }
    }

    if let Some(user_id) = &assignment.user_id {
        if bound.insert(user_id.as_str()) {
            bindings.push(DutyBinding {
                user_id: user_id.clone(),
                duty_id: UNSPECIFIED_DUTY.to_string(),
            });
        }
    }
    bindings
}

fn duty_of<'b>(bindings: &'b [DutyBinding], user_id: &str) -> &'b str {
    bindings
        .iter()
        .find(|b| b.user_id == user_id)
        .map_or(UNSPECIFIED_DUTY, |b| b.duty_id.as_str())
}

// --- Per-Assignment Hours ---

/// One person's share of one assignment. `user_id` is `None` only for planned hours
/// of an assignment nobody is staffed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participation {
    pub user_id: Option<UserId>,
    pub duty_id: DutyId,
    pub totals: Totals,
    pub actual_start_time: Option<ClockTime>,
    pub actual_end_time: Option<ClockTime>,
}

pub fn participations(
    assignment: &Assignment,
    task_type: &TaskType,
    options: &ReportOptions,
) -> Vec<Participation> {
    let breaks_count = break_counts_as_worked(task_type, options.include_breaks_hourly);
    match options.hours_type {
        HoursType::Actual => actual_participations(assignment, task_type, breaks_count),
        HoursType::Planned => planned_participations(assignment, task_type, breaks_count),
    }
}

fn entries_of<'b>(assignment: &'b Assignment, user_id: &str) -> Vec<&'b TimeEntry> {
    assignment
        .time_entries
        .iter()
        .filter(|e| e.user_id == user_id)
        .collect()
}

fn actual_participations(
    assignment: &Assignment,
    task_type: &TaskType,
    breaks_count: bool,
) -> Vec<Participation> {
    let mut bindings = resolve_duties(assignment);
    // Recorded time is never dropped: users with entries but no binding count under
    // the unspecified duty.
    for entry in &assignment.time_entries {
        if !bindings.iter().any(|b| b.user_id == entry.user_id) {
            bindings.push(DutyBinding {
                user_id: entry.user_id.clone(),
                duty_id: UNSPECIFIED_DUTY.to_string(),
            });
        }
    }

    let break_bonus = if breaks_count {
        scheduled_break_hours(assignment)
    } else {
        Decimal::ZERO
    };

    bindings
        .into_iter()
        .filter_map(|binding| {
            let entries = entries_of(assignment, &binding.user_id);
            let first = *entries.first()?;
            let worked: Decimal = entries.iter().map(|e| e.hours_worked).sum();
            Some(Participation {
                totals: account(worked + break_bonus, task_type),
                actual_start_time: first.actual_start_time,
                actual_end_time: first.actual_end_time,
                user_id: Some(binding.user_id),
                duty_id: binding.duty_id,
            })
        })
        .collect()
}

/// Users the scheduled hours are split between: bound users, else users with time
/// entries, else the assignment's own user.
pub fn planned_participants(assignment: &Assignment) -> Vec<UserId> {
    if !assignment.assigned_users.is_empty() {
        distinct_users(assignment.assigned_users.iter().map(|u| &u.user_id))
    } else if !assignment.time_entries.is_empty() {
        distinct_users(assignment.time_entries.iter().map(|e| &e.user_id))
    } else {
        assignment.user_id.iter().cloned().collect()
    }
}

fn distinct_users<'b>(ids: impl Iterator<Item = &'b UserId>) -> Vec<UserId> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

fn planned_participations(
    assignment: &Assignment,
    task_type: &TaskType,
    breaks_count: bool,
) -> Vec<Participation> {
    let participants = planned_participants(assignment);
    let scheduled = assignment
        .interval()
        .map(|i| i.hours())
        .unwrap_or(Decimal::ZERO);
    let net = if breaks_count {
        scheduled
    } else {
        (scheduled - scheduled_break_hours(assignment)).max(Decimal::ZERO)
    };

    if participants.is_empty() {
        // Unstaffed: the scheduled hours still belong to the event and the requested duty.
        let duty_id = assignment
            .personnel_requests
            .first()
            .map_or_else(|| UNSPECIFIED_DUTY.to_string(), |r| r.duty_id.clone());
        return vec![Participation {
            user_id: None,
            duty_id,
            totals: account(net, task_type),
            actual_start_time: None,
            actual_end_time: None,
        }];
    }
    let per_person = (net / Decimal::from(participants.len())).round_dp(HOURS_DP);

    let bindings = resolve_duties(assignment);
    participants
        .into_iter()
        .map(|user_id| {
            let entry = entries_of(assignment, &user_id).first().copied();
            Participation {
                duty_id: duty_of(&bindings, &user_id).to_string(),
                totals: account(per_person, task_type),
                actual_start_time: entry.and_then(|e| e.actual_start_time),
                actual_end_time: entry.and_then(|e| e.actual_end_time),
                user_id: Some(user_id),
            }
        })
        .collect()
}

// --- Accumulators ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupBy {
    Company,
    Employee,
    Event,
    Duty,
}

/// `(date, taskTypeId, "HH:MM-HH:MM")`
pub type ShiftBucketKey = (NaiveDate, TaskTypeId, String);

pub fn shift_key(start: Option<ClockTime>, end: Option<ClockTime>) -> String {
    let fmt = |t: Option<ClockTime>| t.map(|t| t.to_string()).unwrap_or_default();
    format!("{}-{}", fmt(start), fmt(end))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DutyTally {
    pub people: BTreeSet<UserId>,
    pub hours: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftTally {
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
    pub scheduled_break: Option<ScheduledBreak>,
    pub duties: BTreeMap<DutyId, DutyTally>,
    pub people: BTreeSet<UserId>,
    pub totals: Totals,
}

impl ShiftTally {
    fn new(start_time: Option<ClockTime>, end_time: Option<ClockTime>) -> Self {
        Self {
            start_time,
            end_time,
            scheduled_break: None,
            duties: BTreeMap::new(),
            people: BTreeSet::new(),
            totals: Totals::default(),
        }
    }

    fn add(&mut self, participation: &Participation, scheduled_break: Option<ScheduledBreak>) {
        let duty = self.duties.entry(participation.duty_id.clone()).or_default();
        if let Some(user_id) = &participation.user_id {
            duty.people.insert(user_id.clone());
            self.people.insert(user_id.clone());
        }
        duty.hours += participation.totals.hours;
        self.totals += participation.totals;
        self.scheduled_break = pick_break(self.scheduled_break, scheduled_break);
    }

    fn merge(&mut self, other: ShiftTally) {
        for (duty_id, tally) in other.duties {
            let duty = self.duties.entry(duty_id).or_default();
            duty.people.extend(tally.people);
            duty.hours += tally.hours;
        }
        self.people.extend(other.people);
        self.totals += other.totals;
        self.scheduled_break = pick_break(self.scheduled_break, other.scheduled_break);
    }
}

// Assignments sharing a bucket may disagree on the break; the earliest one is shown
// so the outcome does not depend on processing order.
fn pick_break(a: Option<ScheduledBreak>, b: Option<ScheduledBreak>) -> Option<ScheduledBreak> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// One (assignment, person) line of the employee view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkEntryRecord {
    pub assignment_id: String,
    pub date: NaiveDate,
    pub event_id: Option<EventId>,
    pub task_type_id: TaskTypeId,
    pub duty_id: DutyId,
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
    pub actual_start_time: Option<ClockTime>,
    pub actual_end_time: Option<ClockTime>,
    pub totals: Totals,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupTally {
    pub totals: Totals,
    pub categories: BTreeMap<DutyId, Totals>,
    pub daily: BTreeMap<ShiftBucketKey, ShiftTally>,
    pub entries: Vec<WorkEntryRecord>,
}

impl GroupTally {
    fn merge(&mut self, other: GroupTally) {
        self.totals += other.totals;
        for (duty_id, totals) in other.categories {
            *self.categories.entry(duty_id).or_default() += totals;
        }
        for (key, shift) in other.daily {
            match self.daily.get_mut(&key) {
                Some(existing) => existing.merge(shift),
                None => {
                    self.daily.insert(key, shift);
                }
            }
        }
        self.entries.extend(other.entries);
    }
}

/// Per-group totals keyed by company, user, event or duty id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    pub groups: BTreeMap<String, GroupTally>,
}

impl Aggregation {
    /// Combines two partial aggregations. Addition of totals is associative and
    /// commutative, so partials may be built in any order or in parallel.
    pub fn merge(mut self, other: Aggregation) -> Aggregation {
        for (key, group) in other.groups {
            match self.groups.get_mut(&key) {
                Some(existing) => existing.merge(group),
                None => {
                    self.groups.insert(key, group);
                }
            }
        }
        self
    }

    pub fn group(&self, key: &str) -> Option<&GroupTally> {
        self.groups.get(key)
    }

    pub fn grand_total(&self) -> Totals {
        self.groups.values().map(|g| g.totals).sum()
    }
}

// --- Aggregator ---

pub struct HoursAggregator<'a> {
    lookups: &'a Lookups,
    options: ReportOptions,
    filter: &'a ReportFilter,
    group_by: GroupBy,
}

impl<'a> HoursAggregator<'a> {
    pub fn new(
        lookups: &'a Lookups,
        options: ReportOptions,
        filter: &'a ReportFilter,
        group_by: GroupBy,
    ) -> Self {
        Self {
            lookups,
            options,
            filter,
            group_by,
        }
    }

    pub fn aggregate<'b, I>(&self, assignments: I) -> Aggregation
    where
        I: IntoIterator<Item = &'b Assignment>,
    {
        assignments
            .into_iter()
            .fold(Aggregation::default(), |mut aggregation, assignment| {
                self.accumulate(assignment, &mut aggregation);
                aggregation
            })
    }

    /// Adds one assignment to `aggregation`. Unknown references are logged and the
    /// assignment skipped; nothing here aborts a report.
    pub fn accumulate(&self, assignment: &Assignment, aggregation: &mut Aggregation) {
        let Some(task_type) = self.lookups.task_types.get(&assignment.task_type_id) else {
            warn!(
                "Assignment {}: unknown task type {}, skipped",
                assignment.id, assignment.task_type_id
            );
            return;
        };
        if task_type.kind != TaskKind::Shift {
            return;
        }
        let Some(workday) = self.lookups.workday(&assignment.workday_id) else {
            warn!(
                "Assignment {}: unknown workday {}, skipped",
                assignment.id, assignment.workday_id
            );
            return;
        };
        if !self.filter.accepts_workday(&workday, self.lookups) {
            return;
        }

        let bucket: ShiftBucketKey = (
            workday.date,
            assignment.task_type_id.clone(),
            shift_key(assignment.start_time, assignment.end_time),
        );

        for participation in participations(assignment, task_type, &self.options) {
            let company_id = participation
                .user_id
                .as_deref()
                .and_then(|u| self.lookups.company_of(u));
            if !self.filter.accepts_participant(
                participation.user_id.as_deref(),
                &participation.duty_id,
                company_id,
            ) {
                continue;
            }
            let Some(group_key) = self.group_key(&participation, company_id, &workday) else {
                debug!(
                    "Assignment {}: user {:?} has no {:?} key, not grouped",
                    assignment.id, participation.user_id, self.group_by
                );
                continue;
            };

            let group = aggregation.groups.entry(group_key).or_default();
            group.totals += participation.totals;
            *group
                .categories
                .entry(participation.duty_id.clone())
                .or_default() += participation.totals;
            group
                .daily
                .entry(bucket.clone())
                .or_insert_with(|| ShiftTally::new(assignment.start_time, assignment.end_time))
                .add(&participation, assignment.scheduled_break);

            if self.group_by == GroupBy::Employee {
                group.entries.push(WorkEntryRecord {
                    assignment_id: assignment.id.clone(),
                    date: workday.date,
                    event_id: workday.event_id.map(str::to_string),
                    task_type_id: assignment.task_type_id.clone(),
                    duty_id: participation.duty_id.clone(),
                    start_time: assignment.start_time,
                    end_time: assignment.end_time,
                    actual_start_time: participation.actual_start_time,
                    actual_end_time: participation.actual_end_time,
                    totals: participation.totals,
                });
            }
        }
        debug!(
            "Assignment {} accumulated on {} ({})",
            assignment.id, workday.date, task_type.name
        );
    }

    fn group_key(
        &self,
        participation: &Participation,
        company_id: Option<&str>,
        workday: &WorkdayInfo<'_>,
    ) -> Option<String> {
        match self.group_by {
            GroupBy::Company => company_id.map(str::to_string),
            GroupBy::Employee => participation.user_id.clone(),
            GroupBy::Event => workday.event_id.map(str::to_string),
            GroupBy::Duty => Some(participation.duty_id.clone()),
        }
    }
}
