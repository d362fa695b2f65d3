// src/report.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::hours_aggregation::{
    Aggregation, GroupBy, GroupTally, HoursAggregator, HoursType, ReportFilter, ReportOptions,
    ShiftTally, Totals, WorkEntryRecord,
};
use crate::model::{Assignment, TaskTypeId, UserId};
use crate::snapshot::Lookups;
use crate::time_interval::ClockTime;

// --- Output Types ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DutyShiftDetail {
    pub duty_id: String,
    pub duty_name: String,
    pub duty_code: String,
    pub number_of_people: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_hours: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftDetail {
    pub start_time: String,
    pub end_time: String,
    pub has_scheduled_break: bool,
    pub scheduled_break_start_time: Option<String>,
    pub scheduled_break_end_time: Option<String>,
    pub duties: Vec<DutyShiftDetail>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_hours: Decimal,
    pub number_of_people: usize,
    pub shifts: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub overtime_hours: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTypeDetail {
    pub task_type_id: String,
    pub task_type_name: String,
    pub is_hourly_service: bool,
    pub shifts: Vec<ShiftDetail>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_hours: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyDetail {
    pub date: NaiveDate,
    pub task_types: Vec<TaskTypeDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotals {
    pub duty_id: String,
    pub duty_code: String,
    pub duty_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub hours: Decimal,
    pub shifts: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub overtime_hours: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyEntry {
    pub company_id: String,
    pub company_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_hours: Decimal,
    pub total_shifts: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_overtime_hours: Decimal,
    pub categories: Vec<CategoryTotals>,
    pub daily_details: Vec<DailyDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyReport {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub hours_type: HoursType,
    pub show_break_times: bool,
    pub companies: Vec<CompanyEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkEntry {
    pub assignment_id: String,
    pub date: NaiveDate,
    pub event_id: Option<String>,
    pub event_name: Option<String>,
    pub task_type_id: String,
    pub task_type_name: String,
    pub duty_id: String,
    pub duty_name: String,
    pub duty_code: String,
    pub start_time: Option<ClockTime>,
    pub end_time: Option<ClockTime>,
    pub actual_start_time: Option<ClockTime>,
    pub actual_end_time: Option<ClockTime>,
    #[serde(with = "rust_decimal::serde::float")]
    pub hours: Decimal,
    pub shifts: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub overtime_hours: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeEntry {
    pub user_id: String,
    pub user_name: String,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_hours: Decimal,
    pub total_shifts: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_overtime_hours: Decimal,
    pub entries: Vec<WorkEntry>,
    pub daily_details: Vec<DailyDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeReport {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub hours_type: HoursType,
    pub show_break_times: bool,
    pub employees: Vec<EmployeeEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub event_id: String,
    pub event_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_hours: Decimal,
    pub total_shifts: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_overtime_hours: Decimal,
    pub duties: Vec<CategoryTotals>,
    pub daily_details: Vec<DailyDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReport {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub hours_type: HoursType,
    pub show_break_times: bool,
    pub event: EventSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DutyTaskTypeDetail {
    pub task_type_id: String,
    pub task_type_name: String,
    pub is_hourly_service: bool,
    pub number_of_people: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_hours: Decimal,
    pub shifts: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub overtime_hours: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DutyDailyDetail {
    pub date: NaiveDate,
    pub task_types: Vec<DutyTaskTypeDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DutySummary {
    pub duty_id: String,
    pub duty_name: String,
    pub duty_code: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_hours: Decimal,
    pub total_shifts: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_overtime_hours: Decimal,
    pub daily_details: Vec<DutyDailyDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DutyReport {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub hours_type: HoursType,
    pub show_break_times: bool,
    pub duty: DutySummary,
}

/// Flat per-group totals, used for CSV export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_hours: Decimal,
    pub total_shifts: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_overtime_hours: Decimal,
}

pub trait ReportSummary {
    fn summary_rows(&self) -> Vec<SummaryRow>;
}

impl ReportSummary for CompanyReport {
    fn summary_rows(&self) -> Vec<SummaryRow> {
        self.companies
            .iter()
            .map(|c| SummaryRow {
                id: c.company_id.clone(),
                name: c.company_name.clone(),
                total_hours: c.total_hours,
                total_shifts: c.total_shifts,
                total_overtime_hours: c.total_overtime_hours,
            })
            .collect()
    }
}

impl ReportSummary for EmployeeReport {
    fn summary_rows(&self) -> Vec<SummaryRow> {
        self.employees
            .iter()
            .map(|e| SummaryRow {
                id: e.user_id.clone(),
                name: e.user_name.clone(),
                total_hours: e.total_hours,
                total_shifts: e.total_shifts,
                total_overtime_hours: e.total_overtime_hours,
            })
            .collect()
    }
}

impl ReportSummary for EventReport {
    fn summary_rows(&self) -> Vec<SummaryRow> {
        vec![SummaryRow {
            id: self.event.event_id.clone(),
            name: self.event.event_name.clone(),
            total_hours: self.event.total_hours,
            total_shifts: self.event.total_shifts,
            total_overtime_hours: self.event.total_overtime_hours,
        }]
    }
}

impl ReportSummary for DutyReport {
    fn summary_rows(&self) -> Vec<SummaryRow> {
        vec![SummaryRow {
            id: self.duty.duty_id.clone(),
            name: self.duty.duty_name.clone(),
            total_hours: self.duty.total_hours,
            total_shifts: self.duty.total_shifts,
            total_overtime_hours: self.duty.total_overtime_hours,
        }]
    }
}

// --- Report Builder ---

/// Turns aggregated hours into the four report trees. One builder serves one
/// request; it only borrows that request's lookups.
pub struct ReportBuilder<'a> {
    lookups: &'a Lookups,
    options: ReportOptions,
    filter: ReportFilter,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(lookups: &'a Lookups, options: ReportOptions, filter: ReportFilter) -> Self {
        Self {
            lookups,
            options,
            filter,
        }
    }

    pub fn aggregate<'b, I>(&self, group_by: GroupBy, filter: &ReportFilter, assignments: I) -> Aggregation
    where
        I: IntoIterator<Item = &'b Assignment>,
    {
        HoursAggregator::new(self.lookups, self.options, filter, group_by).aggregate(assignments)
    }

    // --- By Company ---

    pub fn company_report<'b, I>(&self, assignments: I) -> CompanyReport
    where
        I: IntoIterator<Item = &'b Assignment>,
    {
        let aggregation = self.aggregate(GroupBy::Company, &self.filter, assignments);
        self.company_report_from(&aggregation)
    }

    pub fn company_report_from(&self, aggregation: &Aggregation) -> CompanyReport {
        let mut companies: Vec<CompanyEntry> = aggregation
            .groups
            .iter()
            .map(|(company_id, group)| CompanyEntry {
                company_id: company_id.clone(),
                company_name: self.lookups.company_name(company_id),
                total_hours: group.totals.hours,
                total_shifts: group.totals.shifts,
                total_overtime_hours: group.totals.overtime_hours,
                categories: self.categories(group),
                daily_details: self.daily_details(group),
            })
            .collect();
        companies.sort_by(|a, b| {
            (a.company_name.as_str(), a.company_id.as_str())
                .cmp(&(b.company_name.as_str(), b.company_id.as_str()))
        });

        info!("Company report built: {} companies", companies.len());
        CompanyReport {
            start_date: self.filter.start_date,
            end_date: self.filter.end_date,
            hours_type: self.options.hours_type,
            show_break_times: self.options.show_break_times,
            companies,
        }
    }

    // --- By Employee ---

    pub fn employee_report<'b, I>(&self, assignments: I) -> EmployeeReport
    where
        I: IntoIterator<Item = &'b Assignment>,
    {
        let aggregation = self.aggregate(GroupBy::Employee, &self.filter, assignments);
        self.employee_report_from(&aggregation)
    }

    pub fn employee_report_from(&self, aggregation: &Aggregation) -> EmployeeReport {
        let mut employees: Vec<EmployeeEntry> = aggregation
            .groups
            .iter()
            .map(|(user_id, group)| self.employee_entry(user_id, group))
            .collect();
        employees.sort_by(|a, b| {
            (a.user_name.as_str(), a.user_id.as_str()).cmp(&(b.user_name.as_str(), b.user_id.as_str()))
        });

        info!("Employee report built: {} employees", employees.len());
        EmployeeReport {
            start_date: self.filter.start_date,
            end_date: self.filter.end_date,
            hours_type: self.options.hours_type,
            show_break_times: self.options.show_break_times,
            employees,
        }
    }

    fn employee_entry(&self, user_id: &UserId, group: &GroupTally) -> EmployeeEntry {
        let company_id = self.lookups.company_of(user_id).map(str::to_string);
        let mut records: Vec<&WorkEntryRecord> = group.entries.iter().collect();
        records.sort_by(|a, b| {
            (a.date, a.start_time, a.assignment_id.as_str())
                .cmp(&(b.date, b.start_time, b.assignment_id.as_str()))
        });

        EmployeeEntry {
            user_id: user_id.clone(),
            user_name: self.lookups.user_name(user_id),
            company_name: company_id.as_deref().map(|c| self.lookups.company_name(c)),
            company_id,
            total_hours: group.totals.hours,
            total_shifts: group.totals.shifts,
            total_overtime_hours: group.totals.overtime_hours,
            entries: records.into_iter().map(|r| self.work_entry(r)).collect(),
            daily_details: self.daily_details(group),
        }
    }

    fn work_entry(&self, record: &WorkEntryRecord) -> WorkEntry {
        let (duty_name, duty_code) = self.lookups.duty_label(&record.duty_id);
        WorkEntry {
            assignment_id: record.assignment_id.clone(),
            date: record.date,
            event_name: record.event_id.as_deref().map(|e| self.lookups.event_name(e)),
            event_id: record.event_id.clone(),
            task_type_id: record.task_type_id.clone(),
            task_type_name: self.lookups.task_type_name(&record.task_type_id),
            duty_id: record.duty_id.clone(),
            duty_name,
            duty_code,
            start_time: record.start_time,
            end_time: record.end_time,
            actual_start_time: record.actual_start_time,
            actual_end_time: record.actual_end_time,
            hours: record.totals.hours,
            shifts: record.totals.shifts,
            overtime_hours: record.totals.overtime_hours,
        }
    }

    // --- By Event ---

    pub fn event_report<'b, I>(&self, event_id: &str, assignments: I) -> EventReport
    where
        I: IntoIterator<Item = &'b Assignment>,
    {
        let filter = ReportFilter {
            event_id: Some(event_id.to_string()),
            ..self.filter.clone()
        };
        let aggregation = self.aggregate(GroupBy::Event, &filter, assignments);
        let empty = GroupTally::default();
        let group = aggregation.group(event_id).unwrap_or(&empty);

        info!("Event report built for {}", event_id);
        EventReport {
            start_date: self.filter.start_date,
            end_date: self.filter.end_date,
            hours_type: self.options.hours_type,
            show_break_times: self.options.show_break_times,
            event: EventSummary {
                event_id: event_id.to_string(),
                event_name: self.lookups.event_name(event_id),
                total_hours: group.totals.hours,
                total_shifts: group.totals.shifts,
                total_overtime_hours: group.totals.overtime_hours,
                duties: self.categories(group),
                daily_details: self.daily_details(group),
            },
        }
    }

    // --- By Duty ---

    pub fn duty_report<'b, I>(&self, duty_id: &str, assignments: I) -> DutyReport
    where
        I: IntoIterator<Item = &'b Assignment>,
    {
        let filter = ReportFilter {
            duty_id: Some(duty_id.to_string()),
            ..self.filter.clone()
        };
        let aggregation = self.aggregate(GroupBy::Duty, &filter, assignments);
        let empty = GroupTally::default();
        let group = aggregation.group(duty_id).unwrap_or(&empty);
        let (duty_name, duty_code) = self.lookups.duty_label(duty_id);

        info!("Duty report built for {}", duty_id);
        DutyReport {
            start_date: self.filter.start_date,
            end_date: self.filter.end_date,
            hours_type: self.options.hours_type,
            show_break_times: self.options.show_break_times,
            duty: DutySummary {
                duty_id: duty_id.to_string(),
                duty_name,
                duty_code,
                total_hours: group.totals.hours,
                total_shifts: group.totals.shifts,
                total_overtime_hours: group.totals.overtime_hours,
                daily_details: self.duty_daily_details(group),
            },
        }
    }

    // --- Shared Tree Assembly ---

    fn categories(&self, group: &GroupTally) -> Vec<CategoryTotals> {
        let mut categories: Vec<CategoryTotals> = group
            .categories
            .iter()
            .map(|(duty_id, totals)| {
                let (duty_name, duty_code) = self.lookups.duty_label(duty_id);
                CategoryTotals {
                    duty_id: duty_id.clone(),
                    duty_code,
                    duty_name,
                    hours: totals.hours,
                    shifts: totals.shifts,
                    overtime_hours: totals.overtime_hours,
                }
            })
            .collect();
        categories.sort_by(|a, b| {
            (a.duty_name.as_str(), a.duty_id.as_str()).cmp(&(b.duty_name.as_str(), b.duty_id.as_str()))
        });
        categories
    }

    /// Dates ascending, task types by name, shifts by start time.
    fn daily_details(&self, group: &GroupTally) -> Vec<DailyDetail> {
        group_by_date(group)
            .into_iter()
            .map(|(date, task_types)| {
                let mut task_types: Vec<TaskTypeDetail> = task_types
                    .into_iter()
                    .map(|(task_type_id, shifts)| self.task_type_detail(task_type_id, shifts))
                    .collect();
                task_types.sort_by(|a, b| {
                    (a.task_type_name.as_str(), a.task_type_id.as_str())
                        .cmp(&(b.task_type_name.as_str(), b.task_type_id.as_str()))
                });
                DailyDetail { date, task_types }
            })
            .collect()
    }

    fn task_type_detail(&self, task_type_id: &TaskTypeId, shifts: Vec<&ShiftTally>) -> TaskTypeDetail {
        let mut shifts: Vec<ShiftDetail> = shifts.into_iter().map(|s| self.shift_detail(s)).collect();
        shifts.sort_by(|a, b| (&a.start_time, &a.end_time).cmp(&(&b.start_time, &b.end_time)));

        TaskTypeDetail {
            task_type_id: task_type_id.clone(),
            task_type_name: self.lookups.task_type_name(task_type_id),
            is_hourly_service: self.is_hourly(task_type_id),
            total_hours: shifts.iter().map(|s| s.total_hours).sum(),
            shifts,
        }
    }

    fn shift_detail(&self, shift: &ShiftTally) -> ShiftDetail {
        let time = |t: Option<ClockTime>| t.map(|t| t.to_string());
        let shown_break = shift.scheduled_break.filter(|_| self.options.show_break_times);

        let mut duties: Vec<DutyShiftDetail> = shift
            .duties
            .iter()
            .map(|(duty_id, tally)| {
                let (duty_name, duty_code) = self.lookups.duty_label(duty_id);
                DutyShiftDetail {
                    duty_id: duty_id.clone(),
                    duty_name,
                    duty_code,
                    number_of_people: tally.people.len(),
                    total_hours: tally.hours,
                }
            })
            .collect();
        duties.sort_by(|a, b| {
            (a.duty_name.as_str(), a.duty_id.as_str()).cmp(&(b.duty_name.as_str(), b.duty_id.as_str()))
        });

        ShiftDetail {
            start_time: time(shift.start_time).unwrap_or_default(),
            end_time: time(shift.end_time).unwrap_or_default(),
            has_scheduled_break: shift.scheduled_break.is_some(),
            scheduled_break_start_time: shown_break.and_then(|b| time(b.start)),
            scheduled_break_end_time: shown_break.and_then(|b| time(b.end)),
            duties,
            total_hours: shift.totals.hours,
            number_of_people: shift.people.len(),
            shifts: shift.totals.shifts,
            overtime_hours: shift.totals.overtime_hours,
        }
    }

    /// Per-task-type totals per date; the duty is fixed so shifts are not broken down.
    fn duty_daily_details(&self, group: &GroupTally) -> Vec<DutyDailyDetail> {
        group_by_date(group)
            .into_iter()
            .map(|(date, task_types)| {
                let mut task_types: Vec<DutyTaskTypeDetail> = task_types
                    .into_iter()
                    .map(|(task_type_id, shifts)| {
                        let people: BTreeSet<&UserId> =
                            shifts.iter().flat_map(|s| s.people.iter()).collect();
                        let totals: Totals = shifts.iter().map(|s| s.totals).sum();
                        DutyTaskTypeDetail {
                            task_type_id: task_type_id.clone(),
                            task_type_name: self.lookups.task_type_name(task_type_id),
                            is_hourly_service: self.is_hourly(task_type_id),
                            number_of_people: people.len(),
                            total_hours: totals.hours,
                            shifts: totals.shifts,
                            overtime_hours: totals.overtime_hours,
                        }
                    })
                    .collect();
                task_types.sort_by(|a, b| {
                    (a.task_type_name.as_str(), a.task_type_id.as_str())
                        .cmp(&(b.task_type_name.as_str(), b.task_type_id.as_str()))
                });
                DutyDailyDetail { date, task_types }
            })
            .collect()
    }

    fn is_hourly(&self, task_type_id: &str) -> bool {
        self.lookups
            .task_types
            .get(task_type_id)
            .is_some_and(|t| t.is_hourly_service)
    }
}

/// `date -> taskTypeId -> shifts`, dates ascending.
fn group_by_date(group: &GroupTally) -> BTreeMap<NaiveDate, BTreeMap<&TaskTypeId, Vec<&ShiftTally>>> {
    let mut by_date: BTreeMap<NaiveDate, BTreeMap<&TaskTypeId, Vec<&ShiftTally>>> = BTreeMap::new();
    for ((date, task_type_id, _), shift) in &group.daily {
        by_date
            .entry(*date)
            .or_default()
            .entry(task_type_id)
            .or_default()
            .push(shift);
    }
    by_date
}
