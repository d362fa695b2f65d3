// src/snapshot.rs
//
// Read-only view of the records a report request works on. The persistence layer
// fetches them; this module only indexes them once per request.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::model::{
    de_id, de_opt_id, Assignment, CompanyId, Duty, DutyId, EventId, RawWorkday, TaskKind,
    TaskType, TaskTypeId, UserId, Workday, WorkdayId, UNSPECIFIED_DUTY,
};

pub const UNSPECIFIED_DUTY_NAME: &str = "Unspecified";

// --- Reference Records ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(deserialize_with = "de_id")]
    pub id: CompanyId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(deserialize_with = "de_id")]
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub company_id: Option<CompanyId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInfo {
    #[serde(deserialize_with = "de_id")]
    pub id: EventId,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub client_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub location_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkdayInfo<'a> {
    pub date: NaiveDate,
    pub event_id: Option<&'a str>,
}

/// Everything the persistence collaborator hands over for one request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecords {
    #[serde(default)]
    pub task_types: Vec<TaskType>,
    #[serde(default)]
    pub duties: Vec<Duty>,
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub users: Vec<UserInfo>,
    #[serde(default)]
    pub events: Vec<EventInfo>,
    #[serde(default)]
    pub workdays: Vec<RawWorkday>,
}

// --- Snapshot ---

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub workdays: Vec<Workday>,
    pub lookups: Lookups,
}

impl Snapshot {
    pub fn from_records(records: SnapshotRecords) -> Self {
        let workdays: Vec<Workday> = records.workdays.into_iter().map(Workday::from_raw).collect();
        let lookups = Lookups {
            task_types: index(records.task_types, |t| t.id.clone()),
            duties: index(records.duties, |d| d.id.clone()),
            companies: index(records.companies, |c| c.id.clone()),
            users: index(records.users, |u| u.id.clone()),
            events: index(records.events, |e| e.id.clone()),
            workdays: workdays
                .iter()
                .map(|w| (w.id.clone(), (w.date, w.event_id.clone())))
                .collect(),
        };
        debug!(
            "Snapshot indexed: {} workdays, {} task types, {} duties, {} users",
            workdays.len(),
            lookups.task_types.len(),
            lookups.duties.len(),
            lookups.users.len()
        );
        Snapshot { workdays, lookups }
    }

    pub fn workday(&self, workday_id: &str) -> Option<&Workday> {
        self.workdays.iter().find(|w| w.id == workday_id)
    }

    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.workdays.iter().flat_map(|w| w.assignments.iter())
    }

    /// Assignments whose task type is SHIFT, the input of every report.
    pub fn shift_assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments().filter(|a| {
            self.lookups
                .task_types
                .get(&a.task_type_id)
                .is_some_and(|t| t.kind == TaskKind::Shift)
        })
    }
}

fn index<T, K: std::hash::Hash + Eq>(items: Vec<T>, key: impl Fn(&T) -> K) -> HashMap<K, T> {
    items.into_iter().map(|item| (key(&item), item)).collect()
}

// --- Lookups ---

/// Per-request lookup tables. Built once per request and passed down; never shared
/// between requests.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    pub task_types: HashMap<TaskTypeId, TaskType>,
    pub duties: HashMap<DutyId, Duty>,
    pub companies: HashMap<CompanyId, Company>,
    pub users: HashMap<UserId, UserInfo>,
    pub events: HashMap<EventId, EventInfo>,
    pub workdays: HashMap<WorkdayId, (NaiveDate, Option<EventId>)>,
}

impl Lookups {
    pub fn workday(&self, workday_id: &str) -> Option<WorkdayInfo<'_>> {
        self.workdays
            .get(workday_id)
            .map(|(date, event_id)| WorkdayInfo {
                date: *date,
                event_id: event_id.as_deref(),
            })
    }

    pub fn company_of(&self, user_id: &str) -> Option<&str> {
        self.users.get(user_id)?.company_id.as_deref()
    }

    pub fn company_name(&self, company_id: &str) -> String {
        self.companies
            .get(company_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| company_id.to_string())
    }

    pub fn user_name(&self, user_id: &str) -> String {
        self.users
            .get(user_id)
            .map(|u| u.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| user_id.to_string())
    }

    pub fn event_name(&self, event_id: &str) -> String {
        self.events
            .get(event_id)
            .map(|e| e.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| event_id.to_string())
    }

    /// `(name, code)` of a duty; the unspecified duty and unknown ids get readable
    /// fallbacks.
    pub fn duty_label(&self, duty_id: &str) -> (String, String) {
        if duty_id == UNSPECIFIED_DUTY {
            return (UNSPECIFIED_DUTY_NAME.to_string(), String::new());
        }
        match self.duties.get(duty_id) {
            Some(duty) => (duty.name.clone(), duty.code.clone()),
            None => (duty_id.to_string(), String::new()),
        }
    }

    pub fn task_type_name(&self, task_type_id: &str) -> String {
        self.task_types
            .get(task_type_id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| task_type_id.to_string())
    }
}
