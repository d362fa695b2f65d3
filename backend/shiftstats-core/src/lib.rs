// src/lib.rs
pub mod break_calc;
pub mod config;
pub mod error;
pub mod hours_aggregation;
pub mod model;
pub mod report;
pub mod shift_validation;
pub mod snapshot;
pub mod time_interval;

mod hours_aggregation_tests;

pub use config::Config;
pub use error::{Rejection, ValidationError};
pub use hours_aggregation::{Aggregation, GroupBy, HoursAggregator, HoursType, ReportFilter, ReportOptions, Totals};
pub use model::{Assignment, RawAssignment, Workday};
pub use report::{CompanyReport, DutyReport, EmployeeReport, EventReport, ReportBuilder, ReportSummary};
pub use shift_validation::validate_assignment;
pub use snapshot::{Lookups, Snapshot, SnapshotRecords};
pub use time_interval::{ClockTime, Interval};
