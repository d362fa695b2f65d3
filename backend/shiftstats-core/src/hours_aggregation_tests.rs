// src/hours_aggregation_tests.rs

#[cfg(test)]
mod tests {
    use crate::hours_aggregation::*;
    use crate::model::*;
    use crate::snapshot::{Snapshot, SnapshotRecords};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};

    // --- Fixtures ---

    fn snapshot(workdays: Value) -> Snapshot {
        let records: SnapshotRecords = serde_json::from_value(json!({
            "taskTypes": [
                {"id": "act", "name": "Setup", "kind": "ACTIVITY"},
                {"id": "guard", "name": "Guard", "kind": "SHIFT", "isHourlyService": false, "shiftHours": 8},
                {"id": "host", "name": "Hostess", "kind": "SHIFT", "isHourlyService": true, "shiftHours": null}
            ],
            "duties": [
                {"id": "d1", "name": "Bar", "code": "BR"},
                {"id": "d2", "name": "Door", "code": "DR"},
                {"id": "d3", "name": "Cloakroom", "code": "CL"}
            ],
            "companies": [
                {"id": "c1", "name": "Acme"},
                {"id": "c2", "name": "Beta"}
            ],
            "users": [
                {"id": "u1", "name": "Alice", "companyId": "c1"},
                {"id": "u2", "name": "Bob", "companyId": "c2"},
                {"id": "u3", "name": "Carol", "companyId": "c1"},
                {"id": "u9", "name": "Drifter"}
            ],
            "events": [
                {"id": "ev1", "name": "Fair", "clientId": "cl1", "locationId": "lo1"},
                {"id": "ev2", "name": "Expo", "clientId": "cl2", "locationId": "lo2"}
            ],
            "workdays": workdays
        }))
        .unwrap();
        Snapshot::from_records(records)
    }

    fn one_day(assignments: Value) -> Snapshot {
        snapshot(json!([
            {"id": "wd1", "date": "2024-05-10", "eventId": "ev1", "assignments": assignments}
        ]))
    }

    fn aggregate(snapshot: &Snapshot, options: ReportOptions, filter: &ReportFilter, group_by: GroupBy) -> Aggregation {
        HoursAggregator::new(&snapshot.lookups, options, filter, group_by).aggregate(snapshot.assignments())
    }

    fn actual() -> ReportOptions {
        ReportOptions::default()
    }

    fn planned() -> ReportOptions {
        ReportOptions {
            hours_type: HoursType::Planned,
            ..ReportOptions::default()
        }
    }

    fn totals(hours: Decimal, shifts: u32, overtime_hours: Decimal) -> Totals {
        Totals {
            hours,
            shifts,
            overtime_hours,
        }
    }

    fn group_totals(aggregation: &Aggregation, key: &str) -> Totals {
        aggregation
            .group(key)
            .map(|g| g.totals)
            .unwrap_or_else(|| panic!("no group {}", key))
    }

    // --- Shift / Overtime ---

    #[test]
    fn shift_and_overtime_split() {
        assert_eq!(shift_and_overtime(dec!(8), Some(dec!(8))), (1, dec!(0)));
        assert_eq!(shift_and_overtime(dec!(6), Some(dec!(8))), (1, dec!(0)));
        assert_eq!(shift_and_overtime(dec!(10), Some(dec!(8))), (1, dec!(2)));
        assert_eq!(shift_and_overtime(dec!(10), None), (0, dec!(10)));
        assert_eq!(shift_and_overtime(dec!(5), Some(dec!(0))), (0, dec!(5)));
    }

    #[test]
    fn hourly_service_counts_raw_hours_without_shifts() {
        let snap = one_day(json!([{
            "id": "a1", "taskTypeId": "host", "startTime": "10:00", "endTime": "18:00",
            "assignedUsers": [{"userId": "u1", "dutyId": "d1"}],
            "timeEntries": [{"userId": "u1", "hoursWorked": 7.5}]
        }]));
        let agg = aggregate(&snap, actual(), &ReportFilter::default(), GroupBy::Employee);
        assert_eq!(group_totals(&agg, "u1"), totals(dec!(7.5), 0, dec!(0)));
    }

    #[test]
    fn shift_based_service_credits_one_shift_per_person() {
        let snap = one_day(json!([{
            "id": "a1", "taskTypeId": "guard", "startTime": "08:00", "endTime": "17:00",
            "assignedUsers": [{"userId": "u1", "dutyId": "d2"}, {"userId": "u3", "dutyId": "d2"}],
            "timeEntries": [{"userId": "u1", "hoursWorked": 9}, {"userId": "u3", "hoursWorked": 9}]
        }]));
        let agg = aggregate(&snap, actual(), &ReportFilter::default(), GroupBy::Company);
        assert_eq!(group_totals(&agg, "c1"), totals(dec!(18), 2, dec!(2)));
        assert_eq!(agg.group("c1").unwrap().categories["d2"], totals(dec!(18), 2, dec!(2)));
    }

    #[test]
    fn single_entry_round_trips_exactly() {
        let snap = one_day(json!([{
            "id": "a1", "taskTypeId": "host", "startTime": "09:00", "endTime": "15:15",
            "userId": "u2",
            "timeEntries": [{"userId": "u2", "hoursWorked": 6.25}]
        }]));
        let agg = aggregate(&snap, actual(), &ReportFilter::default(), GroupBy::Employee);
        assert_eq!(group_totals(&agg, "u2").hours, dec!(6.25));
        assert_eq!(agg.grand_total().hours, dec!(6.25));
    }

    // --- Duty Resolution ---

    #[test]
    fn assigned_users_take_precedence() {
        let snap = one_day(json!([{
            "id": "a1", "taskTypeId": "guard", "userId": "u1",
            "assignedUsers": [{"userId": "u2", "dutyId": "d1"}],
            "personnelRequests": [{"dutyId": "d3", "count": 1}],
            "timeEntries": [{"userId": "u2", "hoursWorked": 4}]
        }]));
        let bindings = resolve_duties(&snap.workdays[0].assignments[0]);
        assert_eq!(
            bindings,
            vec![
                DutyBinding { user_id: "u2".into(), duty_id: "d1".into() },
                DutyBinding { user_id: "u1".into(), duty_id: UNSPECIFIED_DUTY.into() },
            ]
        );
    }

    #[test]
    fn personnel_requests_assign_first_duty_to_every_entry() {
        let snap = one_day(json!([{
            "id": "a1", "taskTypeId": "host",
            "personnelRequests": "[{\"dutyId\":\"d2\",\"count\":2},{\"dutyId\":\"d3\",\"count\":1}]",
            "timeEntries": [{"userId": "u1", "hoursWorked": 3}, {"userId": "u3", "hoursWorked": 5}]
        }]));
        let agg = aggregate(&snap, actual(), &ReportFilter::default(), GroupBy::Duty);
        assert_eq!(group_totals(&agg, "d2"), totals(dec!(8), 0, dec!(0)));
        assert!(agg.group("d3").is_none());
    }

    #[test]
    fn bare_user_id_falls_under_unspecified_duty() {
        let snap = one_day(json!([{
            "id": "a1", "taskTypeId": "host", "userId": "u1",
            "timeEntries": [{"userId": "u1", "hoursWorked": 4}]
        }]));
        let agg = aggregate(&snap, actual(), &ReportFilter::default(), GroupBy::Duty);
        assert_eq!(group_totals(&agg, UNSPECIFIED_DUTY).hours, dec!(4));
    }

    #[test]
    fn malformed_assigned_users_only_affect_their_own_assignment() {
        let snap = one_day(json!([
            {
                "id": "bad", "taskTypeId": "host",
                "assignedUsers": "[{\"userId\": oops",
                "timeEntries": [{"userId": "u1", "hoursWorked": 6}]
            },
            {
                "id": "good", "taskTypeId": "host",
                "assignedUsers": [{"userId": "u2", "dutyId": "d1"}],
                "timeEntries": [{"userId": "u2", "hoursWorked": 8}]
            }
        ]));
        let agg = aggregate(&snap, actual(), &ReportFilter::default(), GroupBy::Duty);
        assert_eq!(group_totals(&agg, "d1").hours, dec!(8));
        // Recorded time survives under the unspecified duty.
        assert_eq!(group_totals(&agg, UNSPECIFIED_DUTY).hours, dec!(6));
        assert_eq!(agg.grand_total().hours, dec!(14));
    }

    #[test]
    fn bad_time_entry_does_not_abort_the_report() {
        let snap = one_day(json!([
            {
                "id": "bad", "taskTypeId": "host",
                "assignedUsers": [{"userId": "u1", "dutyId": "d1"}],
                "timeEntries": [{"userId": null, "hoursWorked": "7.5"}, {"userId": "u1", "hoursWorked": "2.5"}]
            },
            {
                "id": "good", "taskTypeId": "host",
                "assignedUsers": [{"userId": "u2", "dutyId": "d1"}],
                "timeEntries": [{"userId": "u2", "hoursWorked": 8}]
            }
        ]));
        let agg = aggregate(&snap, actual(), &ReportFilter::default(), GroupBy::Employee);
        assert_eq!(group_totals(&agg, "u1").hours, dec!(2.5));
        assert_eq!(group_totals(&agg, "u2").hours, dec!(8));
    }

    // --- Break Handling ---

    #[test]
    fn break_is_added_back_only_for_hourly_services() {
        let assignments = json!([
            {
                "id": "h1", "taskTypeId": "host", "startTime": "09:00", "endTime": "17:00",
                "hasScheduledBreak": true, "scheduledBreakStartTime": "12:00", "scheduledBreakEndTime": "12:30",
                "assignedUsers": [{"userId": "u1", "dutyId": "d1"}],
                "timeEntries": [{"userId": "u1", "hoursWorked": 7}]
            },
            {
                "id": "g1", "taskTypeId": "guard", "startTime": "09:00", "endTime": "17:00",
                "hasScheduledBreak": true, "scheduledBreakStartTime": "12:00", "scheduledBreakEndTime": "12:30",
                "assignedUsers": [{"userId": "u2", "dutyId": "d2"}],
                "timeEntries": [{"userId": "u2", "hoursWorked": 7}]
            }
        ]);
        let snap = one_day(assignments);
        let filter = ReportFilter::default();

        let with_breaks = aggregate(&snap, actual(), &filter, GroupBy::Employee);
        assert_eq!(group_totals(&with_breaks, "u1").hours, dec!(7.5));
        assert_eq!(group_totals(&with_breaks, "u2").hours, dec!(7));

        let options = ReportOptions {
            include_breaks_hourly: false,
            ..actual()
        };
        let without_breaks = aggregate(&snap, options, &filter, GroupBy::Employee);
        assert_eq!(group_totals(&without_breaks, "u1").hours, dec!(7));
        assert_eq!(group_totals(&without_breaks, "u2").hours, dec!(7));
    }

    #[test]
    fn users_without_entries_are_not_counted_in_actual_mode() {
        let snap = one_day(json!([{
            "id": "a1", "taskTypeId": "host",
            "hasScheduledBreak": true, "scheduledBreakStartTime": "12:00", "scheduledBreakEndTime": "13:00",
            "assignedUsers": [{"userId": "u1", "dutyId": "d1"}, {"userId": "u2", "dutyId": "d1"}],
            "timeEntries": [{"userId": "u1", "hoursWorked": 5}]
        }]));
        let agg = aggregate(&snap, actual(), &ReportFilter::default(), GroupBy::Employee);
        assert_eq!(group_totals(&agg, "u1").hours, dec!(6));
        assert!(agg.group("u2").is_none());
    }

    // --- Planned Mode ---

    #[test]
    fn planned_hours_are_split_across_participants() {
        let snap = one_day(json!([{
            "id": "a1", "taskTypeId": "guard", "startTime": "08:00", "endTime": "16:00",
            "hasScheduledBreak": true, "scheduledBreakStartTime": "12:00", "scheduledBreakEndTime": "13:00",
            "assignedUsers": [{"userId": "u1", "dutyId": "d2"}, {"userId": "u3", "dutyId": "d2"}]
        }]));
        let agg = aggregate(&snap, planned(), &ReportFilter::default(), GroupBy::Employee);
        assert_eq!(group_totals(&agg, "u1"), totals(dec!(3.5), 1, dec!(0)));
        assert_eq!(group_totals(&agg, "u3"), totals(dec!(3.5), 1, dec!(0)));
    }

    #[test]
    fn planned_hourly_service_keeps_break_when_enabled() {
        let snap = one_day(json!([{
            "id": "a1", "taskTypeId": "host", "startTime": "22:00", "endTime": "06:00",
            "hasScheduledBreak": true, "scheduledBreakStartTime": "02:00", "scheduledBreakEndTime": "03:00",
            "assignedUsers": [{"userId": "u1", "dutyId": "d1"}, {"userId": "u2", "dutyId": "d1"}]
        }]));
        let filter = ReportFilter::default();

        let kept = aggregate(&snap, planned(), &filter, GroupBy::Employee);
        assert_eq!(group_totals(&kept, "u1").hours, dec!(4));

        let options = ReportOptions {
            include_breaks_hourly: false,
            ..planned()
        };
        let deducted = aggregate(&snap, options, &filter, GroupBy::Employee);
        assert_eq!(group_totals(&deducted, "u1").hours, dec!(3.5));
    }

    #[test]
    fn planned_participants_fall_back_to_entries_then_user() {
        let snap = one_day(json!([
            {
                "id": "a1", "taskTypeId": "host", "startTime": "10:00", "endTime": "16:00",
                "timeEntries": [{"userId": "u1", "hoursWorked": 1}, {"userId": "u2", "hoursWorked": 1}]
            },
            {
                "id": "a2", "taskTypeId": "host", "startTime": "10:00", "endTime": "14:00",
                "userId": "u3"
            }
        ]));
        let assignments = &snap.workdays[0].assignments;
        assert_eq!(planned_participants(&assignments[0]), vec!["u1".to_string(), "u2".to_string()]);
        assert_eq!(planned_participants(&assignments[1]), vec!["u3".to_string()]);

        let agg = aggregate(&snap, planned(), &ReportFilter::default(), GroupBy::Employee);
        assert_eq!(group_totals(&agg, "u1").hours, dec!(3));
        assert_eq!(group_totals(&agg, "u3").hours, dec!(4));
    }

    #[test]
    fn unstaffed_assignment_counts_for_event_and_requested_duty() {
        let snap = one_day(json!([{
            "id": "a1", "taskTypeId": "host", "startTime": "08:00", "endTime": "12:00",
            "personnelRequests": [{"dutyId": "d1", "count": 2}]
        }]));
        let filter = ReportFilter::default();

        let by_event = aggregate(&snap, planned(), &filter, GroupBy::Event);
        assert_eq!(group_totals(&by_event, "ev1"), totals(dec!(4), 0, dec!(0)));
        let shift = by_event.group("ev1").unwrap().daily.values().next().unwrap();
        assert!(shift.people.is_empty());
        assert_eq!(shift.duties["d1"].hours, dec!(4));

        let by_duty = aggregate(&snap, planned(), &filter, GroupBy::Duty);
        assert_eq!(group_totals(&by_duty, "d1").hours, dec!(4));

        assert!(aggregate(&snap, planned(), &filter, GroupBy::Employee).groups.is_empty());
        assert!(aggregate(&snap, planned(), &filter, GroupBy::Company).groups.is_empty());
        assert!(aggregate(&snap, actual(), &filter, GroupBy::Event).groups.is_empty());

        let by_user = ReportFilter {
            user_id: Some("u1".to_string()),
            ..ReportFilter::default()
        };
        assert!(aggregate(&snap, planned(), &by_user, GroupBy::Event).groups.is_empty());
    }

    #[test]
    fn planned_split_is_rounded_per_person() {
        let snap = one_day(json!([{
            "id": "a1", "taskTypeId": "host", "startTime": "08:00", "endTime": "09:00",
            "assignedUsers": [
                {"userId": "u1", "dutyId": "d1"},
                {"userId": "u2", "dutyId": "d1"},
                {"userId": "u3", "dutyId": "d1"}
            ]
        }]));
        let agg = aggregate(&snap, planned(), &ReportFilter::default(), GroupBy::Employee);
        assert_eq!(group_totals(&agg, "u1").hours, dec!(0.333333));
        assert_eq!(agg.grand_total().hours, dec!(0.999999));
    }

    // --- Filtering & Skipping ---

    #[test]
    fn activities_and_unknown_task_types_are_skipped() {
        let snap = one_day(json!([
            {
                "id": "a0", "taskTypeId": "act", "startTime": "08:00", "endTime": "20:00",
                "timeEntries": [{"userId": "u1", "hoursWorked": 12}]
            },
            {
                "id": "a1", "taskTypeId": "ghost",
                "timeEntries": [{"userId": "u1", "hoursWorked": 3}]
            }
        ]));
        let agg = aggregate(&snap, actual(), &ReportFilter::default(), GroupBy::Employee);
        assert!(agg.groups.is_empty());
    }

    #[test]
    fn filters_restrict_dates_events_clients_and_companies() {
        let entry = |id: &str, user: &str| {
            json!({
                "id": id, "taskTypeId": "host",
                "assignedUsers": [{"userId": user, "dutyId": "d1"}],
                "timeEntries": [{"userId": user, "hoursWorked": 2}]
            })
        };
        let snap = snapshot(json!([
            {"id": "wd1", "date": "2024-05-10", "eventId": "ev1", "assignments": [entry("a1", "u1"), entry("a2", "u2")]},
            {"id": "wd2", "date": "2024-05-11", "eventId": "ev2", "assignments": [entry("a3", "u1")]}
        ]));
        let run = |filter: ReportFilter| aggregate(&snap, actual(), &filter, GroupBy::Employee).grand_total().hours;

        assert_eq!(run(ReportFilter::default()), dec!(6));
        assert_eq!(
            run(ReportFilter {
                start_date: NaiveDate::from_ymd_opt(2024, 5, 11),
                ..ReportFilter::default()
            }),
            dec!(2)
        );
        assert_eq!(
            run(ReportFilter {
                end_date: NaiveDate::from_ymd_opt(2024, 5, 10),
                ..ReportFilter::default()
            }),
            dec!(4)
        );
        assert_eq!(
            run(ReportFilter {
                event_id: Some("ev2".into()),
                ..ReportFilter::default()
            }),
            dec!(2)
        );
        assert_eq!(
            run(ReportFilter {
                client_id: Some("cl1".into()),
                ..ReportFilter::default()
            }),
            dec!(4)
        );
        assert_eq!(
            run(ReportFilter {
                company_id: Some("c1".into()),
                ..ReportFilter::default()
            }),
            dec!(4)
        );
        assert_eq!(
            run(ReportFilter {
                user_id: Some("u2".into()),
                location_id: Some("lo1".into()),
                ..ReportFilter::default()
            }),
            dec!(2)
        );
    }

    #[test]
    fn users_without_company_are_left_out_of_company_grouping() {
        let snap = one_day(json!([{
            "id": "a1", "taskTypeId": "host",
            "assignedUsers": [{"userId": "u9", "dutyId": "d1"}, {"userId": "u1", "dutyId": "d1"}],
            "timeEntries": [{"userId": "u9", "hoursWorked": 3}, {"userId": "u1", "hoursWorked": 2}]
        }]));
        let agg = aggregate(&snap, actual(), &ReportFilter::default(), GroupBy::Company);
        assert_eq!(agg.groups.len(), 1);
        assert_eq!(group_totals(&agg, "c1").hours, dec!(2));
    }

    // --- Merging ---

    #[test]
    fn merged_partials_equal_whole_aggregation() {
        let snap = snapshot(json!([
            {"id": "wd1", "date": "2024-05-10", "eventId": "ev1", "assignments": [
                {
                    "id": "a1", "taskTypeId": "guard", "startTime": "08:00", "endTime": "17:00",
                    "hasScheduledBreak": true, "scheduledBreakStartTime": "12:00", "scheduledBreakEndTime": "12:30",
                    "assignedUsers": [{"userId": "u1", "dutyId": "d2"}],
                    "timeEntries": [{"userId": "u1", "hoursWorked": 9.5}]
                },
                {
                    "id": "a2", "taskTypeId": "guard", "startTime": "08:00", "endTime": "17:00",
                    "hasScheduledBreak": true, "scheduledBreakStartTime": "11:30", "scheduledBreakEndTime": "12:00",
                    "assignedUsers": [{"userId": "u3", "dutyId": "d1"}],
                    "timeEntries": [{"userId": "u3", "hoursWorked": 8}]
                }
            ]},
            {"id": "wd2", "date": "2024-05-11", "eventId": "ev2", "assignments": [
                {
                    "id": "a3", "taskTypeId": "host", "startTime": "18:00", "endTime": "02:00",
                    "personnelRequests": [{"dutyId": "d1", "count": 1}],
                    "timeEntries": [{"userId": "u2", "hoursWorked": 8}, {"userId": "u1", "hoursWorked": 1.5}]
                }
            ]}
        ]));
        let filter = ReportFilter::default();
        let aggregator = HoursAggregator::new(&snap.lookups, actual(), &filter, GroupBy::Company);
        let all: Vec<&Assignment> = snap.assignments().collect();

        let whole = aggregator.aggregate(all.iter().copied());
        let left = aggregator.aggregate(all[..1].iter().copied());
        let right = aggregator.aggregate(all[1..].iter().copied());

        assert_eq!(left.clone().merge(right.clone()), whole);
        assert_eq!(right.merge(left), whole);
        assert_eq!(whole.grand_total(), totals(dec!(27), 2, dec!(1.5)));

        // Disagreeing breaks in one bucket resolve the same way in any order.
        let bucket = whole.group("c1").unwrap().daily.values().next().unwrap();
        assert_eq!(bucket.scheduled_break.unwrap().start, "11:30".parse().ok());
    }
}
