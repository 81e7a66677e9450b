#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use std::sync::Arc;

    use crate::audit::AuditLog;
    use crate::config::CompanyConfig;
    use crate::events::{
        AttendanceData, AttendanceEvent, AttendanceWebhook, Label, Profile, Stamp,
        TOPIC_CHECKIN_ENTERED, TOPIC_CHECKIN_EXITED,
    };
    use crate::hr_client::{Assignment, HrClient, HrEmployee, ScheduleBreak, Timesheet};
    use crate::identity::{match_company, match_employee, normalize_name};
    use crate::occupancy_client::OccupancyClient;
    use crate::reconcile::{
        infer_breaks, primary_assignment, select_timesheet_to_update, timesheet_start_instant,
        EventOutcome, Reconciler,
    };
    use crate::token::TokenProvider;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn schedule_break(start_seconds: i64, end_seconds: i64) -> ScheduleBreak {
        ScheduleBreak {
            description: Some("Lunch".to_string()),
            start_seconds,
            end_seconds,
            paid: false,
        }
    }

    fn timesheet(id: &str, date: NaiveDate, start_time: &str) -> Timesheet {
        Timesheet {
            id: id.to_string(),
            employee_id: "emp-1".to_string(),
            date,
            start_time: start_time.to_string(),
            end_time: None,
            breaks: Vec::new(),
            status: None,
        }
    }

    fn assignment(id: &str, is_primary: bool) -> Assignment {
        Assignment {
            id: id.to_string(),
            name: None,
            is_primary,
        }
    }

    fn employee(id: &str, display_name: Option<&str>, first: &str, last: &str) -> HrEmployee {
        HrEmployee {
            id: id.to_string(),
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            display_name: display_name.map(|n| n.to_string()),
            email: Some(format!("{id}@example.com")),
        }
    }

    fn acme() -> CompanyConfig {
        CompanyConfig {
            label: "Acme Industrial".to_string(),
            hr_organisation_id: "org-1".to_string(),
            company_id: "ACME".to_string(),
            company_name: "Acme Industrial Pty Ltd".to_string(),
        }
    }

    fn attendance(
        topic: &str,
        entry: Option<DateTime<Utc>>,
        exit: Option<DateTime<Utc>>,
        name: &str,
        labels: &[&str],
    ) -> AttendanceWebhook {
        AttendanceWebhook {
            event: AttendanceEvent {
                id: "evt-1".to_string(),
                topic: topic.to_string(),
                data: AttendanceData {
                    entry: entry.map(|timestamp| Stamp { timestamp }),
                    exit: exit.map(|timestamp| Stamp { timestamp }),
                },
            },
            profile: Profile {
                name: name.to_string(),
            },
            labels: labels
                .iter()
                .map(|l| Label {
                    name: l.to_string(),
                })
                .collect(),
        }
    }

    // Clients pointed at an unroutable address: tests built on this only
    // exercise paths that return before any remote call.
    fn test_reconciler(companies: Vec<CompanyConfig>) -> Reconciler {
        let http = reqwest::Client::new();
        let hr_tokens = Arc::new(TokenProvider::new(
            "hr-platform",
            http.clone(),
            "http://localhost:9/token",
            "id",
            "secret",
        ));
        let occupancy_tokens = Arc::new(TokenProvider::new(
            "occupancy-platform",
            http.clone(),
            "http://localhost:9/token",
            "id",
            "secret",
        ));
        let hr = Arc::new(
            HrClient::new(http.clone(), "http://localhost:9/hr/", hr_tokens).expect("hr client"),
        );
        let occupancy = Arc::new(
            OccupancyClient::new(http, "http://localhost:9/occupancy/", occupancy_tokens)
                .expect("occupancy client"),
        );
        Reconciler::new(hr, occupancy, Arc::new(AuditLog::disabled()), companies)
    }

    // --- Event gating ---

    #[tokio::test]
    async fn entry_only_event_is_acknowledged_without_any_write() {
        let reconciler = test_reconciler(vec![acme()]);
        let webhook = attendance(
            TOPIC_CHECKIN_ENTERED,
            Some(utc(2025, 3, 3, 21, 58)),
            None,
            "Dana Cole",
            &["Acme Industrial"],
        );

        let outcome = reconciler
            .process_attendance(&webhook)
            .await
            .expect("no-op succeeds");
        assert_eq!(outcome, EventOutcome::SignedIn);
    }

    #[tokio::test]
    async fn exit_event_missing_entry_stamp_is_ignored() {
        let reconciler = test_reconciler(vec![acme()]);
        let webhook = attendance(
            TOPIC_CHECKIN_EXITED,
            None,
            Some(utc(2025, 3, 4, 6, 2)),
            "Dana Cole",
            &["Acme Industrial"],
        );

        let outcome = reconciler
            .process_attendance(&webhook)
            .await
            .expect("ignored, not failed");
        assert!(matches!(outcome, EventOutcome::Ignored(_)));
    }

    #[tokio::test]
    async fn unsupported_topic_is_ignored() {
        let reconciler = test_reconciler(vec![acme()]);
        let webhook = attendance(
            "CHECKIN_DWELL",
            Some(utc(2025, 3, 3, 21, 58)),
            Some(utc(2025, 3, 4, 6, 2)),
            "Dana Cole",
            &["Acme Industrial"],
        );

        let outcome = reconciler
            .process_attendance(&webhook)
            .await
            .expect("ignored, not failed");
        match outcome {
            EventOutcome::Ignored(reason) => assert!(reason.contains("CHECKIN_DWELL")),
            other => panic!("expected ignored outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unmatched_company_label_is_ignored_with_no_writes() {
        let reconciler = test_reconciler(vec![acme()]);
        let webhook = attendance(
            TOPIC_CHECKIN_EXITED,
            Some(utc(2025, 3, 3, 21, 58)),
            Some(utc(2025, 3, 4, 6, 2)),
            "Some Visitor",
            &["Visitors"],
        );

        let outcome = reconciler
            .process_attendance(&webhook)
            .await
            .expect("unmatched events are acknowledged");
        assert!(matches!(outcome, EventOutcome::Ignored(_)));
    }

    // --- Break inference ---

    #[test]
    fn no_break_for_short_shift_without_schedule() {
        let breaks = infer_breaks(
            utc(2025, 3, 3, 8, 0),
            utc(2025, 3, 3, 12, 0),
            date(2025, 3, 3),
            0,
            &[],
        );
        assert!(breaks.is_empty());
    }

    #[test]
    fn shift_at_threshold_gets_no_break() {
        // 4.6 hours exactly: 08:00 to 12:36.
        let breaks = infer_breaks(
            utc(2025, 3, 3, 8, 0),
            utc(2025, 3, 3, 12, 36),
            date(2025, 3, 3),
            0,
            &[],
        );
        assert!(breaks.is_empty());
    }

    #[test]
    fn long_shift_without_schedule_gets_single_half_hour_break() {
        let breaks = infer_breaks(
            utc(2025, 3, 3, 8, 0),
            utc(2025, 3, 3, 16, 0),
            date(2025, 3, 3),
            0,
            &[],
        );
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].description, "Unscheduled break");
    }

    // Pins the upstream system's placement: the synthetic break is
    // anchored to the exit stamp, not the entry.
    #[test]
    fn unscheduled_break_is_anchored_after_exit() {
        let breaks = infer_breaks(
            utc(2025, 3, 3, 8, 0),
            utc(2025, 3, 3, 16, 0),
            date(2025, 3, 3),
            0,
            &[],
        );
        assert_eq!(breaks[0].start_time, "20:00");
        assert_eq!(breaks[0].end_time, "20:30");
    }

    #[test]
    fn unscheduled_break_honours_site_offset() {
        // Site 10 hours ahead of the server: exit 06:00 UTC lands the
        // break at 06:00 + 10h + 4h = 20:00 site time.
        let breaks = infer_breaks(
            utc(2025, 3, 3, 21, 0),
            utc(2025, 3, 4, 6, 0),
            date(2025, 3, 4),
            600,
            &[],
        );
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].start_time, "20:00");
        assert_eq!(breaks[0].end_time, "20:30");
    }

    #[test]
    fn scheduled_break_inside_shift_is_attached() {
        // 12:00-12:30 local, shift 08:00-16:00.
        let breaks = infer_breaks(
            utc(2025, 3, 3, 8, 0),
            utc(2025, 3, 3, 16, 0),
            date(2025, 3, 3),
            0,
            &[schedule_break(43_200, 45_000)],
        );
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].description, "Lunch");
        assert_eq!(breaks[0].start_time, "12:00");
        assert_eq!(breaks[0].end_time, "12:30");
    }

    #[test]
    fn scheduled_break_before_entry_is_omitted() {
        // Shift starts after the scheduled window.
        let breaks = infer_breaks(
            utc(2025, 3, 3, 13, 0),
            utc(2025, 3, 3, 18, 0),
            date(2025, 3, 3),
            0,
            &[schedule_break(43_200, 45_000)],
        );
        assert!(breaks.is_empty());
    }

    #[test]
    fn scheduled_break_touching_shift_edge_is_omitted() {
        // Containment is strict: a break starting exactly at entry or
        // ending exactly at exit does not qualify.
        let at_entry = infer_breaks(
            utc(2025, 3, 3, 12, 0),
            utc(2025, 3, 3, 18, 0),
            date(2025, 3, 3),
            0,
            &[schedule_break(43_200, 45_000)],
        );
        assert!(at_entry.is_empty());

        let at_exit = infer_breaks(
            utc(2025, 3, 3, 8, 0),
            utc(2025, 3, 3, 12, 30),
            date(2025, 3, 3),
            0,
            &[schedule_break(43_200, 45_000)],
        );
        assert!(at_exit.is_empty());
    }

    #[test]
    fn second_scheduled_break_is_ignored() {
        let breaks = infer_breaks(
            utc(2025, 3, 3, 8, 0),
            utc(2025, 3, 3, 18, 0),
            date(2025, 3, 3),
            0,
            &[schedule_break(43_200, 45_000), schedule_break(54_000, 55_800)],
        );
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].start_time, "12:00");
    }

    #[test]
    fn uncontained_scheduled_break_does_not_fall_back_to_synthetic() {
        // A defined-but-uncontained break means no break at all, even on
        // a shift long enough to otherwise earn a synthetic one.
        let breaks = infer_breaks(
            utc(2025, 3, 3, 13, 0),
            utc(2025, 3, 3, 21, 0),
            date(2025, 3, 3),
            0,
            &[schedule_break(43_200, 45_000)],
        );
        assert!(breaks.is_empty());
    }

    #[test]
    fn scheduled_break_respects_site_offset() {
        // Site 10h ahead: local midnight is 14:00 UTC the previous day,
        // so a 12:00 local break runs 02:00-02:30 UTC on the shift date.
        let breaks = infer_breaks(
            utc(2025, 3, 3, 21, 0),
            utc(2025, 3, 4, 6, 0),
            date(2025, 3, 4),
            600,
            &[schedule_break(43_200, 45_000)],
        );
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].start_time, "12:00");
    }

    // --- Timesheet matching ---

    #[test]
    fn timesheet_within_window_is_selected() {
        let exit = utc(2025, 3, 4, 6, 0);
        // One entry started 14 hours before the exit, one 10 hours before;
        // only the 10-hour one falls inside the 12-hour window.
        let outside = timesheet("ts-old", date(2025, 3, 3), "16:00");
        let inside = timesheet("ts-new", date(2025, 3, 3), "20:00");
        let entries = vec![outside, inside];

        let selected = select_timesheet_to_update(&entries, exit, 0).expect("a match");
        assert_eq!(selected.id, "ts-new");
    }

    #[test]
    fn no_timesheet_selected_outside_window() {
        let exit = utc(2025, 3, 4, 6, 0);
        let entries = vec![timesheet("ts-old", date(2025, 3, 3), "16:00")];
        assert!(select_timesheet_to_update(&entries, exit, 0).is_none());
    }

    #[test]
    fn remote_order_decides_between_candidates() {
        let exit = utc(2025, 3, 4, 6, 0);
        let entries = vec![
            timesheet("ts-a", date(2025, 3, 3), "22:00"),
            timesheet("ts-b", date(2025, 3, 3), "23:00"),
        ];
        let selected = select_timesheet_to_update(&entries, exit, 0).expect("a match");
        assert_eq!(selected.id, "ts-a");
    }

    #[test]
    fn timesheet_starting_after_exit_is_not_matched() {
        let exit = utc(2025, 3, 4, 6, 0);
        let entries = vec![timesheet("ts-future", date(2025, 3, 4), "08:00")];
        assert!(select_timesheet_to_update(&entries, exit, 0).is_none());
    }

    #[test]
    fn start_instant_parses_both_clock_formats() {
        let short = timesheet("ts-1", date(2025, 3, 3), "06:00");
        let long = timesheet("ts-2", date(2025, 3, 3), "06:00:00");
        let expected = utc(2025, 3, 3, 6, 0);
        assert_eq!(timesheet_start_instant(&short, 0), Some(expected));
        assert_eq!(timesheet_start_instant(&long, 0), Some(expected));
        assert!(timesheet_start_instant(&timesheet("ts-3", date(2025, 3, 3), "noon"), 0).is_none());
    }

    #[test]
    fn start_instant_applies_site_offset() {
        // 06:00 site-local at +600 minutes is 20:00 UTC the day before.
        let entry = timesheet("ts-1", date(2025, 3, 4), "06:00");
        assert_eq!(
            timesheet_start_instant(&entry, 600),
            Some(utc(2025, 3, 3, 20, 0))
        );
    }

    // --- Primary assignment selection ---

    #[test]
    fn primary_flag_wins_over_order() {
        let records = vec![assignment("dep-a", false), assignment("dep-b", true)];
        let chosen = primary_assignment(records).expect("a record");
        assert_eq!(chosen.id, "dep-b");
    }

    #[test]
    fn first_entry_stands_in_when_nothing_is_flagged() {
        let records = vec![assignment("dep-a", false), assignment("dep-b", false)];
        let chosen = primary_assignment(records).expect("a record");
        assert_eq!(chosen.id, "dep-a");
    }

    #[test]
    fn empty_assignment_collection_yields_none() {
        assert!(primary_assignment(Vec::new()).is_none());
    }

    // --- Identity matching ---

    #[test]
    fn company_label_matching_is_case_insensitive() {
        let labels = vec![
            Label {
                name: "Night shift".to_string(),
            },
            Label {
                name: "ACME INDUSTRIAL".to_string(),
            },
        ];
        let companies = vec![acme()];
        let company = match_company(&labels, &companies).expect("a match");
        assert_eq!(company.hr_organisation_id, "org-1");
    }

    #[test]
    fn employee_match_normalizes_whitespace_and_case() {
        let roster = vec![
            employee("emp-1", Some("Dana  Cole "), "Dana", "Cole"),
            employee("emp-2", None, "Riley", "North"),
        ];
        assert_eq!(
            match_employee(&roster, "dana cole").map(|e| e.id.as_str()),
            Some("emp-1")
        );
        // No display name: "first last" composition is matched instead.
        assert_eq!(
            match_employee(&roster, "Riley North").map(|e| e.id.as_str()),
            Some("emp-2")
        );
        assert!(match_employee(&roster, "Nobody Here").is_none());
    }

    #[test]
    fn identity_resolution_is_idempotent() {
        let roster = vec![employee("emp-1", Some("Dana Cole"), "Dana", "Cole")];
        let labels = vec![Label {
            name: "Acme Industrial".to_string(),
        }];
        let companies = vec![acme()];

        let first = (
            match_company(&labels, &companies).map(|c| c.hr_organisation_id.clone()),
            match_employee(&roster, "Dana Cole").map(|e| e.id.clone()),
        );
        let second = (
            match_company(&labels, &companies).map(|c| c.hr_organisation_id.clone()),
            match_employee(&roster, "Dana Cole").map(|e| e.id.clone()),
        );
        assert_eq!(first, second);
        assert_eq!(first.0.as_deref(), Some("org-1"));
        assert_eq!(first.1.as_deref(), Some("emp-1"));
    }

    #[test]
    fn normalize_name_collapses_runs_of_whitespace() {
        assert_eq!(normalize_name("  Dana \t Cole "), "dana cole");
    }
}
