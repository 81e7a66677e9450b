//! Attendance-to-timesheet reconciliation: resolve the event subject,
//! gather the employee's working context, infer the break window and
//! create or patch the timesheet entry covering the shift.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::{AuditLog, AuditRecord};
use crate::config::CompanyConfig;
use crate::error::AppError;
use crate::events::{AttendanceWebhook, Label, TOPIC_CHECKIN_ENTERED, TOPIC_CHECKIN_EXITED};
use crate::hr_client::{
    Assignment, AssignmentKind, HrClient, ScheduleBreak, Timesheet, TimesheetBreak,
    TimesheetPayload, WorkSchedule,
};
use crate::identity::{resolve_identity, EmployeeIdentity};
use crate::occupancy_client::OccupancyClient;

/// Shifts longer than this get a synthetic break when the schedule
/// defines none. 4.6 hours.
const SYNTHETIC_BREAK_THRESHOLD_SECS: i64 = 16_560;
const SYNTHETIC_BREAK_MINUTES: i64 = 30;
const SYNTHETIC_BREAK_ANCHOR_HOURS: i64 = 4;

/// How far back to search for an existing timesheet covering the shift.
const TIMESHEET_LOOKBACK_HOURS: i64 = 24;
/// An existing entry counts as "this shift" when it started within this
/// window before the exit stamp.
const TIMESHEET_MATCH_WINDOW_HOURS: i64 = 12;

/// What processing an inbound event amounted to. Informational outcomes
/// are acknowledged with HTTP 200 so the webhook sender never retries
/// events we deliberately ignore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Processed { detail: String },
    SignedIn,
    Ignored(String),
}

/// The employee's working context for one shift. Each assignment is the
/// record the HR platform flags as primary (first entry when no record
/// carries the flag).
#[derive(Debug, Clone)]
pub struct ShiftContext {
    pub schedule: Option<WorkSchedule>,
    pub department: Assignment,
    pub location: Assignment,
    pub project: Assignment,
    pub role: Assignment,
    pub offset_minutes: i64,
}

pub struct Reconciler {
    hr: Arc<HrClient>,
    occupancy: Arc<OccupancyClient>,
    audit: Arc<AuditLog>,
    companies: Vec<CompanyConfig>,
}

impl Reconciler {
    pub fn new(
        hr: Arc<HrClient>,
        occupancy: Arc<OccupancyClient>,
        audit: Arc<AuditLog>,
        companies: Vec<CompanyConfig>,
    ) -> Self {
        Self {
            hr,
            occupancy,
            audit,
            companies,
        }
    }

    pub async fn process_attendance(
        &self,
        webhook: &AttendanceWebhook,
    ) -> Result<EventOutcome, AppError> {
        let event = &webhook.event;
        match event.topic.as_str() {
            TOPIC_CHECKIN_ENTERED | TOPIC_CHECKIN_EXITED => {}
            other => {
                return Ok(EventOutcome::Ignored(format!(
                    "unsupported event topic '{other}'"
                )))
            }
        }

        // A timesheet is only written once both stamps exist; an
        // entry-only event is the "signed in" no-op.
        let (entry, exit) = match (webhook.entry_timestamp(), webhook.exit_timestamp()) {
            (Some(entry), Some(exit)) => (entry, exit),
            (Some(_), None) => {
                info!("{} signed in, awaiting exit event", webhook.profile.name);
                return Ok(EventOutcome::SignedIn);
            }
            _ => {
                return Ok(EventOutcome::Ignored(
                    "event carries no entry timestamp".to_string(),
                ))
            }
        };

        let Some(identity) = resolve_identity(
            &self.hr,
            &self.companies,
            &webhook.profile.name,
            &webhook.labels,
        )
        .await?
        else {
            return Ok(EventOutcome::Ignored(format!(
                "no matching company or employee for '{}'",
                webhook.profile.name
            )));
        };

        let ctx = self.fetch_context(&identity, &webhook.labels).await?;

        let local_entry = entry + Duration::minutes(ctx.offset_minutes);
        let shift_date = local_entry.date_naive();
        let schedule_breaks = ctx
            .schedule
            .as_ref()
            .map(|s| s.breaks.as_slice())
            .unwrap_or(&[]);
        let breaks = infer_breaks(entry, exit, shift_date, ctx.offset_minutes, schedule_breaks);

        let write_result = self
            .write_timesheet(&identity, &ctx, entry, exit, &breaks)
            .await;

        // Independent side effect: the audit row is appended whatever
        // became of the timesheet write, and neither failure rolls the
        // other back.
        let record = AuditRecord {
            event_id: event.id.clone(),
            event_name: event.topic.clone(),
            entry_time: entry,
            exit_time: exit,
            employee_id: identity.employee.id.clone(),
            employee_name: identity.employee.full_name(),
            employee_email: identity.employee.email.clone(),
            company_id: identity.company.company_id.clone(),
            company_name: identity.company.company_name.clone(),
        };
        if let Err(e) = self.audit.append(&record).await {
            warn!("audit append failed for event {}: {}", event.id, e);
        }

        let (timesheet_id, updated) = write_result?;
        Ok(EventOutcome::Processed {
            detail: format!(
                "timesheet {} {}",
                timesheet_id,
                if updated { "updated" } else { "created" }
            ),
        })
    }

    /// The five context lookups are read-only and independent, so they
    /// run concurrently and fail fast on the first error.
    async fn fetch_context(
        &self,
        identity: &EmployeeIdentity,
        labels: &[Label],
    ) -> Result<ShiftContext, AppError> {
        let org = &identity.company.hr_organisation_id;
        let emp = &identity.employee.id;

        let (schedules, departments, locations, projects, roles) = tokio::try_join!(
            self.hr.work_schedules(org, emp),
            self.hr.assignments(org, emp, AssignmentKind::Department),
            self.hr.assignments(org, emp, AssignmentKind::Location),
            self.hr.assignments(org, emp, AssignmentKind::Project),
            self.hr.assignments(org, emp, AssignmentKind::Role),
        )?;

        let department = primary_assignment(departments)
            .ok_or(AppError::MissingAssignment(AssignmentKind::Department.label()))?;
        let location = primary_assignment(locations)
            .ok_or(AppError::MissingAssignment(AssignmentKind::Location.label()))?;
        let project = primary_assignment(projects)
            .ok_or(AppError::MissingAssignment(AssignmentKind::Project.label()))?;
        let role = primary_assignment(roles)
            .ok_or(AppError::MissingAssignment(AssignmentKind::Role.label()))?;

        let offset_minutes = self.site_offset_minutes(labels).await;

        Ok(ShiftContext {
            schedule: schedules.into_iter().next(),
            department,
            location,
            project,
            role,
            offset_minutes,
        })
    }

    /// Site offset relative to the server's local timezone at the moment
    /// of the call, in minutes. Falling back to zero keeps the event
    /// processable when the site cannot be identified.
    async fn site_offset_minutes(&self, labels: &[Label]) -> i64 {
        let sites = match self.occupancy.list_sites().await {
            Ok(sites) => sites,
            Err(e) => {
                warn!("could not find sites: {e}");
                return 0;
            }
        };

        let Some(site) = sites
            .iter()
            .find(|site| labels.iter().any(|l| l.name.eq_ignore_ascii_case(&site.name)))
        else {
            warn!("no site matches any event label, assuming server timezone");
            return 0;
        };

        let server_offset_minutes = i64::from(Local::now().offset().local_minus_utc()) / 60;
        site.utc_offset_minutes - server_offset_minutes
    }

    async fn write_timesheet(
        &self,
        identity: &EmployeeIdentity,
        ctx: &ShiftContext,
        entry: DateTime<Utc>,
        exit: DateTime<Utc>,
        breaks: &[TimesheetBreak],
    ) -> Result<(String, bool), AppError> {
        let org = &identity.company.hr_organisation_id;
        let emp = &identity.employee.id;

        let from = entry - Duration::hours(TIMESHEET_LOOKBACK_HOURS);
        let recent = self.hr.timesheets(org, emp, from, entry).await?;

        let local_entry = entry + Duration::minutes(ctx.offset_minutes);
        let local_exit = exit + Duration::minutes(ctx.offset_minutes);

        if let Some(existing) = select_timesheet_to_update(&recent, exit, ctx.offset_minutes) {
            let payload = TimesheetPayload {
                employee_id: existing.employee_id.clone(),
                date: existing.date,
                start_time: existing.start_time.clone(),
                end_time: Some(local_exit.format("%H:%M").to_string()),
                breaks: breaks.to_vec(),
                department_id: Some(ctx.department.id.clone()),
                location_id: Some(ctx.location.id.clone()),
                project_id: Some(ctx.project.id.clone()),
                role_id: Some(ctx.role.id.clone()),
            };
            let updated = self.hr.update_timesheet(org, &existing.id, &payload).await?;
            Ok((updated.id, true))
        } else {
            let payload = TimesheetPayload {
                employee_id: identity.employee.id.clone(),
                date: local_entry.date_naive(),
                start_time: local_entry.format("%H:%M").to_string(),
                end_time: Some(local_exit.format("%H:%M").to_string()),
                breaks: breaks.to_vec(),
                department_id: Some(ctx.department.id.clone()),
                location_id: Some(ctx.location.id.clone()),
                project_id: Some(ctx.project.id.clone()),
                role_id: Some(ctx.role.id.clone()),
            };
            let created = self.hr.create_timesheet(org, &payload).await?;
            Ok((created.id, false))
        }
    }
}

/// The record flagged primary wins; without any flag the remote system's
/// first entry stands in for it.
pub fn primary_assignment(records: Vec<Assignment>) -> Option<Assignment> {
    let mut first = None;
    for record in records {
        if record.is_primary {
            return Some(record);
        }
        if first.is_none() {
            first = Some(record);
        }
    }
    first
}

/// At most one break is ever attached. A scheduled break is used only
/// when its window falls strictly inside the shift; with no scheduled
/// break, long shifts get a synthetic 30-minute one.
pub fn infer_breaks(
    entry: DateTime<Utc>,
    exit: DateTime<Utc>,
    shift_date: NaiveDate,
    offset_minutes: i64,
    schedule_breaks: &[ScheduleBreak],
) -> Vec<TimesheetBreak> {
    if let Some(first) = schedule_breaks.first() {
        if schedule_breaks.len() > 1 {
            warn!(
                "schedule defines {} breaks, only the first is applied",
                schedule_breaks.len()
            );
        }

        // The schedule expresses breaks as seconds since local midnight
        // of the shift date.
        let midnight_utc = Utc.from_utc_datetime(
            &(shift_date.and_time(NaiveTime::MIN) - Duration::minutes(offset_minutes)),
        );
        let break_start = midnight_utc + Duration::seconds(first.start_seconds);
        let break_end = midnight_utc + Duration::seconds(first.end_seconds);

        if break_start > entry && break_end < exit {
            return vec![TimesheetBreak {
                description: first
                    .description
                    .clone()
                    .unwrap_or_else(|| "Scheduled break".to_string()),
                start_time: clock_label(first.start_seconds),
                end_time: clock_label(first.end_seconds),
            }];
        }
        return Vec::new();
    }

    let shift_secs = exit.signed_duration_since(entry).num_seconds();
    if shift_secs > SYNTHETIC_BREAK_THRESHOLD_SECS {
        // Anchored to the exit stamp, matching the upstream system's
        // historical placement.
        let start = exit
            + Duration::minutes(offset_minutes)
            + Duration::hours(SYNTHETIC_BREAK_ANCHOR_HOURS);
        let end = start + Duration::minutes(SYNTHETIC_BREAK_MINUTES);
        return vec![TimesheetBreak {
            description: "Unscheduled break".to_string(),
            start_time: start.format("%H:%M").to_string(),
            end_time: end.format("%H:%M").to_string(),
        }];
    }

    Vec::new()
}

fn clock_label(seconds_since_midnight: i64) -> String {
    format!(
        "{:02}:{:02}",
        seconds_since_midnight / 3600,
        (seconds_since_midnight % 3600) / 60
    )
}

/// First entry, in the remote system's return order, whose start instant
/// lies within the match window before the exit stamp. A heuristic "same
/// shift" test, not a unique key match.
pub fn select_timesheet_to_update<'a>(
    entries: &'a [Timesheet],
    exit: DateTime<Utc>,
    offset_minutes: i64,
) -> Option<&'a Timesheet> {
    entries.iter().find(|entry| {
        let Some(start) = timesheet_start_instant(entry, offset_minutes) else {
            return false;
        };
        let lead = exit.signed_duration_since(start);
        lead >= Duration::zero() && lead <= Duration::hours(TIMESHEET_MATCH_WINDOW_HOURS)
    })
}

/// Recover the UTC instant a timesheet started from its local date and
/// "HH:MM[:SS]" start string.
pub fn timesheet_start_instant(entry: &Timesheet, offset_minutes: i64) -> Option<DateTime<Utc>> {
    let time = NaiveTime::parse_from_str(&entry.start_time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&entry.start_time, "%H:%M"))
        .ok()?;
    let local = entry.date.and_time(time);
    Some(Utc.from_utc_datetime(&(local - Duration::minutes(offset_minutes))))
}
