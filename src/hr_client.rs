//! Typed client for the HR platform. Every call is scoped to an
//! organisation; responses arrive wrapped in a `data` collection.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::remote::{RemoteError, RemoteService};
use crate::token::TokenProvider;

// --- HR API data structures ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HrEmployee {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl HrEmployee {
    /// Roster name used for identity matching: the display name when the
    /// platform provides one, otherwise "first last".
    pub fn full_name(&self) -> String {
        if let Some(display) = &self.display_name {
            return display.clone();
        }
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSchedule {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub breaks: Vec<ScheduleBreak>,
}

/// A nominal break window, expressed as seconds since local midnight.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBreak {
    pub description: Option<String>,
    pub start_seconds: i64,
    pub end_seconds: i64,
    #[serde(default)]
    pub paid: bool,
}

/// A department/location/project/role binding for an employee.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    Department,
    Location,
    Project,
    Role,
}

impl AssignmentKind {
    pub fn label(self) -> &'static str {
        match self {
            AssignmentKind::Department => "department",
            AssignmentKind::Location => "location",
            AssignmentKind::Project => "project",
            AssignmentKind::Role => "role",
        }
    }

    fn path_segment(self) -> &'static str {
        match self {
            AssignmentKind::Department => "department-assignments",
            AssignmentKind::Location => "location-assignments",
            AssignmentKind::Project => "project-assignments",
            AssignmentKind::Role => "role-assignments",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timesheet {
    pub id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    /// Site-local time of day, "HH:MM" or "HH:MM:SS".
    pub start_time: String,
    pub end_time: Option<String>,
    #[serde(default)]
    pub breaks: Vec<TimesheetBreak>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetBreak {
    pub description: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetPayload {
    pub employee_id: String,
    pub date: NaiveDate,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub breaks: Vec<TimesheetBreak>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Collection<T> {
    #[serde(default)]
    data: Vec<T>,
}

// --- Client ---

pub struct HrClient {
    remote: RemoteService,
}

impl HrClient {
    pub fn new(
        http: Client,
        base_url: &str,
        tokens: Arc<TokenProvider>,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            remote: RemoteService::new("hr-platform", http, base_url, tokens)?,
        })
    }

    pub async fn list_employees(&self, org: &str) -> Result<Vec<HrEmployee>, RemoteError> {
        let url = self
            .remote
            .endpoint(&format!("organisations/{org}/employees"))?;
        let response: Collection<HrEmployee> = self.remote.get(url, "list employees").await?;
        Ok(response.data)
    }

    pub async fn work_schedules(
        &self,
        org: &str,
        employee: &str,
    ) -> Result<Vec<WorkSchedule>, RemoteError> {
        let url = self.remote.endpoint(&format!(
            "organisations/{org}/employees/{employee}/work-schedules"
        ))?;
        let response: Collection<WorkSchedule> = self.remote.get(url, "work schedules").await?;
        Ok(response.data)
    }

    pub async fn assignments(
        &self,
        org: &str,
        employee: &str,
        kind: AssignmentKind,
    ) -> Result<Vec<Assignment>, RemoteError> {
        let url = self.remote.endpoint(&format!(
            "organisations/{org}/employees/{employee}/{}",
            kind.path_segment()
        ))?;
        let response: Collection<Assignment> =
            self.remote.get(url, kind.path_segment()).await?;
        Ok(response.data)
    }

    pub async fn timesheets(
        &self,
        org: &str,
        employee: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Timesheet>, RemoteError> {
        let mut url = self.remote.endpoint(&format!(
            "organisations/{org}/employees/{employee}/timesheets"
        ))?;
        url.query_pairs_mut()
            .append_pair("from", &from.to_rfc3339_opts(SecondsFormat::Secs, true))
            .append_pair("to", &to.to_rfc3339_opts(SecondsFormat::Secs, true));
        let response: Collection<Timesheet> = self.remote.get(url, "list timesheets").await?;
        Ok(response.data)
    }

    pub async fn create_timesheet(
        &self,
        org: &str,
        payload: &TimesheetPayload,
    ) -> Result<Timesheet, RemoteError> {
        let url = self
            .remote
            .endpoint(&format!("organisations/{org}/timesheets"))?;
        self.remote
            .send_json(Method::POST, url, payload, "create timesheet")
            .await
    }

    pub async fn update_timesheet(
        &self,
        org: &str,
        id: &str,
        payload: &TimesheetPayload,
    ) -> Result<Timesheet, RemoteError> {
        let url = self
            .remote
            .endpoint(&format!("organisations/{org}/timesheets/{id}"))?;
        self.remote
            .send_json(Method::PUT, url, payload, "update timesheet")
            .await
    }
}
