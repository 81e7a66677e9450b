//! Inbound webhook payloads. Field layout follows the senders' wire
//! formats exactly; everything here is transient request state.

use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const TOPIC_CHECKIN_ENTERED: &str = "CHECKIN_ENTERED";
pub const TOPIC_CHECKIN_EXITED: &str = "CHECKIN_EXITED";

pub const EVENT_EMPLOYEE_CREATED: &str = "EmployeeCreated";
pub const EVENT_EMPLOYEE_MODIFIED: &str = "EmployeeModified";
pub const EVENT_EMPLOYEE_DELETED: &str = "EmployeeDeleted";

// --- Occupancy platform: check-in/check-out events ---

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceWebhook {
    pub event: AttendanceEvent,
    pub profile: Profile,
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceEvent {
    pub id: String,
    pub topic: String,
    #[serde(default)]
    pub data: AttendanceData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendanceData {
    pub entry: Option<Stamp>,
    pub exit: Option<Stamp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Stamp {
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

impl AttendanceWebhook {
    pub fn entry_timestamp(&self) -> Option<DateTime<Utc>> {
        self.event.data.entry.as_ref().map(|s| s.timestamp)
    }

    pub fn exit_timestamp(&self) -> Option<DateTime<Utc>> {
        self.event.data.exit.as_ref().map(|s| s.timestamp)
    }
}

// --- HR platform: employee lifecycle events ---

#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleWebhook {
    #[serde(default)]
    pub events: Vec<LifecycleEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub event_type: String,
    pub employee: LifecycleEmployee,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEmployee {
    pub demographics: Demographics,
    #[serde(default)]
    pub contact: Contact,
    pub company: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub email: Option<String>,
    pub mobile: Option<String>,
}
