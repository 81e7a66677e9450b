//! Local audit trail: one row per processed attendance event. Writes are
//! independent of the timesheet write; callers decide whether a failed
//! append is fatal.

use chrono::{DateTime, Utc};
use sqlx::MySqlPool;
use tracing::{debug, info};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS attendance_event_log (
    id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
    created_at DATETIME NOT NULL,
    event_id VARCHAR(64) NOT NULL,
    event_name VARCHAR(64) NOT NULL,
    entry_time DATETIME NOT NULL,
    exit_time DATETIME NOT NULL,
    employee_id VARCHAR(64) NOT NULL,
    employee_name VARCHAR(255) NOT NULL,
    employee_email VARCHAR(255) NULL,
    company_id VARCHAR(64) NOT NULL,
    company_name VARCHAR(255) NOT NULL
)
"#;

const INSERT_ROW: &str = r#"
INSERT INTO attendance_event_log
    (created_at, event_id, event_name, entry_time, exit_time,
     employee_id, employee_name, employee_email, company_id, company_name)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub event_id: String,
    pub event_name: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub employee_id: String,
    pub employee_name: String,
    pub employee_email: Option<String>,
    pub company_id: String,
    pub company_name: String,
}

pub struct AuditLog {
    pool: Option<MySqlPool>,
}

impl AuditLog {
    pub async fn connect(database_url: Option<&str>) -> Result<Self, sqlx::Error> {
        match database_url {
            Some(url) => {
                let pool = MySqlPool::connect(url).await?;
                Ok(Self { pool: Some(pool) })
            }
            None => {
                info!("audit log disabled, no AUDIT_DATABASE_URL configured");
                Ok(Self::disabled())
            }
        }
    }

    pub fn disabled() -> Self {
        Self { pool: None }
    }

    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        if let Some(pool) = &self.pool {
            sqlx::query(CREATE_TABLE).execute(pool).await?;
        }
        Ok(())
    }

    pub async fn append(&self, record: &AuditRecord) -> Result<(), sqlx::Error> {
        let Some(pool) = &self.pool else {
            debug!("audit log disabled, skipping row for event {}", record.event_id);
            return Ok(());
        };

        sqlx::query(INSERT_ROW)
            .bind(Utc::now())
            .bind(&record.event_id)
            .bind(&record.event_name)
            .bind(record.entry_time)
            .bind(record.exit_time)
            .bind(&record.employee_id)
            .bind(&record.employee_name)
            .bind(record.employee_email.as_deref())
            .bind(&record.company_id)
            .bind(&record.company_name)
            .execute(pool)
            .await?;
        Ok(())
    }
}
