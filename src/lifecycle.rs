//! Mirrors HR employee-lifecycle events into the occupancy platform's
//! inductee register, keyed by email address.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AppError;
use crate::events::{
    LifecycleEmployee, LifecycleWebhook, EVENT_EMPLOYEE_CREATED, EVENT_EMPLOYEE_DELETED,
    EVENT_EMPLOYEE_MODIFIED,
};
use crate::occupancy_client::{InducteePayload, OccupancyClient};
use crate::reconcile::EventOutcome;

pub struct LifecycleSync {
    occupancy: Arc<OccupancyClient>,
    learner_type_name: String,
}

impl LifecycleSync {
    pub fn new(occupancy: Arc<OccupancyClient>, learner_type_name: String) -> Self {
        Self {
            occupancy,
            learner_type_name,
        }
    }

    pub async fn process(&self, webhook: &LifecycleWebhook) -> Result<EventOutcome, AppError> {
        let Some(event) = webhook.events.first() else {
            return Ok(EventOutcome::Ignored("empty event batch".to_string()));
        };

        match event.event_type.as_str() {
            EVENT_EMPLOYEE_CREATED | EVENT_EMPLOYEE_MODIFIED => {
                self.upsert_inductee(&event.employee).await
            }
            EVENT_EMPLOYEE_DELETED => self.deactivate_inductee(&event.employee).await,
            other => Ok(EventOutcome::Ignored(format!(
                "unsupported lifecycle event type '{other}'"
            ))),
        }
    }

    async fn upsert_inductee(
        &self,
        employee: &LifecycleEmployee,
    ) -> Result<EventOutcome, AppError> {
        let Some(email) = employee.contact.email.as_deref() else {
            return Ok(EventOutcome::Ignored(
                "lifecycle event without email address".to_string(),
            ));
        };

        let site_id = self.find_site_id(employee.company.as_deref()).await;
        let learner_type_id = self.find_learner_type_id().await;

        let payload = InducteePayload {
            first_name: employee.demographics.first_name.clone(),
            last_name: employee.demographics.last_name.clone(),
            email: email.to_string(),
            mobile: employee.contact.mobile.clone(),
            company: employee.company.clone(),
            site_id,
            learner_type_id,
            active: true,
        };

        let existing = self.occupancy.find_inductees(email).await?;
        let detail = match existing.first() {
            Some(inductee) => {
                self.occupancy.update_inductee(&inductee.id, &payload).await?;
                format!("inductee {} updated", inductee.id)
            }
            None => {
                let created = self.occupancy.create_inductee(&payload).await?;
                format!("inductee {} created", created.id)
            }
        };
        info!("{detail} for {email}");

        Ok(EventOutcome::Processed { detail })
    }

    async fn deactivate_inductee(
        &self,
        employee: &LifecycleEmployee,
    ) -> Result<EventOutcome, AppError> {
        let Some(email) = employee.contact.email.as_deref() else {
            return Ok(EventOutcome::Ignored(
                "lifecycle event without email address".to_string(),
            ));
        };

        let existing = self.occupancy.find_inductees(email).await?;
        let Some(inductee) = existing.first() else {
            return Ok(EventOutcome::Ignored(format!(
                "no inductee with email '{email}'"
            )));
        };

        let payload = InducteePayload {
            first_name: inductee.first_name.clone(),
            last_name: inductee.last_name.clone(),
            email: email.to_string(),
            mobile: inductee.mobile.clone(),
            company: inductee.company.clone(),
            site_id: None,
            learner_type_id: None,
            active: false,
        };
        self.occupancy.update_inductee(&inductee.id, &payload).await?;
        info!("inductee {} deactivated for {email}", inductee.id);

        Ok(EventOutcome::Processed {
            detail: format!("inductee {} deactivated", inductee.id),
        })
    }

    async fn find_site_id(&self, company: Option<&str>) -> Option<String> {
        let company = company?;
        let sites = match self.occupancy.list_sites().await {
            Ok(sites) => sites,
            Err(e) => {
                warn!("could not find sites: {e}");
                return None;
            }
        };

        let site = sites
            .into_iter()
            .find(|site| site.name.eq_ignore_ascii_case(company));
        if site.is_none() {
            warn!("no site matches company '{company}'");
        }
        site.map(|site| site.id)
    }

    async fn find_learner_type_id(&self) -> Option<String> {
        let types = match self.occupancy.list_learner_types().await {
            Ok(types) => types,
            Err(e) => {
                warn!("could not fetch learner types: {e}");
                return None;
            }
        };

        let learner_type = types
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(&self.learner_type_name));
        if learner_type.is_none() {
            warn!("no learner type named '{}'", self.learner_type_name);
        }
        learner_type.map(|t| t.id)
    }
}
