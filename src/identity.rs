//! Name-based identity resolution across the two platforms. There is no
//! shared key: the event's company label selects the organisation, then
//! the subject name is matched against that organisation's roster.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::config::CompanyConfig;
use crate::events::Label;
use crate::hr_client::{HrClient, HrEmployee};
use crate::remote::RemoteError;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

#[derive(Debug, Clone)]
pub struct EmployeeIdentity {
    pub company: CompanyConfig,
    pub employee: HrEmployee,
}

pub fn normalize_name(raw: &str) -> String {
    WHITESPACE.replace_all(raw.trim(), " ").to_lowercase()
}

pub fn match_company<'a>(
    labels: &[Label],
    companies: &'a [CompanyConfig],
) -> Option<&'a CompanyConfig> {
    companies
        .iter()
        .find(|company| labels.iter().any(|l| l.name.eq_ignore_ascii_case(&company.label)))
}

pub fn match_employee<'a>(roster: &'a [HrEmployee], name: &str) -> Option<&'a HrEmployee> {
    let wanted = normalize_name(name);
    roster
        .iter()
        .find(|employee| normalize_name(&employee.full_name()) == wanted)
}

/// Resolve the event subject to an employee record, or `None` when the
/// event belongs to nobody we know (visitors, contractors). Unmatched
/// events are expected noise, acknowledged rather than failed.
pub async fn resolve_identity(
    hr: &HrClient,
    companies: &[CompanyConfig],
    name: &str,
    labels: &[Label],
) -> Result<Option<EmployeeIdentity>, RemoteError> {
    let Some(company) = match_company(labels, companies) else {
        info!("no configured company among event labels, dropping event for '{name}'");
        return Ok(None);
    };

    let roster = hr.list_employees(&company.hr_organisation_id).await?;
    match match_employee(&roster, name) {
        Some(employee) => Ok(Some(EmployeeIdentity {
            company: company.clone(),
            employee: employee.clone(),
        })),
        None => {
            info!(
                "no employee named '{}' in organisation {}",
                name, company.hr_organisation_id
            );
            Ok(None)
        }
    }
}
