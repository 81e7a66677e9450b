use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "attendance-bridge",
    about = "Reconciles occupancy check-in/check-out events into HR platform timesheets"
)]
pub struct Cli {
    /// Load environment from this file instead of ./.env
    #[arg(long)]
    pub env_file: Option<PathBuf>,
    /// Override SERVER_HOST
    #[arg(long)]
    pub host: Option<String>,
    /// Override SERVER_PORT
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub server_host: String,
    #[serde(default = "default_port")]
    pub server_port: u16,

    /// Shared secret expected in the x-webhook-key header on webhook calls.
    pub webhook_secret: String,

    // HR platform (timesheets, schedules, assignments)
    pub hr_base_url: String,
    pub hr_token_url: String,
    pub hr_client_id: String,
    pub hr_client_secret: String,

    // Occupancy platform (sites, learner types, inductees)
    pub occupancy_base_url: String,
    pub occupancy_token_url: String,
    pub occupancy_client_id: String,
    pub occupancy_client_secret: String,

    /// Audit rows are skipped entirely when no database is configured.
    #[serde(default)]
    pub audit_database_url: Option<String>,

    /// Learner type assigned to inductees mirrored from HR lifecycle events.
    #[serde(default = "default_learner_type")]
    pub employee_learner_type: String,

    /// JSON array mapping event labels to organisations, see CompanyConfig.
    pub company_map: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_learner_type() -> String {
    "Employee".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn companies(&self) -> Result<Vec<CompanyConfig>> {
        parse_company_map(&self.company_map)
    }
}

/// One employing company known to the bridge. The label is what the
/// occupancy platform tags events with; the organisation id scopes every
/// HR platform call; company id/name identify the employer in audit rows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompanyConfig {
    pub label: String,
    pub hr_organisation_id: String,
    pub company_id: String,
    pub company_name: String,
}

pub fn parse_company_map(raw: &str) -> Result<Vec<CompanyConfig>> {
    let companies: Vec<CompanyConfig> =
        serde_json::from_str(raw).context("COMPANY_MAP is not a valid JSON company array")?;
    Ok(companies)
}
