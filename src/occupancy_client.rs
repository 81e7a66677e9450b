//! Typed client for the occupancy/identity platform: sites, learner
//! types and the inductee register mirrored from HR lifecycle events.

use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::remote::{RemoteError, RemoteService};
use crate::token::TokenProvider;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    pub name: String,
    pub timezone: Option<String>,
    /// The site timezone's current offset from UTC, as reported by the
    /// platform alongside the timezone name.
    #[serde(default)]
    pub utc_offset_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerType {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inductee {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub company: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InducteePayload {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learner_type_id: Option<String>,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Items<T> {
    #[serde(default)]
    items: Vec<T>,
}

pub struct OccupancyClient {
    remote: RemoteService,
}

impl OccupancyClient {
    pub fn new(
        http: Client,
        base_url: &str,
        tokens: Arc<TokenProvider>,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            remote: RemoteService::new("occupancy-platform", http, base_url, tokens)?,
        })
    }

    pub async fn list_sites(&self) -> Result<Vec<Site>, RemoteError> {
        let url = self.remote.endpoint("sites")?;
        let response: Items<Site> = self.remote.get(url, "list sites").await?;
        Ok(response.items)
    }

    pub async fn list_learner_types(&self) -> Result<Vec<LearnerType>, RemoteError> {
        let url = self.remote.endpoint("learner-types")?;
        let response: Items<LearnerType> = self.remote.get(url, "list learner types").await?;
        Ok(response.items)
    }

    pub async fn find_inductees(&self, email: &str) -> Result<Vec<Inductee>, RemoteError> {
        let mut url = self.remote.endpoint("inductees")?;
        url.query_pairs_mut().append_pair("email", email);
        let response: Items<Inductee> = self.remote.get(url, "find inductees").await?;
        Ok(response.items)
    }

    pub async fn create_inductee(
        &self,
        payload: &InducteePayload,
    ) -> Result<Inductee, RemoteError> {
        let url = self.remote.endpoint("inductees")?;
        self.remote
            .send_json(Method::POST, url, payload, "create inductee")
            .await
    }

    pub async fn update_inductee(
        &self,
        id: &str,
        payload: &InducteePayload,
    ) -> Result<Inductee, RemoteError> {
        let url = self.remote.endpoint(&format!("inductees/{id}"))?;
        self.remote
            .send_json(Method::PUT, url, payload, "update inductee")
            .await
    }
}
