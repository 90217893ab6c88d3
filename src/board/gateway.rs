use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::models::{BoardState, Stage};
use crate::errors::GatewayError;

/// Table the REST gateway writes to unless configured otherwise.
pub const DEFAULT_TABLE: &str = "production_projects";

/// One card's placement as sent to the remote store. `id` is the conflict
/// key; the last write for an id wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlacementRow {
    pub id: String,
    pub stage: Stage,
    pub position: u32,
    pub updated_at: DateTime<Utc>,
}

/// Rows for every card of `stages`, numbered by their index in the column.
pub fn rows_for_stages(board: &BoardState, stages: &[Stage], now: DateTime<Utc>) -> Vec<PlacementRow> {
    stages
        .iter()
        .flat_map(|stage| {
            board
                .column(*stage)
                .iter()
                .enumerate()
                .map(move |(position, card)| PlacementRow {
                    id: card.id.clone(),
                    stage: *stage,
                    position: position as u32,
                    updated_at: now,
                })
        })
        .collect()
}

/// Remote persistence for column state.
///
/// A batch is all-or-nothing from the caller's point of view.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn upsert(&self, rows: &[PlacementRow]) -> Result<(), GatewayError>;

    /// False when the gateway silently drops writes.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Stand-in used when no remote credentials are configured. Every call
/// succeeds without doing anything.
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredGateway;

#[async_trait]
impl PersistenceGateway for UnconfiguredGateway {
    async fn upsert(&self, rows: &[PlacementRow]) -> Result<(), GatewayError> {
        warn!(rows = rows.len(), "remote store is not configured; skipping persistence");
        Ok(())
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// Upserts rows through a PostgREST endpoint (`{url}/rest/v1/{table}`).
#[derive(Debug, Clone)]
pub struct RestGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl RestGateway {
    pub fn new(
        base_url: &str,
        api_key: &str,
        table: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{}", base_url.trim_end_matches('/'), table),
            api_key: api_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct RestErrorBody {
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[async_trait]
impl PersistenceGateway for RestGateway {
    async fn upsert(&self, rows: &[PlacementRow]) -> Result<(), GatewayError> {
        if rows.is_empty() {
            return Ok(());
        }
        debug!(rows = rows.len(), endpoint = %self.endpoint, "upserting placement rows");

        let resp = self
            .client
            .post(&self.endpoint)
            .query(&[("on_conflict", "id")])
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<RestErrorBody>(&body) {
            Ok(RestErrorBody {
                message: Some(message),
                details,
            }) => match details {
                Some(details) => format!("{} ({})", message, details),
                None => message,
            },
            _ if body.is_empty() => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
            _ => body,
        };
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}
