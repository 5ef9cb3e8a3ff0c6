// src/models/transport.rs

use chrono::{DateTime, Utc};
use std::fmt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::status::{IssueStatus, TransportStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "issue_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    Breakdown,
    Delay,
    Damage,
    Other,
}

impl IssueType {
    /// Mesmo nome usado no enum do Postgres e no JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::Breakdown => "BREAKDOWN",
            IssueType::Delay => "DELAY",
            IssueType::Damage => "DAMAGE",
            IssueType::Other => "OTHER",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: Uuid,
    #[schema(example = "ABC-1D23")]
    pub registration: String,
    pub capacity: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// --- Viagem de coleta/entrega de um lote ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransportTask {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub coordinator_id: Uuid,
    pub status: TransportStatus,
    #[schema(example = "Fazenda Boa Vista")]
    pub pickup_location: String,
    #[schema(example = "Armazém Central")]
    pub delivery_location: String,
    pub scheduled_pickup_at: DateTime<Utc>,
    pub scheduled_delivery_at: DateTime<Utc>,
    pub actual_pickup_at: Option<DateTime<Utc>>,
    pub actual_delivery_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransportTask {
    pub batch_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub coordinator_id: Uuid,
    pub pickup_location: String,
    pub delivery_location: String,
    pub scheduled_pickup_at: DateTime<Utc>,
    pub scheduled_delivery_at: DateTime<Utc>,
    pub notes: Option<String>,
}

// --- Ocorrência (quebra, atraso, avaria) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransportIssue {
    pub id: Uuid,
    pub task_id: Uuid,
    pub reported_by: Uuid,
    pub issue_type: IssueType,
    pub status: IssueStatus,
    pub description: String,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub message: String,
    pub task: TransportTask,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn task(batch_id: Uuid, driver_id: Uuid, status: TransportStatus) -> TransportTask {
        let now = Utc::now();
        TransportTask {
            id: Uuid::new_v4(),
            batch_id,
            driver_id,
            vehicle_id: None,
            coordinator_id: Uuid::new_v4(),
            status,
            pickup_location: "Fazenda Boa Vista".into(),
            delivery_location: "Armazém Central".into(),
            scheduled_pickup_at: now,
            scheduled_delivery_at: now + chrono::Duration::hours(6),
            actual_pickup_at: None,
            actual_delivery_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}
