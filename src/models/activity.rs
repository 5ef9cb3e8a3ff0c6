// src/models/activity.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// Linha de auditoria (somente INSERT)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: Uuid,
    #[schema(example = "BATCH_STATUS_UPDATED")]
    pub action: String,
    #[schema(example = "crop_batch")]
    pub entity_type: String,
    pub entity_id: Uuid,
    #[schema(value_type = Object)]
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewActivityLog {
    pub user_id: Uuid,
    pub action: String,
    pub entity_type: &'static str,
    pub entity_id: Uuid,
    // String ou objeto JSON, tanto faz para a coluna jsonb
    pub details: Value,
}

impl NewActivityLog {
    pub fn new(
        user_id: Uuid,
        action: impl Into<String>,
        entity_type: &'static str,
        entity_id: Uuid,
        details: impl Into<Value>,
    ) -> Self {
        Self {
            user_id,
            action: action.into(),
            entity_type,
            entity_id,
            details: details.into(),
        }
    }
}

pub mod entity {
    pub const CROP_BATCH: &str = "crop_batch";
    pub const TRANSPORT_TASK: &str = "transport_task";
    pub const TRANSPORT_ISSUE: &str = "transport_issue";
    pub const FARM: &str = "farm";
    pub const WAREHOUSE: &str = "warehouse";
    pub const UNIT: &str = "unit_of_measure";
    pub const PROFILE: &str = "profile";
    pub const VEHICLE: &str = "vehicle";
}
