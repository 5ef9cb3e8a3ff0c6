// src/models/batch.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::status::BatchStatus;

// --- Lote de colheita ---
// farm_id e field_agent_id são imutáveis depois da criação.
// `notes` é um log só de acréscimo (append-only).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CropBatch {
    pub id: Uuid,
    #[schema(example = "CB-20261019-4F2A1C")]
    pub batch_code: String,
    #[schema(example = "Milho")]
    pub crop_type: String,
    pub variety: Option<String>,
    #[schema(example = "1200.5")]
    pub quantity: Decimal,
    #[schema(example = "kg")]
    pub unit: String,
    pub status: BatchStatus,
    pub planting_date: NaiveDate,
    pub expected_harvest_date: Option<NaiveDate>,
    pub actual_harvest_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub warehouse_id: Option<Uuid>,
    pub farm_id: Uuid,
    pub field_agent_id: Uuid,
    pub received_quantity: Option<Decimal>,
    #[schema(example = "A1")]
    pub storage_location: Option<String>,
    #[schema(example = "A")]
    pub quality_grade: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub approval_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Campos "laterais" que uma transição pode tocar além do status.
/// Qualquer coisa fora desta struct permanece intocada no UPDATE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchChanges {
    // Acrescentado ao final de `notes`, nunca sobrescreve
    pub append_note: Option<String>,
    pub quantity: Option<Decimal>,
    pub received_quantity: Option<Decimal>,
    pub storage_location: Option<String>,
    pub quality_grade: Option<String>,
    pub approval_data: Option<Value>,
    pub warehouse_id: Option<Uuid>,
    pub actual_harvest_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct NewCropBatch {
    pub batch_code: String,
    pub crop_type: String,
    pub variety: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub planting_date: NaiveDate,
    pub expected_harvest_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub farm_id: Uuid,
    pub field_agent_id: Uuid,
}

/// Resposta padrão das ações de transição: `{ message, batch }`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    #[schema(example = "Lote movido para PACKAGING.")]
    pub message: String,
    pub batch: CropBatch,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllowedTransitions {
    pub current: BatchStatus,
    pub next: Vec<BatchStatus>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn batch(status: BatchStatus, warehouse_id: Option<Uuid>) -> CropBatch {
        let now = Utc::now();
        CropBatch {
            id: Uuid::new_v4(),
            batch_code: "CB-20261019-000001".into(),
            crop_type: "Milho".into(),
            variety: Some("BR 106".into()),
            quantity: Decimal::new(1000, 0),
            unit: "kg".into(),
            status,
            planting_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            expected_harvest_date: NaiveDate::from_ymd_opt(2026, 7, 1),
            actual_harvest_date: None,
            notes: None,
            warehouse_id,
            farm_id: Uuid::new_v4(),
            field_agent_id: Uuid::new_v4(),
            received_quantity: None,
            storage_location: None,
            quality_grade: None,
            approval_data: None,
            created_at: now,
            updated_at: now,
        }
    }
}
