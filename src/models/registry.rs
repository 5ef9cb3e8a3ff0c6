// src/models/registry.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Armazéns ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Warehouse {
    pub id: Uuid,
    #[schema(example = "Armazém Central")]
    pub name: String,
    #[schema(example = "Rodovia BR-163, km 12")]
    pub location: String,
    pub capacity: Option<Decimal>,
    pub manager_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Unidades de Medida ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnitOfMeasure {
    pub id: Uuid,
    #[schema(example = "Quilograma")]
    pub name: String,
    #[schema(example = "kg")]
    pub symbol: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Fazendas ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Farm {
    pub id: Uuid,
    #[schema(example = "Fazenda Boa Vista")]
    pub name: String,
    pub location: String,
    pub size_hectares: Option<Decimal>,
    #[schema(example = "João Pereira")]
    pub farmer_name: String,
    pub farmer_phone: Option<String>,
    pub field_agent_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
