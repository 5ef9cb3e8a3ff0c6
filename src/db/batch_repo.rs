// src/db/batch_repo.rs

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Executor, FromRow, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::{
        batch::{BatchChanges, CropBatch, NewCropBatch},
        status::BatchStatus,
    },
};

/// Filtro de listagem. `None` = sem restrição naquele campo.
#[derive(Debug, Clone, Default)]
pub struct BatchFilter {
    pub field_agent_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub status: Option<BatchStatus>,
    pub limit: i64,
}

#[derive(Debug, Clone, serde::Serialize, FromRow, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: BatchStatus,
    pub batches: i64,
    pub total_quantity: Decimal,
}

#[derive(Clone)]
pub struct BatchRepository {
    pool: PgPool,
}

impl BatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<CropBatch>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let batch = sqlx::query_as::<_, CropBatch>("SELECT * FROM crop_batches WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(batch)
    }

    pub async fn find_by_code(&self, batch_code: &str) -> Result<Option<CropBatch>, AppError> {
        let batch = sqlx::query_as::<_, CropBatch>("SELECT * FROM crop_batches WHERE batch_code = $1")
            .bind(batch_code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(batch)
    }

    pub async fn list<'e, E>(&self, executor: E, filter: &BatchFilter) -> Result<Vec<CropBatch>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let batches = sqlx::query_as::<_, CropBatch>(
            r#"
            SELECT * FROM crop_batches
            WHERE ($1::uuid IS NULL OR field_agent_id = $1)
              AND ($2::uuid IS NULL OR warehouse_id = $2)
              AND ($3::batch_status IS NULL OR status = $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(filter.field_agent_id)
        .bind(filter.warehouse_id)
        .bind(filter.status)
        .bind(filter.limit)
        .fetch_all(executor)
        .await?;
        Ok(batches)
    }

    /// Contagem e soma de quantidade por status (painéis por papel).
    pub async fn count_by_status<'e, E>(
        &self,
        executor: E,
        field_agent_id: Option<Uuid>,
        warehouse_id: Option<Uuid>,
    ) -> Result<Vec<StatusCount>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, COUNT(*) AS batches, COALESCE(SUM(quantity), 0) AS total_quantity
            FROM crop_batches
            WHERE ($1::uuid IS NULL OR field_agent_id = $1)
              AND ($2::uuid IS NULL OR warehouse_id = $2)
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(field_agent_id)
        .bind(warehouse_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    pub async fn create<'e, E>(&self, executor: E, new: &NewCropBatch) -> Result<CropBatch, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, CropBatch>(
            r#"
            INSERT INTO crop_batches (
                batch_code, crop_type, variety, quantity, unit, status,
                planting_date, expected_harvest_date, notes, farm_id, field_agent_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&new.batch_code)
        .bind(&new.crop_type)
        .bind(&new.variety)
        .bind(new.quantity)
        .bind(&new.unit)
        .bind(BatchStatus::Planted)
        .bind(new.planting_date)
        .bind(new.expected_harvest_date)
        .bind(&new.notes)
        .bind(new.farm_id)
        .bind(new.field_agent_id)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, |_| format!("Já existe um lote com o código '{}'.", new.batch_code)))
    }

    /// Transição atômica (compare-and-swap na coluna status).
    /// Só atualiza se o status persistido ainda for `expected`; devolve `None` caso contrário.
    /// Notas são concatenadas no próprio UPDATE, então duas anotações concorrentes não se perdem.
    pub async fn apply_transition<'e, E>(
        &self,
        executor: E,
        batch_id: Uuid,
        expected: BatchStatus,
        next: BatchStatus,
        changes: &BatchChanges,
    ) -> Result<Option<CropBatch>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let batch = sqlx::query_as::<_, CropBatch>(
            r#"
            UPDATE crop_batches
            SET status = $3,
                notes = CASE
                    WHEN $4::text IS NULL THEN notes
                    WHEN notes IS NULL OR notes = '' THEN $4::text
                    ELSE notes || E'\n' || $4::text
                END,
                quantity = COALESCE($5, quantity),
                received_quantity = COALESCE($6, received_quantity),
                storage_location = COALESCE($7, storage_location),
                quality_grade = COALESCE($8, quality_grade),
                approval_data = COALESCE($9, approval_data),
                warehouse_id = COALESCE($10, warehouse_id),
                actual_harvest_date = COALESCE($11, actual_harvest_date),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(batch_id)
        .bind(expected)
        .bind(next)
        .bind(&changes.append_note)
        .bind(changes.quantity)
        .bind(changes.received_quantity)
        .bind(&changes.storage_location)
        .bind(&changes.quality_grade)
        .bind(changes.approval_data.clone())
        .bind(changes.warehouse_id)
        .bind(changes.actual_harvest_date)
        .fetch_optional(executor)
        .await?;

        Ok(batch)
    }
}

/// O mínimo que o serviço precisa para efetivar um plano: o CAS e a releitura
/// usada para explicar um CAS perdido.
#[async_trait]
pub trait BatchStore: Send + Sync {
    async fn transition_if(
        &self,
        batch_id: Uuid,
        expected: BatchStatus,
        next: BatchStatus,
        changes: &BatchChanges,
    ) -> Result<Option<CropBatch>, AppError>;

    async fn current(&self, batch_id: Uuid) -> Result<Option<CropBatch>, AppError>;
}

#[async_trait]
impl BatchStore for BatchRepository {
    async fn transition_if(
        &self,
        batch_id: Uuid,
        expected: BatchStatus,
        next: BatchStatus,
        changes: &BatchChanges,
    ) -> Result<Option<CropBatch>, AppError> {
        self.apply_transition(&self.pool, batch_id, expected, next, changes).await
    }

    async fn current(&self, batch_id: Uuid) -> Result<Option<CropBatch>, AppError> {
        self.find_by_id(&self.pool, batch_id).await
    }
}
