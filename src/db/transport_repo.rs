// src/db/transport_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::{
        status::{IssueStatus, TransportStatus},
        transport::{IssueType, NewTransportTask, TransportIssue, TransportTask, Vehicle},
    },
};

#[derive(Clone)]
pub struct TransportRepository {
    pool: PgPool,
}

impl TransportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  VEÍCULOS
    // =========================================================================

    pub async fn create_vehicle<'e, E>(
        &self,
        executor: E,
        registration: &str,
        capacity: Option<Decimal>,
    ) -> Result<Vehicle, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Vehicle>(
            "INSERT INTO vehicles (registration, capacity) VALUES ($1, $2) RETURNING *",
        )
        .bind(registration)
        .bind(capacity)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, |_| format!("Veículo '{registration}' já cadastrado.")))
    }

    pub async fn list_vehicles(&self) -> Result<Vec<Vehicle>, AppError> {
        let vehicles = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles ORDER BY registration ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(vehicles)
    }

    pub async fn find_vehicle(&self, id: Uuid) -> Result<Option<Vehicle>, AppError> {
        let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(vehicle)
    }

    // =========================================================================
    //  TAREFAS
    // =========================================================================

    pub async fn create_task<'e, E>(&self, executor: E, new: &NewTransportTask) -> Result<TransportTask, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let task = sqlx::query_as::<_, TransportTask>(
            r#"
            INSERT INTO transport_tasks (
                batch_id, driver_id, vehicle_id, coordinator_id, status,
                pickup_location, delivery_location, scheduled_pickup_at, scheduled_delivery_at, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(new.batch_id)
        .bind(new.driver_id)
        .bind(new.vehicle_id)
        .bind(new.coordinator_id)
        .bind(TransportStatus::Scheduled)
        .bind(&new.pickup_location)
        .bind(&new.delivery_location)
        .bind(new.scheduled_pickup_at)
        .bind(new.scheduled_delivery_at)
        .bind(&new.notes)
        .fetch_one(executor)
        .await?;
        Ok(task)
    }

    pub async fn find_task<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<TransportTask>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let task = sqlx::query_as::<_, TransportTask>("SELECT * FROM transport_tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(task)
    }

    /// Tarefa mais recente do lote (usada no recebimento para avisar o coordenador).
    pub async fn latest_task_for_batch(&self, batch_id: Uuid) -> Result<Option<TransportTask>, AppError> {
        let task = sqlx::query_as::<_, TransportTask>(
            "SELECT * FROM transport_tasks WHERE batch_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(batch_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    pub async fn list_tasks(
        &self,
        driver_id: Option<Uuid>,
        status: Option<TransportStatus>,
    ) -> Result<Vec<TransportTask>, AppError> {
        let tasks = sqlx::query_as::<_, TransportTask>(
            r#"
            SELECT * FROM transport_tasks
            WHERE ($1::uuid IS NULL OR driver_id = $1)
              AND ($2::transport_status IS NULL OR status = $2)
            ORDER BY scheduled_pickup_at DESC
            LIMIT 200
            "#,
        )
        .bind(driver_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    /// Mesmo padrão CAS do lote: só muda se o status ainda for `expected`.
    /// Os horários reais saem do próprio UPDATE: `next` = IN_TRANSIT grava
    /// `actual_pickup_at` (só se ainda vazio) e `next` = DELIVERED grava `actual_delivery_at`.
    pub async fn apply_task_transition<'e, E>(
        &self,
        executor: E,
        task_id: Uuid,
        expected: TransportStatus,
        next: TransportStatus,
        note: Option<&str>,
    ) -> Result<Option<TransportTask>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let task = sqlx::query_as::<_, TransportTask>(
            r#"
            UPDATE transport_tasks
            SET status = $3,
                actual_pickup_at = CASE WHEN $3 = 'IN_TRANSIT'::transport_status AND actual_pickup_at IS NULL
                                        THEN NOW() ELSE actual_pickup_at END,
                actual_delivery_at = CASE WHEN $3 = 'DELIVERED'::transport_status
                                          THEN NOW() ELSE actual_delivery_at END,
                notes = CASE
                    WHEN $4::text IS NULL THEN notes
                    WHEN notes IS NULL OR notes = '' THEN $4::text
                    ELSE notes || E'\n' || $4::text
                END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(task_id)
        .bind(expected)
        .bind(next)
        .bind(note)
        .fetch_optional(executor)
        .await?;
        Ok(task)
    }

    // =========================================================================
    //  OCORRÊNCIAS
    // =========================================================================

    pub async fn create_issue<'e, E>(
        &self,
        executor: E,
        task_id: Uuid,
        reported_by: Uuid,
        issue_type: IssueType,
        description: &str,
    ) -> Result<TransportIssue, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let issue = sqlx::query_as::<_, TransportIssue>(
            r#"
            INSERT INTO transport_issues (task_id, reported_by, issue_type, status, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(task_id)
        .bind(reported_by)
        .bind(issue_type)
        .bind(IssueStatus::Open)
        .bind(description)
        .fetch_one(executor)
        .await?;
        Ok(issue)
    }

    pub async fn find_issue(&self, id: Uuid) -> Result<Option<TransportIssue>, AppError> {
        let issue = sqlx::query_as::<_, TransportIssue>("SELECT * FROM transport_issues WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(issue)
    }

    pub async fn list_issues(&self, task_id: Uuid) -> Result<Vec<TransportIssue>, AppError> {
        let issues = sqlx::query_as::<_, TransportIssue>(
            "SELECT * FROM transport_issues WHERE task_id = $1 ORDER BY created_at DESC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(issues)
    }

    pub async fn apply_issue_transition<'e, E>(
        &self,
        executor: E,
        issue_id: Uuid,
        expected: IssueStatus,
        next: IssueStatus,
        resolution: Option<&str>,
        resolved_at: Option<DateTime<Utc>>,
    ) -> Result<Option<TransportIssue>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let issue = sqlx::query_as::<_, TransportIssue>(
            r#"
            UPDATE transport_issues
            SET status = $3,
                resolution = COALESCE($4, resolution),
                resolved_at = COALESCE($5, resolved_at)
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(issue_id)
        .bind(expected)
        .bind(next)
        .bind(resolution)
        .bind(resolved_at)
        .fetch_optional(executor)
        .await?;
        Ok(issue)
    }
}
