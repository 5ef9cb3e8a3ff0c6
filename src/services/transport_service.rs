// src/services/transport_service.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ProfileRepository, TransportRepository},
    models::{
        activity::{entity, NewActivityLog},
        batch::{BatchChanges, CropBatch},
        notification::{NotificationCategory, NotificationKind, NotificationPriority},
        profile::{Capability, Profile, Role},
        status::{validate_issue_transition, validate_transport_transition, BatchStatus, IssueStatus, TransportStatus},
        transport::{IssueType, NewTransportTask, TransportIssue, TransportTask, Vehicle},
    },
    services::{
        batch_service::{plan_transition, BatchService, TransitionPlan},
        side_effects::{Audience, NotificationIntent, SideEffects},
    },
};

fn task_metadata(task: &TransportTask) -> Value {
    json!({ "taskId": task.id, "batchId": task.batch_id, "status": task.status })
}

/// Transição de uma viagem, no mesmo formato do plano de lote.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPlan {
    pub task_id: Uuid,
    pub from: TransportStatus,
    pub to: TransportStatus,
    pub note: Option<String>,
    pub effects: SideEffects,
}

fn task_plan(
    actor: &Profile,
    task: &TransportTask,
    target: TransportStatus,
    action: &str,
    note: Option<String>,
) -> Result<TaskPlan, AppError> {
    validate_transport_transition(task.status, target)?;
    Ok(TaskPlan {
        task_id: task.id,
        from: task.status,
        to: target,
        note: note.clone(),
        effects: SideEffects::audit_only(NewActivityLog::new(
            actor.id,
            action,
            entity::TRANSPORT_TASK,
            task.id,
            json!({ "statusFrom": task.status, "statusTo": target, "batchId": task.batch_id, "note": note }),
        )),
    })
}

fn ensure_own_task(actor: &Profile, task: &TransportTask) -> Result<(), AppError> {
    if task.driver_id == actor.id {
        Ok(())
    } else {
        Err(AppError::OwnershipMismatch("Esta viagem está atribuída a outro motorista.".into()))
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleInput {
    pub batch_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub pickup_location: String,
    pub delivery_location: String,
    pub scheduled_pickup_at: DateTime<Utc>,
    pub scheduled_delivery_at: DateTime<Utc>,
    pub notes: Option<String>,
}

pub fn plan_schedule(
    actor: &Profile,
    batch: &CropBatch,
    driver: &Profile,
    vehicle: Option<&Vehicle>,
    input: &ScheduleInput,
) -> Result<NewTransportTask, AppError> {
    actor.require(Capability::TransportSchedule)?;

    // O lote precisa poder seguir para SHIPPED na coleta
    if !batch.status.can_transition(BatchStatus::Shipped) {
        return Err(AppError::IllegalStatusTransition {
            from: batch.status.to_string(),
            to: BatchStatus::Shipped.to_string(),
        });
    }
    if driver.role != Role::Driver || !driver.is_active {
        return Err(AppError::InvalidInput(format!("{} não é um motorista ativo.", driver.full_name)));
    }
    if let Some(v) = vehicle {
        if !v.is_active {
            return Err(AppError::InvalidInput(format!("O veículo {} está inativo.", v.registration)));
        }
    }
    if input.scheduled_pickup_at >= input.scheduled_delivery_at {
        return Err(AppError::InvalidInput("A coleta deve ser agendada antes da entrega.".into()));
    }

    Ok(NewTransportTask {
        batch_id: batch.id,
        driver_id: driver.id,
        vehicle_id: vehicle.map(|v| v.id),
        coordinator_id: actor.id,
        pickup_location: input.pickup_location.trim().to_string(),
        delivery_location: input.delivery_location.trim().to_string(),
        scheduled_pickup_at: input.scheduled_pickup_at,
        scheduled_delivery_at: input.scheduled_delivery_at,
        notes: input.notes.clone(),
    })
}

/// Coleta: a viagem vai para IN_TRANSIT e o lote para SHIPPED, juntos.
pub fn plan_pickup(actor: &Profile, task: &TransportTask, batch: &CropBatch) -> Result<(TaskPlan, TransitionPlan), AppError> {
    actor.require(Capability::TransportDrive)?;
    ensure_own_task(actor, task)?;

    let mut task_plan = task_plan(actor, task, TransportStatus::InTransit, "TRANSPORT_PICKUP_CONFIRMED", None)?;
    let batch_plan = plan_transition(
        actor,
        batch,
        BatchStatus::Shipped,
        "BATCH_SHIPPED",
        BatchChanges::default(),
        json!({ "taskId": task.id }),
    )?;

    task_plan.effects.notifications.push(NotificationIntent::new(
        Audience::User(task.coordinator_id),
        NotificationCategory::Transport,
        "Coleta confirmada",
        format!("O lote {} foi coletado e está em trânsito.", batch.batch_code),
        task_metadata(task),
    ));

    Ok((task_plan, batch_plan))
}

pub fn plan_delivery(actor: &Profile, task: &TransportTask, batch: &CropBatch) -> Result<TaskPlan, AppError> {
    actor.require(Capability::TransportDrive)?;
    ensure_own_task(actor, task)?;

    let mut plan = task_plan(actor, task, TransportStatus::Delivered, "TRANSPORT_DELIVERY_CONFIRMED", None)?;
    let message = format!("O lote {} foi entregue em {}.", batch.batch_code, task.delivery_location);

    plan.effects.notifications.push(
        NotificationIntent::new(
            Audience::User(task.coordinator_id),
            NotificationCategory::Transport,
            "Entrega realizada",
            message.clone(),
            task_metadata(task),
        )
        .kind(NotificationKind::Success),
    );
    if let Some(w) = batch.warehouse_id {
        plan.effects.notifications.push(NotificationIntent::new(
            Audience::WarehouseManagers(w),
            NotificationCategory::Batch,
            "Lote aguardando recebimento",
            message,
            json!({ "batchId": batch.id, "batchCode": batch.batch_code, "taskId": task.id }),
        ));
    }
    Ok(plan)
}

// IN_TRANSIT e DELIVERED só pela coleta/entrega do motorista, que movem o lote junto
const COORDINATOR_TARGETS: [TransportStatus; 3] = [
    TransportStatus::Scheduled,
    TransportStatus::Delayed,
    TransportStatus::Cancelled,
];

pub fn plan_task_status(
    actor: &Profile,
    task: &TransportTask,
    target: TransportStatus,
    note: Option<&str>,
) -> Result<TaskPlan, AppError> {
    actor.require(Capability::TransportManage)?;
    if !COORDINATOR_TARGETS.contains(&target) {
        return Err(AppError::IllegalStatusTransition {
            from: task.status.to_string(),
            to: target.to_string(),
        });
    }

    let note = note.map(str::trim).filter(|n| !n.is_empty()).map(String::from);
    let mut plan = task_plan(actor, task, target, "TRANSPORT_STATUS_UPDATED", note)?;

    let priority = if target == TransportStatus::Cancelled { NotificationPriority::High } else { NotificationPriority::Normal };
    plan.effects.notifications.push(
        NotificationIntent::new(
            Audience::User(task.driver_id),
            NotificationCategory::Transport,
            "Viagem atualizada",
            format!("Sua viagem agora está {target}."),
            task_metadata(task),
        )
        .priority(priority),
    );
    Ok(plan)
}

pub fn check_issue_report(actor: &Profile, task: &TransportTask, description: &str) -> Result<(), AppError> {
    actor.require(Capability::IssueReport)?;
    if actor.role == Role::Driver {
        ensure_own_task(actor, task)?;
    }
    if description.trim().is_empty() {
        return Err(AppError::InvalidInput("Descreva a ocorrência.".into()));
    }
    Ok(())
}

pub fn issue_report_effects(actor: &Profile, task: &TransportTask, issue: &TransportIssue) -> SideEffects {
    SideEffects {
        audit: NewActivityLog::new(
            actor.id,
            "TRANSPORT_ISSUE_REPORTED",
            entity::TRANSPORT_ISSUE,
            issue.id,
            json!({ "taskId": task.id, "issueType": issue.issue_type, "description": issue.description }),
        ),
        notifications: vec![
            NotificationIntent::new(
                Audience::User(task.coordinator_id),
                NotificationCategory::Transport,
                "Ocorrência no transporte",
                format!("{}: {}", issue.issue_type, issue.description),
                json!({ "taskId": task.id, "batchId": task.batch_id, "issueId": issue.id }),
            )
            .kind(NotificationKind::Warning)
            .priority(NotificationPriority::High),
        ],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssuePlan {
    pub issue_id: Uuid,
    pub from: IssueStatus,
    pub to: IssueStatus,
    pub resolution: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub effects: SideEffects,
}

pub fn plan_issue_status(
    actor: &Profile,
    issue: &TransportIssue,
    target: IssueStatus,
    resolution: Option<&str>,
    now: DateTime<Utc>,
) -> Result<IssuePlan, AppError> {
    actor.require(Capability::TransportManage)?;
    validate_issue_transition(issue.status, target)?;

    let resolution = resolution.map(str::trim).filter(|r| !r.is_empty()).map(String::from);
    let resolved_at = if target == IssueStatus::Resolved {
        if resolution.is_none() {
            return Err(AppError::InvalidInput("Informe a resolução da ocorrência.".into()));
        }
        Some(now)
    } else {
        None
    };

    Ok(IssuePlan {
        issue_id: issue.id,
        from: issue.status,
        to: target,
        effects: SideEffects::audit_only(NewActivityLog::new(
            actor.id,
            "TRANSPORT_ISSUE_UPDATED",
            entity::TRANSPORT_ISSUE,
            issue.id,
            json!({ "statusFrom": issue.status, "statusTo": target, "resolution": resolution }),
        )),
        resolution,
        resolved_at,
    })
}

#[derive(Clone)]
pub struct TransportService {
    pool: PgPool,
    transport_repo: TransportRepository,
    profile_repo: ProfileRepository,
    batches: BatchService,
}

impl TransportService {
    pub fn new(
        pool: PgPool,
        transport_repo: TransportRepository,
        profile_repo: ProfileRepository,
        batches: BatchService,
    ) -> Self {
        Self { pool, transport_repo, profile_repo, batches }
    }

    async fn load_task(&self, task_id: Uuid) -> Result<TransportTask, AppError> {
        self.transport_repo
            .find_task(&self.pool, task_id)
            .await?
            .ok_or(AppError::ResourceNotFound("Viagem"))
    }

    async fn task_conflict(&self, task_id: Uuid, expected: TransportStatus) -> AppError {
        match self.transport_repo.find_task(&self.pool, task_id).await {
            Ok(Some(current)) => AppError::StatusConflict {
                expected: expected.to_string(),
                actual: current.status.to_string(),
            },
            Ok(None) => AppError::ResourceNotFound("Viagem"),
            Err(e) => e,
        }
    }

    async fn execute_task(&self, plan: TaskPlan) -> Result<TransportTask, AppError> {
        let updated = self
            .transport_repo
            .apply_task_transition(&self.pool, plan.task_id, plan.from, plan.to, plan.note.as_deref())
            .await?;
        let Some(task) = updated else {
            return Err(self.task_conflict(plan.task_id, plan.from).await);
        };

        tracing::info!(task_id = %task.id, from = %plan.from, to = %plan.to, "🚚 Viagem atualizada");
        self.batches.effects().dispatch(plan.effects);
        Ok(task)
    }

    // --- AGENDAMENTO ---
    pub async fn schedule(&self, actor: &Profile, input: ScheduleInput) -> Result<TransportTask, AppError> {
        actor.require(Capability::TransportSchedule)?;
        let batch = self.batches.load(input.batch_id).await?;

        let driver = self
            .profile_repo
            .find_by_id(input.driver_id)
            .await?
            .ok_or(AppError::ResourceNotFound("Motorista"))?;

        let vehicle = match input.vehicle_id {
            Some(id) => Some(
                self.transport_repo
                    .find_vehicle(id)
                    .await?
                    .ok_or(AppError::ResourceNotFound("Veículo"))?,
            ),
            None => None,
        };

        let new = plan_schedule(actor, &batch, &driver, vehicle.as_ref(), &input)?;
        let task = self.transport_repo.create_task(&self.pool, &new).await?;

        tracing::info!(task_id = %task.id, batch_id = %batch.id, driver_id = %driver.id, "📅 Viagem agendada");

        self.batches.effects().dispatch(SideEffects {
            audit: NewActivityLog::new(
                actor.id,
                "TRANSPORT_SCHEDULED",
                entity::TRANSPORT_TASK,
                task.id,
                json!({ "batchId": batch.id, "batchCode": batch.batch_code, "driverId": driver.id }),
            ),
            notifications: vec![NotificationIntent::new(
                Audience::User(driver.id),
                NotificationCategory::Transport,
                "Nova viagem agendada",
                format!("Coleta do lote {} em {}.", batch.batch_code, task.pickup_location),
                task_metadata(&task),
            )],
        });

        Ok(task)
    }

    // --- MOTORISTA ---
    pub async fn confirm_pickup(&self, actor: &Profile, task_id: Uuid) -> Result<(TransportTask, CropBatch), AppError> {
        actor.require(Capability::TransportDrive)?;
        let task = self.load_task(task_id).await?;
        let batch = self.batches.load(task.batch_id).await?;
        let (task_plan, batch_plan) = plan_pickup(actor, &task, &batch)?;

        // 1. Viagem e lote mudam na mesma transação
        let mut tx = self.pool.begin().await?;

        let updated_task = self
            .transport_repo
            .apply_task_transition(&mut *tx, task_plan.task_id, task_plan.from, task_plan.to, None)
            .await?;
        let Some(updated_task) = updated_task else {
            tx.rollback().await?;
            return Err(self.task_conflict(task_plan.task_id, task_plan.from).await);
        };

        // 2. CAS no lote; se perdeu a corrida, desfaz a viagem também
        let updated_batch = self
            .batches
            .repo()
            .apply_transition(&mut *tx, batch_plan.batch_id, batch_plan.from, batch_plan.to, &batch_plan.changes)
            .await?;
        let Some(updated_batch) = updated_batch else {
            tx.rollback().await?;
            return Err(self.batches.conflict(batch_plan.batch_id, batch_plan.from).await);
        };

        // 3. Salva tudo
        tx.commit().await?;

        tracing::info!(task_id = %updated_task.id, batch_id = %updated_batch.id, "🚚 Coleta confirmada");

        self.batches.effects().dispatch(task_plan.effects);
        self.batches.effects().dispatch(batch_plan.effects);
        Ok((updated_task, updated_batch))
    }

    pub async fn confirm_delivery(&self, actor: &Profile, task_id: Uuid) -> Result<TransportTask, AppError> {
        actor.require(Capability::TransportDrive)?;
        let task = self.load_task(task_id).await?;
        let batch = self.batches.load(task.batch_id).await?;
        let plan = plan_delivery(actor, &task, &batch)?;
        self.execute_task(plan).await
    }

    // --- COORDENAÇÃO ---
    pub async fn update_status(
        &self,
        actor: &Profile,
        task_id: Uuid,
        target: TransportStatus,
        note: Option<&str>,
    ) -> Result<TransportTask, AppError> {
        actor.require(Capability::TransportManage)?;
        let task = self.load_task(task_id).await?;
        let plan = plan_task_status(actor, &task, target, note)?;
        self.execute_task(plan).await
    }

    pub async fn list_tasks(&self, actor: &Profile, status: Option<TransportStatus>) -> Result<Vec<TransportTask>, AppError> {
        if actor.role == Role::Driver {
            return self.transport_repo.list_tasks(Some(actor.id), status).await;
        }
        actor.require(Capability::TransportSchedule)?;
        self.transport_repo.list_tasks(None, status).await
    }

    // --- OCORRÊNCIAS ---
    pub async fn report_issue(
        &self,
        actor: &Profile,
        task_id: Uuid,
        issue_type: IssueType,
        description: &str,
    ) -> Result<TransportIssue, AppError> {
        actor.require(Capability::IssueReport)?;
        let task = self.load_task(task_id).await?;
        check_issue_report(actor, &task, description)?;

        let issue = self
            .transport_repo
            .create_issue(&self.pool, task.id, actor.id, issue_type, description.trim())
            .await?;

        tracing::warn!(task_id = %task.id, issue_id = %issue.id, issue_type = %issue.issue_type, "Ocorrência registrada");
        self.batches.effects().dispatch(issue_report_effects(actor, &task, &issue));
        Ok(issue)
    }

    pub async fn list_issues(&self, actor: &Profile, task_id: Uuid) -> Result<Vec<TransportIssue>, AppError> {
        let task = self.load_task(task_id).await?;
        if actor.role == Role::Driver {
            ensure_own_task(actor, &task)?;
        } else {
            actor.require(Capability::TransportSchedule)?;
        }
        self.transport_repo.list_issues(task.id).await
    }

    pub async fn update_issue_status(
        &self,
        actor: &Profile,
        issue_id: Uuid,
        target: IssueStatus,
        resolution: Option<&str>,
    ) -> Result<TransportIssue, AppError> {
        actor.require(Capability::TransportManage)?;
        let issue = self
            .transport_repo
            .find_issue(issue_id)
            .await?
            .ok_or(AppError::ResourceNotFound("Ocorrência"))?;

        let plan = plan_issue_status(actor, &issue, target, resolution, Utc::now())?;
        let updated = self
            .transport_repo
            .apply_issue_transition(&self.pool, plan.issue_id, plan.from, plan.to, plan.resolution.as_deref(), plan.resolved_at)
            .await?;

        let Some(updated) = updated else {
            let actual = self.transport_repo.find_issue(issue_id).await?.map(|i| i.status.to_string());
            return Err(AppError::StatusConflict {
                expected: plan.from.to_string(),
                actual: actual.unwrap_or_default(),
            });
        };

        self.batches.effects().dispatch(plan.effects);
        Ok(updated)
    }

    // --- VEÍCULOS ---
    pub async fn create_vehicle(&self, actor: &Profile, registration: &str, capacity: Option<Decimal>) -> Result<Vehicle, AppError> {
        actor.require(Capability::TransportManage)?;
        let registration = registration.trim().to_uppercase();
        let vehicle = self.transport_repo.create_vehicle(&self.pool, &registration, capacity).await?;

        self.batches.effects().dispatch(SideEffects::audit_only(NewActivityLog::new(
            actor.id,
            "VEHICLE_CREATED",
            entity::VEHICLE,
            vehicle.id,
            json!({ "registration": vehicle.registration }),
        )));
        Ok(vehicle)
    }

    pub async fn list_vehicles(&self, actor: &Profile) -> Result<Vec<Vehicle>, AppError> {
        actor.require(Capability::TransportSchedule)?;
        self.transport_repo.list_vehicles().await
    }
}
