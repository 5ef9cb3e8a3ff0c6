// src/services/procurement_service.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::RegistryRepository,
    models::{
        batch::{BatchChanges, CropBatch},
        notification::{NotificationCategory, NotificationKind, NotificationPriority},
        profile::{Capability, Profile},
        registry::{Farm, Warehouse},
        status::BatchStatus,
    },
    services::{
        batch_service::{batch_metadata, plan_transition, BatchService, TransitionPlan},
        side_effects::{Audience, NotificationIntent},
    },
};

#[derive(Debug, Clone, Default)]
pub struct ApprovalInput {
    pub quality_grade: String,
    pub moisture_content: Option<Decimal>,
    pub quality_notes: Option<String>,
    pub photo_urls: Vec<String>,
    pub warehouse_id: Uuid,
}

/// Snapshot gravado em `approval_data` no momento da aprovação.
pub fn approval_snapshot(
    actor: &Profile,
    batch: &CropBatch,
    farm: &Farm,
    input: &ApprovalInput,
    approved_at: DateTime<Utc>,
) -> Value {
    json!({
        "farmer": { "name": farm.farmer_name, "phone": farm.farmer_phone },
        "farm": { "id": farm.id, "name": farm.name, "location": farm.location },
        "harvest": {
            "date": batch.actual_harvest_date,
            "quantity": batch.quantity,
            "unit": batch.unit,
        },
        "quality": {
            "grade": input.quality_grade,
            "moistureContent": input.moisture_content,
            "notes": input.quality_notes,
        },
        "photos": input.photo_urls,
        "approvedBy": actor.id,
        "approvedAt": approved_at,
    })
}

pub fn plan_approval(
    actor: &Profile,
    batch: &CropBatch,
    farm: &Farm,
    warehouse: &Warehouse,
    input: &ApprovalInput,
    now: DateTime<Utc>,
) -> Result<TransitionPlan, AppError> {
    actor.require(Capability::BatchApprove)?;

    let grade = input.quality_grade.trim();
    if grade.is_empty() {
        return Err(AppError::InvalidInput("A classificação de qualidade é obrigatória.".into()));
    }
    if !warehouse.is_active {
        return Err(AppError::InvalidInput(format!("O armazém '{}' está desativado.", warehouse.name)));
    }

    let changes = BatchChanges {
        quality_grade: Some(grade.to_string()),
        approval_data: Some(approval_snapshot(actor, batch, farm, input, now)),
        warehouse_id: Some(warehouse.id),
        ..Default::default()
    };

    let plan = plan_transition(
        actor,
        batch,
        BatchStatus::Processed,
        "BATCH_APPROVED",
        changes,
        json!({ "qualityGrade": grade, "warehouseId": warehouse.id }),
    )?;

    let metadata = batch_metadata(batch);
    Ok(plan
        .notify(
            NotificationIntent::new(
                Audience::User(batch.field_agent_id),
                NotificationCategory::Approval,
                "Lote aprovado",
                format!("O lote {} foi aprovado com classificação {grade}.", batch.batch_code),
                metadata.clone(),
            )
            .kind(NotificationKind::Success),
        )
        .notify(NotificationIntent::new(
            Audience::WarehouseManagers(warehouse.id),
            NotificationCategory::Batch,
            "Lote a caminho do armazém",
            format!("O lote {} foi destinado ao armazém {}.", batch.batch_code, warehouse.name),
            metadata,
        )))
}

pub fn plan_rejection(actor: &Profile, batch: &CropBatch, reason: &str) -> Result<TransitionPlan, AppError> {
    actor.require(Capability::BatchApprove)?;

    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::InvalidInput("Informe o motivo da rejeição.".into()));
    }

    let changes = BatchChanges {
        append_note: Some(format!("Rejected: {reason}")),
        ..Default::default()
    };

    let plan = plan_transition(
        actor,
        batch,
        BatchStatus::ReadyForHarvest,
        "BATCH_REJECTED",
        changes,
        json!({ "reason": reason }),
    )?;

    Ok(plan.notify(
        NotificationIntent::new(
            Audience::User(batch.field_agent_id),
            NotificationCategory::Approval,
            "Lote rejeitado",
            format!("O lote {} foi rejeitado: {reason}", batch.batch_code),
            batch_metadata(batch),
        )
        .kind(NotificationKind::Warning)
        .priority(NotificationPriority::High),
    ))
}

#[derive(Clone)]
pub struct ProcurementService {
    batches: BatchService,
    registry_repo: RegistryRepository,
}

impl ProcurementService {
    pub fn new(batches: BatchService, registry_repo: RegistryRepository) -> Self {
        Self { batches, registry_repo }
    }

    pub async fn approve(&self, actor: &Profile, batch_id: Uuid, input: ApprovalInput) -> Result<CropBatch, AppError> {
        actor.require(Capability::BatchApprove)?;
        let batch = self.batches.load(batch_id).await?;

        let warehouse = self
            .registry_repo
            .find_warehouse(input.warehouse_id)
            .await?
            .ok_or(AppError::ResourceNotFound("Armazém"))?;

        // farm_id é FK, então a fazenda sempre existe
        let farm = self
            .registry_repo
            .find_farm(self.batches.pool(), batch.farm_id)
            .await?
            .ok_or(AppError::ResourceNotFound("Fazenda"))?;

        let plan = plan_approval(actor, &batch, &farm, &warehouse, &input, Utc::now())?;
        self.batches.execute(plan).await
    }

    pub async fn reject(&self, actor: &Profile, batch_id: Uuid, reason: &str) -> Result<CropBatch, AppError> {
        actor.require(Capability::BatchApprove)?;
        let batch = self.batches.load(batch_id).await?;
        let plan = plan_rejection(actor, &batch, reason)?;
        self.batches.execute(plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        batch::fixtures::batch,
        profile::{fixtures::profile, Role},
    };
    use chrono::NaiveDate;

    fn farm() -> Farm {
        let now = Utc::now();
        Farm {
            id: Uuid::new_v4(),
            name: "Fazenda Boa Vista".into(),
            location: "Sorriso - MT".into(),
            size_hectares: Some(Decimal::new(120, 0)),
            farmer_name: "João Pereira".into(),
            farmer_phone: Some("+55 65 99999-0000".into()),
            field_agent_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    fn warehouse() -> Warehouse {
        let now = Utc::now();
        Warehouse {
            id: Uuid::new_v4(),
            name: "Armazém Central".into(),
            location: "BR-163".into(),
            capacity: None,
            manager_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn input(warehouse_id: Uuid) -> ApprovalInput {
        ApprovalInput {
            quality_grade: "A".into(),
            moisture_content: Some(Decimal::new(135, 1)),
            quality_notes: Some("Grãos uniformes".into()),
            photo_urls: vec!["https://cdn.example.com/p1.jpg".into()],
            warehouse_id,
        }
    }

    #[test]
    fn approval_populates_nested_snapshot() {
        let officer = profile(Role::ProcurementOfficer, None);
        let mut b = batch(BatchStatus::PendingApproval, None);
        b.actual_harvest_date = NaiveDate::from_ymd_opt(2026, 7, 2);
        let f = farm();
        let w = warehouse();

        let plan = plan_approval(&officer, &b, &f, &w, &input(w.id), Utc::now()).unwrap();
        assert_eq!(plan.to, BatchStatus::Processed);
        assert_eq!(plan.changes.warehouse_id, Some(w.id));
        assert_eq!(plan.changes.quality_grade.as_deref(), Some("A"));

        let data = plan.changes.approval_data.unwrap();
        assert_eq!(data["farmer"]["name"], "João Pereira");
        assert_eq!(data["farm"]["name"], "Fazenda Boa Vista");
        assert_eq!(data["harvest"]["unit"], "kg");
        assert_eq!(data["harvest"]["date"], "2026-07-02");
        assert_eq!(data["quality"]["grade"], "A");
        assert_eq!(data["photos"][0], "https://cdn.example.com/p1.jpg");
        assert_eq!(data["approvedBy"], json!(officer.id));

        assert_eq!(plan.effects.notifications.len(), 2);
        assert_eq!(plan.effects.notifications[0].audience, Audience::User(b.field_agent_id));
        assert_eq!(plan.effects.notifications[1].audience, Audience::WarehouseManagers(w.id));
    }

    #[test]
    fn approval_needs_a_grade_and_an_active_warehouse() {
        let officer = profile(Role::ProcurementOfficer, None);
        let b = batch(BatchStatus::PendingApproval, None);
        let mut w = warehouse();

        let mut no_grade = input(w.id);
        no_grade.quality_grade = "  ".into();
        assert!(matches!(
            plan_approval(&officer, &b, &farm(), &w, &no_grade, Utc::now()),
            Err(AppError::InvalidInput(_))
        ));

        w.is_active = false;
        assert!(matches!(
            plan_approval(&officer, &b, &farm(), &w, &input(w.id), Utc::now()),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejection_returns_batch_to_harvest() {
        let officer = profile(Role::ProcurementOfficer, None);
        let b = batch(BatchStatus::PendingApproval, None);

        let plan = plan_rejection(&officer, &b, " umidade acima de 14% ").unwrap();
        assert_eq!(plan.to, BatchStatus::ReadyForHarvest);
        assert_eq!(plan.changes.append_note.as_deref(), Some("Rejected: umidade acima de 14%"));
        assert_eq!(plan.effects.notifications[0].priority, NotificationPriority::High);
        assert_eq!(plan.effects.audit.action, "BATCH_REJECTED");
    }

    #[test]
    fn rejection_requires_reason_and_pending_status() {
        let officer = profile(Role::ProcurementOfficer, None);
        assert!(matches!(
            plan_rejection(&officer, &batch(BatchStatus::PendingApproval, None), ""),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            plan_rejection(&officer, &batch(BatchStatus::Stored, None), "x"),
            Err(AppError::IllegalStatusTransition { .. })
        ));
    }

    #[test]
    fn drivers_cannot_approve() {
        let driver = profile(Role::Driver, None);
        let w = warehouse();
        assert!(matches!(
            plan_approval(&driver, &batch(BatchStatus::PendingApproval, None), &farm(), &w, &input(w.id), Utc::now()),
            Err(AppError::InsufficientRole(_))
        ));
    }
}
