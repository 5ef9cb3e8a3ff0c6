// src/services/warehouse_service.rs

use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{db_utils::compose_note, error::AppError},
    db::TransportRepository,
    models::{
        batch::{BatchChanges, CropBatch},
        notification::{NotificationCategory, NotificationKind},
        profile::{Capability, Profile, Role},
        status::BatchStatus,
        transport::IssueType,
    },
    services::{
        batch_service::{batch_metadata, plan_transition, BatchService, TransitionPlan},
        side_effects::{Audience, NotificationIntent},
    },
};

const PACKAGING_TARGETS: [BatchStatus; 3] = [
    BatchStatus::ReadyForPackaging,
    BatchStatus::Packaging,
    BatchStatus::Packaged,
];

/// Recebimento por digitação manual do código: desativado de forma permanente.
/// O único caminho suportado é o leitor (`WarehouseService::confirm_receipt`).
pub fn manual_receipt_disabled(actor: &Profile) -> AppError {
    tracing::info!(user_id = %actor.id, "Tentativa de recebimento manual bloqueada");
    AppError::ManualReceiptDisabled
}

/// Papel + escopo de armazém, nesta ordem. Vem antes da legalidade do status.
fn authorize(actor: &Profile, batch: &CropBatch) -> Result<(), AppError> {
    actor.require(Capability::WarehouseOperate)?;
    actor.ensure_warehouse_scope(batch.warehouse_id)
}

pub fn plan_packaging(
    actor: &Profile,
    batch: &CropBatch,
    target: BatchStatus,
    notes: Option<&str>,
) -> Result<TransitionPlan, AppError> {
    authorize(actor, batch)?;

    if !PACKAGING_TARGETS.contains(&target) {
        return Err(AppError::IllegalStatusTransition {
            from: batch.status.to_string(),
            to: target.to_string(),
        });
    }

    let changes = BatchChanges {
        append_note: compose_note([notes.unwrap_or_default()]),
        ..Default::default()
    };
    let plan = plan_transition(actor, batch, target, "BATCH_PACKAGING_UPDATED", changes, json!({}))?;

    Ok(match target {
        BatchStatus::Packaged => plan.notify(NotificationIntent::new(
            Audience::Role(Role::TransportCoordinator),
            NotificationCategory::Transport,
            "Lote pronto para transporte",
            format!("O lote {} foi embalado e aguarda agendamento de coleta.", batch.batch_code),
            batch_metadata(batch),
        )),
        _ => plan,
    })
}

#[derive(Debug, Clone, Default)]
pub struct ReceiptInput {
    pub received_quantity: Option<Decimal>,
    pub quality_notes: Option<String>,
    pub issue_type: Option<IssueType>,
}

/// Recebimento pelo leitor (scanner). `coordinator_id` = coordenador da última viagem do lote.
pub fn plan_receipt(
    actor: &Profile,
    batch: &CropBatch,
    input: &ReceiptInput,
    coordinator_id: Option<Uuid>,
) -> Result<TransitionPlan, AppError> {
    authorize(actor, batch)?;

    if let Some(q) = input.received_quantity {
        if q.is_sign_negative() {
            return Err(AppError::InvalidInput("A quantidade recebida não pode ser negativa.".into()));
        }
    }

    let note = compose_note([
        input.received_quantity.map(|q| format!("Received quantity: {q} {}", batch.unit)).unwrap_or_default(),
        input.quality_notes.as_deref().map(|n| format!("Quality notes: {}", n.trim())).unwrap_or_default(),
        input.issue_type.map(|t| format!("Issue reported: {t}")).unwrap_or_default(),
    ]);

    let changes = BatchChanges {
        append_note: note,
        received_quantity: input.received_quantity,
        ..Default::default()
    };

    let plan = plan_transition(
        actor,
        batch,
        BatchStatus::Received,
        "BATCH_RECEIVED",
        changes,
        json!({
            "receivedQuantity": input.received_quantity,
            "issueType": input.issue_type,
        }),
    )?;

    let kind = if input.issue_type.is_some() { NotificationKind::Warning } else { NotificationKind::Success };
    let message = format!("O lote {} foi recebido no armazém.", batch.batch_code);
    let metadata = batch_metadata(batch);

    let plan = plan.notify(
        NotificationIntent::new(
            Audience::Role(Role::ProcurementOfficer),
            NotificationCategory::Batch,
            "Lote recebido",
            message.clone(),
            metadata.clone(),
        )
        .kind(kind),
    );

    Ok(match coordinator_id {
        Some(id) => plan.notify(
            NotificationIntent::new(Audience::User(id), NotificationCategory::Transport, "Entrega recebida", message, metadata)
                .kind(kind),
        ),
        None => plan,
    })
}

pub fn plan_storage(actor: &Profile, batch: &CropBatch, storage_location: &str) -> Result<TransitionPlan, AppError> {
    authorize(actor, batch)?;

    let location = storage_location.trim();
    if location.is_empty() {
        return Err(AppError::InvalidInput("O local de armazenagem é obrigatório.".into()));
    }

    let changes = BatchChanges {
        append_note: Some(format!("Storage location: {location}")),
        storage_location: Some(location.to_string()),
        ..Default::default()
    };

    let plan = plan_transition(
        actor,
        batch,
        BatchStatus::Stored,
        "BATCH_STORED",
        changes,
        json!({ "storageLocation": location }),
    )?;

    Ok(plan.notify(
        NotificationIntent::new(
            Audience::Role(Role::ProcurementOfficer),
            NotificationCategory::Batch,
            "Lote armazenado",
            format!("O lote {} foi armazenado em {location}.", batch.batch_code),
            batch_metadata(batch),
        )
        .kind(NotificationKind::Success),
    ))
}

/// Como o usuário identificou o lote no recebimento.
#[derive(Debug, Clone)]
pub enum BatchRef {
    Id(Uuid),
    Code(String),
}

#[derive(Clone)]
pub struct WarehouseService {
    batches: BatchService,
    transport_repo: TransportRepository,
}

impl WarehouseService {
    pub fn new(batches: BatchService, transport_repo: TransportRepository) -> Self {
        Self { batches, transport_repo }
    }

    pub async fn update_packaging(
        &self,
        actor: &Profile,
        batch_id: Uuid,
        target: BatchStatus,
        notes: Option<&str>,
    ) -> Result<CropBatch, AppError> {
        actor.require(Capability::WarehouseOperate)?;
        let batch = self.batches.load(batch_id).await?;
        let plan = plan_packaging(actor, &batch, target, notes)?;
        self.batches.execute(plan).await
    }

    pub async fn confirm_receipt(&self, actor: &Profile, batch: BatchRef, input: ReceiptInput) -> Result<CropBatch, AppError> {
        actor.require(Capability::WarehouseOperate)?;
        let batch = match batch {
            BatchRef::Id(id) => self.batches.load(id).await?,
            BatchRef::Code(code) => self.batches.load_by_code(&code).await?,
        };

        // Só lemos a viagem para saber quem avisar; ela não é alterada aqui
        let coordinator_id = self
            .transport_repo
            .latest_task_for_batch(batch.id)
            .await?
            .map(|t| t.coordinator_id);

        let plan = plan_receipt(actor, &batch, &input, coordinator_id)?;
        self.batches.execute(plan).await
    }

    pub async fn update_storage(&self, actor: &Profile, batch_id: Uuid, storage_location: &str) -> Result<CropBatch, AppError> {
        actor.require(Capability::WarehouseOperate)?;
        let batch = self.batches.load(batch_id).await?;
        let plan = plan_storage(actor, &batch, storage_location)?;
        self.batches.execute(plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{batch::fixtures::batch, profile::fixtures::profile, status::BatchStatus as S},
        services::side_effects::{run_effects, testing::MemorySink},
    };

    fn manager_and_batch(status: BatchStatus) -> (Profile, CropBatch) {
        let w = Uuid::new_v4();
        (profile(Role::WarehouseManager, Some(w)), batch(status, Some(w)))
    }

    #[test]
    fn start_packaging_logs_from_and_to() {
        let (manager, b) = manager_and_batch(S::ReadyForPackaging);
        let plan = plan_packaging(&manager, &b, S::Packaging, None).unwrap();

        assert_eq!(plan.to, S::Packaging);
        assert_eq!(plan.changes, BatchChanges::default());
        assert_eq!(plan.effects.audit.entity_id, b.id);
        assert_eq!(plan.effects.audit.details["statusFrom"], "READY_FOR_PACKAGING");
        assert_eq!(plan.effects.audit.details["statusTo"], "PACKAGING");
    }

    #[test]
    fn packaging_cannot_jump_to_stored() {
        let (manager, b) = manager_and_batch(S::Packaging);
        assert!(matches!(
            plan_packaging(&manager, &b, S::Stored, None),
            Err(AppError::IllegalStatusTransition { ref from, ref to }) if from == "PACKAGING" && to == "STORED"
        ));
    }

    #[test]
    fn packaged_notifies_transport() {
        let (manager, b) = manager_and_batch(S::Packaging);
        let plan = plan_packaging(&manager, &b, S::Packaged, Some("12 sacas")).unwrap();
        assert_eq!(plan.changes.append_note.as_deref(), Some("12 sacas"));
        assert_eq!(plan.effects.notifications[0].audience, Audience::Role(Role::TransportCoordinator));
    }

    #[test]
    fn other_warehouse_always_gets_ownership_mismatch() {
        let other = profile(Role::WarehouseManager, Some(Uuid::new_v4()));
        for status in S::ALL {
            let b = batch(status, Some(Uuid::new_v4()));
            for target in S::ALL {
                assert!(matches!(
                    plan_packaging(&other, &b, target, None),
                    Err(AppError::OwnershipMismatch(_))
                ));
            }
            assert!(matches!(
                plan_receipt(&other, &b, &ReceiptInput::default(), None),
                Err(AppError::OwnershipMismatch(_))
            ));
            assert!(matches!(plan_storage(&other, &b, "A1"), Err(AppError::OwnershipMismatch(_))));
        }
    }

    #[test]
    fn receipt_appends_each_annotation() {
        let (manager, b) = manager_and_batch(S::Shipped);
        let coordinator = Uuid::new_v4();
        let input = ReceiptInput {
            received_quantity: Some(Decimal::new(980, 0)),
            quality_notes: Some(" sacaria úmida ".into()),
            issue_type: Some(IssueType::Damage),
        };

        let plan = plan_receipt(&manager, &b, &input, Some(coordinator)).unwrap();
        assert_eq!(plan.to, S::Received);
        assert_eq!(plan.changes.received_quantity, Some(Decimal::new(980, 0)));
        assert_eq!(
            plan.changes.append_note.as_deref(),
            Some("Received quantity: 980 kg\nQuality notes: sacaria úmida\nIssue reported: DAMAGE")
        );
        assert_eq!(plan.effects.notifications.len(), 2);
        assert_eq!(plan.effects.notifications[1].audience, Audience::User(coordinator));
    }

    #[test]
    fn receipt_rejects_negative_quantity() {
        let (manager, b) = manager_and_batch(S::Packaged);
        let input = ReceiptInput { received_quantity: Some(Decimal::new(-1, 0)), ..Default::default() };
        assert!(matches!(plan_receipt(&manager, &b, &input, None), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn receipt_straight_from_packaged_is_allowed() {
        let (manager, b) = manager_and_batch(S::Packaged);
        let plan = plan_receipt(&manager, &b, &ReceiptInput::default(), None).unwrap();
        assert_eq!(plan.changes.append_note, None);
        assert_eq!(plan.effects.notifications.len(), 1);
    }

    #[tokio::test]
    async fn storage_in_a1_notifies_every_procurement_officer() {
        let (manager, b) = manager_and_batch(S::Received);
        let plan = plan_storage(&manager, &b, "A1").unwrap();

        assert_eq!(plan.to, S::Stored);
        assert_eq!(plan.changes.storage_location.as_deref(), Some("A1"));
        assert_eq!(plan.changes.append_note.as_deref(), Some("Storage location: A1"));

        let officers = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let mut sink = MemorySink::default();
        sink.roles.insert(Role::ProcurementOfficer, officers.clone());

        let report = run_effects(&sink, plan.effects).await;
        assert_eq!(report.notifications_created, 3);

        let audits = sink.audits.lock().await;
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].details["statusTo"], "STORED");
    }

    #[test]
    fn storage_requires_location() {
        let (manager, b) = manager_and_batch(S::Received);
        assert!(matches!(plan_storage(&manager, &b, "   "), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn storage_from_packaging_is_illegal() {
        let (manager, b) = manager_and_batch(S::Packaging);
        assert!(matches!(plan_storage(&manager, &b, "A1"), Err(AppError::IllegalStatusTransition { .. })));
    }
}
