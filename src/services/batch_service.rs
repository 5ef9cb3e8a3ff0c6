// src/services/batch_service.rs

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{batch_repo::{BatchFilter, BatchStore, StatusCount}, BatchRepository, RegistryRepository},
    models::{
        activity::{entity, NewActivityLog},
        batch::{AllowedTransitions, BatchChanges, CropBatch, NewCropBatch},
        notification::NotificationCategory,
        profile::{Capability, Profile, Role},
        status::{validate_batch_transition, BatchStatus},
    },
    services::side_effects::{Audience, EffectDispatcher, NotificationIntent, SideEffects},
};

/// Tudo o que uma transição vai fazer, decidido ANTES de tocar no banco.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub batch_id: Uuid,
    pub from: BatchStatus,
    pub to: BatchStatus,
    pub changes: BatchChanges,
    pub effects: SideEffects,
}

impl TransitionPlan {
    pub fn notify(mut self, intent: NotificationIntent) -> Self {
        self.effects.notifications.push(intent);
        self
    }
}

/// Monta o plano base: valida a tabela e prepara o registro de auditoria
/// com statusFrom/statusTo. `extra` é mesclado nos detalhes.
pub fn plan_transition(
    actor: &Profile,
    batch: &CropBatch,
    target: BatchStatus,
    action: &str,
    changes: BatchChanges,
    extra: Value,
) -> Result<TransitionPlan, AppError> {
    validate_batch_transition(batch.status, target)?;

    let mut details = json!({
        "statusFrom": batch.status,
        "statusTo": target,
        "batchCode": batch.batch_code,
        "actorRole": actor.role,
    });
    if let (Some(base), Value::Object(more)) = (details.as_object_mut(), extra) {
        base.extend(more);
    }

    Ok(TransitionPlan {
        batch_id: batch.id,
        from: batch.status,
        to: target,
        changes,
        effects: SideEffects::audit_only(NewActivityLog::new(
            actor.id,
            action,
            entity::CROP_BATCH,
            batch.id,
            details,
        )),
    })
}

/// Metadados padrão de deep-link das notificações de lote.
pub fn batch_metadata(batch: &CropBatch) -> Value {
    json!({ "batchId": batch.id, "batchCode": batch.batch_code, "status": batch.status })
}

/// Alvos que o agente de campo pode pedir nesta ação.
const FIELD_TARGETS: [BatchStatus; 4] = [
    BatchStatus::Growing,
    BatchStatus::ReadyForHarvest,
    BatchStatus::Harvested,
    BatchStatus::PendingApproval,
];

#[derive(Debug, Clone, Default)]
pub struct AdvanceInput {
    pub target: Option<BatchStatus>,
    pub harvested_quantity: Option<Decimal>,
    pub notes: Option<String>,
}

pub fn plan_advance(
    actor: &Profile,
    batch: &CropBatch,
    input: &AdvanceInput,
    today: NaiveDate,
) -> Result<TransitionPlan, AppError> {
    actor.require(Capability::BatchCultivate)?;

    if !actor.is_admin() && batch.field_agent_id != actor.id {
        return Err(AppError::OwnershipMismatch(
            "Somente o agente de campo responsável pode atualizar este lote.".into(),
        ));
    }

    let target = input
        .target
        .ok_or_else(|| AppError::InvalidInput("O campo 'status' é obrigatório.".into()))?;

    validate_batch_transition(batch.status, target)?;
    if !FIELD_TARGETS.contains(&target) {
        return Err(AppError::InvalidInput(format!(
            "O status {target} não pode ser definido pelo agente de campo."
        )));
    }

    let mut changes = BatchChanges {
        append_note: input.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(String::from),
        ..Default::default()
    };
    if target == BatchStatus::Harvested {
        changes.actual_harvest_date = Some(today);
        changes.quantity = input.harvested_quantity;
    }

    let plan = plan_transition(
        actor,
        batch,
        target,
        "BATCH_STATUS_UPDATED",
        changes,
        json!({ "harvestedQuantity": input.harvested_quantity }),
    )?;

    Ok(match target {
        BatchStatus::PendingApproval => plan.notify(NotificationIntent::new(
            Audience::Role(Role::ProcurementOfficer),
            NotificationCategory::Approval,
            "Lote aguardando aprovação",
            format!("O lote {} ({}) foi enviado para aprovação.", batch.batch_code, batch.crop_type),
            batch_metadata(batch),
        )),
        _ => plan,
    })
}

/// Qual recorte de lotes o usuário enxerga. `None` = nenhum.
pub fn visibility_filter(actor: &Profile) -> Option<BatchFilter> {
    match actor.role {
        Role::FieldAgent => Some(BatchFilter { field_agent_id: Some(actor.id), ..Default::default() }),
        Role::WarehouseManager => actor
            .warehouse_id
            .map(|w| BatchFilter { warehouse_id: Some(w), ..Default::default() }),
        Role::Farmer => None,
        _ => Some(BatchFilter::default()),
    }
}

pub fn can_view(actor: &Profile, batch: &CropBatch) -> bool {
    match visibility_filter(actor) {
        None => false,
        Some(f) => {
            f.field_agent_id.is_none_or(|id| id == batch.field_agent_id)
                && f.warehouse_id.is_none_or(|w| Some(w) == batch.warehouse_id)
        }
    }
}

/// Códigos são gravados e buscados sempre em maiúsculas, sem espaços nas pontas.
pub fn normalize_batch_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Efetiva o plano com CAS. Se o UPDATE não casou nenhuma linha, outra
/// requisição mudou o status antes: relemos para informar o status real.
pub(crate) async fn commit_plan<S>(store: &S, plan: &TransitionPlan) -> Result<CropBatch, AppError>
where
    S: BatchStore + ?Sized,
{
    match store.transition_if(plan.batch_id, plan.from, plan.to, &plan.changes).await? {
        Some(batch) => Ok(batch),
        None => Err(lost_race(store, plan.batch_id, plan.from).await),
    }
}

pub(crate) async fn lost_race<S>(store: &S, batch_id: Uuid, expected: BatchStatus) -> AppError
where
    S: BatchStore + ?Sized,
{
    match store.current(batch_id).await {
        Ok(Some(current)) => AppError::StatusConflict {
            expected: expected.to_string(),
            actual: current.status.to_string(),
        },
        Ok(None) => AppError::ResourceNotFound("Lote"),
        Err(e) => e,
    }
}

pub fn generate_batch_code(today: NaiveDate) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("CB-{}-{}", today.format("%Y%m%d"), suffix)
}

#[derive(Debug, Clone)]
pub struct CreateBatchInput {
    pub batch_code: Option<String>,
    pub crop_type: String,
    pub variety: Option<String>,
    pub quantity: Decimal,
    pub unit: String,
    pub planting_date: NaiveDate,
    pub expected_harvest_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub farm_id: Uuid,
}

#[derive(Clone)]
pub struct BatchService {
    pool: PgPool,
    batch_repo: BatchRepository,
    registry_repo: RegistryRepository,
    effects: EffectDispatcher,
}

impl BatchService {
    pub fn new(
        pool: PgPool,
        batch_repo: BatchRepository,
        registry_repo: RegistryRepository,
        effects: EffectDispatcher,
    ) -> Self {
        Self { pool, batch_repo, registry_repo, effects }
    }

    pub async fn load(&self, batch_id: Uuid) -> Result<CropBatch, AppError> {
        self.batch_repo
            .find_by_id(&self.pool, batch_id)
            .await?
            .ok_or(AppError::ResourceNotFound("Lote"))
    }

    pub async fn load_by_code(&self, batch_code: &str) -> Result<CropBatch, AppError> {
        self.batch_repo
            .find_by_code(&normalize_batch_code(batch_code))
            .await?
            .ok_or(AppError::ResourceNotFound("Lote"))
    }

    /// Aplica o plano com CAS no status. Se outra requisição chegou antes,
    /// nada é escrito e devolvemos StatusConflict com o status real.
    pub async fn execute(&self, plan: TransitionPlan) -> Result<CropBatch, AppError> {
        let batch = commit_plan(&self.batch_repo, &plan).await?;

        tracing::info!(
            batch_id = %batch.id,
            from = %plan.from,
            to = %plan.to,
            action = %plan.effects.audit.action,
            "🔄 Lote atualizado"
        );

        self.effects.dispatch(plan.effects);
        Ok(batch)
    }

    pub(crate) async fn conflict(&self, batch_id: Uuid, expected: BatchStatus) -> AppError {
        lost_race(&self.batch_repo, batch_id, expected).await
    }

    pub fn effects(&self) -> &EffectDispatcher {
        &self.effects
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn repo(&self) -> &BatchRepository {
        &self.batch_repo
    }

    // --- CRIAÇÃO (agente de campo) ---
    pub async fn create_batch(&self, actor: &Profile, input: CreateBatchInput) -> Result<CropBatch, AppError> {
        actor.require(Capability::BatchCreate)?;

        if let Some(expected) = input.expected_harvest_date {
            if expected < input.planting_date {
                return Err(AppError::InvalidInput(
                    "A previsão de colheita não pode ser anterior ao plantio.".into(),
                ));
            }
        }

        let farm = self
            .registry_repo
            .find_farm(&self.pool, input.farm_id)
            .await?
            .ok_or(AppError::ResourceNotFound("Fazenda"))?;

        if !actor.is_admin() && farm.field_agent_id != actor.id {
            return Err(AppError::OwnershipMismatch(
                "Esta fazenda é acompanhada por outro agente de campo.".into(),
            ));
        }

        let today = Utc::now().date_naive();
        let new = NewCropBatch {
            batch_code: input
                .batch_code
                .as_deref()
                .map(normalize_batch_code)
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| generate_batch_code(today)),
            crop_type: input.crop_type,
            variety: input.variety,
            quantity: input.quantity,
            unit: input.unit,
            planting_date: input.planting_date,
            expected_harvest_date: input.expected_harvest_date,
            notes: input.notes,
            farm_id: farm.id,
            field_agent_id: farm.field_agent_id,
        };

        let batch = self.batch_repo.create(&self.pool, &new).await?;

        tracing::info!(batch_id = %batch.id, code = %batch.batch_code, "🌱 Lote criado");

        self.effects.dispatch(SideEffects::audit_only(NewActivityLog::new(
            actor.id,
            "BATCH_CREATED",
            entity::CROP_BATCH,
            batch.id,
            json!({
                "batchCode": batch.batch_code,
                "cropType": batch.crop_type,
                "quantity": batch.quantity,
                "unit": batch.unit,
                "farmId": batch.farm_id,
                "statusTo": batch.status,
            }),
        )));

        Ok(batch)
    }

    // --- CICLO DE CAMPO ---
    pub async fn advance(&self, actor: &Profile, batch_id: Uuid, input: AdvanceInput) -> Result<CropBatch, AppError> {
        let batch = self.load(batch_id).await?;
        let plan = plan_advance(actor, &batch, &input, Utc::now().date_naive())?;
        self.execute(plan).await
    }

    // --- LEITURA ---
    pub async fn list(&self, actor: &Profile, status: Option<BatchStatus>, limit: Option<i64>) -> Result<Vec<CropBatch>, AppError> {
        let Some(mut filter) = visibility_filter(actor) else {
            return Ok(Vec::new());
        };
        filter.status = status;
        filter.limit = limit.unwrap_or(100).clamp(1, 500);
        self.batch_repo.list(&self.pool, &filter).await
    }

    pub async fn get(&self, actor: &Profile, batch_id: Uuid) -> Result<CropBatch, AppError> {
        let batch = self.load(batch_id).await?;
        if !can_view(actor, &batch) {
            // Não revelamos a existência de lotes fora do escopo
            return Err(AppError::ResourceNotFound("Lote"));
        }
        Ok(batch)
    }

    pub async fn allowed_transitions(&self, actor: &Profile, batch_id: Uuid) -> Result<AllowedTransitions, AppError> {
        let batch = self.get(actor, batch_id).await?;
        Ok(AllowedTransitions {
            current: batch.status,
            next: batch.status.next_allowed().to_vec(),
        })
    }

    pub async fn summary(&self, actor: &Profile) -> Result<Vec<StatusCount>, AppError> {
        let Some(filter) = visibility_filter(actor) else {
            return Ok(Vec::new());
        };
        self.batch_repo
            .count_by_status(&self.pool, filter.field_agent_id, filter.warehouse_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{batch::fixtures::batch, profile::fixtures::profile};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Um único lote em memória com o mesmo contrato de CAS do UPDATE.
    struct MemoryStore {
        batch: Mutex<CropBatch>,
    }

    impl MemoryStore {
        fn new(batch: CropBatch) -> Self {
            Self { batch: Mutex::new(batch) }
        }

        fn status(&self) -> BatchStatus {
            self.batch.lock().unwrap().status
        }
    }

    #[async_trait]
    impl BatchStore for MemoryStore {
        async fn transition_if(
            &self,
            batch_id: Uuid,
            expected: BatchStatus,
            next: BatchStatus,
            changes: &BatchChanges,
        ) -> Result<Option<CropBatch>, AppError> {
            let mut batch = self.batch.lock().unwrap();
            if batch.id != batch_id || batch.status != expected {
                return Ok(None);
            }
            batch.status = next;
            if let Some(loc) = &changes.storage_location {
                batch.storage_location = Some(loc.clone());
            }
            Ok(Some(batch.clone()))
        }

        async fn current(&self, batch_id: Uuid) -> Result<Option<CropBatch>, AppError> {
            let batch = self.batch.lock().unwrap();
            Ok((batch.id == batch_id).then(|| batch.clone()))
        }
    }

    fn packaging_plan(b: &CropBatch, target: BatchStatus) -> TransitionPlan {
        let actor = profile(Role::WarehouseManager, b.warehouse_id);
        plan_transition(&actor, b, target, "PACKAGING_STATUS_UPDATED", BatchChanges::default(), json!({})).unwrap()
    }

    #[tokio::test]
    async fn commit_applies_plan_when_status_still_matches() {
        let b = batch(BatchStatus::Packaging, Some(Uuid::new_v4()));
        let store = MemoryStore::new(b.clone());

        let updated = commit_plan(&store, &packaging_plan(&b, BatchStatus::Packaged)).await.unwrap();
        assert_eq!(updated.status, BatchStatus::Packaged);
        assert_eq!(store.status(), BatchStatus::Packaged);
    }

    #[tokio::test]
    async fn slower_writer_gets_status_conflict_with_actual_status() {
        let b = batch(BatchStatus::Packaging, Some(Uuid::new_v4()));
        let store = MemoryStore::new(b.clone());

        // Dois gerentes leram o lote em PACKAGING; os dois planos partem do mesmo status
        let first = packaging_plan(&b, BatchStatus::Packaged);
        let second = packaging_plan(&b, BatchStatus::ReadyForPackaging);

        commit_plan(&store, &first).await.unwrap();
        let err = commit_plan(&store, &second).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::StatusConflict { ref expected, ref actual } if expected == "PACKAGING" && actual == "PACKAGED"
        ));
        // Nada foi escrito pelo perdedor
        assert_eq!(store.status(), BatchStatus::Packaged);
    }

    #[tokio::test]
    async fn vanished_batch_is_not_found() {
        let b = batch(BatchStatus::Packaging, None);
        let store = MemoryStore::new(batch(BatchStatus::Packaging, None));

        let err = commit_plan(&store, &packaging_plan(&b, BatchStatus::Packaged)).await.unwrap_err();
        assert!(matches!(err, AppError::ResourceNotFound(_)));
    }

    #[test]
    fn typed_codes_match_stored_codes() {
        assert_eq!(normalize_batch_code("  cb-20261019-abc123 "), "CB-20261019-ABC123");
        assert_eq!(normalize_batch_code("CB-20261019-ABC123"), "CB-20261019-ABC123");
        assert_eq!(normalize_batch_code("   "), "");
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn base_plan_records_from_and_to() {
        let actor = profile(Role::WarehouseManager, None);
        let b = batch(BatchStatus::ReadyForPackaging, None);
        let plan = plan_transition(&actor, &b, BatchStatus::Packaging, "X", BatchChanges::default(), json!({"k": 1})).unwrap();

        assert_eq!(plan.effects.audit.entity_id, b.id);
        assert_eq!(plan.effects.audit.details["statusFrom"], "READY_FOR_PACKAGING");
        assert_eq!(plan.effects.audit.details["statusTo"], "PACKAGING");
        assert_eq!(plan.effects.audit.details["k"], 1);
    }

    #[test]
    fn field_agent_advances_own_batch() {
        let agent = profile(Role::FieldAgent, None);
        let mut b = batch(BatchStatus::Planted, None);
        b.field_agent_id = agent.id;

        let input = AdvanceInput { target: Some(BatchStatus::Growing), ..Default::default() };
        let plan = plan_advance(&agent, &b, &input, today()).unwrap();
        assert_eq!((plan.from, plan.to), (BatchStatus::Planted, BatchStatus::Growing));
        assert_eq!(plan.changes, BatchChanges::default());
        assert!(plan.effects.notifications.is_empty());
    }

    #[test]
    fn other_agents_cannot_touch_the_batch() {
        let agent = profile(Role::FieldAgent, None);
        let b = batch(BatchStatus::Planted, None);
        let input = AdvanceInput { target: Some(BatchStatus::Growing), ..Default::default() };
        assert!(matches!(plan_advance(&agent, &b, &input, today()), Err(AppError::OwnershipMismatch(_))));
    }

    #[test]
    fn harvest_stamps_date_and_quantity() {
        let agent = profile(Role::FieldAgent, None);
        let mut b = batch(BatchStatus::ReadyForHarvest, None);
        b.field_agent_id = agent.id;

        let input = AdvanceInput {
            target: Some(BatchStatus::Harvested),
            harvested_quantity: Some(Decimal::new(950, 0)),
            notes: None,
        };
        let plan = plan_advance(&agent, &b, &input, today()).unwrap();
        assert_eq!(plan.changes.actual_harvest_date, Some(today()));
        assert_eq!(plan.changes.quantity, Some(Decimal::new(950, 0)));
    }

    #[test]
    fn submit_for_approval_notifies_procurement() {
        let agent = profile(Role::FieldAgent, None);
        let mut b = batch(BatchStatus::Harvested, None);
        b.field_agent_id = agent.id;

        let input = AdvanceInput { target: Some(BatchStatus::PendingApproval), ..Default::default() };
        let plan = plan_advance(&agent, &b, &input, today()).unwrap();
        assert_eq!(plan.effects.notifications.len(), 1);
        assert_eq!(plan.effects.notifications[0].audience, Audience::Role(Role::ProcurementOfficer));
    }

    #[test]
    fn field_agent_cannot_skip_to_processing() {
        let agent = profile(Role::FieldAgent, None);
        let mut b = batch(BatchStatus::Harvested, None);
        b.field_agent_id = agent.id;

        // Legal na tabela, mas não é alvo desta ação
        let input = AdvanceInput { target: Some(BatchStatus::Processed), ..Default::default() };
        assert!(matches!(plan_advance(&agent, &b, &input, today()), Err(AppError::InvalidInput(_))));

        // Ilegal na tabela
        let input = AdvanceInput { target: Some(BatchStatus::Stored), ..Default::default() };
        assert!(matches!(
            plan_advance(&agent, &b, &input, today()),
            Err(AppError::IllegalStatusTransition { .. })
        ));
    }

    #[test]
    fn visibility_by_role() {
        let w = Uuid::new_v4();
        let manager = profile(Role::WarehouseManager, Some(w));
        let mut b = batch(BatchStatus::Stored, Some(w));
        assert!(can_view(&manager, &b));
        b.warehouse_id = Some(Uuid::new_v4());
        assert!(!can_view(&manager, &b));

        let officer = profile(Role::ProcurementOfficer, None);
        assert!(can_view(&officer, &b));

        let farmer = profile(Role::Farmer, None);
        assert!(!can_view(&farmer, &b));
        assert!(visibility_filter(&profile(Role::WarehouseManager, None)).is_none());
    }

    #[test]
    fn generated_codes_carry_the_date() {
        let code = generate_batch_code(today());
        assert!(code.starts_with("CB-20261019-"));
        assert_eq!(code.len(), "CB-20261019-".len() + 6);
    }
}
