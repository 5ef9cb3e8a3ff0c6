// src/services/side_effects.rs
//
// Efeitos colaterais das ações (auditoria + notificações).
// Rodam DEPOIS da mutação principal, fora da transação: uma falha aqui
// nunca desfaz a transição, mas sempre fica registrada no log.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ActivityRepository, NotificationRepository, ProfileRepository},
    models::{
        activity::NewActivityLog,
        notification::{NewNotification, NotificationCategory, NotificationKind, NotificationPriority},
        profile::Role,
    },
};

/// Para quem vai a notificação.
#[derive(Debug, Clone, PartialEq)]
pub enum Audience {
    /// Todos os perfis ativos com o papel
    Role(Role),
    /// Gerentes ativos de um armazém
    WarehouseManagers(Uuid),
    User(Uuid),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationIntent {
    pub audience: Audience,
    pub category: NotificationCategory,
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    pub metadata: Value,
}

impl NotificationIntent {
    pub fn new(
        audience: Audience,
        category: NotificationCategory,
        title: impl Into<String>,
        message: impl Into<String>,
        metadata: Value,
    ) -> Self {
        Self {
            audience,
            category,
            kind: NotificationKind::Info,
            priority: NotificationPriority::Normal,
            title: title.into(),
            message: message.into(),
            metadata,
        }
    }

    pub fn kind(mut self, kind: NotificationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Auditoria (sempre uma) + notificações (zero ou mais) de uma ação.
#[derive(Debug, Clone, PartialEq)]
pub struct SideEffects {
    pub audit: NewActivityLog,
    pub notifications: Vec<NotificationIntent>,
}

impl SideEffects {
    pub fn audit_only(audit: NewActivityLog) -> Self {
        Self { audit, notifications: Vec::new() }
    }
}

/// Uma linha por destinatário distinto, na ordem em que apareceram.
pub fn fan_out(recipients: &[Uuid], intent: &NotificationIntent) -> Vec<NewNotification> {
    let mut seen = HashSet::new();
    recipients
        .iter()
        .filter(|id| seen.insert(**id))
        .map(|user_id| NewNotification {
            user_id: *user_id,
            category: intent.category,
            kind: intent.kind,
            priority: intent.priority,
            title: intent.title.clone(),
            message: intent.message.clone(),
            metadata: intent.metadata.clone(),
        })
        .collect()
}

#[async_trait]
pub trait EffectSink: Send + Sync {
    async fn record_activity(&self, entry: &NewActivityLog) -> Result<(), AppError>;
    async fn resolve_audience(&self, audience: &Audience) -> Result<Vec<Uuid>, AppError>;
    async fn create_notifications(&self, rows: &[NewNotification]) -> Result<u64, AppError>;
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EffectReport {
    pub audit_recorded: bool,
    pub notifications_created: u64,
    pub failures: Vec<String>,
}

/// Executa todos os efeitos; nenhum erro é propagado, todos vão para `failures`.
pub async fn run_effects(sink: &dyn EffectSink, effects: SideEffects) -> EffectReport {
    let mut report = EffectReport::default();

    match sink.record_activity(&effects.audit).await {
        Ok(()) => report.audit_recorded = true,
        Err(e) => report.failures.push(format!("activity_log {}: {e:?}", effects.audit.action)),
    }

    for intent in &effects.notifications {
        let recipients = match sink.resolve_audience(&intent.audience).await {
            Ok(ids) => ids,
            Err(e) => {
                report.failures.push(format!("audience {:?}: {e:?}", intent.audience));
                continue;
            }
        };

        let rows = fan_out(&recipients, intent);
        match sink.create_notifications(&rows).await {
            Ok(n) => report.notifications_created += n,
            Err(e) => report.failures.push(format!("notification '{}': {e:?}", intent.title)),
        }
    }

    report
}

// ---
// Implementação real (Postgres)
// ---
#[derive(Clone)]
pub struct PgEffectSink {
    activity_repo: ActivityRepository,
    notification_repo: NotificationRepository,
    profile_repo: ProfileRepository,
}

impl PgEffectSink {
    pub fn new(
        activity_repo: ActivityRepository,
        notification_repo: NotificationRepository,
        profile_repo: ProfileRepository,
    ) -> Self {
        Self { activity_repo, notification_repo, profile_repo }
    }
}

#[async_trait]
impl EffectSink for PgEffectSink {
    async fn record_activity(&self, entry: &NewActivityLog) -> Result<(), AppError> {
        self.activity_repo.append(entry).await.map(|_| ())
    }

    async fn resolve_audience(&self, audience: &Audience) -> Result<Vec<Uuid>, AppError> {
        match audience {
            Audience::Role(role) => self.profile_repo.active_ids_by_role(*role).await,
            Audience::WarehouseManagers(w) => self.profile_repo.active_warehouse_manager_ids(*w).await,
            Audience::User(id) => Ok(vec![*id]),
        }
    }

    async fn create_notifications(&self, rows: &[NewNotification]) -> Result<u64, AppError> {
        self.notification_repo.create_many(rows).await
    }
}

/// Dispara os efeitos numa task do tokio: a resposta HTTP não espera por eles.
/// O handle devolvido só é aguardado nos testes.
#[derive(Clone)]
pub struct EffectDispatcher {
    sink: Arc<dyn EffectSink>,
}

impl EffectDispatcher {
    pub fn new(sink: Arc<dyn EffectSink>) -> Self {
        Self { sink }
    }

    pub fn dispatch(&self, effects: SideEffects) -> JoinHandle<EffectReport> {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let action = effects.audit.action.clone();
            let entity_id = effects.audit.entity_id;
            let report = run_effects(sink.as_ref(), effects).await;

            if report.failures.is_empty() {
                tracing::debug!(
                    %action, %entity_id, notifications = report.notifications_created,
                    "efeitos colaterais gravados"
                );
            } else {
                tracing::warn!(
                    %action, %entity_id, failures = ?report.failures,
                    "⚠️ efeitos colaterais falharam (transição mantida)"
                );
            }
            report
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// Sink em memória para os testes; pode ser configurado para falhar.
    #[derive(Default)]
    pub struct MemorySink {
        pub roles: HashMap<Role, Vec<Uuid>>,
        pub fail_audit: bool,
        pub fail_notifications: bool,
        pub audits: Mutex<Vec<NewActivityLog>>,
        pub notifications: Mutex<Vec<NewNotification>>,
    }

    #[async_trait]
    impl EffectSink for MemorySink {
        async fn record_activity(&self, entry: &NewActivityLog) -> Result<(), AppError> {
            if self.fail_audit {
                return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
            }
            self.audits.lock().await.push(entry.clone());
            Ok(())
        }

        async fn resolve_audience(&self, audience: &Audience) -> Result<Vec<Uuid>, AppError> {
            Ok(match audience {
                Audience::Role(role) => self.roles.get(role).cloned().unwrap_or_default(),
                Audience::WarehouseManagers(_) => Vec::new(),
                Audience::User(id) => vec![*id],
            })
        }

        async fn create_notifications(&self, rows: &[NewNotification]) -> Result<u64, AppError> {
            if self.fail_notifications {
                return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
            }
            self.notifications.lock().await.extend_from_slice(rows);
            Ok(rows.len() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemorySink;
    use super::*;
    use serde_json::json;

    fn effects(audience: Audience) -> SideEffects {
        SideEffects {
            audit: NewActivityLog::new(Uuid::new_v4(), "BATCH_STORED", "crop_batch", Uuid::new_v4(), json!({})),
            notifications: vec![NotificationIntent::new(
                audience,
                NotificationCategory::Batch,
                "Lote armazenado",
                "msg",
                json!({ "batchId": "x" }),
            )],
        }
    }

    #[test]
    fn fan_out_dedupes_recipients() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let intent = effects(Audience::User(a)).notifications.remove(0);
        let rows = fan_out(&[a, b, a], &intent);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, a);
        assert_eq!(rows[1].user_id, b);
        assert!(rows.iter().all(|r| r.metadata["batchId"] == "x"));
    }

    #[tokio::test]
    async fn one_notification_per_procurement_officer() {
        let officers = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let mut sink = MemorySink::default();
        sink.roles.insert(Role::ProcurementOfficer, officers.clone());

        let report = run_effects(&sink, effects(Audience::Role(Role::ProcurementOfficer))).await;

        assert!(report.audit_recorded);
        assert_eq!(report.notifications_created, 3);
        let stored = sink.notifications.lock().await;
        let targets: Vec<Uuid> = stored.iter().map(|n| n.user_id).collect();
        assert_eq!(targets, officers);
    }

    #[tokio::test]
    async fn notification_failure_is_reported_not_propagated() {
        let sink = MemorySink { fail_notifications: true, ..Default::default() };
        let report = run_effects(&sink, effects(Audience::User(Uuid::new_v4()))).await;

        assert!(report.audit_recorded);
        assert_eq!(report.notifications_created, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(sink.audits.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn dispatched_effects_survive_a_failing_sink() {
        let sink = Arc::new(MemorySink { fail_audit: true, fail_notifications: true, ..Default::default() });
        let dispatcher = EffectDispatcher::new(sink.clone());

        let report = dispatcher
            .dispatch(effects(Audience::User(Uuid::new_v4())))
            .await
            .expect("a task de efeitos não pode entrar em pânico");

        assert!(!report.audit_recorded);
        assert_eq!(report.notifications_created, 0);
        assert_eq!(report.failures.len(), 2);

        // O dispatcher continua utilizável depois da falha
        let again = dispatcher.dispatch(effects(Audience::User(Uuid::new_v4()))).await.unwrap();
        assert_eq!(again.failures.len(), 2);
        assert!(sink.audits.lock().await.is_empty());
    }

    #[tokio::test]
    async fn audit_failure_still_sends_notifications() {
        let sink = MemorySink { fail_audit: true, ..Default::default() };
        let report = run_effects(&sink, effects(Audience::User(Uuid::new_v4()))).await;

        assert!(!report.audit_recorded);
        assert_eq!(report.notifications_created, 1);
        assert_eq!(report.failures.len(), 1);
    }
}
