// src/services/notification_service.rs

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ActivityRepository, NotificationRepository},
    models::{
        activity::ActivityLog,
        notification::{Notification, NotificationCategory},
        profile::{Capability, Profile},
    },
};

const MAX_ACTIVITY: i64 = 100;

// Lado de leitura: caixa de notificações do usuário e trilha de auditoria.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    activity_repo: ActivityRepository,
}

impl NotificationService {
    pub fn new(notification_repo: NotificationRepository, activity_repo: ActivityRepository) -> Self {
        Self { notification_repo, activity_repo }
    }

    pub async fn list(
        &self,
        user: &Profile,
        category: Option<NotificationCategory>,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AppError> {
        self.notification_repo.list_for_user(user.id, category, unread_only).await
    }

    pub async fn unread_count(&self, user: &Profile) -> Result<i64, AppError> {
        self.notification_repo.count_unread(user.id).await
    }

    /// Notificação de outro usuário responde como inexistente.
    pub async fn mark_read(&self, user: &Profile, notification_id: Uuid) -> Result<Notification, AppError> {
        self.notification_repo
            .mark_read(user.id, notification_id)
            .await?
            .ok_or(AppError::ResourceNotFound("Notificação"))
    }

    pub async fn mark_all_read(&self, user: &Profile) -> Result<u64, AppError> {
        self.notification_repo.mark_all_read(user.id).await
    }

    pub async fn activity(
        &self,
        user: &Profile,
        entity_type: Option<&str>,
        entity_id: Option<Uuid>,
        limit: Option<i64>,
    ) -> Result<Vec<ActivityLog>, AppError> {
        user.require(Capability::AuditRead)?;
        let limit = limit.unwrap_or(MAX_ACTIVITY).clamp(1, MAX_ACTIVITY);
        self.activity_repo.list(entity_type, entity_id, limit).await
    }
}
