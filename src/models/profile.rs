// src/models/profile.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    FieldAgent,
    Farmer,
    WarehouseManager,
    ProcurementOfficer,
    TransportCoordinator,
    Driver,
}

/// O que cada papel pode fazer. Os handlers pedem uma capacidade,
/// nunca comparam o papel diretamente.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    BatchCreate,
    BatchCultivate,
    FarmRegister,
    BatchApprove,
    WarehouseOperate,
    TransportSchedule,
    TransportManage,
    TransportDrive,
    IssueReport,
    AuditRead,
    AdminManage,
}

impl Capability {
    pub fn slug(self) -> &'static str {
        match self {
            Capability::BatchCreate => "batch:create",
            Capability::BatchCultivate => "batch:cultivate",
            Capability::FarmRegister => "farm:register",
            Capability::BatchApprove => "batch:approve",
            Capability::WarehouseOperate => "warehouse:operate",
            Capability::TransportSchedule => "transport:schedule",
            Capability::TransportManage => "transport:manage",
            Capability::TransportDrive => "transport:drive",
            Capability::IssueReport => "transport:issue",
            Capability::AuditRead => "audit:read",
            Capability::AdminManage => "admin:manage",
        }
    }
}

impl Role {
    pub fn capabilities(self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Admin => &[
                BatchCreate, BatchCultivate, FarmRegister, BatchApprove,
                TransportSchedule, TransportManage, AuditRead, AdminManage,
            ],
            Role::Manager => &[BatchApprove, AuditRead],
            Role::FieldAgent => &[BatchCreate, BatchCultivate, FarmRegister],
            Role::Farmer => &[],
            Role::WarehouseManager => &[WarehouseOperate],
            Role::ProcurementOfficer => &[BatchApprove, TransportSchedule],
            Role::TransportCoordinator => &[TransportSchedule, TransportManage, IssueReport],
            Role::Driver => &[TransportDrive, IssueReport],
        }
    }

    pub fn has(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

// Representa o perfil vindo do banco de dados (o "quem sou eu" de toda checagem)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    // Mesmo id do usuário no provedor de autenticação
    pub id: Uuid,
    #[schema(example = "gerente@armazem.com")]
    pub email: String,
    #[schema(example = "Maria Souza")]
    pub full_name: String,
    pub role: Role,
    pub warehouse_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.role.has(capability) {
            Ok(())
        } else {
            Err(AppError::InsufficientRole(format!(
                "Você precisa da permissão '{}' para realizar esta ação.",
                capability.slug()
            )))
        }
    }

    /// Escopo de armazém: o lote precisa estar no armazém atribuído ao usuário.
    pub fn ensure_warehouse_scope(&self, batch_warehouse: Option<Uuid>) -> Result<(), AppError> {
        let mine = self.warehouse_id.ok_or_else(|| {
            AppError::OwnershipMismatch("Nenhum armazém atribuído ao seu usuário.".into())
        })?;

        match batch_warehouse {
            Some(w) if w == mine => Ok(()),
            _ => Err(AppError::OwnershipMismatch(
                "Este lote não pertence ao seu armazém.".into(),
            )),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn profile(role: Role, warehouse_id: Option<Uuid>) -> Profile {
        let now = Utc::now();
        Profile {
            id: Uuid::new_v4(),
            email: format!("{role:?}@example.com").to_lowercase(),
            full_name: format!("{role:?}"),
            role,
            warehouse_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::profile;
    use super::*;

    #[test]
    fn only_warehouse_managers_operate_warehouses() {
        for role in [
            Role::Admin, Role::Manager, Role::FieldAgent, Role::Farmer,
            Role::ProcurementOfficer, Role::TransportCoordinator, Role::Driver,
        ] {
            assert!(!role.has(Capability::WarehouseOperate), "{role:?}");
        }
        assert!(Role::WarehouseManager.has(Capability::WarehouseOperate));
    }

    #[test]
    fn approval_roles() {
        assert!(Role::ProcurementOfficer.has(Capability::BatchApprove));
        assert!(Role::Admin.has(Capability::BatchApprove));
        assert!(Role::Manager.has(Capability::BatchApprove));
        assert!(!Role::FieldAgent.has(Capability::BatchApprove));
    }

    #[test]
    fn require_reports_the_capability_slug() {
        let driver = profile(Role::Driver, None);
        let err = driver.require(Capability::BatchApprove).unwrap_err();
        assert!(matches!(err, AppError::InsufficientRole(ref m) if m.contains("batch:approve")));
    }

    #[test]
    fn warehouse_scope() {
        let w1 = Uuid::new_v4();
        let w2 = Uuid::new_v4();
        let manager = profile(Role::WarehouseManager, Some(w1));

        assert!(manager.ensure_warehouse_scope(Some(w1)).is_ok());
        assert!(matches!(
            manager.ensure_warehouse_scope(Some(w2)),
            Err(AppError::OwnershipMismatch(_))
        ));
        assert!(matches!(
            manager.ensure_warehouse_scope(None),
            Err(AppError::OwnershipMismatch(_))
        ));

        let unassigned = profile(Role::WarehouseManager, None);
        assert!(matches!(
            unassigned.ensure_warehouse_scope(Some(w1)),
            Err(AppError::OwnershipMismatch(_))
        ));
    }

    #[test]
    fn role_wire_format_is_snake_case() {
        assert_eq!(serde_json::to_string(&Role::WarehouseManager).unwrap(), "\"warehouse_manager\"");
    }
}
