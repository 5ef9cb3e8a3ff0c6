// src/middleware/rbac.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

use crate::{
    common::error::AppError,
    middleware::auth::AuthenticatedUser,
    models::profile::{Capability, Profile},
};

/// 1. O Trait que define qual capacidade a rota exige
pub trait CapabilityDef: Send + Sync + 'static {
    fn capability() -> Capability;
}

/// 2. O Extractor (Guardião). Entrega o perfil já autorizado.
pub struct RequireCapability<T>(pub Profile, PhantomData<T>);

impl<T> RequireCapability<T> {
    pub fn profile(&self) -> &Profile {
        &self.0
    }
}

// 3. Implementação do FromRequestParts
impl<T, S> FromRequestParts<S> for RequireCapability<T>
where
    T: CapabilityDef,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // A. Extrai Usuário (colocado lá pelo auth_guard)
        let AuthenticatedUser(profile) = AuthenticatedUser::from_request_parts(parts, state).await?;

        // B. Papel -> capacidades, sem ida ao banco
        profile.require(T::capability())?;

        Ok(RequireCapability(profile, PhantomData))
    }
}

// ---
// DEFINIÇÃO DAS CAPACIDADES (TIPOS)
// ---

pub struct CanCreateBatch;
impl CapabilityDef for CanCreateBatch {
    fn capability() -> Capability { Capability::BatchCreate }
}

pub struct CanCultivate;
impl CapabilityDef for CanCultivate {
    fn capability() -> Capability { Capability::BatchCultivate }
}

pub struct CanRegisterFarm;
impl CapabilityDef for CanRegisterFarm {
    fn capability() -> Capability { Capability::FarmRegister }
}

pub struct CanApprove;
impl CapabilityDef for CanApprove {
    fn capability() -> Capability { Capability::BatchApprove }
}

pub struct CanOperateWarehouse;
impl CapabilityDef for CanOperateWarehouse {
    fn capability() -> Capability { Capability::WarehouseOperate }
}

pub struct CanScheduleTransport;
impl CapabilityDef for CanScheduleTransport {
    fn capability() -> Capability { Capability::TransportSchedule }
}

pub struct CanManageTransport;
impl CapabilityDef for CanManageTransport {
    fn capability() -> Capability { Capability::TransportManage }
}

pub struct CanDrive;
impl CapabilityDef for CanDrive {
    fn capability() -> Capability { Capability::TransportDrive }
}

pub struct CanReportIssue;
impl CapabilityDef for CanReportIssue {
    fn capability() -> Capability { Capability::IssueReport }
}

pub struct CanReadAudit;
impl CapabilityDef for CanReadAudit {
    fn capability() -> Capability { Capability::AuditRead }
}

pub struct CanAdminister;
impl CapabilityDef for CanAdminister {
    fn capability() -> Capability { Capability::AdminManage }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::{fixtures::profile, Role};
    use axum::http::Request;

    async fn extract<T: CapabilityDef>(user: Option<Profile>) -> Result<RequireCapability<T>, AppError> {
        let (mut parts, _) = Request::new(()).into_parts();
        if let Some(p) = user {
            parts.extensions.insert(AuthenticatedUser(p));
        }
        RequireCapability::<T>::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn missing_user_is_unauthenticated() {
        assert!(matches!(extract::<CanApprove>(None).await, Err(AppError::AuthenticationRequired)));
    }

    #[tokio::test]
    async fn role_without_capability_is_forbidden() {
        let driver = profile(Role::Driver, None);
        assert!(matches!(
            extract::<CanOperateWarehouse>(Some(driver)).await,
            Err(AppError::InsufficientRole(_))
        ));
    }

    #[tokio::test]
    async fn authorized_profile_is_handed_over() {
        let officer = profile(Role::ProcurementOfficer, None);
        let id = officer.id;
        let guard = extract::<CanApprove>(Some(officer)).await.unwrap();
        assert_eq!(guard.profile().id, id);
    }
}
