// src/services/admin_service.rs

use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ProfileRepository, RegistryRepository},
    models::{
        activity::{entity, NewActivityLog},
        profile::{Capability, Profile, Role},
        registry::{Farm, UnitOfMeasure, Warehouse},
    },
    services::side_effects::{EffectDispatcher, SideEffects},
};

#[derive(Debug, Clone)]
pub struct NewProfileInput {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub warehouse_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub role: Option<Role>,
    pub warehouse_id: Option<Uuid>,
    pub clear_warehouse: bool,
    pub is_active: Option<bool>,
}

/// Gerente de armazém sem armazém não consegue operar nada.
pub fn check_profile_assignment(role: Role, warehouse_id: Option<Uuid>) -> Result<(), AppError> {
    if role == Role::WarehouseManager && warehouse_id.is_none() {
        return Err(AppError::InvalidInput("Gerentes de armazém precisam de um armazém atribuído.".into()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct AdminService {
    profile_repo: ProfileRepository,
    registry_repo: RegistryRepository,
    effects: EffectDispatcher,
}

impl AdminService {
    pub fn new(profile_repo: ProfileRepository, registry_repo: RegistryRepository, effects: EffectDispatcher) -> Self {
        Self { profile_repo, registry_repo, effects }
    }

    fn audit(&self, actor: &Profile, action: &str, entity_type: &'static str, entity_id: Uuid, details: serde_json::Value) {
        self.effects
            .dispatch(SideEffects::audit_only(NewActivityLog::new(actor.id, action, entity_type, entity_id, details)));
    }

    async fn require_active_warehouse(&self, warehouse_id: Option<Uuid>) -> Result<(), AppError> {
        if let Some(id) = warehouse_id {
            let warehouse = self
                .registry_repo
                .find_warehouse(id)
                .await?
                .ok_or(AppError::ResourceNotFound("Armazém"))?;
            if !warehouse.is_active {
                return Err(AppError::InvalidInput(format!("O armazém '{}' está desativado.", warehouse.name)));
            }
        }
        Ok(())
    }

    // --- PERFIS ---
    pub async fn create_profile(&self, actor: &Profile, input: NewProfileInput) -> Result<Profile, AppError> {
        actor.require(Capability::AdminManage)?;
        check_profile_assignment(input.role, input.warehouse_id)?;
        self.require_active_warehouse(input.warehouse_id).await?;

        let profile = self
            .profile_repo
            .create(input.id, input.email.trim(), input.full_name.trim(), input.role, input.warehouse_id)
            .await?;

        tracing::info!(profile_id = %profile.id, role = ?profile.role, "👤 Perfil provisionado");
        self.audit(
            actor,
            "PROFILE_CREATED",
            entity::PROFILE,
            profile.id,
            json!({ "email": profile.email, "role": profile.role, "warehouseId": profile.warehouse_id }),
        );
        Ok(profile)
    }

    pub async fn list_profiles(&self, actor: &Profile, role: Option<Role>) -> Result<Vec<Profile>, AppError> {
        actor.require(Capability::AdminManage)?;
        self.profile_repo.list(role).await
    }

    pub async fn update_profile(&self, actor: &Profile, id: Uuid, update: ProfileUpdate) -> Result<Profile, AppError> {
        actor.require(Capability::AdminManage)?;

        let current = self
            .profile_repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::ResourceNotFound("Perfil"))?;

        let role = update.role.unwrap_or(current.role);
        let warehouse = if update.clear_warehouse { None } else { update.warehouse_id.or(current.warehouse_id) };
        check_profile_assignment(role, warehouse)?;
        self.require_active_warehouse(update.warehouse_id).await?;

        let profile = self
            .profile_repo
            .update(id, update.role, update.warehouse_id, update.clear_warehouse, update.is_active)
            .await?
            .ok_or(AppError::ResourceNotFound("Perfil"))?;

        self.audit(
            actor,
            "PROFILE_UPDATED",
            entity::PROFILE,
            profile.id,
            json!({
                "roleFrom": current.role,
                "roleTo": profile.role,
                "warehouseId": profile.warehouse_id,
                "isActive": profile.is_active,
            }),
        );
        Ok(profile)
    }

    // --- ARMAZÉNS ---
    pub async fn create_warehouse(
        &self,
        actor: &Profile,
        name: &str,
        location: &str,
        capacity: Option<Decimal>,
        manager_id: Option<Uuid>,
    ) -> Result<Warehouse, AppError> {
        actor.require(Capability::AdminManage)?;
        let warehouse = self
            .registry_repo
            .create_warehouse(name.trim(), location.trim(), capacity, manager_id)
            .await?;

        self.audit(actor, "WAREHOUSE_CREATED", entity::WAREHOUSE, warehouse.id, json!({ "name": warehouse.name }));
        Ok(warehouse)
    }

    pub async fn list_warehouses(&self, only_active: bool) -> Result<Vec<Warehouse>, AppError> {
        self.registry_repo.list_warehouses(only_active).await
    }

    pub async fn deactivate_warehouse(&self, actor: &Profile, id: Uuid) -> Result<Warehouse, AppError> {
        actor.require(Capability::AdminManage)?;
        let warehouse = self
            .registry_repo
            .deactivate_warehouse(id)
            .await?
            .ok_or(AppError::ResourceNotFound("Armazém"))?;

        self.audit(actor, "WAREHOUSE_DEACTIVATED", entity::WAREHOUSE, warehouse.id, json!({ "name": warehouse.name }));
        Ok(warehouse)
    }

    // --- UNIDADES ---
    pub async fn create_unit(&self, actor: &Profile, name: &str, symbol: &str) -> Result<UnitOfMeasure, AppError> {
        actor.require(Capability::AdminManage)?;
        let unit = self.registry_repo.create_unit(name.trim(), symbol.trim()).await?;
        self.audit(actor, "UNIT_CREATED", entity::UNIT, unit.id, json!({ "name": unit.name, "symbol": unit.symbol }));
        Ok(unit)
    }

    pub async fn list_units(&self) -> Result<Vec<UnitOfMeasure>, AppError> {
        self.registry_repo.list_units().await
    }

    // --- FAZENDAS ---
    pub async fn register_farm(
        &self,
        actor: &Profile,
        name: &str,
        location: &str,
        size_hectares: Option<Decimal>,
        farmer_name: &str,
        farmer_phone: Option<&str>,
    ) -> Result<Farm, AppError> {
        actor.require(Capability::FarmRegister)?;
        let farm = self
            .registry_repo
            .create_farm(name.trim(), location.trim(), size_hectares, farmer_name.trim(), farmer_phone, actor.id)
            .await?;

        self.audit(actor, "FARM_REGISTERED", entity::FARM, farm.id, json!({ "name": farm.name, "farmer": farm.farmer_name }));
        Ok(farm)
    }

    pub async fn list_farms(&self, actor: &Profile) -> Result<Vec<Farm>, AppError> {
        match actor.role {
            Role::FieldAgent => self.registry_repo.list_farms(Some(actor.id)).await,
            _ => {
                actor.require(Capability::FarmRegister)?;
                self.registry_repo.list_farms(None).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warehouse_managers_need_a_warehouse() {
        assert!(matches!(
            check_profile_assignment(Role::WarehouseManager, None),
            Err(AppError::InvalidInput(_))
        ));
        assert!(check_profile_assignment(Role::WarehouseManager, Some(Uuid::new_v4())).is_ok());
        assert!(check_profile_assignment(Role::Driver, None).is_ok());
    }
}
