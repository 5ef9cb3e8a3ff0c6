// src/handlers/admin.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::batches::validate_positive,
    middleware::rbac::{CanAdminister, RequireCapability},
    models::{
        profile::{Profile, Role},
        registry::{UnitOfMeasure, Warehouse},
    },
    services::admin_service::{NewProfileInput, ProfileUpdate},
};

// ---
// Perfis
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfilePayload {
    /// ID do usuário no provedor de autenticação
    pub id: Uuid,
    #[validate(email(message = "E-mail inválido."))]
    pub email: String,
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub full_name: String,
    pub role: Role,
    pub warehouse_id: Option<Uuid>,
}

#[utoipa::path(
    post,
    path = "/api/admin/profiles",
    tag = "Admin",
    request_body = CreateProfilePayload,
    responses(
        (status = 201, description = "Perfil provisionado", body = Profile),
        (status = 409, description = "Perfil ou e-mail já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_profile(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanAdminister>,
    Json(payload): Json<CreateProfilePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let profile = app_state
        .admin_service
        .create_profile(
            guard.profile(),
            NewProfileInput {
                id: payload.id,
                email: payload.email,
                full_name: payload.full_name,
                role: payload.role,
                warehouse_id: payload.warehouse_id,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(profile)))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProfileQuery {
    pub role: Option<Role>,
}

#[utoipa::path(
    get,
    path = "/api/admin/profiles",
    tag = "Admin",
    params(ProfileQuery),
    responses(
        (status = 200, description = "Perfis cadastrados", body = Vec<Profile>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_profiles(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanAdminister>,
    Query(query): Query<ProfileQuery>,
) -> Result<impl IntoResponse, AppError> {
    let profiles = app_state.admin_service.list_profiles(guard.profile(), query.role).await?;
    Ok((StatusCode::OK, Json(profiles)))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfilePayload {
    pub role: Option<Role>,
    pub warehouse_id: Option<Uuid>,
    /// Remove o vínculo com o armazém
    #[serde(default)]
    pub clear_warehouse: bool,
    pub is_active: Option<bool>,
}

#[utoipa::path(
    patch,
    path = "/api/admin/profiles/{id}",
    tag = "Admin",
    request_body = UpdateProfilePayload,
    params(("id" = Uuid, Path, description = "ID do Perfil")),
    responses(
        (status = 200, description = "Perfil atualizado", body = Profile)
    ),
    security(("api_jwt" = []))
)]
pub async fn update_profile(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanAdminister>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<impl IntoResponse, AppError> {
    let profile = app_state
        .admin_service
        .update_profile(
            guard.profile(),
            id,
            ProfileUpdate {
                role: payload.role,
                warehouse_id: payload.warehouse_id,
                clear_warehouse: payload.clear_warehouse,
                is_active: payload.is_active,
            },
        )
        .await?;

    Ok((StatusCode::OK, Json(profile)))
}

// ---
// Armazéns
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWarehousePayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,
    #[validate(length(min = 1, message = "A localização é obrigatória."))]
    pub location: String,
    #[validate(custom(function = "validate_positive"))]
    pub capacity: Option<Decimal>,
    pub manager_id: Option<Uuid>,
}

#[utoipa::path(
    post,
    path = "/api/admin/warehouses",
    tag = "Admin",
    request_body = CreateWarehousePayload,
    responses(
        (status = 201, description = "Armazém criado", body = Warehouse)
    ),
    security(("api_jwt" = []))
)]
pub async fn create_warehouse(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanAdminister>,
    Json(payload): Json<CreateWarehousePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let warehouse = app_state
        .admin_service
        .create_warehouse(guard.profile(), &payload.name, &payload.location, payload.capacity, payload.manager_id)
        .await?;

    Ok((StatusCode::CREATED, Json(warehouse)))
}

#[utoipa::path(
    get,
    path = "/api/admin/warehouses",
    tag = "Admin",
    responses(
        (status = 200, description = "Todos os armazéns, inclusive inativos", body = Vec<Warehouse>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_all_warehouses(
    State(app_state): State<AppState>,
    _guard: RequireCapability<CanAdminister>,
) -> Result<impl IntoResponse, AppError> {
    let warehouses = app_state.admin_service.list_warehouses(false).await?;
    Ok((StatusCode::OK, Json(warehouses)))
}

#[utoipa::path(
    post,
    path = "/api/admin/warehouses/{id}/deactivate",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "ID do Armazém")),
    responses(
        (status = 200, description = "Armazém desativado", body = Warehouse)
    ),
    security(("api_jwt" = []))
)]
pub async fn deactivate_warehouse(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanAdminister>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let warehouse = app_state.admin_service.deactivate_warehouse(guard.profile(), id).await?;
    Ok((StatusCode::OK, Json(warehouse)))
}

// ---
// Unidades de medida
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUnitPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Saca 60kg")]
    pub name: String,
    #[validate(length(min = 1, max = 10, message = "O símbolo deve ter entre 1 e 10 caracteres."))]
    #[schema(example = "sc")]
    pub symbol: String,
}

#[utoipa::path(
    post,
    path = "/api/admin/units",
    tag = "Admin",
    request_body = CreateUnitPayload,
    responses(
        (status = 201, description = "Unidade criada", body = UnitOfMeasure),
        (status = 409, description = "Nome ou símbolo já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_unit(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanAdminister>,
    Json(payload): Json<CreateUnitPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let unit = app_state
        .admin_service
        .create_unit(guard.profile(), &payload.name, &payload.symbol)
        .await?;

    Ok((StatusCode::CREATED, Json(unit)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_payload_validates_email() {
        let payload: CreateProfilePayload = serde_json::from_str(
            r#"{
                "id": "7b0c8f5e-3f3c-4d55-9a57-1f1f0d1f4a11",
                "email": "nao-e-email",
                "fullName": "Ana",
                "role": "warehouse_manager"
            }"#,
        )
        .unwrap();
        assert!(payload.validate().is_err());
        assert_eq!(payload.role, Role::WarehouseManager);
    }

    #[test]
    fn unit_symbol_length_is_bounded() {
        let payload = CreateUnitPayload { name: "Tonelada".into(), symbol: "tonelada-metrica".into() };
        assert!(payload.validate().is_err());
    }
}
