// src/handlers/registry.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::batches::validate_positive,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{CanRegisterFarm, RequireCapability},
    },
    models::{
        profile::Profile,
        registry::{Farm, UnitOfMeasure, Warehouse},
    },
};

#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    responses(
        (status = 200, description = "Perfil do usuário autenticado", body = Profile),
        (status = 401, description = "Token ausente ou inválido"),
        (status = 403, description = "Perfil não provisionado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_me(AuthenticatedUser(user): AuthenticatedUser) -> Result<impl IntoResponse, AppError> {
    Ok((StatusCode::OK, Json(user)))
}

#[utoipa::path(
    get,
    path = "/api/warehouses",
    tag = "Registry",
    responses(
        (status = 200, description = "Armazéns ativos", body = Vec<Warehouse>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_warehouses(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let warehouses = app_state.admin_service.list_warehouses(true).await?;
    Ok((StatusCode::OK, Json(warehouses)))
}

#[utoipa::path(
    get,
    path = "/api/units",
    tag = "Registry",
    responses(
        (status = 200, description = "Unidades de medida", body = Vec<UnitOfMeasure>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_units(
    State(app_state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let units = app_state.admin_service.list_units().await?;
    Ok((StatusCode::OK, Json(units)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFarmPayload {
    #[validate(length(min = 1, message = "O nome da fazenda é obrigatório."))]
    pub name: String,
    #[validate(length(min = 1, message = "A localização é obrigatória."))]
    pub location: String,
    #[validate(custom(function = "validate_positive"))]
    pub size_hectares: Option<Decimal>,
    #[validate(length(min = 1, message = "O nome do produtor é obrigatório."))]
    pub farmer_name: String,
    pub farmer_phone: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/farms",
    tag = "Registry",
    request_body = RegisterFarmPayload,
    responses(
        (status = 201, description = "Fazenda cadastrada", body = Farm)
    ),
    security(("api_jwt" = []))
)]
pub async fn register_farm(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanRegisterFarm>,
    Json(payload): Json<RegisterFarmPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let farm = app_state
        .admin_service
        .register_farm(
            guard.profile(),
            &payload.name,
            &payload.location,
            payload.size_hectares,
            &payload.farmer_name,
            payload.farmer_phone.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(farm)))
}

#[utoipa::path(
    get,
    path = "/api/farms",
    tag = "Registry",
    responses(
        (status = 200, description = "Fazendas (agentes veem só as próprias)", body = Vec<Farm>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_farms(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let farms = app_state.admin_service.list_farms(&user).await?;
    Ok((StatusCode::OK, Json(farms)))
}
