// src/handlers/batches.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::extract::JsonOrForm,
    db::batch_repo::StatusCount,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{CanCreateBatch, CanCultivate, RequireCapability},
    },
    models::{
        batch::{AllowedTransitions, CropBatch, TransitionResponse},
        status::BatchStatus,
    },
    services::batch_service::{AdvanceInput, CreateBatchInput},
};

pub(crate) fn validate_positive(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.message = Some("O valor deve ser maior que zero.".into());
        return Err(err);
    }
    Ok(())
}

pub(crate) fn transition_response(batch: CropBatch) -> TransitionResponse {
    TransitionResponse {
        message: format!("Lote {} movido para {}.", batch.batch_code, batch.status),
        batch,
    }
}

// ---
// Payload: CreateBatch
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchPayload {
    /// Gerado automaticamente (CB-AAAAMMDD-XXXXXX) quando omitido
    #[validate(length(min = 3, max = 40, message = "Código de lote inválido."))]
    pub batch_code: Option<String>,

    #[validate(length(min = 1, message = "O tipo de cultura é obrigatório."))]
    #[schema(example = "Milho")]
    pub crop_type: String,

    pub variety: Option<String>,

    #[validate(custom(function = "validate_positive"))]
    pub quantity: Decimal,

    #[validate(length(min = 1, message = "A unidade é obrigatória."))]
    #[schema(example = "kg")]
    pub unit: String,

    pub planting_date: NaiveDate,
    pub expected_harvest_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub farm_id: Uuid,
}

#[utoipa::path(
    post,
    path = "/api/batches",
    tag = "Batches",
    request_body = CreateBatchPayload,
    responses(
        (status = 201, description = "Lote criado em PLANTED", body = CropBatch),
        (status = 403, description = "Papel sem permissão ou fazenda de outro agente"),
        (status = 409, description = "Código de lote já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_batch(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanCreateBatch>,
    Json(payload): Json<CreateBatchPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let batch = app_state
        .batch_service
        .create_batch(
            guard.profile(),
            CreateBatchInput {
                batch_code: payload.batch_code,
                crop_type: payload.crop_type.trim().to_string(),
                variety: payload.variety,
                quantity: payload.quantity,
                unit: payload.unit.trim().to_string(),
                planting_date: payload.planting_date,
                expected_harvest_date: payload.expected_harvest_date,
                notes: payload.notes,
                farm_id: payload.farm_id,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(batch)))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BatchListQuery {
    pub status: Option<BatchStatus>,
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/batches",
    tag = "Batches",
    params(BatchListQuery),
    responses(
        (status = 200, description = "Lotes visíveis para o papel do usuário", body = Vec<CropBatch>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_batches(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<BatchListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let batches = app_state.batch_service.list(&user, query.status, query.limit).await?;
    Ok((StatusCode::OK, Json(batches)))
}

#[utoipa::path(
    get,
    path = "/api/batches/summary",
    tag = "Batches",
    responses(
        (status = 200, description = "Quantidade de lotes e volume por status", body = Vec<StatusCount>)
    ),
    security(("api_jwt" = []))
)]
pub async fn batch_summary(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let summary = app_state.batch_service.summary(&user).await?;
    Ok((StatusCode::OK, Json(summary)))
}

#[utoipa::path(
    get,
    path = "/api/batches/{id}",
    tag = "Batches",
    params(("id" = Uuid, Path, description = "ID do Lote")),
    responses(
        (status = 200, description = "Detalhe do lote", body = CropBatch),
        (status = 404, description = "Lote não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_batch(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let batch = app_state.batch_service.get(&user, id).await?;
    Ok((StatusCode::OK, Json(batch)))
}

#[utoipa::path(
    get,
    path = "/api/batches/{id}/transitions",
    tag = "Batches",
    params(("id" = Uuid, Path, description = "ID do Lote")),
    responses(
        (status = 200, description = "Próximos status permitidos", body = AllowedTransitions)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_transitions(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let transitions = app_state.batch_service.allowed_transitions(&user, id).await?;
    Ok((StatusCode::OK, Json(transitions)))
}

// ---
// Payload: AdvanceBatch (agente de campo)
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceBatchPayload {
    #[validate(required(message = "O campo 'status' é obrigatório."))]
    pub status: Option<BatchStatus>,

    #[validate(custom(function = "validate_positive"))]
    pub harvested_quantity: Option<Decimal>,

    pub notes: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/batches/{id}/advance",
    tag = "Batches",
    request_body = AdvanceBatchPayload,
    params(("id" = Uuid, Path, description = "ID do Lote")),
    responses(
        (status = 200, description = "Lote avançado", body = TransitionResponse),
        (status = 409, description = "Transição inválida ou concorrente")
    ),
    security(("api_jwt" = []))
)]
pub async fn advance_batch(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanCultivate>,
    Path(id): Path<Uuid>,
    JsonOrForm(payload): JsonOrForm<AdvanceBatchPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let batch = app_state
        .batch_service
        .advance(
            guard.profile(),
            id,
            AdvanceInput {
                target: payload.status,
                harvested_quantity: payload.harvested_quantity,
                notes: payload.notes,
            },
        )
        .await?;

    Ok((StatusCode::OK, Json(transition_response(batch))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_must_be_positive() {
        assert!(validate_positive(&Decimal::new(1, 2)).is_ok());
        assert!(validate_positive(&Decimal::ZERO).is_err());
        assert!(validate_positive(&Decimal::new(-5, 0)).is_err());
    }

    #[test]
    fn advance_payload_requires_status() {
        let payload: AdvanceBatchPayload = serde_json::from_str(r#"{ "notes": "ok" }"#).unwrap();
        assert!(payload.validate().is_err());

        let payload: AdvanceBatchPayload =
            serde_json::from_str(r#"{ "status": "HARVESTED", "harvestedQuantity": 950 }"#).unwrap();
        assert!(payload.validate().is_ok());
        assert_eq!(payload.status, Some(BatchStatus::Harvested));
    }

    #[test]
    fn create_payload_uses_camel_case() {
        let payload: CreateBatchPayload = serde_json::from_str(
            r#"{
                "cropType": "Soja",
                "quantity": 1200,
                "unit": "kg",
                "plantingDate": "2026-03-01",
                "farmId": "7b0c8f5e-3f3c-4d55-9a57-1f1f0d1f4a11"
            }"#,
        )
        .unwrap();
        assert!(payload.validate().is_ok());
        assert_eq!(payload.batch_code, None);
    }
}
