// src/handlers/procurement.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::{batches::transition_response, extract::JsonOrForm},
    middleware::rbac::{CanApprove, RequireCapability},
    models::batch::TransitionResponse,
    services::procurement_service::ApprovalInput,
};

fn validate_percentage(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() || *val > Decimal::ONE_HUNDRED {
        let mut err = ValidationError::new("range");
        err.message = Some("A umidade deve estar entre 0 e 100%.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveBatchPayload {
    #[validate(length(min = 1, max = 20, message = "A classificação de qualidade é obrigatória."))]
    #[schema(example = "A")]
    pub quality_grade: String,

    #[validate(custom(function = "validate_percentage"))]
    #[schema(example = "13.5")]
    pub moisture_content: Option<Decimal>,

    pub quality_notes: Option<String>,

    #[serde(default)]
    pub photo_urls: Vec<String>,

    /// Armazém de destino do lote aprovado
    pub warehouse_id: Uuid,
}

impl From<ApproveBatchPayload> for ApprovalInput {
    fn from(p: ApproveBatchPayload) -> Self {
        ApprovalInput {
            quality_grade: p.quality_grade,
            moisture_content: p.moisture_content,
            quality_notes: p.quality_notes,
            photo_urls: p.photo_urls,
            warehouse_id: p.warehouse_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectBatchPayload {
    #[validate(length(min = 1, message = "Informe o motivo da rejeição."))]
    pub reason: String,
}

#[utoipa::path(
    post,
    path = "/api/procurement/batches/{id}/approve",
    tag = "Procurement",
    request_body = ApproveBatchPayload,
    params(("id" = Uuid, Path, description = "ID do Lote")),
    responses(
        (status = 200, description = "Lote aprovado (PROCESSED)", body = TransitionResponse),
        (status = 404, description = "Lote ou armazém não encontrado"),
        (status = 409, description = "Lote não está aguardando aprovação")
    ),
    security(("api_jwt" = []))
)]
pub async fn approve_batch(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanApprove>,
    Path(id): Path<Uuid>,
    JsonOrForm(payload): JsonOrForm<ApproveBatchPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let batch = app_state
        .procurement_service
        .approve(guard.profile(), id, payload.into())
        .await?;

    Ok((StatusCode::OK, Json(transition_response(batch))))
}

#[utoipa::path(
    post,
    path = "/api/procurement/batches/{id}/reject",
    tag = "Procurement",
    request_body = RejectBatchPayload,
    params(("id" = Uuid, Path, description = "ID do Lote")),
    responses(
        (status = 200, description = "Lote devolvido para READY_FOR_HARVEST", body = TransitionResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn reject_batch(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanApprove>,
    Path(id): Path<Uuid>,
    JsonOrForm(payload): JsonOrForm<RejectBatchPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let batch = app_state
        .procurement_service
        .reject(guard.profile(), id, &payload.reason)
        .await?;

    Ok((StatusCode::OK, Json(transition_response(batch))))
}

// ---
// Formulário único de decisão: { decision: APPROVE | REJECT, ... }
// ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPayload {
    pub decision: Decision,
    pub quality_grade: Option<String>,
    #[validate(custom(function = "validate_percentage"))]
    pub moisture_content: Option<Decimal>,
    pub quality_notes: Option<String>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    pub warehouse_id: Option<Uuid>,
    pub reason: Option<String>,
}

impl DecisionPayload {
    fn into_approval(self) -> Result<ApprovalInput, AppError> {
        let warehouse_id = self
            .warehouse_id
            .ok_or_else(|| AppError::InvalidInput("O campo 'warehouseId' é obrigatório para aprovar.".into()))?;

        Ok(ApprovalInput {
            quality_grade: self.quality_grade.unwrap_or_default(),
            moisture_content: self.moisture_content,
            quality_notes: self.quality_notes,
            photo_urls: self.photo_urls,
            warehouse_id,
        })
    }
}

#[utoipa::path(
    post,
    path = "/api/procurement/batches/{id}/decision",
    tag = "Procurement",
    request_body = DecisionPayload,
    params(("id" = Uuid, Path, description = "ID do Lote")),
    responses(
        (status = 200, description = "Decisão aplicada", body = TransitionResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn decide_batch(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanApprove>,
    Path(id): Path<Uuid>,
    JsonOrForm(payload): JsonOrForm<DecisionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let batch = match payload.decision {
        Decision::Approve => {
            let input = payload.into_approval()?;
            app_state.procurement_service.approve(guard.profile(), id, input).await?
        }
        Decision::Reject => {
            let reason = payload.reason.unwrap_or_default();
            app_state.procurement_service.reject(guard.profile(), id, &reason).await?
        }
    };

    Ok((StatusCode::OK, Json(transition_response(batch))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_decision_needs_a_warehouse() {
        let payload: DecisionPayload =
            serde_json::from_str(r#"{ "decision": "APPROVE", "qualityGrade": "A" }"#).unwrap();
        assert!(matches!(payload.into_approval(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn moisture_outside_range_is_rejected() {
        let payload: ApproveBatchPayload = serde_json::from_str(
            r#"{ "qualityGrade": "B", "moistureContent": 140, "warehouseId": "7b0c8f5e-3f3c-4d55-9a57-1f1f0d1f4a11" }"#,
        )
        .unwrap();
        assert!(payload.validate().is_err());
    }
}
