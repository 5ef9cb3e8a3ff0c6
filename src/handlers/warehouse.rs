// src/handlers/warehouse.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::{batches::transition_response, extract::JsonOrForm},
    middleware::rbac::{CanOperateWarehouse, RequireCapability},
    models::{batch::TransitionResponse, status::BatchStatus, transport::IssueType},
    services::warehouse_service::{manual_receipt_disabled, BatchRef, ReceiptInput},
};

fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackagingPayload {
    pub batch_id: Uuid,
    /// READY_FOR_PACKAGING, PACKAGING ou PACKAGED
    pub status: BatchStatus,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/warehouse/packaging/update-status",
    tag = "Warehouse",
    request_body = PackagingPayload,
    responses(
        (status = 200, description = "Status de embalagem atualizado", body = TransitionResponse),
        (status = 403, description = "Lote de outro armazém"),
        (status = 409, description = "Transição inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_packaging(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanOperateWarehouse>,
    JsonOrForm(payload): JsonOrForm<PackagingPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let batch = app_state
        .warehouse_service
        .update_packaging(guard.profile(), payload.batch_id, payload.status, payload.notes.as_deref())
        .await?;

    Ok((StatusCode::OK, Json(transition_response(batch))))
}

// ---
// Recebimento pelo leitor: aceita o id (QR) ou o código impresso na etiqueta
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayload {
    pub batch_id: Option<Uuid>,
    pub batch_code: Option<String>,

    #[validate(custom(function = "validate_not_negative"))]
    pub received_quantity: Option<Decimal>,

    pub quality_notes: Option<String>,
    pub issue_type: Option<IssueType>,
}

impl ReceiptPayload {
    fn batch_ref(&self) -> Result<BatchRef, AppError> {
        match (self.batch_id, self.batch_code.as_deref().map(str::trim)) {
            (Some(id), _) => Ok(BatchRef::Id(id)),
            (None, Some(code)) if !code.is_empty() => Ok(BatchRef::Code(code.to_string())),
            _ => Err(AppError::InvalidInput("Informe 'batchId' ou 'batchCode'.".into())),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/warehouse/scanner/confirm-receipt",
    tag = "Warehouse",
    request_body = ReceiptPayload,
    responses(
        (status = 200, description = "Lote recebido (RECEIVED)", body = TransitionResponse),
        (status = 403, description = "Lote de outro armazém")
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm_receipt(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanOperateWarehouse>,
    JsonOrForm(payload): JsonOrForm<ReceiptPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let batch_ref = payload.batch_ref()?;

    let batch = app_state
        .warehouse_service
        .confirm_receipt(
            guard.profile(),
            batch_ref,
            ReceiptInput {
                received_quantity: payload.received_quantity,
                quality_notes: payload.quality_notes,
                issue_type: payload.issue_type,
            },
        )
        .await?;

    Ok((StatusCode::OK, Json(transition_response(batch))))
}

// Sem extrator de corpo: qualquer conteúdo (ou nenhum) recebe a mesma recusa
#[utoipa::path(
    post,
    path = "/api/warehouse/receipt/confirm-by-code",
    tag = "Warehouse",
    responses(
        (status = 403, description = "Recebimento manual desativado; use o leitor")
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm_receipt_by_code(
    guard: RequireCapability<CanOperateWarehouse>,
) -> Result<Json<TransitionResponse>, AppError> {
    Err(manual_receipt_disabled(guard.profile()))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoragePayload {
    pub batch_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "O local de armazenagem é obrigatório."))]
    #[schema(example = "A1")]
    pub storage_location: String,
}

#[utoipa::path(
    post,
    path = "/api/warehouse/storage/update-status",
    tag = "Warehouse",
    request_body = StoragePayload,
    responses(
        (status = 200, description = "Lote armazenado (STORED)", body = TransitionResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn update_storage(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanOperateWarehouse>,
    JsonOrForm(payload): JsonOrForm<StoragePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let batch = app_state
        .warehouse_service
        .update_storage(guard.profile(), payload.batch_id, &payload.storage_location)
        .await?;

    Ok((StatusCode::OK, Json(transition_response(batch))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        middleware::auth::AuthenticatedUser,
        models::profile::{fixtures::profile, Role},
    };
    use axum::{extract::FromRequestParts, http::Request};

    #[tokio::test]
    async fn manual_receipt_is_refused_without_reading_a_body() {
        // Corpo vazio e sem Content-Type: a recusa vem do serviço, não do axum
        let (mut parts, _) = Request::builder()
            .method("POST")
            .uri("/api/warehouse/receipt/confirm-by-code")
            .body(())
            .unwrap()
            .into_parts();
        parts
            .extensions
            .insert(AuthenticatedUser(profile(Role::WarehouseManager, Some(Uuid::new_v4()))));

        let guard = RequireCapability::<CanOperateWarehouse>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        let res = confirm_receipt_by_code(guard).await;
        assert!(matches!(res, Err(AppError::ManualReceiptDisabled)));
    }

    #[test]
    fn receipt_accepts_id_or_code() {
        let by_code: ReceiptPayload = serde_json::from_str(r#"{ "batchCode": " CB-20261019-ABC123 " }"#).unwrap();
        assert!(matches!(by_code.batch_ref(), Ok(BatchRef::Code(ref c)) if c == "CB-20261019-ABC123"));

        let empty: ReceiptPayload = serde_json::from_str(r#"{ "batchCode": "  " }"#).unwrap();
        assert!(matches!(empty.batch_ref(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn negative_received_quantity_fails_validation() {
        let payload: ReceiptPayload =
            serde_json::from_str(r#"{ "batchCode": "X", "receivedQuantity": -3, "issueType": "DAMAGE" }"#).unwrap();
        assert!(payload.validate().is_err());
        assert_eq!(payload.issue_type, Some(IssueType::Damage));
    }
}
