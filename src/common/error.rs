use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// Todo erro de ação vira um JSON { error, code } na borda HTTP.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Autenticação necessária")]
    AuthenticationRequired,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Perfil não provisionado")]
    ProfileNotProvisioned,

    #[error("Permissão insuficiente: {0}")]
    InsufficientRole(String),

    #[error("{0} não encontrado")]
    ResourceNotFound(&'static str),

    #[error("{0}")]
    OwnershipMismatch(String),

    #[error("Transição de status inválida: {from} -> {to}")]
    IllegalStatusTransition { from: String, to: String },

    // O CAS no banco falhou: alguém alterou o status entre a leitura e a escrita
    #[error("Status alterado concorrentemente: esperado {expected}, atual {actual}")]
    StatusConflict { expected: String, actual: String },

    #[error("Recebimento por código manual desativado")]
    ManualReceiptDisabled,

    #[error("{0}")]
    UniqueConstraintViolation(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Código estável para o frontend (toasts, testes).
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput(_) => "VALIDATION_ERROR",
            AppError::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::ProfileNotProvisioned => "PROFILE_NOT_PROVISIONED",
            AppError::InsufficientRole(_) => "INSUFFICIENT_ROLE",
            AppError::ResourceNotFound(_) => "RESOURCE_NOT_FOUND",
            AppError::OwnershipMismatch(_) => "OWNERSHIP_MISMATCH",
            AppError::IllegalStatusTransition { .. } => "ILLEGAL_STATUS_TRANSITION",
            AppError::StatusConflict { .. } => "STATUS_CONFLICT",
            AppError::ManualReceiptDisabled => "MANUAL_RECEIPT_DISABLED",
            AppError::UniqueConstraintViolation(_) => "UNIQUE_CONSTRAINT_VIOLATION",
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => "PERSISTENCE_FAILURE",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::AuthenticationRequired | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::ProfileNotProvisioned
            | AppError::InsufficientRole(_)
            | AppError::OwnershipMismatch(_)
            | AppError::ManualReceiptDisabled => StatusCode::FORBIDDEN,
            AppError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::IllegalStatusTransition { .. }
            | AppError::StatusConflict { .. }
            | AppError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        let error_message = match &self {
            // Retornar todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "code": code,
                    "details": details,
                }));
                return (status, body).into_response();
            }
            AppError::AuthenticationRequired => "Token de autenticação ausente.".to_string(),
            AppError::InvalidToken => {
                "Token de autenticação inválido ou expirado.".to_string()
            }
            AppError::ProfileNotProvisioned => {
                "Seu usuário ainda não possui um perfil ativo no sistema.".to_string()
            }
            AppError::ManualReceiptDisabled => {
                "O recebimento por código manual está desativado. Use o leitor de código de lote.".to_string()
            }

            // Banco e erros internos: o detalhe vai para o log, o usuário vê uma mensagem genérica.
            e @ (AppError::DatabaseError(_) | AppError::InternalServerError(_)) => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                "Ocorreu um erro inesperado.".to_string()
            }

            other => other.to_string(),
        };

        let body = Json(json!({ "error": error_message, "code": code }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn illegal_transition_is_conflict_with_both_statuses() {
        let (status, body) = body_json(AppError::IllegalStatusTransition {
            from: "PACKAGING".into(),
            to: "STORED".into(),
        })
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ILLEGAL_STATUS_TRANSITION");
        let msg = body["error"].as_str().unwrap();
        assert!(msg.contains("PACKAGING") && msg.contains("STORED"));
    }

    #[tokio::test]
    async fn persistence_failure_hides_details() {
        let (status, body) = body_json(AppError::DatabaseError(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Ocorreu um erro inesperado.");
        assert_eq!(body["code"], "PERSISTENCE_FAILURE");
    }

    #[tokio::test]
    async fn ownership_mismatch_is_forbidden() {
        let (status, body) =
            body_json(AppError::OwnershipMismatch("Lote pertence a outro armazém.".into())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "OWNERSHIP_MISMATCH");
    }

    #[tokio::test]
    async fn rejected_token_is_unauthorized() {
        let (status, body) = body_json(AppError::InvalidToken).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_TOKEN");
        assert_eq!(body["error"], "Token de autenticação inválido ou expirado.");
    }
}
