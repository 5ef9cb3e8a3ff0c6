// src/handlers/extract.rs

use axum::{
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::common::error::AppError;

/// Corpo de ação vindo de fetch (JSON) ou de um `<form>` HTML (urlencoded).
/// A escolha é feita pelo `Content-Type`; qualquer outro tipo cai no JSON
/// e é recusado como entrada inválida.
pub struct JsonOrForm<T>(pub T);

fn is_form(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if is_form(content_type) {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;
            return Ok(JsonOrForm(value));
        }

        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::InvalidInput(rejection.body_text()))?;
        Ok(JsonOrForm(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::warehouse::StoragePayload;
    use axum::body::Body;
    use uuid::Uuid;
    use validator::Validate;

    async fn storage_body(content_type: &str, body: String) -> Result<StoragePayload, AppError> {
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/api/warehouse/storage/update-status")
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        JsonOrForm::<StoragePayload>::from_request(req, &()).await.map(|JsonOrForm(p)| p)
    }

    #[tokio::test]
    async fn form_encoded_storage_update_is_accepted() {
        let batch_id = Uuid::new_v4();
        let payload = storage_body(
            "application/x-www-form-urlencoded",
            format!("batchId={batch_id}&storageLocation=A1"),
        )
        .await
        .unwrap();

        assert_eq!(payload.batch_id, batch_id);
        assert_eq!(payload.storage_location, "A1");
        assert!(payload.validate().is_ok());
    }

    #[tokio::test]
    async fn form_with_charset_parameter_is_still_a_form() {
        let batch_id = Uuid::new_v4();
        let payload = storage_body(
            "application/x-www-form-urlencoded; charset=UTF-8",
            format!("batchId={batch_id}&storageLocation=Doca+3"),
        )
        .await
        .unwrap();
        assert_eq!(payload.storage_location, "Doca 3");
    }

    #[tokio::test]
    async fn json_storage_update_is_accepted() {
        let batch_id = Uuid::new_v4();
        let payload = storage_body(
            "application/json",
            format!(r#"{{ "batchId": "{batch_id}", "storageLocation": "B2" }}"#),
        )
        .await
        .unwrap();
        assert_eq!(payload.batch_id, batch_id);
        assert_eq!(payload.storage_location, "B2");
    }

    #[tokio::test]
    async fn unknown_content_type_is_invalid_input() {
        let res = storage_body("text/plain", "storageLocation=A1".into()).await;
        assert!(matches!(res, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn form_missing_field_is_invalid_input() {
        let res = storage_body("application/x-www-form-urlencoded", "storageLocation=A1".into()).await;
        assert!(matches!(res, Err(AppError::InvalidInput(_))));
    }
}
