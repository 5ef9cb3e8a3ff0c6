// src/services/auth.rs
//
// Os tokens são emitidos pelo provedor de autenticação externo; aqui só
// verificamos a assinatura e carregamos o perfil correspondente.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::{
    common::error::AppError,
    db::ProfileRepository,
    models::{auth::Claims, profile::Profile},
};

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self { key: DecodingKey::from_secret(secret.as_bytes()), validation }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token rejeitado: {e}");
                AppError::InvalidToken
            })
    }
}

#[derive(Clone)]
pub struct AuthService {
    verifier: TokenVerifier,
    profile_repo: ProfileRepository,
}

impl AuthService {
    pub fn new(verifier: TokenVerifier, profile_repo: ProfileRepository) -> Self {
        Self { verifier, profile_repo }
    }

    /// Token válido + perfil existente e ativo.
    pub async fn authenticate(&self, token: &str) -> Result<Profile, AppError> {
        let claims = self.verifier.verify(token)?;

        let profile = self
            .profile_repo
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::ProfileNotProvisioned)?;

        if !profile.is_active {
            tracing::warn!(user_id = %profile.id, "Perfil desativado tentou acessar a API");
            return Err(AppError::ProfileNotProvisioned);
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use uuid::Uuid;

    fn token(secret: &str, claims: serde_json::Value) -> String {
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn exp_in(secs: i64) -> i64 {
        Utc::now().timestamp() + secs
    }

    #[test]
    fn accepts_provider_token() {
        let verifier = TokenVerifier::new("segredo", None);
        let sub = Uuid::new_v4();
        let claims = verifier
            .verify(&token("segredo", json!({ "sub": sub, "exp": exp_in(600), "email": "a@b.com" })))
            .unwrap();
        assert_eq!(claims.sub, sub);
        assert_eq!(claims.email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let verifier = TokenVerifier::new("segredo", None);
        let sub = Uuid::new_v4();

        let forged = token("outro", json!({ "sub": sub, "exp": exp_in(600) }));
        assert!(matches!(verifier.verify(&forged), Err(AppError::InvalidToken)));

        let expired = token("segredo", json!({ "sub": sub, "exp": exp_in(-3600) }));
        assert!(matches!(verifier.verify(&expired), Err(AppError::InvalidToken)));
    }

    #[test]
    fn audience_is_checked_when_configured() {
        let verifier = TokenVerifier::new("segredo", Some("authenticated"));
        let sub = Uuid::new_v4();

        let good = token("segredo", json!({ "sub": sub, "exp": exp_in(600), "aud": "authenticated" }));
        assert!(verifier.verify(&good).is_ok());

        let bad = token("segredo", json!({ "sub": sub, "exp": exp_in(600), "aud": "anon" }));
        assert!(matches!(verifier.verify(&bad), Err(AppError::InvalidToken)));
    }
}
