// src/models/auth.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Estrutura de dados ("claims") dentro do JWT emitido pelo provedor de autenticação
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Subject (ID do usuário no provedor)
    pub exp: usize, // Expiration time (quando o token expira)
    #[serde(default)]
    pub iat: Option<usize>, // Issued At
    #[serde(default)]
    pub email: Option<String>,
}
