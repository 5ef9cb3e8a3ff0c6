// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        ActivityRepository, BatchRepository, NotificationRepository, ProfileRepository, RegistryRepository,
        TransportRepository,
    },
    services::{
        admin_service::AdminService,
        auth::{AuthService, TokenVerifier},
        batch_service::BatchService,
        notification_service::NotificationService,
        procurement_service::ProcurementService,
        side_effects::{EffectDispatcher, PgEffectSink},
        transport_service::TransportService,
        warehouse_service::WarehouseService,
    },
};

/// Configuração lida do ambiente (ou do .env).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("{key} inválida: '{raw}'")),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_audience: lookup("JWT_AUDIENCE").filter(|a| !a.trim().is_empty()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            db_acquire_timeout: Duration::from_secs(parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 3)?),
        })
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub auth_service: AuthService,
    pub batch_service: BatchService,
    pub procurement_service: ProcurementService,
    pub warehouse_service: WarehouseService,
    pub transport_service: TransportService,
    pub notification_service: NotificationService,
    pub admin_service: AdminService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout)
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::build(db_pool, config))
    }

    // --- Monta o gráfico de dependências ---
    fn build(db_pool: PgPool, config: &Config) -> Self {
        let batch_repo = BatchRepository::new(db_pool.clone());
        let transport_repo = TransportRepository::new(db_pool.clone());
        let profile_repo = ProfileRepository::new(db_pool.clone());
        let registry_repo = RegistryRepository::new(db_pool.clone());
        let notification_repo = NotificationRepository::new(db_pool.clone());
        let activity_repo = ActivityRepository::new(db_pool.clone());

        let effects = EffectDispatcher::new(Arc::new(PgEffectSink::new(
            activity_repo.clone(),
            notification_repo.clone(),
            profile_repo.clone(),
        )));

        let verifier = TokenVerifier::new(&config.jwt_secret, config.jwt_audience.as_deref());
        let auth_service = AuthService::new(verifier, profile_repo.clone());

        let batch_service = BatchService::new(db_pool.clone(), batch_repo, registry_repo.clone(), effects.clone());
        let procurement_service = ProcurementService::new(batch_service.clone(), registry_repo.clone());
        let warehouse_service = WarehouseService::new(batch_service.clone(), transport_repo.clone());
        let transport_service =
            TransportService::new(db_pool.clone(), transport_repo, profile_repo.clone(), batch_service.clone());
        let notification_service = NotificationService::new(notification_repo, activity_repo);
        let admin_service = AdminService::new(profile_repo, registry_repo, effects);

        Self {
            db_pool,
            auth_service,
            batch_service,
            procurement_service,
            warehouse_service,
            transport_service,
            notification_service,
            admin_service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_keys_are_missing() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("JWT_SECRET", "s")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.db_acquire_timeout, Duration::from_secs(3));
        assert_eq!(config.jwt_audience, None);
    }

    #[test]
    fn required_keys_and_bad_numbers_fail() {
        assert!(Config::from_lookup(lookup(&[("JWT_SECRET", "s")])).is_err());
        assert!(Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("DB_MAX_CONNECTIONS", "muitas"),
        ]))
        .is_err());
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("JWT_AUDIENCE", "authenticated"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("DB_MAX_CONNECTIONS", "20"),
        ]))
        .unwrap();
        assert_eq!(config.jwt_audience.as_deref(), Some("authenticated"));
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.db_max_connections, 20);
    }
}
