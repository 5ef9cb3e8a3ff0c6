// src/db/registry_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::registry::{Farm, UnitOfMeasure, Warehouse},
};

// Cadastros de apoio: armazéns, unidades de medida e fazendas.
#[derive(Clone)]
pub struct RegistryRepository {
    pool: PgPool,
}

impl RegistryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Armazéns
    // ---

    pub async fn create_warehouse(
        &self,
        name: &str,
        location: &str,
        capacity: Option<Decimal>,
        manager_id: Option<Uuid>,
    ) -> Result<Warehouse, AppError> {
        sqlx::query_as::<_, Warehouse>(
            r#"
            INSERT INTO warehouses (name, location, capacity, manager_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(location)
        .bind(capacity)
        .bind(manager_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, |_| format!("Já existe um armazém chamado '{name}'.")))
    }

    pub async fn find_warehouse(&self, id: Uuid) -> Result<Option<Warehouse>, AppError> {
        let warehouse = sqlx::query_as::<_, Warehouse>("SELECT * FROM warehouses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(warehouse)
    }

    pub async fn list_warehouses(&self, only_active: bool) -> Result<Vec<Warehouse>, AppError> {
        let warehouses = sqlx::query_as::<_, Warehouse>(
            "SELECT * FROM warehouses WHERE (NOT $1 OR is_active = TRUE) ORDER BY name ASC",
        )
        .bind(only_active)
        .fetch_all(&self.pool)
        .await?;
        Ok(warehouses)
    }

    pub async fn deactivate_warehouse(&self, id: Uuid) -> Result<Option<Warehouse>, AppError> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "UPDATE warehouses SET is_active = FALSE, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(warehouse)
    }

    // ---
    // Unidades de medida
    // ---

    /// Cria uma nova unidade (kg, sc, t).
    pub async fn create_unit(&self, name: &str, symbol: &str) -> Result<UnitOfMeasure, AppError> {
        sqlx::query_as::<_, UnitOfMeasure>(
            r#"
            INSERT INTO units_of_measure (name, symbol)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(symbol)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, |constraint| {
                if constraint.contains("symbol") {
                    format!("O símbolo '{symbol}' já está em uso.")
                } else {
                    format!("A unidade '{name}' já existe.")
                }
            })
        })
    }

    pub async fn list_units(&self) -> Result<Vec<UnitOfMeasure>, AppError> {
        let units = sqlx::query_as::<_, UnitOfMeasure>("SELECT * FROM units_of_measure ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(units)
    }

    // ---
    // Fazendas
    // ---

    pub async fn create_farm(
        &self,
        name: &str,
        location: &str,
        size_hectares: Option<Decimal>,
        farmer_name: &str,
        farmer_phone: Option<&str>,
        field_agent_id: Uuid,
    ) -> Result<Farm, AppError> {
        let farm = sqlx::query_as::<_, Farm>(
            r#"
            INSERT INTO farms (name, location, size_hectares, farmer_name, farmer_phone, field_agent_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(location)
        .bind(size_hectares)
        .bind(farmer_name)
        .bind(farmer_phone)
        .bind(field_agent_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(farm)
    }

    pub async fn find_farm<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Farm>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let farm = sqlx::query_as::<_, Farm>("SELECT * FROM farms WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(farm)
    }

    pub async fn list_farms(&self, field_agent_id: Option<Uuid>) -> Result<Vec<Farm>, AppError> {
        let farms = sqlx::query_as::<_, Farm>(
            "SELECT * FROM farms WHERE ($1::uuid IS NULL OR field_agent_id = $1) ORDER BY name ASC",
        )
        .bind(field_agent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(farms)
    }
}
