use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::profile::{Profile, Role},
};

// O repositório de perfis, responsável por todas as interações com a tabela 'profiles'
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Busca um perfil pelo ID do usuário no provedor
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    pub async fn list(&self, role: Option<Role>) -> Result<Vec<Profile>, AppError> {
        let profiles = sqlx::query_as::<_, Profile>(
            "SELECT * FROM profiles WHERE ($1::user_role IS NULL OR role = $1) ORDER BY full_name ASC",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;
        Ok(profiles)
    }

    /// IDs de todos os perfis ATIVOS com o papel informado (alvo de notificações).
    pub async fn active_ids_by_role(&self, role: Role) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM profiles WHERE role = $1 AND is_active = TRUE",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Gerentes ativos de um armazém específico.
    pub async fn active_warehouse_manager_ids(&self, warehouse_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM profiles
            WHERE role = $1 AND warehouse_id = $2 AND is_active = TRUE
            "#,
        )
        .bind(Role::WarehouseManager)
        .bind(warehouse_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn create(
        &self,
        id: Uuid,
        email: &str,
        full_name: &str,
        role: Role,
        warehouse_id: Option<Uuid>,
    ) -> Result<Profile, AppError> {
        sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, email, full_name, role, warehouse_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(full_name)
        .bind(role)
        .bind(warehouse_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, |_| "Já existe um perfil para este usuário ou e-mail.".into()))
    }

    /// Atualização parcial: `None` mantém o valor atual.
    /// `clear_warehouse` remove o vínculo de armazém explicitamente.
    pub async fn update(
        &self,
        id: Uuid,
        role: Option<Role>,
        warehouse_id: Option<Uuid>,
        clear_warehouse: bool,
        is_active: Option<bool>,
    ) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET role = COALESCE($2, role),
                warehouse_id = CASE WHEN $4 THEN NULL ELSE COALESCE($3, warehouse_id) END,
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(role)
        .bind(warehouse_id)
        .bind(clear_warehouse)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }
}
