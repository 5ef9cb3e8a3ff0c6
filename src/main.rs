//src/main.rs

use anyhow::Context;
use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Config};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controla o nível; sem ele, "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    if let Err(e) = run().await {
        tracing::error!("🔥 Falha ao iniciar a aplicação: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let app_state = AppState::new(&config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados.")?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let app = router(app_state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Falha ao abrir o listener TCP em {}", config.bind_addr))?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Erro no servidor Axum")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Falha ao escutar o sinal de desligamento: {:?}", e);
    }
    tracing::info!("Encerrando o servidor...");
}

fn router(app_state: AppState) -> Router {
    let user_routes = Router::new().route("/me", get(handlers::registry::get_me));

    let batch_routes = Router::new()
        .route("/"
               ,post(handlers::batches::create_batch)
               .get(handlers::batches::list_batches)
        )
        .route("/summary", get(handlers::batches::batch_summary))
        .route("/{id}", get(handlers::batches::get_batch))
        .route("/{id}/transitions", get(handlers::batches::get_transitions))
        .route("/{id}/advance", post(handlers::batches::advance_batch));

    let procurement_routes = Router::new()
        .route("/batches/{id}/approve", post(handlers::procurement::approve_batch))
        .route("/batches/{id}/reject", post(handlers::procurement::reject_batch))
        .route("/batches/{id}/decision", post(handlers::procurement::decide_batch));

    let warehouse_routes = Router::new()
        .route("/packaging/update-status", post(handlers::warehouse::update_packaging))
        .route("/scanner/confirm-receipt", post(handlers::warehouse::confirm_receipt))
        .route("/receipt/confirm-by-code", post(handlers::warehouse::confirm_receipt_by_code))
        .route("/storage/update-status", post(handlers::warehouse::update_storage));

    let transport_routes = Router::new()
        .route("/tasks"
               ,post(handlers::transport::schedule_task)
               .get(handlers::transport::list_tasks)
        )
        .route("/tasks/{id}/pickup", post(handlers::transport::confirm_pickup))
        .route("/tasks/{id}/deliver", post(handlers::transport::confirm_delivery))
        .route("/tasks/{id}/status", post(handlers::transport::update_task_status))
        .route("/tasks/{id}/issues"
               ,post(handlers::transport::report_issue)
               .get(handlers::transport::list_issues)
        )
        .route("/issues/{id}/status", post(handlers::transport::update_issue_status))
        .route("/vehicles"
               ,post(handlers::transport::create_vehicle)
               .get(handlers::transport::list_vehicles)
        );

    let notification_routes = Router::new()
        .route("/", get(handlers::notifications::list_notifications))
        .route("/unread-count", get(handlers::notifications::unread_count))
        .route("/read-all", post(handlers::notifications::mark_all_read))
        .route("/{id}/read", post(handlers::notifications::mark_read));

    let admin_routes = Router::new()
        .route("/profiles"
               ,post(handlers::admin::create_profile)
               .get(handlers::admin::list_profiles)
        )
        .route("/profiles/{id}", patch(handlers::admin::update_profile))
        .route("/warehouses"
               ,post(handlers::admin::create_warehouse)
               .get(handlers::admin::list_all_warehouses)
        )
        .route("/warehouses/{id}/deactivate", post(handlers::admin::deactivate_warehouse))
        .route("/units", post(handlers::admin::create_unit));

    // Tudo abaixo exige Bearer token válido + perfil provisionado
    let protected = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/batches", batch_routes)
        .nest("/api/procurement", procurement_routes)
        .nest("/api/warehouse", warehouse_routes)
        .nest("/api/transport", transport_routes)
        .nest("/api/notifications", notification_routes)
        .nest("/api/admin", admin_routes)
        .route("/api/activity", get(handlers::notifications::list_activity))
        .route("/api/warehouses", get(handlers::registry::list_warehouses))
        .route("/api/units", get(handlers::registry::list_units))
        .route("/api/farms"
               ,post(handlers::registry::register_farm)
               .get(handlers::registry::list_farms)
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(protected)
        .with_state(app_state)
}
