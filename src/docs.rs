// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::db;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Users ---
        handlers::registry::get_me,

        // --- Batches ---
        handlers::batches::create_batch,
        handlers::batches::list_batches,
        handlers::batches::batch_summary,
        handlers::batches::get_batch,
        handlers::batches::get_transitions,
        handlers::batches::advance_batch,

        // --- Procurement ---
        handlers::procurement::approve_batch,
        handlers::procurement::reject_batch,
        handlers::procurement::decide_batch,

        // --- Warehouse ---
        handlers::warehouse::update_packaging,
        handlers::warehouse::confirm_receipt,
        handlers::warehouse::confirm_receipt_by_code,
        handlers::warehouse::update_storage,

        // --- Transport ---
        handlers::transport::schedule_task,
        handlers::transport::list_tasks,
        handlers::transport::confirm_pickup,
        handlers::transport::confirm_delivery,
        handlers::transport::update_task_status,
        handlers::transport::report_issue,
        handlers::transport::list_issues,
        handlers::transport::update_issue_status,
        handlers::transport::create_vehicle,
        handlers::transport::list_vehicles,

        // --- Notifications / Activity ---
        handlers::notifications::list_notifications,
        handlers::notifications::unread_count,
        handlers::notifications::mark_read,
        handlers::notifications::mark_all_read,
        handlers::notifications::list_activity,

        // --- Admin ---
        handlers::admin::create_profile,
        handlers::admin::list_profiles,
        handlers::admin::update_profile,
        handlers::admin::create_warehouse,
        handlers::admin::list_all_warehouses,
        handlers::admin::deactivate_warehouse,
        handlers::admin::create_unit,

        // --- Registry ---
        handlers::registry::list_warehouses,
        handlers::registry::list_units,
        handlers::registry::register_farm,
        handlers::registry::list_farms,
    ),
    components(
        schemas(
            // --- Status ---
            models::status::BatchStatus,
            models::status::TransportStatus,
            models::status::IssueStatus,

            // --- Lotes ---
            models::batch::CropBatch,
            models::batch::TransitionResponse,
            models::batch::AllowedTransitions,
            db::batch_repo::StatusCount,
            handlers::batches::CreateBatchPayload,
            handlers::batches::AdvanceBatchPayload,

            // --- Compras ---
            handlers::procurement::ApproveBatchPayload,
            handlers::procurement::RejectBatchPayload,
            handlers::procurement::Decision,
            handlers::procurement::DecisionPayload,

            // --- Armazém ---
            handlers::warehouse::PackagingPayload,
            handlers::warehouse::ReceiptPayload,
            handlers::warehouse::StoragePayload,

            // --- Transporte ---
            models::transport::IssueType,
            models::transport::Vehicle,
            models::transport::TransportTask,
            models::transport::TransportIssue,
            models::transport::TaskResponse,
            handlers::transport::ScheduleTaskPayload,
            handlers::transport::PickupResponse,
            handlers::transport::TaskStatusPayload,
            handlers::transport::ReportIssuePayload,
            handlers::transport::IssueStatusPayload,
            handlers::transport::CreateVehiclePayload,

            // --- Notificações ---
            models::notification::NotificationCategory,
            models::notification::NotificationKind,
            models::notification::NotificationPriority,
            models::notification::Notification,
            models::notification::UnreadCount,
            models::activity::ActivityLog,
            handlers::notifications::MarkAllReadResponse,

            // --- Perfis e cadastros ---
            models::profile::Role,
            models::profile::Profile,
            models::registry::Warehouse,
            models::registry::UnitOfMeasure,
            models::registry::Farm,
            handlers::admin::CreateProfilePayload,
            handlers::admin::UpdateProfilePayload,
            handlers::admin::CreateWarehousePayload,
            handlers::admin::CreateUnitPayload,
            handlers::registry::RegisterFarmPayload,
        )
    ),
    tags(
        (name = "Users", description = "Dados do Usuário e Perfil"),
        (name = "Batches", description = "Ciclo de vida dos lotes (agente de campo)"),
        (name = "Procurement", description = "Aprovação e rejeição de lotes"),
        (name = "Warehouse", description = "Embalagem, recebimento e armazenagem"),
        (name = "Transport", description = "Viagens, ocorrências e frota"),
        (name = "Notifications", description = "Caixa de notificações do usuário"),
        (name = "Activity", description = "Trilha de auditoria"),
        (name = "Admin", description = "Perfis, armazéns e unidades"),
        (name = "Registry", description = "Cadastros de apoio")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_transition_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/warehouse/storage/update-status"));
        assert!(paths.contains_key("/api/procurement/batches/{id}/approve"));
        assert!(paths.contains_key("/api/transport/tasks/{id}/pickup"));
        assert!(doc.components.unwrap().security_schemes.contains_key("api_jwt"));
    }
}
