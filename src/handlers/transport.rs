// src/handlers/transport.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::{batches::validate_positive, extract::JsonOrForm},
    middleware::{
        auth::AuthenticatedUser,
        rbac::{CanDrive, CanManageTransport, CanReportIssue, CanScheduleTransport, RequireCapability},
    },
    models::{
        batch::CropBatch,
        status::{IssueStatus, TransportStatus},
        transport::{IssueType, TaskResponse, TransportIssue, TransportTask, Vehicle},
    },
    services::transport_service::ScheduleInput,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTaskPayload {
    pub batch_id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    #[validate(length(min = 1, message = "O local de coleta é obrigatório."))]
    pub pickup_location: String,
    #[validate(length(min = 1, message = "O local de entrega é obrigatório."))]
    pub delivery_location: String,
    pub scheduled_pickup_at: DateTime<Utc>,
    pub scheduled_delivery_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/transport/tasks",
    tag = "Transport",
    request_body = ScheduleTaskPayload,
    responses(
        (status = 201, description = "Viagem agendada", body = TransportTask),
        (status = 409, description = "Lote ainda não está embalado")
    ),
    security(("api_jwt" = []))
)]
pub async fn schedule_task(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanScheduleTransport>,
    Json(payload): Json<ScheduleTaskPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let task = app_state
        .transport_service
        .schedule(
            guard.profile(),
            ScheduleInput {
                batch_id: payload.batch_id,
                driver_id: payload.driver_id,
                vehicle_id: payload.vehicle_id,
                pickup_location: payload.pickup_location,
                delivery_location: payload.delivery_location,
                scheduled_pickup_at: payload.scheduled_pickup_at,
                scheduled_delivery_at: payload.scheduled_delivery_at,
                notes: payload.notes,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskListQuery {
    pub status: Option<TransportStatus>,
}

#[utoipa::path(
    get,
    path = "/api/transport/tasks",
    tag = "Transport",
    params(TaskListQuery),
    responses(
        (status = 200, description = "Viagens (motoristas veem só as próprias)", body = Vec<TransportTask>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_tasks(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<TaskListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let tasks = app_state.transport_service.list_tasks(&user, query.status).await?;
    Ok((StatusCode::OK, Json(tasks)))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PickupResponse {
    pub message: String,
    pub task: TransportTask,
    pub batch: CropBatch,
}

#[utoipa::path(
    post,
    path = "/api/transport/tasks/{id}/pickup",
    tag = "Transport",
    params(("id" = Uuid, Path, description = "ID da Viagem")),
    responses(
        (status = 200, description = "Coleta confirmada; lote em SHIPPED", body = PickupResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm_pickup(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanDrive>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (task, batch) = app_state.transport_service.confirm_pickup(guard.profile(), id).await?;

    Ok((
        StatusCode::OK,
        Json(PickupResponse {
            message: format!("Coleta do lote {} confirmada.", batch.batch_code),
            task,
            batch,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/transport/tasks/{id}/deliver",
    tag = "Transport",
    params(("id" = Uuid, Path, description = "ID da Viagem")),
    responses(
        (status = 200, description = "Entrega confirmada", body = TaskResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn confirm_delivery(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanDrive>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let task = app_state.transport_service.confirm_delivery(guard.profile(), id).await?;

    Ok((
        StatusCode::OK,
        Json(TaskResponse { message: "Entrega confirmada.".into(), task }),
    ))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusPayload {
    pub status: TransportStatus,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/transport/tasks/{id}/status",
    tag = "Transport",
    request_body = TaskStatusPayload,
    params(("id" = Uuid, Path, description = "ID da Viagem")),
    responses(
        (status = 200, description = "Status da viagem atualizado", body = TaskResponse)
    ),
    security(("api_jwt" = []))
)]
pub async fn update_task_status(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanManageTransport>,
    Path(id): Path<Uuid>,
    JsonOrForm(payload): JsonOrForm<TaskStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let task = app_state
        .transport_service
        .update_status(guard.profile(), id, payload.status, payload.note.as_deref())
        .await?;

    Ok((
        StatusCode::OK,
        Json(TaskResponse { message: format!("Viagem movida para {}.", task.status), task }),
    ))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportIssuePayload {
    pub issue_type: IssueType,
    #[validate(length(min = 1, max = 2000, message = "Descreva a ocorrência."))]
    pub description: String,
}

#[utoipa::path(
    post,
    path = "/api/transport/tasks/{id}/issues",
    tag = "Transport",
    request_body = ReportIssuePayload,
    params(("id" = Uuid, Path, description = "ID da Viagem")),
    responses(
        (status = 201, description = "Ocorrência registrada", body = TransportIssue)
    ),
    security(("api_jwt" = []))
)]
pub async fn report_issue(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanReportIssue>,
    Path(id): Path<Uuid>,
    JsonOrForm(payload): JsonOrForm<ReportIssuePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let issue = app_state
        .transport_service
        .report_issue(guard.profile(), id, payload.issue_type, &payload.description)
        .await?;

    Ok((StatusCode::CREATED, Json(issue)))
}

#[utoipa::path(
    get,
    path = "/api/transport/tasks/{id}/issues",
    tag = "Transport",
    params(("id" = Uuid, Path, description = "ID da Viagem")),
    responses(
        (status = 200, description = "Ocorrências da viagem", body = Vec<TransportIssue>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_issues(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let issues = app_state.transport_service.list_issues(&user, id).await?;
    Ok((StatusCode::OK, Json(issues)))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueStatusPayload {
    pub status: IssueStatus,
    #[validate(length(max = 2000))]
    pub resolution: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/transport/issues/{id}/status",
    tag = "Transport",
    request_body = IssueStatusPayload,
    params(("id" = Uuid, Path, description = "ID da Ocorrência")),
    responses(
        (status = 200, description = "Ocorrência atualizada", body = TransportIssue)
    ),
    security(("api_jwt" = []))
)]
pub async fn update_issue_status(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanManageTransport>,
    Path(id): Path<Uuid>,
    JsonOrForm(payload): JsonOrForm<IssueStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let issue = app_state
        .transport_service
        .update_issue_status(guard.profile(), id, payload.status, payload.resolution.as_deref())
        .await?;

    Ok((StatusCode::OK, Json(issue)))
}

// ---
// Veículos
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVehiclePayload {
    #[validate(length(min = 1, max = 20, message = "A placa é obrigatória."))]
    #[schema(example = "ABC1D23")]
    pub registration: String,
    #[validate(custom(function = "validate_positive"))]
    pub capacity: Option<Decimal>,
}

#[utoipa::path(
    post,
    path = "/api/transport/vehicles",
    tag = "Transport",
    request_body = CreateVehiclePayload,
    responses(
        (status = 201, description = "Veículo cadastrado", body = Vehicle),
        (status = 409, description = "Placa já cadastrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_vehicle(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanManageTransport>,
    Json(payload): Json<CreateVehiclePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let vehicle = app_state
        .transport_service
        .create_vehicle(guard.profile(), &payload.registration, payload.capacity)
        .await?;

    Ok((StatusCode::CREATED, Json(vehicle)))
}

#[utoipa::path(
    get,
    path = "/api/transport/vehicles",
    tag = "Transport",
    responses(
        (status = 200, description = "Frota", body = Vec<Vehicle>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_vehicles(
    State(app_state): State<AppState>,
    guard: RequireCapability<CanScheduleTransport>,
) -> Result<impl IntoResponse, AppError> {
    let vehicles = app_state.transport_service.list_vehicles(guard.profile()).await?;
    Ok((StatusCode::OK, Json(vehicles)))
}
