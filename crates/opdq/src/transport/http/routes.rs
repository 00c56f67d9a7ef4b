//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::service::{ServiceError, TokenRequest, TokenService};
use crate::slot::SlotId;
use crate::staff::DoctorId;
use crate::token::{PaymentStatus, Token, TokenId, TokenSource};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
struct HealthCheckResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "READY",
        version: VERSION,
    })
}

fn error_response(err: ServiceError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err {
        ServiceError::SlotNotFound(_)
        | ServiceError::TokenNotFound(_)
        | ServiceError::DoctorNotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        ServiceError::InvalidState(_) => StatusCode::CONFLICT,
        ServiceError::Contention(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Dependency(_) => StatusCode::BAD_GATEWAY,
    };
    let retryable = matches!(status, StatusCode::SERVICE_UNAVAILABLE);
    (
        status,
        Json(serde_json::json!({
            "error": err.to_string(),
            "retryable": retryable,
        })),
    )
}

fn bad_request(msg: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": msg })),
    )
}

fn token_response(token: &Token) -> serde_json::Value {
    serde_json::json!({
        "id": token.id,
        "patient_id": token.patient_id,
        "doctor_id": token.doctor_id,
        "slot_id": token.slot_id,
        "source": token.source,
        "payment_status": token.payment_status,
        "priority_score": token.priority_score,
        "status": token.status,
        "seat_number": token.seat_number,
        "created_at": token.created_at,
    })
}

#[derive(Debug, Deserialize)]
struct RequestTokenBody {
    name: String,
    phone: Option<String>,
    dob: Option<NaiveDate>,
    doctor_id: DoctorId,
    slot_id: SlotId,
    source: TokenSource,
    payment_status: PaymentStatus,
    #[serde(default)]
    is_emergency: bool,
    requested_by: Option<String>,
}

async fn request_token(
    State(service): State<Arc<TokenService>>,
    Json(body): Json<RequestTokenBody>,
) -> impl IntoResponse {
    if body.name.trim().is_empty() {
        return bad_request("name is required");
    }

    let request = TokenRequest {
        name: body.name,
        phone: body.phone,
        dob: body.dob,
        doctor_id: body.doctor_id,
        slot_id: body.slot_id,
        source: body.source,
        payment_status: body.payment_status,
        is_emergency: body.is_emergency,
        requested_by: body.requested_by.unwrap_or_else(|| "system".to_string()),
    };

    match service.request_token(request).await {
        Ok(ticket) => (
            StatusCode::CREATED,
            Json(token_response(&ticket.token)),
        ),
        Err(err) => error_response(err),
    }
}

async fn get_token(
    State(service): State<Arc<TokenService>>,
    Path(token_id): Path<String>,
) -> impl IntoResponse {
    let Ok(token_id) = TokenId::parse(&token_id) else {
        return bad_request("invalid token id");
    };
    match service.token(token_id) {
        Ok(token) => (StatusCode::OK, Json(token_response(&token))),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ActorBody {
    actor_id: Option<String>,
}

async fn cancel_token(
    State(service): State<Arc<TokenService>>,
    Path(token_id): Path<String>,
    body: Option<Json<ActorBody>>,
) -> impl IntoResponse {
    let Ok(token_id) = TokenId::parse(&token_id) else {
        return bad_request("invalid token id");
    };
    let actor = body.and_then(|Json(b)| b.actor_id);
    match service.cancel_token(token_id, actor.as_deref()).await {
        Ok(token) => (StatusCode::OK, Json(token_response(&token))),
        Err(err) => error_response(err),
    }
}

async fn mark_no_show(
    State(service): State<Arc<TokenService>>,
    Path(token_id): Path<String>,
    body: Option<Json<ActorBody>>,
) -> impl IntoResponse {
    let Ok(token_id) = TokenId::parse(&token_id) else {
        return bad_request("invalid token id");
    };
    let actor = body.and_then(|Json(b)| b.actor_id);
    match service.mark_no_show(token_id, actor.as_deref()).await {
        Ok(token) => (StatusCode::OK, Json(token_response(&token))),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct CreateSlotBody {
    doctor_id: DoctorId,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    hard_capacity: u32,
}

async fn create_slot(
    State(service): State<Arc<TokenService>>,
    Json(body): Json<CreateSlotBody>,
) -> impl IntoResponse {
    match service.create_slot(body.doctor_id, body.starts_at, body.ends_at, body.hard_capacity) {
        Ok(slot) => (StatusCode::CREATED, Json(serde_json::json!(slot))),
        Err(err) => error_response(err),
    }
}

async fn get_slot(
    State(service): State<Arc<TokenService>>,
    Path(slot_id): Path<String>,
) -> impl IntoResponse {
    let Ok(slot_id) = SlotId::parse(&slot_id) else {
        return bad_request("invalid slot id");
    };
    let slot = match service.slot(slot_id) {
        Ok(slot) => slot,
        Err(err) => return error_response(err),
    };
    let tokens = match service.slot_tokens(slot_id) {
        Ok(tokens) => tokens,
        Err(err) => return error_response(err),
    };
    let confirmed = service.confirmed_count(slot_id).unwrap_or(0);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "slot": slot,
            "confirmed_count": confirmed,
            "tokens": tokens.iter().map(token_response).collect::<Vec<_>>(),
        })),
    )
}

/// Fill any open seats in a slot from its waitlist.
async fn promote_slot(
    State(service): State<Arc<TokenService>>,
    Path(slot_id): Path<String>,
) -> impl IntoResponse {
    let Ok(slot_id) = SlotId::parse(&slot_id) else {
        return bad_request("invalid slot id");
    };
    match service.fill_vacancies(slot_id).await {
        Ok(promoted) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "promoted": promoted.iter().map(token_response).collect::<Vec<_>>(),
            })),
        ),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct CreateDoctorBody {
    name: String,
    specialization: Option<String>,
}

async fn create_doctor(
    State(service): State<Arc<TokenService>>,
    Json(body): Json<CreateDoctorBody>,
) -> impl IntoResponse {
    if body.name.trim().is_empty() {
        return bad_request("doctor name is required");
    }
    let doctor = service.create_doctor(body.name, body.specialization);
    (StatusCode::CREATED, Json(serde_json::json!(doctor)))
}

#[derive(Debug, Deserialize)]
struct CreateEmployeeBody {
    name: String,
    department: Option<String>,
    designation: Option<String>,
}

async fn create_employee(
    State(service): State<Arc<TokenService>>,
    Json(body): Json<CreateEmployeeBody>,
) -> impl IntoResponse {
    if body.name.trim().is_empty() {
        return bad_request("employee name is required");
    }
    let employee = service.create_employee(body.name, body.department, body.designation);
    (StatusCode::CREATED, Json(serde_json::json!(employee)))
}

async fn shutdown(State(service): State<Arc<TokenService>>) -> impl IntoResponse {
    tracing::info!("Shutdown requested via HTTP");
    service.trigger_shutdown();
    (StatusCode::OK, Json(serde_json::json!({})))
}

pub fn routes(service: Arc<TokenService>) -> Router {
    Router::new()
        .route("/health-check", get(health_check))
        .route("/shutdown", post(shutdown))
        .route("/tokens", post(request_token))
        .route("/tokens/{id}", get(get_token))
        .route("/tokens/{id}/cancel", post(cancel_token))
        .route("/tokens/{id}/no-show", post(mark_no_show))
        .route("/slots", post(create_slot))
        .route("/slots/{id}", get(get_slot))
        .route("/slots/{id}/promote", post(promote_slot))
        .route("/admin/doctors", post(create_doctor))
        .route("/admin/employees", post(create_employee))
        .with_state(service)
}
