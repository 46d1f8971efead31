//! Axum REST handlers for the offer admin API.

use crate::models::*;
use crate::service::OfferService;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use offerwall_core::OfferError;
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

/// Shared admin state.
#[derive(Clone)]
pub struct OfferAdminState {
    pub service: Arc<OfferService>,
}

/// `OfferError` rendered as an HTTP error.
pub struct ApiError(pub OfferError);

impl From<OfferError> for ApiError {
    fn from(err: OfferError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            OfferError::SchemaValidation { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "validation_failed"),
            OfferError::DuplicatePriority(_) => (StatusCode::UNPROCESSABLE_ENTITY, "duplicate_priority"),
            OfferError::DuplicateOfferId(_) => (StatusCode::CONFLICT, "duplicate_offer_id"),
            OfferError::Conflict(_) => (StatusCode::CONFLICT, "write_conflict"),
            OfferError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            OfferError::Connection(_) | OfferError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            error!(error = %self.0, "Offer admin request failed");
        }
        let body = ErrorResponse {
            error: code.to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ─── Offers ────────────────────────────────────────────────────────────────

pub async fn list_offers(State(state): State<OfferAdminState>) -> ApiResult<Json<Vec<Offer>>> {
    Ok(Json(state.service.list_offers().await?))
}

pub async fn get_offer(
    State(state): State<OfferAdminState>,
    Path(offer_id): Path<String>,
) -> ApiResult<Json<Offer>> {
    Ok(Json(state.service.get_offer(&offer_id).await?))
}

pub async fn create_offer(
    State(state): State<OfferAdminState>,
    Json(req): Json<CreateOfferRequest>,
) -> ApiResult<(StatusCode, Json<Offer>)> {
    let offer = state.service.create_offer(req).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

pub async fn deactivate_offer(
    State(state): State<OfferAdminState>,
    Path(offer_id): Path<String>,
) -> ApiResult<Json<Offer>> {
    Ok(Json(state.service.deactivate_offer(&offer_id).await?))
}

// ─── Schedule ──────────────────────────────────────────────────────────────

pub async fn update_schedule(
    State(state): State<OfferAdminState>,
    Path(offer_id): Path<String>,
    Json(schedule): Json<Schedule>,
) -> ApiResult<Json<Offer>> {
    Ok(Json(state.service.update_schedule(&offer_id, schedule).await?))
}

pub async fn pause_offer(
    State(state): State<OfferAdminState>,
    Path(offer_id): Path<String>,
) -> ApiResult<Json<Offer>> {
    let offer = state
        .service
        .set_schedule_status(&offer_id, ScheduleStatus::Paused)
        .await?;
    Ok(Json(offer))
}

pub async fn resume_offer(
    State(state): State<OfferAdminState>,
    Path(offer_id): Path<String>,
) -> ApiResult<Json<Offer>> {
    let offer = state
        .service
        .set_schedule_status(&offer_id, ScheduleStatus::Active)
        .await?;
    Ok(Json(offer))
}

pub async fn offer_activity(
    State(state): State<OfferAdminState>,
    Path(offer_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let active = state.service.is_currently_active(&offer_id, Utc::now()).await?;
    Ok(Json(serde_json::json!({ "isCurrentlyActive": active })))
}

// ─── Smart Rules ───────────────────────────────────────────────────────────

pub async fn add_smart_rule(
    State(state): State<OfferAdminState>,
    Path(offer_id): Path<String>,
    Json(req): Json<SmartRuleRequest>,
) -> ApiResult<(StatusCode, Json<Offer>)> {
    let offer = state.service.add_smart_rule(&offer_id, req).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

pub async fn remove_smart_rule(
    State(state): State<OfferAdminState>,
    Path((offer_id, rule_id)): Path<(String, String)>,
) -> ApiResult<Json<Offer>> {
    Ok(Json(state.service.remove_smart_rule(&offer_id, &rule_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    pub country: String,
}

pub async fn resolve_redirect(
    State(state): State<OfferAdminState>,
    Path(offer_id): Path<String>,
    Query(query): Query<RedirectQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let url = state
        .service
        .resolve_redirect(&offer_id, &query.country, Utc::now())
        .await?;
    Ok(Json(serde_json::json!({ "url": url })))
}
