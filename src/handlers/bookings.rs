use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{check_auth, client_key};
use crate::db::queries::DEFAULT_PAGE_LIMIT;
use crate::errors::AppError;
use crate::models::{
    BookingFilter, BookingSort, BookingStatus, CreateBookingRequest, UpdateBookingRequest,
};
use crate::services::bookings;
use crate::state::AppState;

fn bad_body(rejection: JsonRejection) -> AppError {
    tracing::debug!(error = %rejection, "rejected request body");
    AppError::Validation("Invalid request body".to_string())
}

// POST /bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let key = client_key(&headers);
    if !state.rate_limiter.check(&key) {
        tracing::warn!(client = %key, "booking creation rate limited");
        return Err(AppError::RateLimited);
    }

    let Json(request) = payload.map_err(bad_body)?;
    let booking = bookings::create_booking(&state, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "booking": booking })),
    ))
}

// GET /bookings
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub email: Option<String>,
    pub status: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => Some(
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::Validation("Invalid status".to_string()))?,
        ),
        None => None,
    };
    let sort = match query.sort.as_deref().filter(|s| !s.is_empty()) {
        Some(s) => BookingSort::parse(s)
            .ok_or_else(|| AppError::Validation("Invalid sort".to_string()))?,
        None => BookingSort::default(),
    };

    let filter = BookingFilter {
        client_email: query.email.filter(|e| !e.trim().is_empty()),
        status,
    };
    let page = query.page.and_then(|p| p.parse().ok()).unwrap_or(1);
    let limit = query
        .limit
        .and_then(|l| l.parse().ok())
        .unwrap_or(DEFAULT_PAGE_LIMIT);

    let result = bookings::list_bookings(&state, &filter, page, limit, sort)?;

    Ok(Json(json!({
        "success": true,
        "bookings": result.bookings,
        "pagination": result.pagination,
    })))
}

// GET /bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let booking = bookings::get_booking(&state, &id)?;
    Ok(Json(json!({ "success": true, "booking": booking })))
}

// PUT /bookings/:id (admin)
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<UpdateBookingRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let Json(request) = payload.map_err(bad_body)?;
    let booking = bookings::update_booking(&state, &id, request).await?;

    Ok(Json(json!({ "success": true, "booking": booking })))
}

// DELETE /bookings/:id
#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    // The body is optional; anything unreadable counts as no reason given.
    let request: CancelRequest = serde_json::from_slice(&body).unwrap_or_default();

    bookings::cancel_booking(&state, &id, request.reason).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Booking cancelled successfully",
    })))
}
