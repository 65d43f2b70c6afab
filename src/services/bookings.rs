//! Booking lifecycle: creation, status transitions and the notifications
//! they trigger. This is the only place that writes booking status.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use url::Url;

use crate::db::queries::{self, InsertOutcome, UpdateOutcome};
use crate::errors::AppError;
use crate::models::{
    Booking, BookingFilter, BookingPage, BookingPatch, BookingSort, BookingStatus,
    CreateBookingRequest, NewBooking, UpdateBookingRequest,
};
use crate::services::notifications::Notification;
use crate::services::scheduling;
use crate::state::AppState;

pub const DEFAULT_DURATION_MINUTES: i32 = 60;
pub const MIN_DURATION_MINUTES: i64 = 30;
pub const MAX_DURATION_MINUTES: i64 = 240;
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const CLIENT_CANCEL_REASON: &str = "Cancelled by user";

const MAX_TEXT_LEN: usize = 10_000;
const MAX_EMAIL_LEN: usize = 254;

/// Optional fields that ride along with a status change.
#[derive(Debug, Clone, Default)]
pub struct StatusExtras {
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
}

fn not_found() -> AppError {
    AppError::NotFound("Booking not found".to_string())
}

// ── Create ──

pub async fn create_booking(
    state: &AppState,
    request: CreateBookingRequest,
) -> Result<Booking, AppError> {
    let new = validate_create_request(request, queries::utc_now())?;

    let booking = {
        let conn = state.db()?;

        if scheduling::slot_is_taken(&conn, &new.booking_date, &new.preferred_time)? {
            return Err(AppError::SlotConflict);
        }

        // Two requests can both pass the check above; the unique index
        // settles the race.
        match queries::insert_booking(&conn, &new)? {
            InsertOutcome::Inserted(booking) => booking,
            InsertOutcome::SlotTaken => {
                tracing::info!(
                    preferred_time = %new.preferred_time,
                    "slot taken between check and insert"
                );
                return Err(AppError::SlotConflict);
            }
        }
    };

    tracing::info!(
        booking_id = %booking.id,
        service_id = %booking.service_id,
        "booking created"
    );

    dispatch(state, &booking.id, Notification::booking_received(&booking)).await;

    if state.config.operator_email.is_empty() {
        tracing::warn!(booking_id = %booking.id, "OPERATOR_EMAIL not set, skipping operator notification");
    } else {
        let notification = Notification::new_booking(&booking, &state.config.operator_email);
        dispatch(state, &booking.id, notification).await;
    }

    Ok(booking)
}

fn validate_create_request(
    request: CreateBookingRequest,
    now: NaiveDateTime,
) -> Result<NewBooking, AppError> {
    let booking_date = request.booking_date.as_deref().map(str::trim);

    // A past date fails regardless of what else is wrong with the request.
    let parsed_date = booking_date.and_then(parse_booking_date);
    if let Some(date) = parsed_date {
        if date < now {
            return Err(AppError::PastDate);
        }
    }

    let (
        Some(service_id),
        Some(service_name),
        Some(client_name),
        Some(client_email),
        Some(_),
        Some(preferred_time),
    ) = (
        optional(request.service_id),
        optional(request.service_name),
        optional(request.client_name),
        optional(request.client_email),
        booking_date.filter(|s| !s.is_empty()),
        optional(request.preferred_time),
    )
    else {
        return Err(AppError::Validation("Required fields are missing".to_string()));
    };

    let client_email = normalize_email(&client_email)
        .ok_or_else(|| AppError::Validation("Invalid email address".to_string()))?;

    let booking_date =
        parsed_date.ok_or_else(|| AppError::Validation("Invalid booking date".to_string()))?;

    let duration = request.duration.unwrap_or(DEFAULT_DURATION_MINUTES as i64);
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration) {
        return Err(AppError::Validation(format!(
            "Duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes"
        )));
    }

    Ok(NewBooking {
        service_id,
        service_name,
        client_name,
        client_email,
        client_phone: optional(request.client_phone),
        company: optional(request.company),
        booking_date,
        preferred_time,
        timezone: optional(request.timezone).unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        duration: duration as i32,
        message: optional(request.message),
    })
}

fn clean_text(value: String) -> String {
    value.trim().chars().take(MAX_TEXT_LEN).collect()
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(clean_text).filter(|v| !v.is_empty())
}

/// Lowercased, trimmed address of the shape `local@domain.tld`.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return None;
    }

    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.contains('@') {
        return None;
    }
    let (host, tld) = domain.rsplit_once('.')?;
    if host.is_empty() || tld.is_empty() {
        return None;
    }

    Some(email)
}

/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` (read as UTC) or a plain
/// `YYYY-MM-DD` (midnight UTC). Sub-second precision is dropped so that
/// equal slots compare equal in storage.
pub fn parse_booking_date(raw: &str) -> Option<NaiveDateTime> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc).naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    Some(parsed.with_nanosecond(0).unwrap_or(parsed))
}

// ── Status transitions ──

/// Sets any status over any prior status. Confirmation stamps
/// `confirmed_at` and notifies the client; cancellation stamps
/// `cancelled_at` and records the reason (empty when none is given).
pub async fn update_status(
    state: &AppState,
    id: &str,
    new_status: Option<BookingStatus>,
    extras: StatusExtras,
) -> Result<Booking, AppError> {
    let updated = {
        let conn = state.db()?;
        let existing = queries::get_booking_by_id(&conn, id)?.ok_or_else(not_found)?;

        let now = queries::utc_now();
        let mut patch = BookingPatch {
            meeting_link: extras.meeting_link,
            notes: extras.notes,
            ..Default::default()
        };

        if let Some(status) = new_status {
            if existing.status.is_final() && status != existing.status {
                tracing::warn!(
                    booking_id = %id,
                    from = existing.status.as_str(),
                    to = status.as_str(),
                    "booking leaving a final status, flag for review"
                );
            }

            patch.status = Some(status);
            match status {
                BookingStatus::Confirmed => patch.confirmed_at = Some(now),
                BookingStatus::Cancelled => {
                    patch.cancelled_at = Some(now);
                    patch.cancellation_reason =
                        Some(extras.cancellation_reason.unwrap_or_default());
                }
                _ => {}
            }
        }

        match queries::update_booking_fields(&conn, id, &patch)? {
            UpdateOutcome::Updated => {}
            UpdateOutcome::NotModified => return Err(not_found()),
            UpdateOutcome::SlotTaken => return Err(AppError::SlotConflict),
        }

        if let Some(status) = new_status {
            tracing::info!(
                booking_id = %id,
                from = existing.status.as_str(),
                to = status.as_str(),
                "booking status changed"
            );
        }

        queries::get_booking_by_id(&conn, id)?.ok_or_else(not_found)?
    };

    if new_status == Some(BookingStatus::Confirmed) {
        let notification = Notification::booking_confirmed(&updated, updated.meeting_link.as_deref());
        dispatch(state, &updated.id, notification).await;
    }

    Ok(updated)
}

/// Admin update from the HTTP surface: validates the raw status string and
/// meeting link, then applies [`update_status`].
pub async fn update_booking(
    state: &AppState,
    id: &str,
    request: UpdateBookingRequest,
) -> Result<Booking, AppError> {
    let status = match request.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::Validation("Invalid status".to_string()))?,
        ),
        None => None,
    };

    let meeting_link = match request.meeting_link {
        Some(link) if !link.trim().is_empty() => Some(
            validate_meeting_link(link.trim())
                .ok_or_else(|| AppError::Validation("Invalid meeting link".to_string()))?,
        ),
        other => other,
    };

    let extras = StatusExtras {
        meeting_link,
        notes: request.notes.map(clean_text),
        cancellation_reason: request.cancellation_reason.map(clean_text),
    };

    update_status(state, id, status, extras).await
}

/// Client-initiated cancellation.
pub async fn cancel_booking(
    state: &AppState,
    id: &str,
    reason: Option<String>,
) -> Result<Booking, AppError> {
    let reason = optional(reason).unwrap_or_else(|| CLIENT_CANCEL_REASON.to_string());
    let extras = StatusExtras {
        cancellation_reason: Some(reason),
        ..Default::default()
    };
    update_status(state, id, Some(BookingStatus::Cancelled), extras).await
}

/// Only absolute http(s) URLs with a host are accepted. The stored form is
/// the parser's serialization.
fn validate_meeting_link(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(url.to_string())
}

// ── Reads ──

pub fn get_booking(state: &AppState, id: &str) -> Result<Booking, AppError> {
    let conn = state.db()?;
    queries::get_booking_by_id(&conn, id)?.ok_or_else(not_found)
}

pub fn list_bookings(
    state: &AppState,
    filter: &BookingFilter,
    page: u32,
    limit: u32,
    sort: BookingSort,
) -> Result<BookingPage, AppError> {
    let conn = state.db()?;
    Ok(queries::query_bookings(&conn, filter, page, limit, sort)?)
}

async fn dispatch(state: &AppState, booking_id: &str, notification: Notification) {
    if let Err(e) = state.notifier.send(&notification).await {
        tracing::warn!(
            booking_id,
            kind = notification.kind.as_str(),
            error = %e,
            "notification failed, not retried"
        );
    }
}
