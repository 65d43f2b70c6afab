use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A client's request to meet for a service at a given date and time slot.
/// All timestamps are UTC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub service_id: String,
    pub service_name: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub company: Option<String>,
    pub booking_date: NaiveDateTime,
    pub preferred_time: String,
    pub timezone: String,
    pub duration: i32,
    pub message: Option<String>,
    pub status: BookingStatus,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub confirmed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub reminder_sent: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
}

impl BookingStatus {
    /// Statuses that hold their slot against new bookings.
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Confirmed];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rescheduled => "rescheduled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "rescheduled" => Some(BookingStatus::Rescheduled),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// Leaving one of these states is allowed but logged for review.
    pub fn is_final(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

/// Validated input for a new booking. The store assigns id, status and
/// timestamps.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub service_id: String,
    pub service_name: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub company: Option<String>,
    pub booking_date: NaiveDateTime,
    pub preferred_time: String,
    pub timezone: String,
    pub duration: i32,
    pub message: Option<String>,
}

/// Body of `POST /bookings`. Every field is optional at this level so that a
/// missing value becomes a validation error instead of a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub service_id: Option<String>,
    pub service_name: Option<String>,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub company: Option<String>,
    pub booking_date: Option<String>,
    pub preferred_time: Option<String>,
    pub timezone: Option<String>,
    pub duration: Option<i64>,
    pub message: Option<String>,
}

/// Body of `PUT /bookings/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingRequest {
    pub status: Option<String>,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
}

/// Partial update applied by the store. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub meeting_link: Option<String>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub confirmed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub client_email: Option<String>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BookingSort {
    #[default]
    BookingDateAsc,
    BookingDateDesc,
    CreatedAtAsc,
    CreatedAtDesc,
}

impl BookingSort {
    /// Accepts `bookingDate`, `createdAt`, optionally prefixed with `-` for
    /// descending order.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bookingDate" => Some(BookingSort::BookingDateAsc),
            "-bookingDate" => Some(BookingSort::BookingDateDesc),
            "createdAt" => Some(BookingSort::CreatedAtAsc),
            "-createdAt" => Some(BookingSort::CreatedAtDesc),
            _ => None,
        }
    }

    pub fn order_by(&self) -> &'static str {
        match self {
            BookingSort::BookingDateAsc => "booking_date ASC, created_at ASC",
            BookingSort::BookingDateDesc => "booking_date DESC, created_at DESC",
            BookingSort::CreatedAtAsc => "created_at ASC, id ASC",
            BookingSort::CreatedAtDesc => "created_at DESC, id DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as u64)
        };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingPage {
    pub bookings: Vec<Booking>,
    pub pagination: Pagination,
}
