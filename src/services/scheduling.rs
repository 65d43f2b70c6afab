use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::queries;

/// Whether an active (pending or confirmed) booking already holds the slot.
///
/// Slots are compared textually: two requests name the same slot when their
/// booking dates are equal and their time labels are byte-identical. This
/// check only produces the friendly error; the active-slot unique index is
/// what actually prevents double booking under concurrent requests.
pub fn slot_is_taken(
    conn: &Connection,
    booking_date: &NaiveDateTime,
    preferred_time: &str,
) -> anyhow::Result<bool> {
    anyhow::ensure!(!preferred_time.is_empty(), "preferred time must not be empty");

    let existing = queries::find_conflicting_booking(conn, booking_date, preferred_time)?;
    if let Some(booking) = &existing {
        tracing::debug!(
            booking_id = %booking.id,
            preferred_time,
            "slot already held"
        );
    }
    Ok(existing.is_some())
}
