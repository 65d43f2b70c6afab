use anyhow::Context;
use chrono::{NaiveDateTime, Timelike, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection};

use crate::models::{
    Booking, BookingFilter, BookingPage, BookingPatch, BookingSort, BookingStatus, NewBooking,
    Pagination,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BOOKING_COLUMNS: &str = "id, service_id, service_name, client_name, client_email, client_phone, \
     company, booking_date, preferred_time, timezone, duration, message, status, meeting_link, notes, \
     cancellation_reason, confirmed_at, cancelled_at, reminder_sent, created_at, updated_at";

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Current UTC time at the precision the store keeps.
pub fn utc_now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid stored timestamp: {s}"))
}

fn is_slot_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[derive(Debug)]
pub enum InsertOutcome {
    Inserted(Booking),
    /// The active-slot unique index rejected the row.
    SlotTaken,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotModified,
    SlotTaken,
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, new: &NewBooking) -> anyhow::Result<InsertOutcome> {
    let now = utc_now();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        service_id: new.service_id.clone(),
        service_name: new.service_name.clone(),
        client_name: new.client_name.clone(),
        client_email: new.client_email.to_lowercase(),
        client_phone: new.client_phone.clone(),
        company: new.company.clone(),
        booking_date: new.booking_date,
        preferred_time: new.preferred_time.clone(),
        timezone: new.timezone.clone(),
        duration: new.duration,
        message: new.message.clone(),
        status: BookingStatus::Pending,
        meeting_link: None,
        notes: None,
        cancellation_reason: None,
        confirmed_at: None,
        cancelled_at: None,
        reminder_sent: false,
        created_at: now,
        updated_at: now,
    };

    let result = conn.execute(
        &format!(
            "INSERT INTO service_bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
        ),
        params![
            booking.id,
            booking.service_id,
            booking.service_name,
            booking.client_name,
            booking.client_email,
            booking.client_phone,
            booking.company,
            format_ts(&booking.booking_date),
            booking.preferred_time,
            booking.timezone,
            booking.duration,
            booking.message,
            booking.status.as_str(),
            booking.meeting_link,
            booking.notes,
            booking.cancellation_reason,
            booking.confirmed_at.as_ref().map(format_ts),
            booking.cancelled_at.as_ref().map(format_ts),
            booking.reminder_sent as i32,
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    );

    match result {
        Ok(_) => Ok(InsertOutcome::Inserted(booking)),
        Err(e) if is_slot_violation(&e) => Ok(InsertOutcome::SlotTaken),
        Err(e) => Err(anyhow::Error::new(e).context("failed to insert booking")),
    }
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM service_bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// First active booking holding exactly this (date, time label) slot.
pub fn find_conflicting_booking(
    conn: &Connection,
    booking_date: &NaiveDateTime,
    preferred_time: &str,
) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM service_bookings
             WHERE booking_date = ?1 AND preferred_time = ?2 AND status IN ('pending', 'confirmed')
             LIMIT 1"
        ),
        params![format_ts(booking_date), preferred_time],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Applies the fields set in `patch` and refreshes `updated_at`.
pub fn update_booking_fields(
    conn: &Connection,
    id: &str,
    patch: &BookingPatch,
) -> anyhow::Result<UpdateOutcome> {
    let mut sets: Vec<&'static str> = vec![];
    let mut values: Vec<Box<dyn ToSql>> = vec![];

    if let Some(status) = patch.status {
        sets.push("status");
        values.push(Box::new(status.as_str()));
    }
    if let Some(link) = &patch.meeting_link {
        sets.push("meeting_link");
        values.push(Box::new(link.clone()));
    }
    if let Some(notes) = &patch.notes {
        sets.push("notes");
        values.push(Box::new(notes.clone()));
    }
    if let Some(reason) = &patch.cancellation_reason {
        sets.push("cancellation_reason");
        values.push(Box::new(reason.clone()));
    }
    if let Some(ts) = &patch.confirmed_at {
        sets.push("confirmed_at");
        values.push(Box::new(format_ts(ts)));
    }
    if let Some(ts) = &patch.cancelled_at {
        sets.push("cancelled_at");
        values.push(Box::new(format_ts(ts)));
    }
    sets.push("updated_at");
    values.push(Box::new(format_ts(&utc_now())));

    let assignments: Vec<String> = sets
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{col} = ?{}", i + 1))
        .collect();
    let sql = format!(
        "UPDATE service_bookings SET {} WHERE id = ?{}",
        assignments.join(", "),
        values.len() + 1
    );
    values.push(Box::new(id.to_string()));

    let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
    match conn.execute(&sql, params_refs.as_slice()) {
        Ok(0) => Ok(UpdateOutcome::NotModified),
        Ok(_) => Ok(UpdateOutcome::Updated),
        Err(e) if is_slot_violation(&e) => Ok(UpdateOutcome::SlotTaken),
        Err(e) => Err(anyhow::Error::new(e).context("failed to update booking")),
    }
}

/// One page of bookings matching `filter`, with the total match count.
/// `page` is clamped to at least 1 and `limit` to `1..=MAX_PAGE_LIMIT`.
pub fn query_bookings(
    conn: &Connection,
    filter: &BookingFilter,
    page: u32,
    limit: u32,
    sort: BookingSort,
) -> anyhow::Result<BookingPage> {
    let page = page.max(1);
    let limit = limit.clamp(1, MAX_PAGE_LIMIT);

    let mut clauses: Vec<String> = vec![];
    let mut values: Vec<Box<dyn ToSql>> = vec![];

    if let Some(email) = &filter.client_email {
        values.push(Box::new(email.trim().to_lowercase()));
        clauses.push(format!("LOWER(client_email) = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str()));
        clauses.push(format!("status = ?{}", values.len()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let total: i64 = {
        let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
        conn.query_row(
            &format!("SELECT COUNT(*) FROM service_bookings {where_sql}"),
            params_refs.as_slice(),
            |row| row.get(0),
        )
        .context("failed to count bookings")?
    };

    let offset = (page as i64 - 1) * limit as i64;
    values.push(Box::new(limit as i64));
    let limit_idx = values.len();
    values.push(Box::new(offset));
    let offset_idx = values.len();

    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM service_bookings {where_sql} ORDER BY {} LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
        sort.order_by()
    );
    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }

    Ok(BookingPage {
        bookings,
        pagination: Pagination::new(page, limit, total.max(0) as u64),
    })
}

pub fn ping(conn: &Connection) -> anyhow::Result<()> {
    let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
    anyhow::ensure!(one == 1, "unexpected ping result: {one}");
    Ok(())
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let booking_date_str: String = row.get(7)?;
    let status_str: String = row.get(12)?;
    let confirmed_at_str: Option<String> = row.get(16)?;
    let cancelled_at_str: Option<String> = row.get(17)?;
    let reminder_sent: i32 = row.get(18)?;
    let created_at_str: String = row.get(19)?;
    let updated_at_str: String = row.get(20)?;

    let status = BookingStatus::parse(&status_str)
        .with_context(|| format!("unknown stored status: {status_str}"))?;

    Ok(Booking {
        id: row.get(0)?,
        service_id: row.get(1)?,
        service_name: row.get(2)?,
        client_name: row.get(3)?,
        client_email: row.get(4)?,
        client_phone: row.get(5)?,
        company: row.get(6)?,
        booking_date: parse_ts(&booking_date_str)?,
        preferred_time: row.get(8)?,
        timezone: row.get(9)?,
        duration: row.get(10)?,
        message: row.get(11)?,
        status,
        meeting_link: row.get(13)?,
        notes: row.get(14)?,
        cancellation_reason: row.get(15)?,
        confirmed_at: confirmed_at_str.as_deref().map(parse_ts).transpose()?,
        cancelled_at: cancelled_at_str.as_deref().map(parse_ts).transpose()?,
        reminder_sent: reminder_sent != 0,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}
