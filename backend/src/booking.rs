//! Reservation booking.
//!
//! A property is held by any pending or active reservation. A new booking is
//! refused while a holding reservation covers the current instant or overlaps
//! the requested window. The check and the insert share one immediate
//! transaction, which takes SQLite's write lock up front, so two concurrent
//! submissions for the same property serialise and the second one sees the
//! first one's row.

use chrono::{Duration, NaiveDateTime};
use diesel::prelude::*;
use rand::Rng;

use crate::error::AppError;
use crate::models::property::find_live;
use crate::models::{NewReservation, Reservation, ReservationStatus, ReservationType};
use crate::schema::reservations;

pub const REFERENCE_LEN: usize = 10;
const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TIMESTAMP_FORMAT: &str = "%b %-d, %Y %-I:%M %p";

/// Every booking spans exactly this long, whatever its type.
pub fn booking_length() -> Duration {
    Duration::days(1)
}

/// The half-open window `[starts_at, ends_at)` a booking will occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
}

impl BookingWindow {
    /// Start never lies in the past: earlier requests are moved up to `now`.
    pub fn starting(requested: Option<NaiveDateTime>, now: NaiveDateTime) -> Self {
        let starts_at = requested.map_or(now, |start| start.max(now));
        Self {
            starts_at,
            ends_at: starts_at + booking_length(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub property_id: i32,
    pub tenant_id: i32,
    pub reservation_type: ReservationType,
    pub starts_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
}

/// Ten uppercase letters or digits.
pub fn generate_reference<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..REFERENCE_LEN)
        .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect()
}

pub fn conflict_message(existing_end: Option<NaiveDateTime>) -> String {
    match existing_end {
        Some(end) => format!(
            "This property is already reserved until {}.",
            end.format(TIMESTAMP_FORMAT)
        ),
        None => "This property is already reserved.".to_string(),
    }
}

/// Most recent holding reservation that covers `now`.
pub fn covering_reservation(
    conn: &mut SqliteConnection,
    property_id: i32,
    now: NaiveDateTime,
) -> QueryResult<Option<Reservation>> {
    reservations::table
        .filter(reservations::property_id.eq(property_id))
        .filter(reservations::status.eq_any(ReservationStatus::holding_strs()))
        .filter(reservations::starts_at.le(now))
        .filter(
            reservations::ends_at
                .is_null()
                .or(reservations::ends_at.gt(now)),
        )
        .order((reservations::starts_at.desc(), reservations::id.desc()))
        .select(Reservation::as_select())
        .first(conn)
        .optional()
}

/// Most recent holding reservation that overlaps `window`.
pub fn overlapping_reservation(
    conn: &mut SqliteConnection,
    property_id: i32,
    window: BookingWindow,
) -> QueryResult<Option<Reservation>> {
    reservations::table
        .filter(reservations::property_id.eq(property_id))
        .filter(reservations::status.eq_any(ReservationStatus::holding_strs()))
        .filter(reservations::starts_at.lt(window.ends_at))
        .filter(
            reservations::ends_at
                .is_null()
                .or(reservations::ends_at.gt(window.starts_at)),
        )
        .order((reservations::starts_at.desc(), reservations::id.desc()))
        .select(Reservation::as_select())
        .first(conn)
        .optional()
}

/// Whether nothing holds the property right now.
pub fn is_available(
    conn: &mut SqliteConnection,
    property_id: i32,
    now: NaiveDateTime,
) -> QueryResult<bool> {
    Ok(covering_reservation(conn, property_id, now)?.is_none())
}

/// Checks the booking rules and records a pending reservation.
pub fn book(
    conn: &mut SqliteConnection,
    request: &BookingRequest,
    now: NaiveDateTime,
) -> Result<Reservation, AppError> {
    conn.immediate_transaction(|conn| {
        let property = find_live(conn, request.property_id)?.ok_or(AppError::NotFound("Property"))?;
        let owner_id = property.owner_id.ok_or_else(|| {
            AppError::field(
                "reservation",
                "This property has no owner to receive the reservation.",
            )
        })?;

        let window = BookingWindow::starting(request.starts_at, now);
        let existing = match covering_reservation(conn, property.id, now)? {
            Some(existing) => Some(existing),
            None => overlapping_reservation(conn, property.id, window)?,
        };
        if let Some(existing) = existing {
            log::info!(
                "Rejected booking of property {} by tenant {}: held by reservation {}",
                property.id,
                request.tenant_id,
                existing.reference
            );
            return Err(AppError::field(
                "reservation",
                conflict_message(existing.ends_at),
            ));
        }

        let reference = unused_reference(conn)?;
        let reservation = diesel::insert_into(reservations::table)
            .values(&NewReservation {
                property_id: property.id,
                tenant_id: request.tenant_id,
                owner_id,
                status: ReservationStatus::Pending.as_str(),
                reservation_type: request.reservation_type.as_str(),
                reference: &reference,
                starts_at: window.starts_at,
                ends_at: Some(window.ends_at),
                notes: request.notes.as_deref(),
                created_at: now,
                updated_at: now,
            })
            .returning(Reservation::as_returning())
            .get_result(conn)?;

        log::info!(
            "Booked property {} for tenant {} as {}",
            property.id,
            request.tenant_id,
            reservation.reference
        );
        Ok(reservation)
    })
}

fn unused_reference(conn: &mut SqliteConnection) -> Result<String, AppError> {
    let mut rng = rand::thread_rng();
    for _ in 0..8 {
        let candidate = generate_reference(&mut rng);
        let taken: i64 = reservations::table
            .filter(reservations::reference.eq(&candidate))
            .count()
            .get_result(conn)?;
        if taken == 0 {
            return Ok(candidate);
        }
    }
    Err(AppError::Internal(
        "could not generate a unique reservation reference".to_string(),
    ))
}

/// Moves a reservation along its lifecycle.
pub fn transition(
    conn: &mut SqliteConnection,
    reservation: &Reservation,
    next: ReservationStatus,
    now: NaiveDateTime,
) -> Result<Reservation, AppError> {
    let current = reservation.status()?;
    if !current.can_become(next) {
        return Err(AppError::field(
            "status",
            format!("A {} reservation cannot become {}.", current, next),
        ));
    }
    let updated = diesel::update(reservations::table.find(reservation.id))
        .set((
            reservations::status.eq(next.as_str()),
            reservations::updated_at.eq(now),
        ))
        .returning(Reservation::as_returning())
        .get_result(conn)?;
    log::info!(
        "Reservation {} moved from {} to {}",
        updated.reference,
        current,
        next
    );
    Ok(updated)
}
