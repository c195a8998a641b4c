//! Operator worklist for copying reservation facts onto tenant profiles.

use chrono::{Duration, NaiveDateTime};
use diesel::prelude::*;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::error::{AppError, FieldErrors};
use crate::models::{Reservation, ReservationStatus, Role, TenantStatus, User};
use crate::schema::{properties, reservations, users};

/// How long a confirmation keeps a reservation off the worklist.
pub fn confirmation_ttl() -> Duration {
    Duration::hours(1)
}

pub fn needs_confirmation(confirmed_at: Option<NaiveDateTime>, now: NaiveDateTime) -> bool {
    match confirmed_at {
        None => true,
        Some(at) => at < now - confirmation_ttl(),
    }
}

/// Facts an operator settles for the tenant behind a reservation.
#[derive(Debug, Clone)]
pub struct TenantFacts {
    pub property_name: String,
    pub unit_number: Option<String>,
    pub monthly_rent: i64,
    pub tenant_status: TenantStatus,
    pub lease_start: NaiveDateTime,
    pub lease_end: NaiveDateTime,
    pub concierge_name: Option<String>,
}

impl TenantFacts {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        if self.property_name.trim().is_empty() {
            errors.add("property_name", "The property name field is required.");
        }
        if self.monthly_rent < 0 {
            errors.add("monthly_rent", "The monthly rent must be at least 0.");
        }
        if self.lease_end < self.lease_start {
            errors.add(
                "lease_end",
                "The lease end must be a date after or equal to lease start.",
            );
        }
        errors.into_result()
    }
}

#[derive(Debug, Serialize)]
pub struct WorklistItem {
    pub reservation: Reservation,
    pub tenant_name: String,
    pub property_name: String,
    pub suggested_rent: i64,
    pub suggested_lease_start: NaiveDateTime,
    pub suggested_lease_end: Option<NaiveDateTime>,
}

/// Holding reservations whose tenant facts are unconfirmed or stale,
/// limited to the caller's properties unless the caller is an admin.
pub fn worklist(
    conn: &mut SqliteConnection,
    viewer: &AuthUser,
    now: NaiveDateTime,
) -> Result<Vec<WorklistItem>, AppError> {
    let stale_before = now - confirmation_ttl();
    let mut query = reservations::table
        .inner_join(properties::table)
        .inner_join(users::table.on(users::id.eq(reservations::tenant_id)))
        .filter(reservations::status.eq_any(ReservationStatus::holding_strs()))
        .filter(
            reservations::tenant_confirmed_at
                .is_null()
                .or(reservations::tenant_confirmed_at.lt(stale_before)),
        )
        .select((
            Reservation::as_select(),
            users::name,
            properties::name,
            properties::monthly_rent,
        ))
        .order((reservations::starts_at.asc(), reservations::id.asc()))
        .into_boxed();
    if viewer.role != Role::Admin {
        query = query.filter(reservations::owner_id.eq(viewer.id));
    }

    let rows: Vec<(Reservation, String, String, i64)> = query.load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(reservation, tenant_name, property_name, rent)| WorklistItem {
            suggested_lease_start: reservation.starts_at,
            suggested_lease_end: reservation.ends_at,
            reservation,
            tenant_name,
            property_name,
            suggested_rent: rent,
        })
        .collect())
}

fn managed_reservation(
    conn: &mut SqliteConnection,
    viewer: &AuthUser,
    reservation_id: i32,
) -> Result<Reservation, AppError> {
    let reservation = crate::models::reservation::find(conn, reservation_id)?
        .ok_or(AppError::NotFound("Reservation"))?;
    if viewer.role != Role::Admin && !reservation.is_managed_by(viewer.id) {
        return Err(AppError::Forbidden);
    }
    Ok(reservation)
}

/// Writes `facts` onto the tenant and stamps the reservation confirmed.
pub fn confirm(
    conn: &mut SqliteConnection,
    viewer: &AuthUser,
    reservation_id: i32,
    facts: &TenantFacts,
    now: NaiveDateTime,
) -> Result<(Reservation, User), AppError> {
    facts.validate()?;
    conn.immediate_transaction(|conn| {
        let reservation = managed_reservation(conn, viewer, reservation_id)?;
        if !reservation.status()?.holds_property() {
            return Err(AppError::field(
                "reservation",
                "Only pending or active reservations can be confirmed.",
            ));
        }

        diesel::update(users::table.find(reservation.tenant_id))
            .set((
                users::property_name.eq(facts.property_name.trim()),
                users::unit_number.eq(facts.unit_number.as_deref()),
                users::monthly_rent.eq(facts.monthly_rent),
                users::tenant_status.eq(facts.tenant_status.as_str()),
                users::lease_start.eq(facts.lease_start),
                users::lease_end.eq(facts.lease_end),
                users::concierge_name.eq(facts.concierge_name.as_deref()),
                users::updated_at.eq(now),
            ))
            .execute(conn)?;

        let reservation = diesel::update(reservations::table.find(reservation.id))
            .set((
                reservations::tenant_confirmed_at.eq(Some(now)),
                reservations::updated_at.eq(now),
            ))
            .returning(Reservation::as_returning())
            .get_result(conn)?;

        let tenant = crate::models::user::find_user(conn, reservation.tenant_id)?
            .ok_or(AppError::NotFound("Tenant"))?;
        log::info!(
            "Confirmed tenant {} for reservation {}",
            tenant.id,
            reservation.reference
        );
        Ok((reservation, User::try_from(tenant)?))
    })
}

/// Puts a reservation straight back on the worklist.
pub fn clear(
    conn: &mut SqliteConnection,
    viewer: &AuthUser,
    reservation_id: i32,
    now: NaiveDateTime,
) -> Result<Reservation, AppError> {
    let reservation = managed_reservation(conn, viewer, reservation_id)?;
    let reservation = diesel::update(reservations::table.find(reservation.id))
        .set((
            reservations::tenant_confirmed_at.eq(None::<NaiveDateTime>),
            reservations::updated_at.eq(now),
        ))
        .returning(Reservation::as_returning())
        .get_result(conn)?;
    log::info!("Cleared confirmation of reservation {}", reservation.reference);
    Ok(reservation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn unconfirmed_reservations_need_confirmation() {
        assert!(needs_confirmation(None, at(9, 0)));
    }

    #[test]
    fn confirmation_holds_for_one_hour() {
        assert!(!needs_confirmation(Some(at(9, 0)), at(9, 0)));
        assert!(!needs_confirmation(Some(at(9, 0)), at(10, 0)));
        assert!(needs_confirmation(Some(at(9, 0)), at(10, 1)));
    }

    #[test]
    fn lease_must_not_end_before_it_starts() {
        let facts = TenantFacts {
            property_name: "  ".into(),
            unit_number: None,
            monthly_rent: -5,
            tenant_status: TenantStatus::Active,
            lease_start: at(10, 0),
            lease_end: at(9, 0),
            concierge_name: None,
        };
        match facts.validate() {
            Err(AppError::Validation(errors)) => {
                assert!(errors.get("property_name").is_some());
                assert!(errors.get("monthly_rent").is_some());
                assert!(errors.get("lease_end").is_some());
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
