mod common;

use chrono::Duration;
use common::{at, property, user};
use diesel::prelude::*;
use efinder::booking::{book, is_available, transition, BookingRequest, REFERENCE_LEN};
use efinder::error::AppError;
use efinder::models::{ReservationStatus, ReservationType, Role};
use efinder::schema::reservations;

fn request(property_id: i32, tenant_id: i32) -> BookingRequest {
    BookingRequest {
        property_id,
        tenant_id,
        reservation_type: ReservationType::Daily,
        starts_at: None,
        notes: None,
    }
}

fn count(conn: &mut SqliteConnection) -> i64 {
    reservations::table.count().get_result(conn).unwrap()
}

fn reservation_error(result: Result<impl std::fmt::Debug, AppError>) -> String {
    match result {
        Err(AppError::Validation(errors)) => errors
            .get("reservation")
            .and_then(|messages| messages.first().cloned())
            .expect("error on the reservation field"),
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[test]
fn free_property_accepts_one_day_booking() {
    let pool = common::pool();
    let mut conn = pool.get().unwrap();
    let owner = user(&mut conn, "Olivia Owner", Role::Owner);
    let tenant = user(&mut conn, "Tomas Tenant", Role::Tenant);
    let property_id = property(&mut conn, Some(owner), "Bonuan Loft");
    let now = at(3, 9);

    let reservation = book(&mut conn, &request(property_id, tenant), now).unwrap();

    assert_eq!(count(&mut conn), 1);
    assert_eq!(reservation.status, "pending");
    assert_eq!(reservation.owner_id, owner);
    assert_eq!(reservation.starts_at, now);
    assert_eq!(reservation.ends_at, Some(now + Duration::days(1)));
    assert_eq!(reservation.reference.len(), REFERENCE_LEN);
    assert!(reservation
        .reference
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
}

#[test]
fn past_start_is_moved_up_to_now() {
    let pool = common::pool();
    let mut conn = pool.get().unwrap();
    let owner = user(&mut conn, "Olivia Owner", Role::Owner);
    let tenant = user(&mut conn, "Tomas Tenant", Role::Tenant);
    let property_id = property(&mut conn, Some(owner), "Bonuan Loft");
    let now = at(3, 9);

    let mut monthly = request(property_id, tenant);
    monthly.starts_at = Some(at(1, 9));
    monthly.reservation_type = ReservationType::Monthly;
    let reservation = book(&mut conn, &monthly, now).unwrap();

    assert_eq!(reservation.starts_at, now);
    assert_eq!(reservation.reservation_type, "monthly");
    assert_eq!(reservation.ends_at, Some(now + Duration::days(1)));
}

#[test]
fn covering_reservation_rejects_second_booking() {
    let pool = common::pool();
    let mut conn = pool.get().unwrap();
    let owner = user(&mut conn, "Olivia Owner", Role::Owner);
    let first = user(&mut conn, "Tomas Tenant", Role::Tenant);
    let second = user(&mut conn, "Teresa Tenant", Role::Tenant);
    let property_id = property(&mut conn, Some(owner), "Bonuan Loft");

    book(&mut conn, &request(property_id, first), at(3, 9)).unwrap();
    assert!(!is_available(&mut conn, property_id, at(3, 12)).unwrap());

    let message = reservation_error(book(&mut conn, &request(property_id, second), at(3, 12)));
    assert_eq!(message, "This property is already reserved until Jun 4, 2024 9:00 AM.");
    assert_eq!(count(&mut conn), 1);
}

#[test]
fn future_booking_overlapping_an_existing_window_is_rejected() {
    let pool = common::pool();
    let mut conn = pool.get().unwrap();
    let owner = user(&mut conn, "Olivia Owner", Role::Owner);
    let first = user(&mut conn, "Tomas Tenant", Role::Tenant);
    let second = user(&mut conn, "Teresa Tenant", Role::Tenant);
    let property_id = property(&mut conn, Some(owner), "Bonuan Loft");

    let mut later = request(property_id, first);
    later.starts_at = Some(at(10, 9));
    book(&mut conn, &later, at(3, 9)).unwrap();

    let mut overlapping = request(property_id, second);
    overlapping.starts_at = Some(at(9, 18));
    reservation_error(book(&mut conn, &overlapping, at(3, 10)));

    let mut after = request(property_id, second);
    after.starts_at = Some(at(11, 9));
    book(&mut conn, &after, at(3, 10)).unwrap();
    assert_eq!(count(&mut conn), 2);
}

#[test]
fn cancelled_and_expired_reservations_do_not_hold_the_property() {
    let pool = common::pool();
    let mut conn = pool.get().unwrap();
    let owner = user(&mut conn, "Olivia Owner", Role::Owner);
    let tenant = user(&mut conn, "Tomas Tenant", Role::Tenant);
    let property_id = property(&mut conn, Some(owner), "Bonuan Loft");

    let first = book(&mut conn, &request(property_id, tenant), at(3, 9)).unwrap();
    transition(&mut conn, &first, ReservationStatus::Cancelled, at(3, 10)).unwrap();
    let second = book(&mut conn, &request(property_id, tenant), at(3, 11)).unwrap();

    // The second booking has run its day by the 5th.
    assert!(is_available(&mut conn, property_id, at(5, 9)).unwrap());
    book(&mut conn, &request(property_id, tenant), at(5, 9)).unwrap();
    assert_ne!(first.reference, second.reference);
    assert_eq!(count(&mut conn), 3);
}

#[test]
fn property_without_owner_cannot_be_booked() {
    let pool = common::pool();
    let mut conn = pool.get().unwrap();
    let tenant = user(&mut conn, "Tomas Tenant", Role::Tenant);
    let property_id = property(&mut conn, None, "Orphaned Unit");

    let message = reservation_error(book(&mut conn, &request(property_id, tenant), at(3, 9)));
    assert_eq!(message, "This property has no owner to receive the reservation.");
    assert_eq!(count(&mut conn), 0);
}

#[test]
fn missing_property_is_not_found() {
    let pool = common::pool();
    let mut conn = pool.get().unwrap();
    let tenant = user(&mut conn, "Tomas Tenant", Role::Tenant);
    assert!(matches!(
        book(&mut conn, &request(999, tenant), at(3, 9)),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn illegal_transition_is_a_status_error() {
    let pool = common::pool();
    let mut conn = pool.get().unwrap();
    let owner = user(&mut conn, "Olivia Owner", Role::Owner);
    let tenant = user(&mut conn, "Tomas Tenant", Role::Tenant);
    let property_id = property(&mut conn, Some(owner), "Bonuan Loft");
    let reservation = book(&mut conn, &request(property_id, tenant), at(3, 9)).unwrap();

    let active = transition(&mut conn, &reservation, ReservationStatus::Active, at(3, 10)).unwrap();
    let completed = transition(&mut conn, &active, ReservationStatus::Completed, at(4, 10)).unwrap();
    match transition(&mut conn, &completed, ReservationStatus::Active, at(4, 11)) {
        Err(AppError::Validation(errors)) => assert_eq!(
            errors.get("status"),
            Some(&["A completed reservation cannot become active.".to_string()][..])
        ),
        other => panic!("expected a status error, got {:?}", other),
    }
}

#[tokio::test]
async fn concurrent_submissions_for_one_property_book_once() {
    let dir = tempfile::tempdir().unwrap();
    let url = dir.path().join("booking.db");
    let pool = efinder::db::establish_pool(url.to_str().unwrap(), 4).unwrap();
    let (property_id, tenants) = {
        let mut conn = pool.get().unwrap();
        let owner = user(&mut conn, "Olivia Owner", Role::Owner);
        let tenants: Vec<i32> = (0..4)
            .map(|i| user(&mut conn, &format!("Tenant {}", i), Role::Tenant))
            .collect();
        (property(&mut conn, Some(owner), "Bonuan Loft"), tenants)
    };

    let now = at(3, 9);
    let attempts = tenants.into_iter().map(|tenant| {
        let pool = pool.clone();
        tokio::spawn(async move {
            efinder::db::run(&pool, move |conn| book(conn, &request(property_id, tenant), now)).await
        })
    });
    let mut booked = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        if attempt.await.unwrap().is_ok() {
            booked += 1;
        }
    }

    assert_eq!(booked, 1);
    let mut conn = pool.get().unwrap();
    assert_eq!(count(&mut conn), 1);
}
