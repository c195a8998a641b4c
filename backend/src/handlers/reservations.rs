use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::{non_blank, parse_choice, request_now};
use crate::auth::{AuthUser, Operator, TenantCaller};
use crate::booking::{self, BookingRequest};
use crate::db;
use crate::error::{AppError, FieldErrors};
use crate::models::reservation::find;
use crate::models::{Reservation, ReservationStatus, ReservationType, Role};
use crate::schema::{properties, reservations};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReservationForm {
    pub property_id: i32,
    pub starts_at: Option<NaiveDateTime>,
    pub reservation_type: String,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReservationFilters {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ReservationView {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub property_name: String,
}

/// Whether `viewer` may see `reservation` at all.
fn is_visible_to(reservation: &Reservation, viewer: &AuthUser) -> bool {
    match viewer.role {
        Role::Admin => true,
        Role::Owner => reservation.owner_id == viewer.id,
        Role::Tenant => reservation.tenant_id == viewer.id,
    }
}

fn visible_reservation(
    conn: &mut SqliteConnection,
    viewer: &AuthUser,
    reservation_id: i32,
) -> Result<Reservation, AppError> {
    find(conn, reservation_id)?
        .filter(|reservation| is_visible_to(reservation, viewer))
        .ok_or(AppError::NotFound("Reservation"))
}

pub async fn store(
    State(state): State<AppState>,
    TenantCaller(auth): TenantCaller,
    Json(form): Json<ReservationForm>,
) -> Result<(StatusCode, Json<Reservation>), AppError> {
    let mut errors = FieldErrors::new();
    let reservation_type =
        parse_choice::<ReservationType>(&mut errors, "reservation_type", &form.reservation_type);
    errors.into_result()?;
    let reservation_type = reservation_type.ok_or_else(|| {
        AppError::field("reservation_type", "The selected reservation type is invalid.")
    })?;

    let request = BookingRequest {
        property_id: form.property_id,
        tenant_id: auth.id,
        reservation_type,
        starts_at: form.starts_at,
        notes: non_blank(form.notes),
    };
    let now = request_now();
    let reservation = db::run(&state.pool, move |conn| booking::book(conn, &request, now)).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filters): Query<ReservationFilters>,
) -> Result<Json<Vec<ReservationView>>, AppError> {
    let mut errors = FieldErrors::new();
    let status = filters
        .status
        .as_deref()
        .and_then(|value| parse_choice::<ReservationStatus>(&mut errors, "status", value));
    errors.into_result()?;

    let rows = db::run(&state.pool, move |conn| {
        let mut query = reservations::table
            .inner_join(properties::table)
            .select((Reservation::as_select(), properties::name))
            .order((reservations::created_at.desc(), reservations::id.desc()))
            .into_boxed();
        match auth.role {
            Role::Admin => {}
            Role::Owner => query = query.filter(reservations::owner_id.eq(auth.id)),
            Role::Tenant => query = query.filter(reservations::tenant_id.eq(auth.id)),
        }
        if let Some(status) = status {
            query = query.filter(reservations::status.eq(status.as_str()));
        }
        let rows: Vec<(Reservation, String)> = query.load(conn)?;
        Ok(rows)
    })
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(reservation, property_name)| ReservationView {
                reservation,
                property_name,
            })
            .collect(),
    ))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(reservation_id): Path<i32>,
) -> Result<Json<ReservationView>, AppError> {
    let view = db::run(&state.pool, move |conn| {
        let reservation = visible_reservation(conn, &auth, reservation_id)?;
        let property_name = properties::table
            .find(reservation.property_id)
            .select(properties::name)
            .first(conn)?;
        Ok(ReservationView {
            reservation,
            property_name,
        })
    })
    .await?;
    Ok(Json(view))
}

pub async fn update_status(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Path(reservation_id): Path<i32>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Reservation>, AppError> {
    let mut errors = FieldErrors::new();
    let next = parse_choice::<ReservationStatus>(&mut errors, "status", &change.status);
    errors.into_result()?;
    let next = next.ok_or_else(|| AppError::field("status", "The selected status is invalid."))?;

    let now = request_now();
    let reservation = db::run(&state.pool, move |conn| {
        conn.immediate_transaction(|conn| {
            let reservation = find(conn, reservation_id)?.ok_or(AppError::NotFound("Reservation"))?;
            if !auth.is_admin() && !reservation.is_managed_by(auth.id) {
                return Err(AppError::Forbidden);
            }
            booking::transition(conn, &reservation, next, now)
        })
    })
    .await?;
    Ok(Json(reservation))
}

/// A tenant withdrawing a booking that was never accepted.
pub async fn cancel(
    State(state): State<AppState>,
    TenantCaller(auth): TenantCaller,
    Path(reservation_id): Path<i32>,
) -> Result<Json<Reservation>, AppError> {
    let now = request_now();
    let reservation = db::run(&state.pool, move |conn| {
        conn.immediate_transaction(|conn| {
            let reservation = visible_reservation(conn, &auth, reservation_id)?;
            if reservation.status()? != ReservationStatus::Pending {
                return Err(AppError::field(
                    "status",
                    "Only pending reservations can be cancelled.",
                ));
            }
            booking::transition(conn, &reservation, ReservationStatus::Cancelled, now)
        })
    })
    .await?;
    Ok(Json(reservation))
}
