use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{non_blank, parse_choice, request_now};
use crate::auth::Operator;
use crate::confirmation::{self, TenantFacts, WorklistItem};
use crate::db;
use crate::error::{AppError, FieldErrors};
use crate::models::{Reservation, TenantStatus, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ConfirmForm {
    pub property_name: String,
    pub unit_number: Option<String>,
    pub monthly_rent: i64,
    pub tenant_status: String,
    pub lease_start: NaiveDateTime,
    pub lease_end: NaiveDateTime,
    pub concierge_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Confirmed {
    pub reservation: Reservation,
    pub tenant: User,
}

pub async fn index(
    State(state): State<AppState>,
    Operator(auth): Operator,
) -> Result<Json<Vec<WorklistItem>>, AppError> {
    let now = request_now();
    let items = db::run(&state.pool, move |conn| confirmation::worklist(conn, &auth, now)).await?;
    Ok(Json(items))
}

pub async fn confirm(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Path(reservation_id): Path<i32>,
    Json(form): Json<ConfirmForm>,
) -> Result<Json<Confirmed>, AppError> {
    let mut errors = FieldErrors::new();
    let tenant_status = parse_choice::<TenantStatus>(&mut errors, "tenant_status", &form.tenant_status);
    errors.into_result()?;
    let tenant_status = tenant_status.ok_or_else(|| {
        AppError::field("tenant_status", "The selected tenant status is invalid.")
    })?;

    let facts = TenantFacts {
        property_name: form.property_name,
        unit_number: non_blank(form.unit_number),
        monthly_rent: form.monthly_rent,
        tenant_status,
        lease_start: form.lease_start,
        lease_end: form.lease_end,
        concierge_name: non_blank(form.concierge_name),
    };
    let now = request_now();
    let (reservation, tenant) = db::run(&state.pool, move |conn| {
        confirmation::confirm(conn, &auth, reservation_id, &facts, now)
    })
    .await?;
    Ok(Json(Confirmed {
        reservation,
        tenant,
    }))
}

pub async fn clear(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Path(reservation_id): Path<i32>,
) -> Result<Json<Reservation>, AppError> {
    let now = request_now();
    let reservation = db::run(&state.pool, move |conn| {
        confirmation::clear(conn, &auth, reservation_id, now)
    })
    .await?;
    Ok(Json(reservation))
}
