use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::{parse_choice, request_now};
use crate::auth::{AuthUser, Operator, TenantCaller};
use crate::db;
use crate::error::{AppError, FieldErrors};
use crate::models::property::find_live;
use crate::models::{NewTicket, Role, Ticket, TicketCategory, TicketPriority, TicketStatus};
use crate::schema::{properties, tickets};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct TicketForm {
    #[validate(length(min = 1, max = 255, message = "The subject field is required."))]
    pub subject: String,
    #[validate(length(min = 1, message = "The description field is required."))]
    pub description: String,
    pub category: String,
    pub priority: String,
    pub property_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct TicketChange {
    pub status: String,
    pub priority: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketFilters {
    pub status: Option<String>,
}

fn find_ticket(conn: &mut SqliteConnection, ticket_id: i32) -> Result<Ticket, AppError> {
    tickets::table
        .find(ticket_id)
        .select(Ticket::as_select())
        .first(conn)
        .optional()?
        .ok_or(AppError::NotFound("Ticket"))
}

/// Whether the viewer may see (and, for operators, work on) a ticket.
fn can_see(conn: &mut SqliteConnection, ticket: &Ticket, viewer: &AuthUser) -> QueryResult<bool> {
    Ok(match viewer.role {
        Role::Admin => true,
        Role::Tenant => ticket.tenant_id == viewer.id,
        Role::Owner => match ticket.property_id {
            Some(property_id) => find_live(conn, property_id)?
                .is_some_and(|property| property.is_owned_by(viewer.id)),
            None => false,
        },
    })
}

fn visible_ticket(
    conn: &mut SqliteConnection,
    viewer: &AuthUser,
    ticket_id: i32,
) -> Result<Ticket, AppError> {
    let ticket = find_ticket(conn, ticket_id)?;
    if can_see(conn, &ticket, viewer)? {
        Ok(ticket)
    } else {
        Err(AppError::NotFound("Ticket"))
    }
}

/// Select options for the ticket form.
pub async fn create(TenantCaller(_): TenantCaller) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(json!({
        "categories": TicketCategory::ALL,
        "priorities": TicketPriority::ALL,
    })))
}

pub async fn store(
    State(state): State<AppState>,
    TenantCaller(auth): TenantCaller,
    Json(form): Json<TicketForm>,
) -> Result<(StatusCode, Json<Ticket>), AppError> {
    let mut errors = match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => e.into(),
    };
    let category = parse_choice::<TicketCategory>(&mut errors, "category", &form.category);
    let priority = parse_choice::<TicketPriority>(&mut errors, "priority", &form.priority);
    errors.into_result()?;
    let (Some(category), Some(priority)) = (category, priority) else {
        return Err(AppError::field("category", "The selected category is invalid."));
    };

    let now = request_now();
    let ticket = db::run(&state.pool, move |conn| {
        if let Some(property_id) = form.property_id {
            if find_live(conn, property_id)?.is_none() {
                return Err(AppError::field("property_id", "The selected property is invalid."));
            }
        }
        let ticket = diesel::insert_into(tickets::table)
            .values(&NewTicket {
                tenant_id: auth.id,
                property_id: form.property_id,
                subject: form.subject.trim().to_string(),
                description: form.description.trim().to_string(),
                category: category.as_str().to_string(),
                priority: priority.as_str().to_string(),
                status: TicketStatus::Open.as_str().to_string(),
                created_at: now,
                updated_at: now,
            })
            .returning(Ticket::as_returning())
            .get_result(conn)?;
        log::info!("Tenant {} opened ticket {}", auth.id, ticket.id);
        Ok(ticket)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(filters): Query<TicketFilters>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let mut errors = FieldErrors::new();
    let status = filters
        .status
        .as_deref()
        .and_then(|value| parse_choice::<TicketStatus>(&mut errors, "status", value));
    errors.into_result()?;

    let tickets = db::run(&state.pool, move |conn| {
        let mut query = tickets::table
            .select(Ticket::as_select())
            .order((tickets::created_at.desc(), tickets::id.desc()))
            .into_boxed();
        match auth.role {
            Role::Admin => {}
            Role::Owner => {
                let owned = properties::table
                    .filter(properties::owner_id.eq(auth.id))
                    .filter(properties::deleted_at.is_null())
                    .select(properties::id.nullable());
                query = query.filter(tickets::property_id.eq_any(owned));
            }
            Role::Tenant => query = query.filter(tickets::tenant_id.eq(auth.id)),
        }
        if let Some(status) = status {
            query = query.filter(tickets::status.eq(status.as_str()));
        }
        Ok(query.load(conn)?)
    })
    .await?;
    Ok(Json(tickets))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(ticket_id): Path<i32>,
) -> Result<Json<Ticket>, AppError> {
    let ticket = db::run(&state.pool, move |conn| visible_ticket(conn, &auth, ticket_id)).await?;
    Ok(Json(ticket))
}

/// Applies a status (and optional priority) change, keeping `resolved_at`
/// in step with whether the ticket is closed.
pub fn apply_change(
    conn: &mut SqliteConnection,
    viewer: &AuthUser,
    ticket_id: i32,
    status: TicketStatus,
    priority: Option<TicketPriority>,
    now: NaiveDateTime,
) -> Result<Ticket, AppError> {
    viewer.require(&[Role::Owner, Role::Admin])?;
    conn.immediate_transaction(|conn| {
        let ticket = find_ticket(conn, ticket_id)?;
        if !can_see(conn, &ticket, viewer)? {
            return Err(AppError::Forbidden);
        }
        let current: TicketStatus = ticket.status.parse()?;
        let resolved_at = current.resolved_at_after(status, ticket.resolved_at, now);
        let priority = priority.map_or(ticket.priority.clone(), |p| p.as_str().to_string());

        let updated = diesel::update(tickets::table.find(ticket.id))
            .set((
                tickets::status.eq(status.as_str()),
                tickets::priority.eq(priority),
                tickets::resolved_at.eq(resolved_at),
                tickets::updated_at.eq(now),
            ))
            .returning(Ticket::as_returning())
            .get_result(conn)?;
        log::info!("Ticket {} moved from {} to {}", updated.id, current, status);
        Ok(updated)
    })
}

pub async fn update(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Path(ticket_id): Path<i32>,
    Json(change): Json<TicketChange>,
) -> Result<Json<Ticket>, AppError> {
    let mut errors = FieldErrors::new();
    let status = parse_choice::<TicketStatus>(&mut errors, "status", &change.status);
    let priority = change
        .priority
        .as_deref()
        .and_then(|value| parse_choice::<TicketPriority>(&mut errors, "priority", value));
    errors.into_result()?;
    let status = status.ok_or_else(|| AppError::field("status", "The selected status is invalid."))?;

    let now = request_now();
    let ticket = db::run(&state.pool, move |conn| {
        apply_change(conn, &auth, ticket_id, status, priority, now)
    })
    .await?;
    Ok(Json(ticket))
}
