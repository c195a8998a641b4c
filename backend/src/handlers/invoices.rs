use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Deserialize;

use super::{non_blank, request_now, Message};
use crate::auth::{AuthUser, Operator};
use crate::billing::{next_invoice_number, Charges};
use crate::db;
use crate::error::AppError;
use crate::models::property::find_live;
use crate::models::user::find_user;
use crate::models::{Invoice, NewInvoice, Role, User};
use crate::schema::{invoices, users};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct InvoiceForm {
    pub tenant_id: i32,
    pub property_id: i32,
    pub due_date: NaiveDateTime,
    #[serde(default)]
    pub rent: i64,
    #[serde(default)]
    pub utilities: i64,
    #[serde(default)]
    pub additional_fees: i64,
    #[serde(default)]
    pub late_fee: i64,
    #[serde(default)]
    pub tax: i64,
    #[serde(default)]
    pub amount_paid: i64,
    pub notes: Option<String>,
}

impl InvoiceForm {
    fn charges(&self) -> Charges {
        Charges {
            rent: self.rent,
            utilities: self.utilities,
            additional_fees: self.additional_fees,
            late_fee: self.late_fee,
            tax: self.tax,
            amount_paid: self.amount_paid,
        }
    }
}

fn is_visible_to(invoice: &Invoice, viewer: &AuthUser) -> bool {
    match viewer.role {
        Role::Admin => true,
        Role::Owner => invoice.owner_id == viewer.id,
        Role::Tenant => invoice.tenant_id == viewer.id,
    }
}

fn find_visible(
    conn: &mut SqliteConnection,
    viewer: &AuthUser,
    invoice_id: i32,
) -> Result<Invoice, AppError> {
    invoices::table
        .find(invoice_id)
        .select(Invoice::as_select())
        .first(conn)
        .optional()?
        .filter(|invoice| is_visible_to(invoice, viewer))
        .ok_or(AppError::NotFound("Invoice"))
}

/// Issues an invoice and adds its balance to the tenant's running balance.
pub fn issue(
    conn: &mut SqliteConnection,
    issuer: &AuthUser,
    form: &InvoiceForm,
    now: NaiveDateTime,
) -> Result<Invoice, AppError> {
    issuer.require(&[Role::Owner, Role::Admin])?;
    let charges = form.charges();
    charges.validate()?;
    let totals = charges.totals()?;

    conn.immediate_transaction(|conn| {
        let property = find_live(conn, form.property_id)?
            .ok_or_else(|| AppError::field("property_id", "The selected property is invalid."))?;
        let owner_id = match (issuer.role, property.owner_id) {
            (Role::Owner, Some(owner_id)) if owner_id == issuer.id => owner_id,
            (Role::Owner, _) => return Err(AppError::Forbidden),
            (_, Some(owner_id)) => owner_id,
            (_, None) => {
                return Err(AppError::field(
                    "property_id",
                    "The selected property has no owner.",
                ))
            }
        };

        let tenant = find_user(conn, form.tenant_id)?
            .map(User::try_from)
            .transpose()?
            .filter(|user| user.role() == Role::Tenant)
            .ok_or_else(|| AppError::field("tenant_id", "The selected tenant is invalid."))?;
        let balance = tenant
            .tenant_profile()
            .map_or(0, |profile| profile.balance_due)
            .checked_add(totals.balance_due)
            .ok_or_else(|| AppError::field("tenant_id", "The tenant balance is too large."))?;

        let invoice = diesel::insert_into(invoices::table)
            .values(&NewInvoice {
                invoice_number: next_invoice_number(conn, now)?,
                tenant_id: tenant.id,
                owner_id,
                property_id: property.id,
                due_date: form.due_date,
                rent: charges.rent,
                utilities: charges.utilities,
                additional_fees: charges.additional_fees,
                late_fee: charges.late_fee,
                tax: charges.tax,
                subtotal: totals.subtotal,
                total: totals.total,
                amount_paid: charges.amount_paid,
                balance_due: totals.balance_due,
                status: totals.status(charges.amount_paid).as_str().to_string(),
                notes: non_blank(form.notes.clone()),
                created_at: now,
                updated_at: now,
            })
            .returning(Invoice::as_returning())
            .get_result(conn)?;

        diesel::update(users::table.find(tenant.id))
            .set((users::balance_due.eq(Some(balance)), users::updated_at.eq(now)))
            .execute(conn)?;

        log::info!(
            "Issued invoice {} to tenant {} for {}",
            invoice.invoice_number,
            tenant.id,
            invoice.total
        );
        Ok(invoice)
    })
}

pub async fn store(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Json(form): Json<InvoiceForm>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    let now = request_now();
    let invoice = db::run(&state.pool, move |conn| issue(conn, &auth, &form, now)).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let invoices = db::run(&state.pool, move |conn| {
        let mut query = invoices::table
            .select(Invoice::as_select())
            .order((invoices::created_at.desc(), invoices::id.desc()))
            .into_boxed();
        match auth.role {
            Role::Admin => {}
            Role::Owner => query = query.filter(invoices::owner_id.eq(auth.id)),
            Role::Tenant => query = query.filter(invoices::tenant_id.eq(auth.id)),
        }
        Ok(query.load(conn)?)
    })
    .await?;
    Ok(Json(invoices))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(invoice_id): Path<i32>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = db::run(&state.pool, move |conn| find_visible(conn, &auth, invoice_id)).await?;
    Ok(Json(invoice))
}

pub async fn destroy(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Path(invoice_id): Path<i32>,
) -> Result<Json<Message>, AppError> {
    let number = db::run(&state.pool, move |conn| {
        let invoice = find_visible(conn, &auth, invoice_id)?;
        diesel::delete(invoices::table.find(invoice.id)).execute(conn)?;
        Ok(invoice.invoice_number)
    })
    .await?;
    log::info!("Deleted invoice {}", number);
    Ok(Json(Message::new("Invoice deleted successfully.")))
}
