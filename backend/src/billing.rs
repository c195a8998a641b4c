//! Invoice arithmetic. Totals are computed once when an invoice is issued
//! and stored; nothing recomputes them on read.

use chrono::{Datelike, NaiveDateTime};
use diesel::prelude::*;

use crate::error::{AppError, FieldErrors};
use crate::models::InvoiceStatus;
use crate::schema::invoices;

/// Charges as entered on the invoice form, in centavos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Charges {
    pub rent: i64,
    pub utilities: i64,
    pub additional_fees: i64,
    pub late_fee: i64,
    pub tax: i64,
    pub amount_paid: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: i64,
    pub total: i64,
    pub balance_due: i64,
}

impl Charges {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        for (field, amount) in [
            ("rent", self.rent),
            ("utilities", self.utilities),
            ("additional_fees", self.additional_fees),
            ("late_fee", self.late_fee),
            ("tax", self.tax),
            ("amount_paid", self.amount_paid),
        ] {
            if amount < 0 {
                errors.add(field, format!("The {} must be at least 0.", field.replace('_', " ")));
            }
        }
        errors.into_result()
    }

    /// subtotal = rent + utilities + additional fees + late fee;
    /// total = subtotal + tax; balance = total - amount paid.
    pub fn totals(&self) -> Result<Totals, AppError> {
        let overflow = || AppError::field("rent", "The invoice amounts are too large.");
        let subtotal = self
            .rent
            .checked_add(self.utilities)
            .and_then(|sum| sum.checked_add(self.additional_fees))
            .and_then(|sum| sum.checked_add(self.late_fee))
            .ok_or_else(overflow)?;
        let total = subtotal.checked_add(self.tax).ok_or_else(overflow)?;
        let balance_due = total.checked_sub(self.amount_paid).ok_or_else(overflow)?;
        Ok(Totals {
            subtotal,
            total,
            balance_due,
        })
    }
}

impl Totals {
    pub fn status(&self, amount_paid: i64) -> InvoiceStatus {
        if self.balance_due <= 0 {
            InvoiceStatus::Paid
        } else if amount_paid > 0 {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Unpaid
        }
    }
}

pub fn invoice_number(issued_at: NaiveDateTime, sequence: i64) -> String {
    format!(
        "INV-{:04}{:02}-{:04}",
        issued_at.year(),
        issued_at.month(),
        sequence
    )
}

/// Next free number for the month of `issued_at`.
pub fn next_invoice_number(
    conn: &mut SqliteConnection,
    issued_at: NaiveDateTime,
) -> QueryResult<String> {
    let prefix = format!("INV-{:04}{:02}-", issued_at.year(), issued_at.month());
    let numbers: Vec<String> = invoices::table
        .filter(invoices::invoice_number.like(format!("{}%", prefix)))
        .select(invoices::invoice_number)
        .load(conn)?;
    // Suffixes widen past four digits, so compare them as numbers.
    let last = numbers
        .iter()
        .filter_map(|number| number.strip_prefix(&prefix)?.parse::<i64>().ok())
        .max()
        .unwrap_or(0);
    Ok(invoice_number(issued_at, last + 1))
}
