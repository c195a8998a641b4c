use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::invoices;

text_enum!(
    InvoiceStatus {
        Unpaid => "unpaid",
        Partial => "partial",
        Paid => "paid",
    }
);

#[derive(Debug, Clone, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = invoices)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Invoice {
    pub id: i32,
    pub invoice_number: String,
    pub tenant_id: i32,
    pub owner_id: i32,
    pub property_id: i32,
    pub due_date: NaiveDateTime,
    pub rent: i64,
    pub utilities: i64,
    pub additional_fees: i64,
    pub late_fee: i64,
    pub tax: i64,
    pub subtotal: i64,
    pub total: i64,
    pub amount_paid: i64,
    pub balance_due: i64,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = invoices)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub tenant_id: i32,
    pub owner_id: i32,
    pub property_id: i32,
    pub due_date: NaiveDateTime,
    pub rent: i64,
    pub utilities: i64,
    pub additional_fees: i64,
    pub late_fee: i64,
    pub tax: i64,
    pub subtotal: i64,
    pub total: i64,
    pub amount_paid: i64,
    pub balance_due: i64,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
