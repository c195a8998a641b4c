use std::str::FromStr;

use axum::extract::Multipart;
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{AppError, FieldErrors};

pub mod auth;
pub mod confirmations;
pub mod dashboard;
pub mod invoices;
pub mod properties;
pub mod public;
pub mod reservations;
pub mod tenants;
pub mod tickets;

/// The request's single reading of the clock.
pub fn request_now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Parses a closed-vocabulary form value, recording a field error on failure.
pub fn parse_choice<T: FromStr>(errors: &mut FieldErrors, field: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            errors.add(field, format!("The selected {} is invalid.", field.replace('_', " ")));
            None
        }
    }
}

pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Plain `{"message": ...}` acknowledgement.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Reads the file part named `field` from a multipart body.
pub async fn read_upload(mut multipart: Multipart, field: &str) -> Result<Upload, AppError> {
    let unreadable = |_| AppError::field(field, "The upload could not be read.");
    while let Some(part) = multipart.next_field().await.map_err(unreadable)? {
        if part.name() != Some(field) {
            continue;
        }
        let file_name = part.file_name().unwrap_or_default().to_string();
        let bytes = part.bytes().await.map_err(unreadable)?;
        return Ok(Upload {
            file_name,
            bytes: bytes.to_vec(),
        });
    }
    Err(AppError::field(
        field,
        format!("The {} field is required.", field),
    ))
}
