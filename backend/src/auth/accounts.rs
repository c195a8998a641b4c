//! Account creation and the boot-time admin seed.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use super::password::hash_password;
use crate::error::AppError;
use crate::models::user::find_by_email;
use crate::models::{NewUser, Role, User, UserRow};
use crate::schema::users;

pub struct Registration<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub role: Role,
    pub phone: Option<&'a str>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn create_user(
    conn: &mut SqliteConnection,
    registration: &Registration<'_>,
    now: NaiveDateTime,
) -> Result<User, AppError> {
    let email = normalize_email(registration.email);
    let password_hash = hash_password(registration.password)?;
    conn.immediate_transaction(|conn| {
        if find_by_email(conn, &email)?.is_some() {
            return Err(AppError::field("email", "The email has already been taken."));
        }
        let row = diesel::insert_into(users::table)
            .values(&NewUser {
                name: registration.name.trim(),
                email: &email,
                password_hash: &password_hash,
                role: registration.role.as_str(),
                phone: registration.phone,
                created_at: now,
                updated_at: now,
            })
            .returning(UserRow::as_returning())
            .get_result(conn)?;
        log::info!("Registered {} account {}", registration.role, row.id);
        Ok(User::try_from(row)?)
    })
}

/// Creates the configured admin unless that email is already registered.
pub fn ensure_admin(
    conn: &mut SqliteConnection,
    email: &str,
    password: &str,
    now: NaiveDateTime,
) -> Result<(), AppError> {
    if find_by_email(conn, email)?.is_some() {
        return Ok(());
    }
    create_user(
        conn,
        &Registration {
            name: "Administrator",
            email,
            password,
            role: Role::Admin,
            phone: None,
        },
        now,
    )?;
    log::info!("Seeded admin account {}", normalize_email(email));
    Ok(())
}
