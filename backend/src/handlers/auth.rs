use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{non_blank, parse_choice, request_now};
use crate::auth::accounts::{create_user, normalize_email, Registration};
use crate::auth::password::verify_password;
use crate::auth::{create_token, AuthUser};
use crate::db;
use crate::error::{AppError, FieldErrors};
use crate::models::user::{find_by_email, find_user};
use crate::models::{Role, User};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    pub name: String,
    #[validate(email(message = "The email must be a valid email address."))]
    pub email: String,
    #[validate(length(min = 8, message = "The password must be at least 8 characters."))]
    pub password: String,
    pub role: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let mut errors = match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => e.into(),
    };
    let role = parse_choice::<Role>(&mut errors, "role", &form.role);
    if role == Some(Role::Admin) {
        errors.add("role", "The selected role is invalid.");
    }
    errors.into_result()?;
    let role = role.ok_or_else(|| AppError::field("role", "The selected role is invalid."))?;

    let now = request_now();
    let phone = non_blank(form.phone);
    let user = db::run(&state.pool, move |conn| {
        let registration = Registration {
            name: &form.name,
            email: &form.email,
            password: &form.password,
            role,
            phone: phone.as_deref(),
        };
        create_user(conn, &registration, now)
    })
    .await?;

    let token = issue_token(&state, &user)?;
    Ok((StatusCode::CREATED, Json(Session { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(form): Json<LoginRequest>,
) -> Result<Json<Session>, AppError> {
    let email = normalize_email(&form.email);
    // Argon2 verification is CPU-bound, so it runs with the lookup off the executor.
    let row = db::run(&state.pool, move |conn| {
        let Some(row) = find_by_email(conn, &email)? else {
            return Ok(None);
        };
        if verify_password(&form.password, &row.password_hash)? {
            Ok(Some(row))
        } else {
            log::info!("Failed login for user {}", row.id);
            Ok(None)
        }
    })
    .await?
    .ok_or_else(|| AppError::field("email", "These credentials do not match our records."))?;

    let user = User::try_from(row)?;
    let token = issue_token(&state, &user)?;
    log::info!("User {} logged in", user.id);
    Ok(Json(Session { token, user }))
}

fn issue_token(state: &AppState, user: &User) -> Result<String, AppError> {
    create_token(
        user.id,
        user.role(),
        &state.config.jwt_secret,
        state.config.jwt_ttl_hours,
    )
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<User>, AppError> {
    let row = db::run(&state.pool, move |conn| Ok(find_user(conn, auth.id)?))
        .await?
        .ok_or(AppError::NotFound("User"))?;
    Ok(Json(User::try_from(row)?))
}
