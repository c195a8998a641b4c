use axum::{extract::State, Extension, Json};

use super::request_now;
use crate::auth::AuthUser;
use crate::dashboard::{self, Dashboard};
use crate::db;
use crate::error::AppError;
use crate::AppState;

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Dashboard>, AppError> {
    let now = request_now();
    let dashboard = db::run(&state.pool, move |conn| dashboard::build(conn, &auth, now)).await?;
    Ok(Json(dashboard))
}
