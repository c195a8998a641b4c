use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use diesel::prelude::*;

use super::{read_upload, request_now};
use crate::auth::{AuthUser, Operator, OwnerCaller};
use crate::db;
use crate::error::AppError;
use crate::models::user::find_user;
use crate::models::{Role, User, UserRow};
use crate::schema::{reservations, users};
use crate::storage::UploadKind;
use crate::AppState;

/// Tenants the viewer may look at: everyone for an admin, otherwise those
/// who have reserved one of the viewer's properties.
fn visible_tenants(viewer: &AuthUser) -> users::BoxedQuery<'static, diesel::sqlite::Sqlite> {
    let mut query = users::table
        .filter(users::role.eq(Role::Tenant.as_str()))
        .into_boxed();
    if viewer.role != Role::Admin {
        query = query.filter(
            users::id.eq_any(
                reservations::table
                    .filter(reservations::owner_id.eq(viewer.id))
                    .select(reservations::tenant_id),
            ),
        );
    }
    query
}

pub async fn index(
    State(state): State<AppState>,
    Operator(auth): Operator,
) -> Result<Json<Vec<User>>, AppError> {
    let rows = db::run(&state.pool, move |conn| {
        Ok(visible_tenants(&auth)
            .order(users::name.asc())
            .select(UserRow::as_select())
            .load(conn)?)
    })
    .await?;
    let tenants = rows
        .into_iter()
        .map(User::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(tenants))
}

pub async fn show(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Path(tenant_id): Path<i32>,
) -> Result<Json<User>, AppError> {
    let row = db::run(&state.pool, move |conn| {
        Ok(visible_tenants(&auth)
            .filter(users::id.eq(tenant_id))
            .select(UserRow::as_select())
            .first(conn)
            .optional()?)
    })
    .await?
    .ok_or(AppError::NotFound("Tenant"))?;
    Ok(Json(User::try_from(row)?))
}

/// Stores a new business permit for the calling owner and drops the old file.
pub async fn upload_permit(
    State(state): State<AppState>,
    OwnerCaller(auth): OwnerCaller,
    multipart: Multipart,
) -> Result<Json<User>, AppError> {
    let upload = read_upload(multipart, "permit").await?;
    let stored = state
        .storage
        .store(UploadKind::BusinessPermit, &upload.file_name, &upload.bytes)
        .await?;

    let now = request_now();
    let path = stored.clone();
    let result = db::run(&state.pool, move |conn| {
        let previous = find_user(conn, auth.id)?
            .ok_or(AppError::NotFound("User"))?
            .business_permit_path;
        let row = diesel::update(users::table.find(auth.id))
            .set((
                users::business_permit_path.eq(Some(path)),
                users::updated_at.eq(now),
            ))
            .returning(UserRow::as_returning())
            .get_result(conn)?;
        Ok((previous, row))
    })
    .await;

    let (previous, row) = match result {
        Ok(updated) => updated,
        Err(e) => {
            state.storage.delete(&stored).await?;
            return Err(e);
        }
    };
    if let Some(previous) = previous {
        state.storage.delete(&previous).await?;
    }
    log::info!("Owner {} replaced their business permit", auth.id);
    Ok(Json(User::try_from(row)?))
}
