use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use super::{non_blank, parse_choice, read_upload, request_now, Message};
use crate::auth::{AuthUser, Operator};
use crate::booking::is_available;
use crate::db;
use crate::error::{AppError, FieldErrors};
use crate::models::property::{decode_gallery, encode_gallery, find_live, PropertyChanges};
use crate::models::user::find_user;
use crate::models::{NewProperty, Page, PageParams, Property, PropertyStatus, Role};
use crate::schema::properties;
use crate::storage::UploadKind;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PropertyFilters {
    pub status: Option<String>,
    pub city: Option<String>,
    pub owner_id: Option<i32>,
    pub min_rent: Option<i64>,
    pub max_rent: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PropertyForm {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    pub name: String,
    #[validate(length(min = 1, max = 255, message = "The address line field is required."))]
    pub address_line: String,
    pub barangay: Option<String>,
    #[validate(length(min = 1, max = 120, message = "The city field is required."))]
    pub city: String,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "The monthly rent must be at least 0."))]
    pub monthly_rent: i64,
    pub status: String,
    pub owner_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct PropertyUpdate {
    #[validate(length(min = 1, max = 255, message = "The name field is required."))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 255, message = "The address line field is required."))]
    pub address_line: Option<String>,
    pub barangay: Option<String>,
    #[validate(length(min = 1, max = 120, message = "The city field is required."))]
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "The monthly rent must be at least 0."))]
    pub monthly_rent: Option<i64>,
    pub status: Option<String>,
    pub owner_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct PropertyDetail {
    #[serde(flatten)]
    pub property: Property,
    pub owner_name: Option<String>,
    pub is_available: bool,
}

fn validation_errors<T: Validate>(form: &T) -> FieldErrors {
    match form.validate() {
        Ok(()) => FieldErrors::new(),
        Err(e) => e.into(),
    }
}

/// Owner id a property ends up with; admins may assign any owner account.
fn resolve_owner(
    conn: &mut SqliteConnection,
    auth: &AuthUser,
    requested: Option<i32>,
) -> Result<Option<i32>, AppError> {
    match (auth.role, requested) {
        (Role::Owner, _) => Ok(Some(auth.id)),
        (_, None) => Ok(None),
        (_, Some(owner_id)) => {
            let is_owner = find_user(conn, owner_id)?
                .map(|row| row.role.parse::<Role>() == Ok(Role::Owner))
                .unwrap_or(false);
            if is_owner {
                Ok(Some(owner_id))
            } else {
                Err(AppError::field("owner_id", "The selected owner is invalid."))
            }
        }
    }
}

/// Loads a live property the caller may edit.
fn editable_property(
    conn: &mut SqliteConnection,
    auth: &AuthUser,
    property_id: i32,
) -> Result<Property, AppError> {
    auth.require(&[Role::Owner, Role::Admin])?;
    let property = find_live(conn, property_id)?.ok_or(AppError::NotFound("Property"))?;
    if !auth.is_admin() && !property.is_owned_by(auth.id) {
        return Err(AppError::Forbidden);
    }
    Ok(property)
}

fn filtered(filters: &PropertyFilters) -> properties::BoxedQuery<'_, Sqlite> {
    let mut query = properties::table
        .filter(properties::deleted_at.is_null())
        .into_boxed();
    if let Some(status) = &filters.status {
        query = query.filter(properties::status.eq(status.trim().to_ascii_lowercase()));
    }
    if let Some(city) = &filters.city {
        query = query.filter(properties::city.like(format!("%{}%", city.trim())));
    }
    if let Some(owner_id) = filters.owner_id {
        query = query.filter(properties::owner_id.eq(owner_id));
    }
    if let Some(min_rent) = filters.min_rent {
        query = query.filter(properties::monthly_rent.ge(min_rent));
    }
    if let Some(max_rent) = filters.max_rent {
        query = query.filter(properties::monthly_rent.le(max_rent));
    }
    query
}

pub async fn index(
    State(state): State<AppState>,
    Query(filters): Query<PropertyFilters>,
) -> Result<Json<Page<Property>>, AppError> {
    let params = PageParams {
        page: filters.page.unwrap_or(1),
        per_page: filters.per_page.unwrap_or(15),
    }
    .clamped();

    let page = db::run(&state.pool, move |conn| {
        let total: i64 = filtered(&filters).select(count_star()).get_result(conn)?;
        let data = filtered(&filters)
            .order((properties::created_at.desc(), properties::id.desc()))
            .limit(params.per_page)
            .offset(params.offset())
            .select(Property::as_select())
            .load(conn)?;
        Ok(Page {
            data,
            page: params.page,
            per_page: params.per_page,
            total,
        })
    })
    .await?;
    Ok(Json(page))
}

pub async fn show(
    State(state): State<AppState>,
    Path(property_id): Path<i32>,
) -> Result<Json<PropertyDetail>, AppError> {
    let now = request_now();
    let detail = db::run(&state.pool, move |conn| {
        let property = find_live(conn, property_id)?.ok_or(AppError::NotFound("Property"))?;
        let owner_name = match property.owner_id {
            Some(owner_id) => find_user(conn, owner_id)?.map(|row| row.name),
            None => None,
        };
        let is_available = is_available(conn, property.id, now)?;
        Ok(PropertyDetail {
            property,
            owner_name,
            is_available,
        })
    })
    .await?;
    Ok(Json(detail))
}

/// Select options for the create form.
pub async fn create(Operator(_): Operator) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(json!({ "statuses": PropertyStatus::ALL })))
}

pub async fn store(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Json(form): Json<PropertyForm>,
) -> Result<(StatusCode, Json<Property>), AppError> {
    let mut errors = validation_errors(&form);
    let status = parse_choice::<PropertyStatus>(&mut errors, "status", &form.status);
    errors.into_result()?;
    let status = status.ok_or_else(|| AppError::field("status", "The selected status is invalid."))?;

    let now = request_now();
    let property = db::run(&state.pool, move |conn| {
        let owner_id = resolve_owner(conn, &auth, form.owner_id)?;
        let property = diesel::insert_into(properties::table)
            .values(&NewProperty {
                owner_id,
                name: form.name.trim().to_string(),
                address_line: form.address_line.trim().to_string(),
                barangay: non_blank(form.barangay),
                city: form.city.trim().to_string(),
                province: non_blank(form.province),
                postal_code: non_blank(form.postal_code),
                description: non_blank(form.description),
                monthly_rent: form.monthly_rent,
                status: status.as_str().to_string(),
                gallery: encode_gallery(&[]),
                created_at: now,
                updated_at: now,
            })
            .returning(Property::as_returning())
            .get_result(conn)?;
        Ok(property)
    })
    .await?;

    log::info!("User {} created property {}", auth.id, property.id);
    Ok((StatusCode::CREATED, Json(property)))
}

/// The property plus select options for the edit form.
pub async fn edit(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Path(property_id): Path<i32>,
) -> Result<Json<serde_json::Value>, AppError> {
    let property =
        db::run(&state.pool, move |conn| editable_property(conn, &auth, property_id)).await?;
    Ok(Json(json!({
        "property": property,
        "statuses": PropertyStatus::ALL,
    })))
}

pub async fn update(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Path(property_id): Path<i32>,
    Json(form): Json<PropertyUpdate>,
) -> Result<Json<Property>, AppError> {
    let mut errors = validation_errors(&form);
    let status = form
        .status
        .as_deref()
        .and_then(|value| parse_choice::<PropertyStatus>(&mut errors, "status", value));
    errors.into_result()?;

    let now = request_now();
    let property = db::run(&state.pool, move |conn| {
        let existing = editable_property(conn, &auth, property_id)?;
        let owner_id = match form.owner_id {
            Some(_) if auth.is_admin() => Some(resolve_owner(conn, &auth, form.owner_id)?),
            _ => None,
        };
        let changes = PropertyChanges {
            owner_id,
            name: form.name.map(|v| v.trim().to_string()),
            address_line: form.address_line.map(|v| v.trim().to_string()),
            barangay: form.barangay.map(|v| non_blank(Some(v))),
            city: form.city.map(|v| v.trim().to_string()),
            province: form.province.map(|v| non_blank(Some(v))),
            postal_code: form.postal_code.map(|v| non_blank(Some(v))),
            description: form.description.map(|v| non_blank(Some(v))),
            monthly_rent: form.monthly_rent,
            status: status.map(|s| s.as_str().to_string()),
            updated_at: Some(now),
        };
        let property = diesel::update(properties::table.find(existing.id))
            .set(&changes)
            .returning(Property::as_returning())
            .get_result(conn)?;
        Ok(property)
    })
    .await?;

    log::info!("User {} updated property {}", auth.id, property.id);
    Ok(Json(property))
}

pub async fn destroy(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Path(property_id): Path<i32>,
) -> Result<Json<Message>, AppError> {
    let now = request_now();
    let images = db::run(&state.pool, move |conn| {
        let property = editable_property(conn, &auth, property_id)?;
        diesel::update(properties::table.find(property.id))
            .set((
                properties::deleted_at.eq(Some(now)),
                properties::gallery.eq(encode_gallery(&[])),
                properties::updated_at.eq(now),
            ))
            .execute(conn)?;
        Ok(property.images())
    })
    .await?;

    state.storage.delete_all(&images).await?;
    log::info!(
        "User {} deleted property {} and {} image(s)",
        auth.id,
        property_id,
        images.len()
    );
    Ok(Json(Message::new("Property deleted successfully.")))
}

/// Rewrites the gallery column of an editable property.
async fn save_gallery(
    state: &AppState,
    auth: AuthUser,
    property_id: i32,
    edit: impl FnOnce(&mut Vec<String>) -> Result<Option<String>, AppError> + Send + 'static,
) -> Result<(Property, Option<String>), AppError> {
    let now = request_now();
    db::run(&state.pool, move |conn| {
        conn.immediate_transaction(|conn| {
            let property = editable_property(conn, &auth, property_id)?;
            let mut gallery = decode_gallery(&property.gallery);
            let removed = edit(&mut gallery)?;
            let property = diesel::update(properties::table.find(property.id))
                .set((
                    properties::gallery.eq(encode_gallery(&gallery)),
                    properties::updated_at.eq(now),
                ))
                .returning(Property::as_returning())
                .get_result(conn)?;
            Ok((property, removed))
        })
    })
    .await
}

fn image_index_error() -> AppError {
    AppError::field("image", "The selected image does not exist.")
}

pub async fn add_image(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Path(property_id): Path<i32>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Property>), AppError> {
    // Check access before touching the disk.
    db::run(&state.pool, move |conn| editable_property(conn, &auth, property_id)).await?;
    let upload = read_upload(multipart, "image").await?;
    let stored = state
        .storage
        .store(UploadKind::PropertyImage, &upload.file_name, &upload.bytes)
        .await?;

    let path = stored.clone();
    let result = save_gallery(&state, auth, property_id, move |gallery| {
        gallery.push(path);
        Ok(None)
    })
    .await;
    match result {
        Ok((property, _)) => Ok((StatusCode::CREATED, Json(property))),
        Err(e) => {
            state.storage.delete(&stored).await?;
            Err(e)
        }
    }
}

pub async fn replace_image(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Path((property_id, index)): Path<(i32, usize)>,
    multipart: Multipart,
) -> Result<Json<Property>, AppError> {
    db::run(&state.pool, move |conn| editable_property(conn, &auth, property_id)).await?;
    let upload = read_upload(multipart, "image").await?;
    let stored = state
        .storage
        .store(UploadKind::PropertyImage, &upload.file_name, &upload.bytes)
        .await?;

    let path = stored.clone();
    let result = save_gallery(&state, auth, property_id, move |gallery| {
        let slot = gallery.get_mut(index).ok_or_else(image_index_error)?;
        Ok(Some(std::mem::replace(slot, path)))
    })
    .await;
    match result {
        Ok((property, previous)) => {
            if let Some(previous) = previous {
                state.storage.delete(&previous).await?;
            }
            Ok(Json(property))
        }
        Err(e) => {
            state.storage.delete(&stored).await?;
            Err(e)
        }
    }
}

pub async fn remove_image(
    State(state): State<AppState>,
    Operator(auth): Operator,
    Path((property_id, index)): Path<(i32, usize)>,
) -> Result<Json<Property>, AppError> {
    let (property, removed) = save_gallery(&state, auth, property_id, move |gallery| {
        if index >= gallery.len() {
            return Err(image_index_error());
        }
        Ok(Some(gallery.remove(index)))
    })
    .await?;
    if let Some(removed) = removed {
        state.storage.delete(&removed).await?;
    }
    Ok(Json(property))
}
