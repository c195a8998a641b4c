use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::properties;

text_enum!(
    PropertyStatus {
        Leasing => "leasing",
        Occupied => "occupied",
        Maintenance => "maintenance",
        Unlisted => "unlisted",
    }
);

#[derive(Debug, Clone, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = properties)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Property {
    pub id: i32,
    pub owner_id: Option<i32>,
    pub name: String,
    pub address_line: String,
    pub barangay: Option<String>,
    pub city: String,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub description: Option<String>,
    pub monthly_rent: i64,
    pub status: String,
    #[serde(serialize_with = "gallery_as_list")]
    pub gallery: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(skip)]
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = properties)]
pub struct NewProperty {
    pub owner_id: Option<i32>,
    pub name: String,
    pub address_line: String,
    pub barangay: Option<String>,
    pub city: String,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub description: Option<String>,
    pub monthly_rent: i64,
    pub status: String,
    pub gallery: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Column changes for an edit; `None` leaves the column alone.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = properties)]
pub struct PropertyChanges {
    pub owner_id: Option<Option<i32>>,
    pub name: Option<String>,
    pub address_line: Option<String>,
    pub barangay: Option<Option<String>>,
    pub city: Option<String>,
    pub province: Option<Option<String>>,
    pub postal_code: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub monthly_rent: Option<i64>,
    pub status: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Property {
    /// Stored image paths, oldest first.
    pub fn images(&self) -> Vec<String> {
        decode_gallery(&self.gallery)
    }

    pub fn is_owned_by(&self, user_id: i32) -> bool {
        self.owner_id == Some(user_id)
    }
}

pub fn decode_gallery(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str(raw) {
        Ok(paths) => paths,
        Err(e) => {
            log::warn!("Unreadable gallery column {:?}: {}", raw, e);
            Vec::new()
        }
    }
}

pub fn encode_gallery(paths: &[String]) -> String {
    serde_json::to_string(paths).unwrap_or_else(|_| "[]".to_string())
}

fn gallery_as_list<S: serde::Serializer>(raw: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(decode_gallery(raw))
}

/// Non-deleted property by id.
pub fn find_live(conn: &mut SqliteConnection, property_id: i32) -> QueryResult<Option<Property>> {
    properties::table
        .find(property_id)
        .filter(properties::deleted_at.is_null())
        .select(Property::as_select())
        .first(conn)
        .optional()
}
