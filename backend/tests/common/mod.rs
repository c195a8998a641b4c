#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use efinder::config::AppConfig;
use efinder::db::{self, DbPool};
use efinder::models::{NewProperty, NewUser, PropertyStatus, Role};
use efinder::schema::{properties, users};
use efinder::AppState;

pub const JWT_SECRET: &str = "integration-secret";

pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

pub fn pool() -> DbPool {
    db::establish_pool(":memory:", 1).expect("in-memory pool")
}

pub fn config(storage_root: &str) -> AppConfig {
    AppConfig {
        database_url: ":memory:".into(),
        database_max_connections: 1,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: JWT_SECRET.into(),
        jwt_ttl_hours: 1,
        storage_root: storage_root.into(),
        maps_api_key: None,
        admin_email: None,
        admin_password: None,
    }
}

pub fn state(storage_root: &str) -> AppState {
    AppState::new(config(storage_root), pool())
}

/// Inserts a user without hashing a password; these accounts never log in.
pub fn user(conn: &mut SqliteConnection, name: &str, role: Role) -> i32 {
    let email = format!("{}@example.com", name.to_ascii_lowercase().replace(' ', "."));
    diesel::insert_into(users::table)
        .values(&NewUser {
            name,
            email: &email,
            password_hash: "unused",
            role: role.as_str(),
            phone: None,
            created_at: at(1, 8),
            updated_at: at(1, 8),
        })
        .returning(users::id)
        .get_result(conn)
        .expect("insert user")
}

pub fn property(conn: &mut SqliteConnection, owner_id: Option<i32>, name: &str) -> i32 {
    diesel::insert_into(properties::table)
        .values(&NewProperty {
            owner_id,
            name: name.into(),
            address_line: "12 Arellano St.".into(),
            barangay: Some("Poblacion Oeste".into()),
            city: "Dagupan".into(),
            province: Some("Pangasinan".into()),
            postal_code: Some("2400".into()),
            description: None,
            monthly_rent: 1_500_000,
            status: PropertyStatus::Leasing.as_str().into(),
            gallery: "[]".into(),
            created_at: at(1, 8),
            updated_at: at(1, 8),
        })
        .returning(properties::id)
        .get_result(conn)
        .expect("insert property")
}
