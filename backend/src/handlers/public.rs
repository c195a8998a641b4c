use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::db;
use crate::error::AppError;
use crate::AppState;

pub const MAP_UNAVAILABLE: &str = "Map is unavailable at the moment.";

pub async fn root() -> &'static str {
    "Dagupan E-Finder API is running"
}

pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    db::run(&state.pool, db::ping).await?;
    Ok(Json(json!({ "status": "ok", "database": "ok" })))
}

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MapConfig {
    Enabled { enabled: bool, api_key: String },
    Disabled { enabled: bool, message: &'static str },
}

impl MapConfig {
    pub fn from_key(api_key: Option<&str>) -> Self {
        match api_key {
            Some(key) => MapConfig::Enabled {
                enabled: true,
                api_key: key.to_string(),
            },
            None => MapConfig::Disabled {
                enabled: false,
                message: MAP_UNAVAILABLE,
            },
        }
    }
}

/// The map widget degrades to a notice when no key is configured.
pub async fn map_config(State(state): State<AppState>) -> Json<MapConfig> {
    Json(MapConfig::from_key(state.config.maps_key()))
}
