pub mod auth;
pub mod billing;
pub mod booking;
pub mod config;
pub mod confirmation;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod schema;
pub mod storage;

use config::AppConfig;
use db::DbPool;
use storage::PublicDisk;

pub use routes::app;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub pool: DbPool,
    pub storage: PublicDisk,
}

impl AppState {
    pub fn new(config: AppConfig, pool: DbPool) -> Self {
        let storage = PublicDisk::new(&config.storage_root);
        Self {
            config,
            pool,
            storage,
        }
    }
}
