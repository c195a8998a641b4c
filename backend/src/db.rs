use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;
use diesel::RunQueryDsl;

use crate::error::AppError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

const SCHEMA: &str = include_str!("../migrations/schema.sql");

#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Builds the pool and makes sure every table exists.
pub fn establish_pool(database_url: &str, max_connections: u32) -> Result<DbPool, AppError> {
    log::info!(
        "Opening database {} with up to {} connections",
        database_url,
        max_connections
    );
    // Every `:memory:` connection is its own database, so it gets exactly one.
    let max_size = if database_url == ":memory:" {
        1
    } else {
        max_connections.max(1)
    };
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)?;

    let mut conn = pool.get()?;
    conn.batch_execute(SCHEMA).map_err(|e| {
        log::error!("Failed to bootstrap schema: {}", e);
        AppError::Database(e)
    })?;
    log::info!("Database schema ready");
    Ok(pool)
}

/// Runs blocking diesel work off the async executor.
pub async fn run<F, T>(pool: &DbPool, work: F) -> Result<T, AppError>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        work(&mut conn)
    })
    .await
    .map_err(|e| AppError::Internal(format!("database task failed: {}", e)))?
}

pub fn ping(conn: &mut SqliteConnection) -> Result<i32, AppError> {
    let one: i32 = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("1"))
        .get_result(conn)?;
    Ok(one)
}
