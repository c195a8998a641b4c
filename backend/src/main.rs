use efinder::auth::accounts::ensure_admin;
use efinder::config::AppConfig;
use efinder::{app, db, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = AppConfig::load()?;
    log::info!("Loaded config: {:?}", config);

    let pool = db::establish_pool(&config.database_url, config.database_max_connections)?;
    let mut conn = pool.get()?;
    let test_query = db::ping(&mut conn)?;
    log::info!("Database test query result: {}", test_query);

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let now = chrono::Utc::now().naive_utc();
        ensure_admin(&mut conn, email, password, now)?;
    }
    drop(conn);

    let addr = config.bind_address();
    log::info!("Starting server on {}", addr);

    let state = AppState::new(config, pool);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state).into_make_service()).await?;

    Ok(())
}
