use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::services::ServeDir;

use crate::auth::authenticate;
use crate::handlers::{
    auth, confirmations, dashboard, invoices, properties, public, reservations, tenants, tickets,
};
use crate::storage::MAX_UPLOAD_BYTES;
use crate::AppState;

/// Room for one maximum-size file plus the multipart framing.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

pub fn app(state: AppState) -> Router {
    let uploads = Router::new()
        .route("/api/properties/:id/images", post(properties::add_image))
        .route(
            "/api/properties/:id/images/:index",
            put(properties::replace_image).delete(properties::remove_image),
        )
        .route("/api/owners/me/business-permit", post(tenants::upload_permit))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/properties", post(properties::store))
        .route("/api/properties/create", get(properties::create))
        .route(
            "/api/properties/:id",
            put(properties::update).delete(properties::destroy),
        )
        .route("/api/properties/:id/edit", get(properties::edit))
        .route(
            "/api/reservations",
            get(reservations::index).post(reservations::store),
        )
        .route("/api/reservations/:id", get(reservations::show))
        .route("/api/reservations/:id/status", patch(reservations::update_status))
        .route("/api/reservations/:id/cancel", post(reservations::cancel))
        .route("/api/confirmations", get(confirmations::index))
        .route(
            "/api/confirmations/:id",
            post(confirmations::confirm).delete(confirmations::clear),
        )
        .route("/api/tenants", get(tenants::index))
        .route("/api/tenants/:id", get(tenants::show))
        .route("/api/invoices", get(invoices::index).post(invoices::store))
        .route(
            "/api/invoices/:id",
            get(invoices::show).delete(invoices::destroy),
        )
        .route("/api/tickets", get(tickets::index).post(tickets::store))
        .route("/api/tickets/create", get(tickets::create))
        .route("/api/tickets/:id", get(tickets::show).patch(tickets::update))
        .route("/api/dashboard", get(dashboard::show))
        .merge(uploads)
        .layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let storage = ServeDir::new(state.storage.root());

    Router::new()
        .route("/", get(public::root))
        .route("/api/health", get(public::health))
        .route("/api/public/map-config", get(public::map_config))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/properties", get(properties::index))
        .route("/api/properties/:id", get(properties::show))
        .nest_service("/storage", storage)
        .merge(protected_routes)
        .with_state(state)
}
