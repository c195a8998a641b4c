mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use common::{property, user, JWT_SECRET};
use efinder::auth::create_token;
use efinder::models::Role;
use efinder::{app, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

struct Harness {
    state: AppState,
    _storage: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let storage = tempfile::tempdir().unwrap();
        let state = common::state(storage.path().to_str().unwrap());
        Self {
            state,
            _storage: storage,
        }
    }

    fn token(&self, id: i32, role: Role) -> String {
        create_token(id, role, JWT_SECRET, 1).unwrap()
    }

    async fn send(&self, request: Request<Body>) -> Response {
        app(self.state.clone()).oneshot(request).await.unwrap()
    }
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn new_property() -> Value {
    json!({
        "name": "Tapuac Townhouse",
        "address_line": "7 Perez Blvd.",
        "city": "Dagupan",
        "monthly_rent": 1200000,
        "status": "leasing"
    })
}

#[tokio::test]
async fn tenant_cannot_create_a_property() {
    let h = Harness::new();
    let tenant = {
        let mut conn = h.state.pool.get().unwrap();
        user(&mut conn, "Tomas Tenant", Role::Tenant)
    };
    let token = h.token(tenant, Role::Tenant);

    let response = h
        .send(json_request("POST", "/api/properties", Some(&token), new_property()))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn wrong_role_is_forbidden_before_the_body_is_read() {
    let h = Harness::new();
    let (tenant, owner) = {
        let mut conn = h.state.pool.get().unwrap();
        let owner = user(&mut conn, "Olivia Owner", Role::Owner);
        property(&mut conn, Some(owner), "Bonuan Loft");
        (user(&mut conn, "Tomas Tenant", Role::Tenant), owner)
    };
    let tenant_token = h.token(tenant, Role::Tenant);
    let owner_token = h.token(owner, Role::Owner);

    for (method, uri, body) in [
        ("POST", "/api/properties", json!({})),
        ("PUT", "/api/properties/1", json!({ "name": "" })),
        ("POST", "/api/invoices", json!({})),
        ("POST", "/api/confirmations/1", json!({})),
        ("PATCH", "/api/reservations/1/status", json!({})),
        ("PATCH", "/api/tickets/1", json!({})),
    ] {
        let response = h
            .send(json_request(method, uri, Some(&tenant_token), body))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{} {}", method, uri);
    }

    let response = h
        .send(json_request("POST", "/api/reservations", Some(&owner_token), json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The right role still gets the body validated.
    let response = h
        .send(json_request("PUT", "/api/properties/1", Some(&owner_token), json!({ "name": "" })))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn owner_creates_a_property_it_then_owns() {
    let h = Harness::new();
    let owner = {
        let mut conn = h.state.pool.get().unwrap();
        user(&mut conn, "Olivia Owner", Role::Owner)
    };
    let token = h.token(owner, Role::Owner);

    let response = h
        .send(json_request("POST", "/api/properties", Some(&token), new_property()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["owner_id"], json!(owner));
    assert_eq!(created["gallery"], json!([]));

    let id = created["id"].as_i64().unwrap();
    let response = h.send(get(&format!("/api/properties/{}", id), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_json(response).await;
    assert_eq!(detail["is_available"], json!(true));
    assert_eq!(detail["owner_name"], json!("Olivia Owner"));
}

#[tokio::test]
async fn invalid_property_status_is_a_field_error() {
    let h = Harness::new();
    let owner = {
        let mut conn = h.state.pool.get().unwrap();
        user(&mut conn, "Olivia Owner", Role::Owner)
    };
    let token = h.token(owner, Role::Owner);
    let mut form = new_property();
    form["status"] = json!("sold");
    form["monthly_rent"] = json!(-5);

    let response = h
        .send(json_request("POST", "/api/properties", Some(&token), form))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["message"], json!("The given data was invalid."));
    assert_eq!(body["errors"]["status"], json!(["The selected status is invalid."]));
    assert_eq!(body["errors"]["monthly_rent"], json!(["The monthly rent must be at least 0."]));
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let h = Harness::new();
    let response = h.send(get("/api/dashboard", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = h.send(get("/api/dashboard", Some("not-a-jwt"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_then_login() {
    let h = Harness::new();
    let registration = json!({
        "name": "Tomas Tenant",
        "email": "Tomas@Example.com",
        "password": "correct horse",
        "role": "Tenant"
    });
    let response = h
        .send(json_request("POST", "/api/auth/register", None, registration.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let session = body_json(response).await;
    assert_eq!(session["user"]["role"], json!("tenant"));
    assert_eq!(session["user"]["email"], json!("tomas@example.com"));

    let response = h
        .send(json_request("POST", "/api/auth/register", None, registration))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["errors"]["email"],
        json!(["The email has already been taken."])
    );

    let response = h
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "tomas@example.com", "password": "correct horse" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["token"].as_str().unwrap().to_string();

    let response = h.send(get("/api/auth/me", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], json!("Tomas Tenant"));

    let response = h
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "tomas@example.com", "password": "wrong horse" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn admin_accounts_cannot_self_register() {
    let h = Harness::new();
    let response = h
        .send(json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({
                "name": "Mallory",
                "email": "mallory@example.com",
                "password": "password123",
                "role": "admin"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["errors"]["role"],
        json!(["The selected role is invalid."])
    );
}

#[tokio::test]
async fn second_booking_of_a_held_property_fails_on_the_reservation_field() {
    let h = Harness::new();
    let (first, second, property_id) = {
        let mut conn = h.state.pool.get().unwrap();
        let owner = user(&mut conn, "Olivia Owner", Role::Owner);
        let first = user(&mut conn, "Tomas Tenant", Role::Tenant);
        let second = user(&mut conn, "Teresa Tenant", Role::Tenant);
        (first, second, property(&mut conn, Some(owner), "Bonuan Loft"))
    };
    let booking = json!({ "property_id": property_id, "reservation_type": "daily" });

    let response = h
        .send(json_request(
            "POST",
            "/api/reservations",
            Some(&h.token(first, Role::Tenant)),
            booking.clone(),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let reservation = body_json(response).await;
    assert_eq!(reservation["status"], json!("pending"));

    let response = h
        .send(json_request(
            "POST",
            "/api/reservations",
            Some(&h.token(second, Role::Tenant)),
            booking,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    let message = body["errors"]["reservation"][0].as_str().unwrap();
    assert!(message.starts_with("This property is already reserved until "));

    let response = h
        .send(get("/api/reservations", Some(&h.token(second, Role::Tenant))))
        .await;
    assert_eq!(body_json(response).await, json!([]));

    let response = h
        .send(get(&format!("/api/properties/{}", property_id), None))
        .await;
    assert_eq!(body_json(response).await["is_available"], json!(false));
}

#[tokio::test]
async fn tenants_cancel_their_own_pending_reservations() {
    let h = Harness::new();
    let (owner, tenant, property_id) = {
        let mut conn = h.state.pool.get().unwrap();
        let owner = user(&mut conn, "Olivia Owner", Role::Owner);
        let tenant = user(&mut conn, "Tomas Tenant", Role::Tenant);
        (owner, tenant, property(&mut conn, Some(owner), "Bonuan Loft"))
    };
    let tenant_token = h.token(tenant, Role::Tenant);
    let response = h
        .send(json_request(
            "POST",
            "/api/reservations",
            Some(&tenant_token),
            json!({ "property_id": property_id, "reservation_type": "viewing" }),
        ))
        .await;
    let id = body_json(response).await["id"].as_i64().unwrap();

    let response = h
        .send(json_request(
            "PATCH",
            &format!("/api/reservations/{}/status", id),
            Some(&tenant_token),
            json!({ "status": "active" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = h
        .send(json_request(
            "POST",
            &format!("/api/reservations/{}/cancel", id),
            Some(&tenant_token),
            json!({}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], json!("cancelled"));

    let response = h
        .send(json_request(
            "PATCH",
            &format!("/api/reservations/{}/status", id),
            Some(&h.token(owner, Role::Owner)),
            json!({ "status": "active" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn public_endpoints() {
    let h = Harness::new();
    {
        let mut conn = h.state.pool.get().unwrap();
        let owner = user(&mut conn, "Olivia Owner", Role::Owner);
        property(&mut conn, Some(owner), "Bonuan Loft");
        property(&mut conn, Some(owner), "Lucao Studio");
    }

    let response = h.send(get("/api/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = h.send(get("/api/public/map-config", None)).await;
    assert_eq!(
        body_json(response).await,
        json!({ "enabled": false, "message": "Map is unavailable at the moment." })
    );

    let response = h.send(get("/api/properties?per_page=1", None)).await;
    let page = body_json(response).await;
    assert_eq!(page["total"], json!(2));
    assert_eq!(page["per_page"], json!(1));
    assert_eq!(page["data"].as_array().unwrap().len(), 1);

    let response = h
        .send(get("/api/properties?page=9223372036854775807&per_page=100", None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["total"], json!(2));
    assert_eq!(page["data"], json!([]));
}

#[tokio::test]
async fn tenants_only_see_their_own_dashboard() {
    let h = Harness::new();
    let tenant = {
        let mut conn = h.state.pool.get().unwrap();
        user(&mut conn, "Tomas Tenant", Role::Tenant)
    };
    let response = h
        .send(get("/api/dashboard", Some(&h.token(tenant, Role::Tenant))))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let dashboard = body_json(response).await;
    assert_eq!(dashboard["role"], json!("tenant"));
    assert_eq!(dashboard["outstanding_balance"], json!(0));
    assert_eq!(dashboard["upcoming_reservations"]["trend"], json!("neutral"));
}
