//! Common test utilities for integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use lp_api::{routes, AppState};
use lp_core::db::create_memory_pool;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Creates a router over a fresh in-memory database.
pub async fn create_test_router() -> (Router, AppState) {
    let pool = create_memory_pool()
        .await
        .expect("Failed to create test database");
    let state = AppState::new(pool);
    let router = routes::create_router(state.clone());
    (router, state)
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn delete_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    json_request(Method::POST, uri, body)
}

pub fn put_json(uri: &str, body: &Value) -> Request<Body> {
    json_request(Method::PUT, uri, body)
}

pub fn patch_json(uri: &str, body: &Value) -> Request<Body> {
    json_request(Method::PATCH, uri, body)
}

/// Sends a request and parses the JSON body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap_or_else(|e| {
        panic!(
            "Failed to parse response: {} - Body: {:?}",
            e,
            String::from_utf8_lossy(&body)
        )
    });
    (status, parsed)
}

/// Sends a request that must succeed with `expected` and returns `data`.
pub async fn send_ok(app: &Router, request: Request<Body>, expected: StatusCode) -> Value {
    let (status, body) = send(app, request).await;
    assert_eq!(status, expected, "unexpected status, body: {}", body);
    assert_eq!(body["success"], true);
    body["data"].clone()
}

/// Asserts the error envelope and returns its `code`.
pub fn assert_error(status: StatusCode, body: &Value, expected: StatusCode) -> String {
    assert_eq!(status, expected, "unexpected status, body: {}", body);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string(), "missing error message: {}", body);
    body["code"].as_str().unwrap_or_default().to_string()
}

/// Ids of a small catalog created through the API.
pub struct Catalog {
    pub rheology: String,
    pub thermal: String,
    pub mfr: String,
    pub viscosity: String,
    pub dsc: String,
    pub rheometer: String,
    pub researcher: String,
    pub io: String,
}

pub fn id_of(data: &Value) -> String {
    data["id"].as_str().expect("id").to_string()
}

/// Creates two capabilities with test methods, a reservable rheometer, a
/// researcher and an IO.
pub async fn seed_catalog(app: &Router) -> Catalog {
    let rheology = id_of(
        &send_ok(
            app,
            post_json(
                "/api/capabilities",
                &json!({"name": "Rheology", "short_name": "RHE"}),
            ),
            StatusCode::CREATED,
        )
        .await,
    );
    let thermal = id_of(
        &send_ok(
            app,
            post_json(
                "/api/capabilities",
                &json!({"name": "Thermal Analysis", "short_name": "TA"}),
            ),
            StatusCode::CREATED,
        )
        .await,
    );

    let method = |code: &str, name: &str, capability: &str| {
        post_json(
            "/api/test-methods",
            &json!({"code": code, "name": name, "capability_id": capability, "price": 120.0}),
        )
    };
    let mfr = id_of(
        &send_ok(
            app,
            method("RHE-MFR", "Melt flow rate", &rheology),
            StatusCode::CREATED,
        )
        .await,
    );
    let viscosity = id_of(
        &send_ok(
            app,
            method("RHE-VIS", "Shear viscosity", &rheology),
            StatusCode::CREATED,
        )
        .await,
    );
    let dsc = id_of(
        &send_ok(
            app,
            method("TA-DSC", "DSC melting point", &thermal),
            StatusCode::CREATED,
        )
        .await,
    );

    let rheometer = id_of(
        &send_ok(
            app,
            post_json(
                "/api/equipment",
                &json!({
                    "code": "EQ-RHE-01",
                    "name": "Rotational rheometer",
                    "capability_id": rheology,
                    "reservable": true
                }),
            ),
            StatusCode::CREATED,
        )
        .await,
    );

    let researcher = id_of(
        &send_ok(
            app,
            post_json(
                "/api/users",
                &json!({"email": "ana@lab.example", "name": "Ana"}),
            ),
            StatusCode::CREATED,
        )
        .await,
    );

    let io = id_of(
        &send_ok(
            app,
            post_json(
                "/api/ios",
                &json!({"io_number": "IO-4711", "name": "Compounding trials"}),
            ),
            StatusCode::CREATED,
        )
        .await,
    );

    Catalog {
        rheology,
        thermal,
        mfr,
        viscosity,
        dsc,
        rheometer,
        researcher,
        io,
    }
}

/// An NTR body touching both capabilities with two samples.
pub fn ntr_body(catalog: &Catalog) -> Value {
    json!({
        "requester_id": catalog.researcher,
        "io_id": catalog.io,
        "title": "Batch 42 characterisation",
        "priority": "urgent",
        "details": {"project": "PX-9"},
        "samples": [
            {"name": "Pellet A", "sample_type": "pellet"},
            {"name": "Pellet B"}
        ],
        "test_methods": [
            {"test_method_id": catalog.mfr},
            {"test_method_id": catalog.dsc, "samples": ["Pellet B"]},
            {"test_method_id": catalog.viscosity, "samples": ["Pellet A"]}
        ]
    })
}
