//! Every failure comes back in the same envelope.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};

use super::common::{
    assert_error, create_test_router, get_request, patch_json, post_json, send,
};
use serde_json::json;

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _state) = create_test_router().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/capabilities")
        .header("Content-Type", "application/json")
        .body(Body::from("{\"name\": \"Rheology\","))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(assert_error(status, &body, StatusCode::BAD_REQUEST), "BAD_REQUEST");
}

#[tokio::test]
async fn test_missing_field_is_bad_request() {
    let (app, _state) = create_test_router().await;

    let (status, body) = send(
        &app,
        post_json("/api/capabilities", &json!({"name": "Rheology"})),
    )
    .await;
    assert_error(status, &body, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_content_type_is_bad_request() {
    let (app, _state) = create_test_router().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/capabilities")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_error(status, &body, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_path_id_is_bad_request() {
    let (app, _state) = create_test_router().await;

    let (status, body) = send(&app, get_request("/api/requests/not-a-uuid")).await;
    assert_error(status, &body, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        patch_json("/api/samples/42/status", &json!({"status": "received"})),
    )
    .await;
    assert_error(status, &body, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bad_query_is_bad_request() {
    let (app, _state) = create_test_router().await;

    let (status, body) = send(&app, get_request("/api/requests?page=abc")).await;
    assert_error(status, &body, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get_request("/api/requests?status=lost")).await;
    assert_eq!(
        assert_error(status, &body, StatusCode::BAD_REQUEST),
        "VALIDATION_ERROR"
    );
    assert!(body["details"]["status"].is_array());
}

#[tokio::test]
async fn test_unknown_ids_and_routes_are_not_found() {
    let (app, _state) = create_test_router().await;

    let id = uuid::Uuid::new_v4();
    for uri in [
        format!("/api/requests/{}", id),
        format!("/api/samples/{}", id),
        format!("/api/users/{}", id),
        format!("/api/ios/{}", id),
        format!("/api/locations/{}", id),
        format!("/api/equipment/{}", id),
        format!("/api/test-methods/{}", id),
    ] {
        let (status, body) = send(&app, get_request(&uri)).await;
        assert_eq!(
            assert_error(status, &body, StatusCode::NOT_FOUND),
            "NOT_FOUND",
            "{}",
            uri
        );
        assert!(body["error"].as_str().unwrap().contains(&id.to_string()));
    }

    let (status, body) = send(&app, get_request("/api/nothing-here")).await;
    assert_error(status, &body, StatusCode::NOT_FOUND);
}
