//! Health endpoint tests.

use axum::http::StatusCode;
use tower::ServiceExt;

use super::common::{create_test_router, get_request, send};

#[tokio::test]
async fn test_health_reports_database() {
    let (app, _state) = create_test_router().await;

    let (status, body) = send(&app, get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["connected"], true);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_ready_and_live() {
    let (app, state) = create_test_router().await;

    for uri in ["/ready", "/live"] {
        let response = app.clone().oneshot(get_request(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }

    state.db.close().await;
    let response = app.clone().oneshot(get_request("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = send(&app, get_request("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}
