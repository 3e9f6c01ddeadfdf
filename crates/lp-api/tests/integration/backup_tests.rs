//! Backup export and restore.

use axum::http::StatusCode;
use serde_json::json;

use super::common::{
    assert_error, create_test_router, get_request, ntr_body, post_json, seed_catalog, send,
    send_ok,
};

#[tokio::test]
async fn test_export_then_restore_into_fresh_database() {
    let (source, _state) = create_test_router().await;
    let catalog = seed_catalog(&source).await;
    send_ok(
        &source,
        post_json("/api/requests/ntr", &ntr_body(&catalog)),
        StatusCode::CREATED,
    )
    .await;

    let backup = send_ok(&source, get_request("/api/backup"), StatusCode::OK).await;
    assert_eq!(backup["format_version"], 1);
    assert_eq!(backup["capabilities"].as_array().unwrap().len(), 2);
    assert_eq!(backup["requests"].as_array().unwrap().len(), 2);
    assert_eq!(backup["testing_samples"].as_array().unwrap().len(), 4);

    let (target, _state) = create_test_router().await;
    // the envelope from GET /api/backup is accepted as-is
    let summary = send_ok(
        &target,
        post_json("/api/backup/restore", &json!({"success": true, "data": backup})),
        StatusCode::OK,
    )
    .await;
    assert_eq!(summary["capabilities"], 2);
    assert_eq!(summary["test_methods"], 3);
    assert_eq!(summary["requests"], 2);
    assert_eq!(summary["testing_samples"], 4);

    let restored = send_ok(&target, get_request("/api/backup"), StatusCode::OK).await;
    assert_eq!(restored["requests"], backup["requests"]);
    assert_eq!(restored["testing_samples"], backup["testing_samples"]);

    // run counters survive, so numbering continues
    let next = send_ok(
        &target,
        post_json("/api/requests/ntr", &ntr_body(&catalog)),
        StatusCode::CREATED,
    )
    .await;
    let number = next[0]["request_number"].as_str().unwrap();
    assert!(number.ends_with("-0002"), "{}", number);
}

#[tokio::test]
async fn test_restore_replaces_existing_rows() {
    let (app, _state) = create_test_router().await;
    let empty = send_ok(&app, get_request("/api/backup"), StatusCode::OK).await;

    seed_catalog(&app).await;
    send_ok(&app, post_json("/api/backup/restore", &empty), StatusCode::OK).await;

    let (_, body) = send(&app, get_request("/api/capabilities")).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_restore_rejects_bad_documents() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let mut backup = send_ok(&app, get_request("/api/backup"), StatusCode::OK).await;
    backup["format_version"] = json!(99);
    let (status, err) = send(&app, post_json("/api/backup/restore", &backup)).await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);

    let (status, err) = send(
        &app,
        post_json("/api/backup/restore", &json!({"format_version": 1})),
    )
    .await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);

    // a row the schema refuses is the caller's fault too
    let mut negative_price = send_ok(&app, get_request("/api/backup"), StatusCode::OK).await;
    negative_price["test_methods"][0]["price"] = json!(-1.0);
    let (status, err) = send(&app, post_json("/api/backup/restore", &negative_price)).await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);

    // failed restores leave the database alone
    let capability = send_ok(
        &app,
        get_request(&format!("/api/capabilities/{}", catalog.rheology)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(capability["short_name"], "RHE");
}
