//! Testing sample workflow and request rollup.

use axum::http::StatusCode;
use serde_json::{json, Value};

use super::common::{
    assert_error, create_test_router, get_request, id_of, ntr_body, patch_json, post_json,
    seed_catalog, send, send_ok,
};

async fn move_sample(app: &axum::Router, sample_id: &str, status: &str) -> Value {
    send_ok(
        app,
        patch_json(
            &format!("/api/samples/{}/status", sample_id),
            &json!({"status": status}),
        ),
        StatusCode::OK,
    )
    .await
}

async fn request_status(app: &axum::Router, request_id: &str) -> String {
    let request = send_ok(
        app,
        get_request(&format!("/api/requests/{}", request_id)),
        StatusCode::OK,
    )
    .await;
    request["status"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_sample_progress_rolls_up_to_request() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let created = send_ok(
        &app,
        post_json("/api/requests/ntr", &ntr_body(&catalog)),
        StatusCode::CREATED,
    )
    .await;
    let thermal = &created[1];
    let request_id = id_of(thermal);
    let sample_id = id_of(&thermal["samples"][0]);

    let received = move_sample(&app, &sample_id, "received").await;
    assert_eq!(received["status"], "received");
    assert!(received["received_at"].is_string());
    assert_eq!(request_status(&app, &request_id).await, "in_progress");

    move_sample(&app, &sample_id, "in_progress").await;
    let completed = move_sample(&app, &sample_id, "completed").await;
    assert!(completed["completed_at"].is_string());
    assert_eq!(request_status(&app, &request_id).await, "completed");
}

#[tokio::test]
async fn test_request_waits_for_every_sample() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let created = send_ok(
        &app,
        post_json("/api/requests/ntr", &ntr_body(&catalog)),
        StatusCode::CREATED,
    )
    .await;
    let rheology = &created[0];
    let request_id = id_of(rheology);
    let samples: Vec<String> = rheology["samples"]
        .as_array()
        .unwrap()
        .iter()
        .map(id_of)
        .collect();

    move_sample(&app, &samples[0], "rejected").await;
    assert_eq!(request_status(&app, &request_id).await, "submitted");

    for id in &samples[1..] {
        move_sample(&app, id, "received").await;
        move_sample(&app, id, "in_progress").await;
    }
    assert_eq!(request_status(&app, &request_id).await, "in_progress");

    move_sample(&app, &samples[1], "completed").await;
    assert_eq!(request_status(&app, &request_id).await, "in_progress");

    move_sample(&app, &samples[2], "cancelled").await;
    // every sample is closed and one completed
    assert_eq!(request_status(&app, &request_id).await, "completed");
}

#[tokio::test]
async fn test_invalid_sample_transitions() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let created = send_ok(
        &app,
        post_json("/api/requests/ntr", &ntr_body(&catalog)),
        StatusCode::CREATED,
    )
    .await;
    let sample_id = id_of(&created[1]["samples"][0]);

    let (status, err) = send(
        &app,
        patch_json(
            &format!("/api/samples/{}/status", sample_id),
            &json!({"status": "completed"}),
        ),
    )
    .await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);

    let (status, err) = send(
        &app,
        patch_json(
            &format!("/api/samples/{}/status", sample_id),
            &json!({"status": "lost"}),
        ),
    )
    .await;
    assert_eq!(
        assert_error(status, &err, StatusCode::BAD_REQUEST),
        "VALIDATION_ERROR"
    );

    let (status, err) = send(
        &app,
        patch_json(
            &format!("/api/samples/{}/status", uuid::Uuid::new_v4()),
            &json!({"status": "received"}),
        ),
    )
    .await;
    assert_error(status, &err, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sample_remarks_and_filters() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let created = send_ok(
        &app,
        post_json("/api/requests/ntr", &ntr_body(&catalog)),
        StatusCode::CREATED,
    )
    .await;
    let sample_id = id_of(&created[0]["samples"][0]);

    let updated = send_ok(
        &app,
        patch_json(
            &format!("/api/samples/{}/status", sample_id),
            &json!({"status": "received", "remarks": "Bag slightly torn"}),
        ),
        StatusCode::OK,
    )
    .await;
    assert_eq!(updated["remarks"], "Bag slightly torn");

    let fetched = send_ok(
        &app,
        get_request(&format!("/api/samples/{}", sample_id)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(fetched["status"], "received");

    let (_, body) = send(&app, get_request("/api/samples?status=received")).await;
    assert_eq!(body["count"], 1);

    let (_, body) = send(
        &app,
        get_request(&format!("/api/samples?test_method_id={}", catalog.mfr)),
    )
    .await;
    assert_eq!(body["count"], 2);

    let (_, body) = send(
        &app,
        get_request(&format!("/api/samples?request_id={}", id_of(&created[1]))),
    )
    .await;
    assert_eq!(body["count"], 1);
}
