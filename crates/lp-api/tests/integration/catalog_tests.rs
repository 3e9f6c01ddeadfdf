//! CRUD tests for capabilities, locations, equipment, test methods, users and IOs.

use axum::http::StatusCode;
use serde_json::json;

use super::common::{
    assert_error, create_test_router, delete_request, get_request, id_of, post_json, put_json,
    seed_catalog, send, send_ok,
};

#[tokio::test]
async fn test_capability_crud() {
    let (app, _state) = create_test_router().await;

    let created = send_ok(
        &app,
        post_json(
            "/api/capabilities",
            &json!({"name": "Rheology", "short_name": "rhe", "description": "Flow behaviour"}),
        ),
        StatusCode::CREATED,
    )
    .await;
    let id = id_of(&created);
    assert_eq!(created["short_name"], "RHE");
    assert_eq!(created["req_run_no"], 0);
    assert_eq!(created["is_active"], true);

    let fetched = send_ok(
        &app,
        get_request(&format!("/api/capabilities/{}", id)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(fetched["name"], "Rheology");

    // null clears, absent keeps
    let updated = send_ok(
        &app,
        put_json(
            &format!("/api/capabilities/{}", id),
            &json!({"name": "Rheology Lab", "description": null}),
        ),
        StatusCode::OK,
    )
    .await;
    assert_eq!(updated["name"], "Rheology Lab");
    assert!(updated["description"].is_null());
    assert_eq!(updated["short_name"], "RHE");

    let deleted = send_ok(
        &app,
        delete_request(&format!("/api/capabilities/{}", id)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(deleted["deleted"], true);

    let (status, body) = send(&app, get_request(&format!("/api/capabilities/{}", id))).await;
    assert_eq!(assert_error(status, &body, StatusCode::NOT_FOUND), "NOT_FOUND");

    let (status, body) = send(&app, delete_request(&format!("/api/capabilities/{}", id))).await;
    assert_error(status, &body, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_capability_short_name_rules() {
    let (app, _state) = create_test_router().await;
    send_ok(
        &app,
        post_json(
            "/api/capabilities",
            &json!({"name": "Rheology", "short_name": "RHE"}),
        ),
        StatusCode::CREATED,
    )
    .await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/capabilities",
            &json!({"name": "Other", "short_name": "R-1"}),
        ),
    )
    .await;
    assert_eq!(
        assert_error(status, &body, StatusCode::BAD_REQUEST),
        "VALIDATION_ERROR"
    );
    assert!(body["details"]["short_name"].is_array());

    let (status, body) = send(
        &app,
        post_json(
            "/api/capabilities",
            &json!({"name": "Rheology 2", "short_name": "rhe"}),
        ),
    )
    .await;
    assert_error(status, &body, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_envelope_has_count() {
    let (app, _state) = create_test_router().await;
    seed_catalog(&app).await;

    let (status, body) = send(&app, get_request("/api/capabilities")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app, get_request("/api/capabilities?search=therm")).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["short_name"], "TA");
}

#[tokio::test]
async fn test_test_methods_filter_by_capability() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let (_, body) = send(
        &app,
        get_request(&format!(
            "/api/test-methods?capability_id={}",
            catalog.rheology
        )),
    )
    .await;
    assert_eq!(body["count"], 2);

    let updated = send_ok(
        &app,
        put_json(
            &format!("/api/test-methods/{}", catalog.mfr),
            &json!({"is_active": false, "turnaround_days": 5}),
        ),
        StatusCode::OK,
    )
    .await;
    assert_eq!(updated["is_active"], false);
    assert_eq!(updated["turnaround_days"], 5);

    let (_, body) = send(&app, get_request("/api/test-methods?is_active=true")).await;
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn test_referenced_capability_cannot_be_deleted() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let (status, body) = send(
        &app,
        delete_request(&format!("/api/capabilities/{}", catalog.rheology)),
    )
    .await;
    assert_error(status, &body, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_equipment_status_and_location() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let location = id_of(
        &send_ok(
            &app,
            post_json(
                "/api/locations",
                &json!({"name": "Lab 2.14", "building": "B2", "floor": "2"}),
            ),
            StatusCode::CREATED,
        )
        .await,
    );

    let updated = send_ok(
        &app,
        put_json(
            &format!("/api/equipment/{}", catalog.rheometer),
            &json!({"status": "maintenance", "location_id": location}),
        ),
        StatusCode::OK,
    )
    .await;
    assert_eq!(updated["status"], "maintenance");
    assert_eq!(updated["location_id"], location.as_str());

    let (_, body) = send(&app, get_request("/api/equipment?status=maintenance")).await;
    assert_eq!(body["count"], 1);

    let (status, body) = send(&app, get_request("/api/equipment?status=broken")).await;
    assert_eq!(
        assert_error(status, &body, StatusCode::BAD_REQUEST),
        "VALIDATION_ERROR"
    );

    let cleared = send_ok(
        &app,
        put_json(
            &format!("/api/equipment/{}", catalog.rheometer),
            &json!({"location_id": null}),
        ),
        StatusCode::OK,
    )
    .await;
    assert!(cleared["location_id"].is_null());
}

#[tokio::test]
async fn test_equipment_requires_existing_capability() {
    let (app, _state) = create_test_router().await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/equipment",
            &json!({
                "code": "EQ-1",
                "name": "Orphan",
                "capability_id": uuid::Uuid::new_v4()
            }),
        ),
    )
    .await;
    assert_error(status, &body, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_rules() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/users",
            &json!({"email": "ANA@lab.example", "name": "Ana again"}),
        ),
    )
    .await;
    assert_error(status, &body, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        post_json("/api/users", &json!({"email": "not-an-email", "name": "X"})),
    )
    .await;
    assert_eq!(
        assert_error(status, &body, StatusCode::BAD_REQUEST),
        "VALIDATION_ERROR"
    );
    assert!(body["details"]["email"].is_array());

    let staff = send_ok(
        &app,
        post_json(
            "/api/users",
            &json!({
                "email": "li@lab.example",
                "name": "Li",
                "role": "lab_staff",
                "capability_id": catalog.thermal
            }),
        ),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(staff["role"], "lab_staff");

    let (_, body) = send(&app, get_request("/api/users?role=lab_staff")).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["email"], "li@lab.example");
}

#[tokio::test]
async fn test_io_crud() {
    let (app, _state) = create_test_router().await;

    let io = send_ok(
        &app,
        post_json(
            "/api/ios",
            &json!({"io_number": "IO-1", "name": "Trials", "cost_center": "CC-7"}),
        ),
        StatusCode::CREATED,
    )
    .await;
    let id = id_of(&io);

    let updated = send_ok(
        &app,
        put_json(
            &format!("/api/ios/{}", id),
            &json!({"is_active": false, "cost_center": null}),
        ),
        StatusCode::OK,
    )
    .await;
    assert_eq!(updated["is_active"], false);
    assert!(updated["cost_center"].is_null());

    let (_, body) = send(&app, get_request("/api/ios?is_active=false")).await;
    assert_eq!(body["count"], 1);

    send_ok(
        &app,
        delete_request(&format!("/api/ios/{}", id)),
        StatusCode::OK,
    )
    .await;
}
