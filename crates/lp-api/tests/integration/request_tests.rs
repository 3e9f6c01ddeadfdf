//! Request submission and workflow tests.

use axum::http::StatusCode;
use serde_json::{json, Value};

use super::common::{
    assert_error, create_test_router, delete_request, get_request, id_of, ntr_body, patch_json,
    post_json, seed_catalog, send, send_ok, Catalog,
};

fn sample_codes(request: &Value) -> Vec<String> {
    request["samples"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["sample_code"].as_str().unwrap().to_string())
        .collect()
}

fn er_body(catalog: &Catalog, start: &str, end: &str) -> Value {
    json!({
        "requester_id": catalog.researcher,
        "equipment_id": catalog.rheometer,
        "title": "Rheometer slot",
        "reservation_start": start,
        "reservation_end": end,
        "purpose": "Frequency sweeps"
    })
}

#[tokio::test]
async fn test_ntr_splits_per_capability() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let (status, body) = send(&app, post_json("/api/requests/ntr", &ntr_body(&catalog))).await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);

    let created = body["data"].as_array().unwrap();
    let rheology = &created[0];
    let thermal = &created[1];

    let rhe_number = rheology["request_number"].as_str().unwrap();
    assert!(rhe_number.starts_with("NTR-RHE-"), "{}", rhe_number);
    assert!(rhe_number.ends_with("-0001"), "{}", rhe_number);
    assert_eq!(rheology["capability_id"], catalog.rheology.as_str());
    assert_eq!(rheology["request_type"], "ntr");
    assert_eq!(rheology["status"], "submitted");
    assert_eq!(rheology["priority"], "urgent");
    assert_eq!(rheology["details"]["project"], "PX-9");
    assert_eq!(
        sample_codes(rheology),
        vec![
            format!("{}-S01", rhe_number),
            format!("{}-S02", rhe_number),
            format!("{}-S03", rhe_number),
        ]
    );
    // method-major: MFR on both samples, then viscosity on Pellet A
    assert_eq!(rheology["samples"][0]["name"], "Pellet A");
    assert_eq!(rheology["samples"][0]["test_method_id"], catalog.mfr.as_str());
    assert_eq!(rheology["samples"][1]["name"], "Pellet B");
    assert_eq!(
        rheology["samples"][2]["test_method_id"],
        catalog.viscosity.as_str()
    );

    let ta_number = thermal["request_number"].as_str().unwrap();
    assert!(ta_number.starts_with("NTR-TA-"), "{}", ta_number);
    assert!(ta_number.ends_with("-0001"), "{}", ta_number);
    assert_eq!(thermal["samples"].as_array().unwrap().len(), 1);
    assert_eq!(thermal["samples"][0]["name"], "Pellet B");

    assert_eq!(rheology["submission_id"], thermal["submission_id"]);
    assert_ne!(rheology["id"], thermal["id"]);

    let capability = send_ok(
        &app,
        get_request(&format!("/api/capabilities/{}", catalog.rheology)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(capability["req_run_no"], 1);

    let (_, listed) = send(
        &app,
        get_request(&format!(
            "/api/requests?submission_id={}",
            rheology["submission_id"].as_str().unwrap()
        )),
    )
    .await;
    assert_eq!(listed["pagination"]["total"], 2);
}

#[tokio::test]
async fn test_run_numbers_continue_per_capability() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    send_ok(
        &app,
        post_json("/api/requests/ntr", &ntr_body(&catalog)),
        StatusCode::CREATED,
    )
    .await;

    let asr = send_ok(
        &app,
        post_json(
            "/api/requests/asr",
            &json!({
                "requester_id": catalog.researcher,
                "capability_id": catalog.rheology,
                "title": "Why does batch 42 gel?",
                "problem_statement": "Viscosity doubles after storage",
                "samples": [{"name": "Aged pellet"}]
            }),
        ),
        StatusCode::CREATED,
    )
    .await;
    let number = asr["request_number"].as_str().unwrap();
    assert!(number.starts_with("ASR-RHE-"), "{}", number);
    assert!(number.ends_with("-0002"), "{}", number);
    assert_eq!(asr["request_type"], "asr");
    assert_eq!(asr["priority"], "normal");
    assert_eq!(
        asr["details"]["problem_statement"],
        "Viscosity doubles after storage"
    );
    assert_eq!(sample_codes(&asr), vec![format!("{}-S01", number)]);
    assert!(asr["samples"][0]["test_method_id"].is_null());

    let thermal = send_ok(
        &app,
        get_request(&format!("/api/capabilities/{}", catalog.thermal)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(thermal["req_run_no"], 1);
}

#[tokio::test]
async fn test_ntr_rejections() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let mut body = ntr_body(&catalog);
    body["samples"] = json!([{"name": "A"}, {"name": "A"}]);
    body["test_methods"] = json!([{"test_method_id": catalog.mfr}]);
    let (status, err) = send(&app, post_json("/api/requests/ntr", &body)).await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);

    let mut body = ntr_body(&catalog);
    body["test_methods"] = json!([]);
    let (status, err) = send(&app, post_json("/api/requests/ntr", &body)).await;
    assert_eq!(
        assert_error(status, &err, StatusCode::BAD_REQUEST),
        "VALIDATION_ERROR"
    );

    let mut body = ntr_body(&catalog);
    body["test_methods"] = json!([{"test_method_id": uuid::Uuid::new_v4()}]);
    let (status, err) = send(&app, post_json("/api/requests/ntr", &body)).await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);

    let mut body = ntr_body(&catalog);
    body["priority"] = json!("asap");
    let (status, err) = send(&app, post_json("/api/requests/ntr", &body)).await;
    assert_eq!(
        assert_error(status, &err, StatusCode::BAD_REQUEST),
        "VALIDATION_ERROR"
    );

    let mut body = ntr_body(&catalog);
    body["requester_id"] = json!(uuid::Uuid::new_v4());
    let (status, err) = send(&app, post_json("/api/requests/ntr", &body)).await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);

    // nothing was written, so the counter is untouched
    let capability = send_ok(
        &app,
        get_request(&format!("/api/capabilities/{}", catalog.rheology)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(capability["req_run_no"], 0);
    let (_, listed) = send(&app, get_request("/api/requests")).await;
    assert_eq!(listed["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_blank_text_is_rejected() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let mut body = ntr_body(&catalog);
    body["title"] = json!("   ");
    let (status, err) = send(&app, post_json("/api/requests/ntr", &body)).await;
    assert_eq!(
        assert_error(status, &err, StatusCode::BAD_REQUEST),
        "VALIDATION_ERROR"
    );
    assert!(err["details"]["title"].is_array(), "{}", err);

    let (status, err) = send(
        &app,
        post_json(
            "/api/requests/asr",
            &json!({
                "requester_id": catalog.researcher,
                "capability_id": catalog.rheology,
                "title": "Gel content",
                "problem_statement": " \t ",
                "samples": [{"name": "Film"}]
            }),
        ),
    )
    .await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);
    assert!(err["details"]["problem_statement"].is_array(), "{}", err);

    let (status, err) = send(
        &app,
        post_json(
            "/api/requests/er",
            &json!({
                "requester_id": catalog.researcher,
                "equipment_id": catalog.rheometer,
                "title": "  ",
                "reservation_start": "2030-03-01T08:00:00Z",
                "reservation_end": "2030-03-01T10:00:00Z"
            }),
        ),
    )
    .await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);

    let (status, err) = send(
        &app,
        post_json("/api/locations", &json!({"name": "  "})),
    )
    .await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);

    let (_, listed) = send(&app, get_request("/api/requests")).await;
    assert_eq!(listed["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_inactive_requester_cannot_submit() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    send_ok(
        &app,
        super::common::put_json(
            &format!("/api/users/{}", catalog.researcher),
            &json!({"is_active": false}),
        ),
        StatusCode::OK,
    )
    .await;

    let (status, err) = send(&app, post_json("/api/requests/ntr", &ntr_body(&catalog))).await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_er_overlap_conflicts() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let first = send_ok(
        &app,
        post_json(
            "/api/requests/er",
            &er_body(&catalog, "2030-03-02T10:00:00Z", "2030-03-02T12:00:00Z"),
        ),
        StatusCode::CREATED,
    )
    .await;
    let number = first["request_number"].as_str().unwrap().to_string();
    assert!(number.starts_with("ER-RHE-"), "{}", number);
    assert_eq!(first["equipment_id"], catalog.rheometer.as_str());
    assert_eq!(first["details"]["purpose"], "Frequency sweeps");

    let (status, err) = send(
        &app,
        post_json(
            "/api/requests/er",
            &er_body(&catalog, "2030-03-02T11:00:00Z", "2030-03-02T13:00:00Z"),
        ),
    )
    .await;
    assert_eq!(assert_error(status, &err, StatusCode::CONFLICT), "CONFLICT");
    assert!(err["error"].as_str().unwrap().contains(&number));

    // back-to-back windows are fine
    send_ok(
        &app,
        post_json(
            "/api/requests/er",
            &er_body(&catalog, "2030-03-02T12:00:00Z", "2030-03-02T14:00:00Z"),
        ),
        StatusCode::CREATED,
    )
    .await;

    // a cancelled reservation frees its window
    send_ok(
        &app,
        patch_json(
            &format!("/api/requests/{}/status", id_of(&first)),
            &json!({"status": "cancelled"}),
        ),
        StatusCode::OK,
    )
    .await;
    send_ok(
        &app,
        post_json(
            "/api/requests/er",
            &er_body(&catalog, "2030-03-02T10:30:00Z", "2030-03-02T11:30:00Z"),
        ),
        StatusCode::CREATED,
    )
    .await;
}

#[tokio::test]
async fn test_er_window_and_equipment_rules() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let (status, err) = send(
        &app,
        post_json(
            "/api/requests/er",
            &er_body(&catalog, "2030-03-02T12:00:00Z", "2030-03-02T12:00:00Z"),
        ),
    )
    .await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);

    send_ok(
        &app,
        super::common::put_json(
            &format!("/api/equipment/{}", catalog.rheometer),
            &json!({"status": "maintenance"}),
        ),
        StatusCode::OK,
    )
    .await;
    let (status, err) = send(
        &app,
        post_json(
            "/api/requests/er",
            &er_body(&catalog, "2030-03-02T10:00:00Z", "2030-03-02T12:00:00Z"),
        ),
    )
    .await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_by_id_and_number() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let created = send_ok(
        &app,
        post_json("/api/requests/ntr", &ntr_body(&catalog)),
        StatusCode::CREATED,
    )
    .await;
    let first = &created[0];
    let number = first["request_number"].as_str().unwrap();

    let by_id = send_ok(
        &app,
        get_request(&format!("/api/requests/{}", id_of(first))),
        StatusCode::OK,
    )
    .await;
    assert_eq!(by_id["request_number"], number);
    assert_eq!(by_id["samples"].as_array().unwrap().len(), 3);

    let by_number = send_ok(
        &app,
        get_request(&format!("/api/requests/number/{}", number)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(by_number["id"], first["id"]);

    let (status, err) = send(&app, get_request("/api/requests/number/NTR-XX-0000-0000")).await;
    assert_error(status, &err, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_filters_and_pagination() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    for _ in 0..3 {
        send_ok(
            &app,
            post_json("/api/requests/ntr", &ntr_body(&catalog)),
            StatusCode::CREATED,
        )
        .await;
    }

    let (status, body) = send(&app, get_request("/api/requests?page=2&per_page=4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 6);
    assert_eq!(body["pagination"]["total_pages"], 2);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = send(
        &app,
        get_request(&format!("/api/requests?capability_id={}", catalog.thermal)),
    )
    .await;
    assert_eq!(body["pagination"]["total"], 3);

    let (_, body) = send(&app, get_request("/api/requests?request_type=asr")).await;
    assert_eq!(body["pagination"]["total"], 0);

    let (_, body) = send(&app, get_request("/api/requests?search=NTR-TA")).await;
    assert_eq!(body["pagination"]["total"], 3);

    let (status, err) = send(&app, get_request("/api/requests?per_page=0")).await;
    assert_eq!(
        assert_error(status, &err, StatusCode::BAD_REQUEST),
        "VALIDATION_ERROR"
    );
}

#[tokio::test]
async fn test_status_transitions_and_cascade() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let created = send_ok(
        &app,
        post_json("/api/requests/ntr", &ntr_body(&catalog)),
        StatusCode::CREATED,
    )
    .await;
    let rheology = id_of(&created[0]);
    let thermal = id_of(&created[1]);

    let rejected = send_ok(
        &app,
        patch_json(
            &format!("/api/requests/{}/status", rheology),
            &json!({"status": "rejected"}),
        ),
        StatusCode::OK,
    )
    .await;
    assert_eq!(rejected["status"], "rejected");
    for sample in rejected["samples"].as_array().unwrap() {
        assert_eq!(sample["status"], "rejected");
    }

    // terminal requests stay terminal
    let (status, err) = send(
        &app,
        patch_json(
            &format!("/api/requests/{}/status", rheology),
            &json!({"status": "in_progress"}),
        ),
    )
    .await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);

    // the sibling from the same submission is untouched
    let sibling = send_ok(
        &app,
        get_request(&format!("/api/requests/{}", thermal)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(sibling["status"], "submitted");

    let (status, err) = send(
        &app,
        patch_json(
            &format!("/api/requests/{}/status", thermal),
            &json!({"status": "completed"}),
        ),
    )
    .await;
    assert_error(status, &err, StatusCode::BAD_REQUEST);

    let (status, err) = send(
        &app,
        patch_json(
            &format!("/api/requests/{}/status", thermal),
            &json!({"status": "archived"}),
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
            &format!("/api/requests/{}/status", uuid::Uuid::new_v4()),
            &json!({"status": "in_progress"}),
        ),
    )
    .await;
    assert_error(status, &err, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_request_removes_samples() {
    let (app, _state) = create_test_router().await;
    let catalog = seed_catalog(&app).await;

    let created = send_ok(
        &app,
        post_json("/api/requests/ntr", &ntr_body(&catalog)),
        StatusCode::CREATED,
    )
    .await;
    let id = id_of(&created[0]);

    let deleted = send_ok(
        &app,
        delete_request(&format!("/api/requests/{}", id)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(deleted["id"], id.as_str());

    let (_, samples) = send(&app, get_request(&format!("/api/samples?request_id={}", id))).await;
    assert_eq!(samples["count"], 0);

    let (status, err) = send(&app, get_request(&format!("/api/requests/{}", id))).await;
    assert_error(status, &err, StatusCode::NOT_FOUND);
    let (status, err) = send(&app, delete_request(&format!("/api/requests/{}", id))).await;
    assert_error(status, &err, StatusCode::NOT_FOUND);
}
