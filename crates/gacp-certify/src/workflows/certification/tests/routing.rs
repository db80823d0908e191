use super::common::*;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::workflows::certification::domain::{ApplicationStatus, PaymentPhase};
use crate::workflows::certification::store::WorkflowStore;

fn draft_request_body() -> Value {
    json!({
        "applicant": {
            "type": "INDIVIDUAL",
            "id_card": "1100501234567",
            "first_name": "Somchai",
            "last_name": "Srisuk",
            "phone": "0812345678",
        },
        "form": {
            "site": {
                "farm_name": "Baan Rai Herbs",
                "province": "Chiang Mai",
                "district": "Mae Rim",
            },
        },
    })
}

#[tokio::test]
async fn missing_identity_headers_are_unauthorized() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/certification/applications")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn draft_creation_round_trips() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    // The legacy FARMER role label still maps to the applicant role.
    let response = router
        .oneshot(
            Request::post("/api/v1/certification/applications")
                .header("x-actor-id", "farmer-1")
                .header("x-actor-role", "FARMER")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&draft_request_body()).expect("serializes"),
                ))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status"), Some(&json!("DRAFT")));
    assert_eq!(
        payload.pointer("/phase1/amount"),
        Some(&json!(5_000)),
        "fee quote rides along in the view"
    );
    assert!(payload.get("application_id").is_some());
}

#[tokio::test]
async fn premature_payment_maps_to_bad_request() {
    let (service, store, _) = build_service();
    let record = service
        .create_draft(&applicant(), individual_profile(), form())
        .expect("draft created");
    let router = router_with_service(service);

    let response = router
        .oneshot(
            Request::post(format!(
                "/api/v1/certification/applications/{}/payments/1",
                record.id
            ))
            .header("x-actor-id", "farmer-1")
            .header("x-actor-role", "APPLICANT")
            .body(Body::empty())
            .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.transaction_count(), 0);
}

#[tokio::test]
async fn unknown_phase_number_maps_to_bad_request() {
    let (service, _, _) = build_service();
    let record = service
        .create_draft(&applicant(), individual_profile(), form())
        .expect("draft created");
    let router = router_with_service(service);

    let response = router
        .oneshot(
            Request::post(format!(
                "/api/v1/certification/applications/{}/payments/9",
                record.id
            ))
            .header("x-actor-id", "farmer-1")
            .header("x-actor-role", "APPLICANT")
            .body(Body::empty())
            .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn foreign_applications_map_to_forbidden() {
    let (service, _, _) = build_service();
    let record = service
        .create_draft(&applicant(), individual_profile(), form())
        .expect("draft created");
    let router = router_with_service(service);

    let response = router
        .oneshot(
            Request::post(format!(
                "/api/v1/certification/applications/{}/confirm-review",
                record.id
            ))
            .header("x-actor-id", "farmer-2")
            .header("x-actor-role", "APPLICANT")
            .body(Body::empty())
            .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_applications_map_to_not_found() {
    let (service, _, _) = build_service();
    let router = router_with_service(service);

    let response = router
        .oneshot(
            Request::get("/api/v1/certification/applications/app-missing")
                .header("x-actor-id", "officer-1")
                .header("x-actor-role", "OFFICER")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_settles_without_identity_headers() {
    let (service, store, _) = build_service();
    let record = draft_ready_for_payment(&service);
    let initiation = service
        .initiate_payment(&applicant(), &record.id, PaymentPhase::Phase1)
        .expect("order opened");
    let order = external_order_of(&store, &initiation);
    let router = router_with_service(service);

    let response = router
        .oneshot(
            Request::post("/api/v1/certification/payments/webhook")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::to_vec(&paid_webhook(&order)).expect("serializes"),
                ))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("result"), Some(&json!("SUCCESS")));
    assert_eq!(payload.get("outcome"), Some(&json!("confirmed")));

    let stored = store
        .fetch_application(&record.id)
        .expect("fetch succeeds")
        .expect("record present");
    assert_eq!(stored.status, ApplicationStatus::Submitted);
}

#[tokio::test]
async fn forged_webhook_maps_to_bad_request() {
    let (service, store, _) = build_service();
    let record = draft_ready_for_payment(&service);
    let initiation = service
        .initiate_payment(&applicant(), &record.id, PaymentPhase::Phase1)
        .expect("order opened");
    let order = external_order_of(&store, &initiation);
    let router = router_with_service(service);

    let mut payload = paid_webhook(&order);
    payload.signature = "0000".to_string();
    let response = router
        .oneshot(
            Request::post("/api/v1/certification/payments/webhook")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&payload).expect("serializes")))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body.get("result"), Some(&json!("FAIL")));
}

#[tokio::test]
async fn status_override_parses_wire_labels() {
    let (service, _, _) = build_service();
    let record = service
        .create_draft(&applicant(), individual_profile(), form())
        .expect("draft created");
    let router = router_with_service(service);

    let response = router
        .clone()
        .oneshot(
            Request::patch(format!(
                "/api/v1/certification/applications/{}/status",
                record.id
            ))
            .header("x-actor-id", "admin-1")
            .header("x-actor-role", "ADMIN")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({ "status": "review_pending" })).expect("serializes"),
            ))
            .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status"), Some(&json!("REVIEW_PENDING")));

    let response = router
        .oneshot(
            Request::patch(format!(
                "/api/v1/certification/applications/{}/status",
                record.id
            ))
            .header("x-actor-id", "admin-1")
            .header("x-actor-role", "ADMIN")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({ "status": "NOT_A_STATUS" })).expect("serializes"),
            ))
            .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
