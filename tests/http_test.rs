mod common;

use {
    axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    },
    chrono::Utc,
    common::*,
    ticket_sync::{
        adapters::http::router,
        domain::{gateway::GatewayPaymentStatus, id::ExternalReference, intent::IntentStatus},
    },
    tower::ServiceExt,
};

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, body)
}

fn callback_request(payment_id: &str, signature: Option<String>) -> Request<Body> {
    let body = serde_json::json!({
        "type": "payment",
        "action": "payment.updated",
        "live_mode": true,
        "data": { "id": payment_id },
    });
    let mut builder = Request::post(format!("/webhooks/gateway?data.id={payment_id}&type=payment"))
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-request-id", "req-42");
    if let Some(signature) = signature {
        builder = builder.header("x-signature", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn signed(payment_id: &str) -> Option<String> {
    Some(signature_header(payment_id, "req-42", Utc::now().timestamp()))
}

async fn approved_setup(h: &Harness) -> ExternalReference {
    let event = h.seed_event(1000, 5).await;
    let intent = h.pending_intent(&event, 2).await;
    h.gateway.put_payment(payment(
        "777",
        &intent.external_reference,
        GatewayPaymentStatus::Approved,
        intent.total_amount,
    ));
    intent.external_reference
}

// ── webhook ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn signed_callback_completes_intent() {
    let h = Harness::new();
    let reference = approved_setup(&h).await;

    let (status, body) = send(router(h.app_state()), callback_request("777", signed("777"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(h.intent(&reference).await.status, IntentStatus::Completed);

    // Redelivery is acknowledged without a second batch.
    let (status, body) = send(router(h.app_state()), callback_request("777", signed("777"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "duplicate");
    assert_eq!(h.tickets(&reference).await.len(), 2);
}

#[tokio::test]
async fn bad_signature_is_rejected_without_state_change() {
    let h = Harness::new();
    let reference = approved_setup(&h).await;

    let forged = Some(format!("ts={},v1={}", Utc::now().timestamp(), "00".repeat(32)));
    let (status, body) = send(router(h.app_state()), callback_request("777", forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "unauthorized");

    let (status, _) = send(router(h.app_state()), callback_request("777", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(h.intent(&reference).await.status, IntentStatus::Pending);
    assert_eq!(h.store.ticket_count().await, 0);
}

#[tokio::test]
async fn stale_signature_is_rejected() {
    let h = Harness::new();
    let reference = approved_setup(&h).await;

    let old = Some(signature_header("777", "req-42", Utc::now().timestamp() - 3600));
    let (status, _) = send(router(h.app_state()), callback_request("777", old)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.intent(&reference).await.status, IntentStatus::Pending);
}

#[tokio::test]
async fn out_of_range_signature_timestamp_is_rejected() {
    let h = Harness::new();
    let reference = approved_setup(&h).await;

    let header = Some(format!("ts={},v1={}", i64::MIN, "00".repeat(32)));
    let (status, body) = send(router(h.app_state()), callback_request("777", header)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "unauthorized");
    assert_eq!(h.intent(&reference).await.status, IntentStatus::Pending);
}

#[tokio::test]
async fn signature_for_another_resource_is_rejected() {
    let h = Harness::new();
    approved_setup(&h).await;
    let (status, _) = send(router(h.app_state()), callback_request("777", signed("778"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn gateway_test_notification_is_acknowledged() {
    let h = Harness::new();
    let body = serde_json::json!({
        "type": "payment",
        "live_mode": false,
        "data": { "id": "123456" },
    });
    let request = Request::post("/webhooks/gateway")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, body) = send(router(h.app_state()), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "test_notification");
    assert_eq!(h.gateway.fetches.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_callback_is_bad_request() {
    let h = Harness::new();
    let request = Request::post("/webhooks/gateway")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"type\": \"payment\""))
        .unwrap();
    let (status, body) = send(router(h.app_state()), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "malformed_payload");
}

#[tokio::test]
async fn unknown_reference_is_acknowledged_over_http() {
    let h = Harness::new();
    h.gateway.put_payment(payment(
        "888",
        &ExternalReference::generate(),
        GatewayPaymentStatus::Approved,
        ticket_sync::domain::money::MoneyAmount::new(500).unwrap(),
    ));
    let (status, body) = send(router(h.app_state()), callback_request("888", signed("888"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unknown_reference");
}

#[tokio::test]
async fn gateway_outage_asks_for_redelivery() {
    let h = Harness::new();
    let reference = approved_setup(&h).await;
    h.gateway.set_unavailable(true);

    let (status, body) = send(router(h.app_state()), callback_request("777", signed("777"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error_code"], "gateway_unavailable");
    assert_eq!(h.intent(&reference).await.status, IntentStatus::Pending);
}

// ── checkout and status ────────────────────────────────────────────────────

#[tokio::test]
async fn checkout_then_poll_status_and_tickets() {
    let h = Harness::new();
    let event = h.seed_event(1200, 5).await;
    let body = serde_json::json!({
        "event_id": event.id,
        "requested_quantity": 1,
        "attendees": [{
            "name": "Ana Perez",
            "email": "ana@example.com",
            "national_id": "30111222",
        }],
    });
    let request = Request::post("/checkouts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, created) = send(router(h.app_state()), request).await;
    assert_eq!(status, StatusCode::CREATED);
    let reference = created["external_reference"].as_str().unwrap().to_string();
    assert!(created["redirect_url"].as_str().unwrap().starts_with("https://gateway.example.com"));

    let status_uri = format!("/checkouts/{reference}");
    let (status, view) = send(router(h.app_state()), Request::get(&status_uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "pending");
    assert_eq!(view["total_amount"], 1200);

    let tickets_uri = format!("/checkouts/{reference}/tickets");
    let (_, tickets) = send(router(h.app_state()), Request::get(&tickets_uri).body(Body::empty()).unwrap()).await;
    assert_eq!(tickets, serde_json::json!([]));

    let reference = ExternalReference::new(reference).unwrap();
    h.gateway.put_payment(payment("999", &reference, GatewayPaymentStatus::Approved, h.intent(&reference).await.total_amount));
    let (status, _) = send(router(h.app_state()), callback_request("999", signed("999"))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, view) = send(router(h.app_state()), Request::get(&status_uri).body(Body::empty()).unwrap()).await;
    assert_eq!(view["status"], "completed");
    assert_eq!(view["tickets_issued"], 1);
    assert_eq!(view["gateway_status"], "approved");

    let (_, tickets) = send(router(h.app_state()), Request::get(&tickets_uri).body(Body::empty()).unwrap()).await;
    assert_eq!(tickets.as_array().unwrap().len(), 1);
    assert_eq!(tickets[0]["attendee"]["name"], "Ana Perez");
    assert_eq!(tickets[0]["status"], "active");
}

#[tokio::test]
async fn checkout_validation_errors_are_unprocessable() {
    let h = Harness::new();
    let event = h.seed_event(1200, 5).await;
    let body = serde_json::json!({
        "event_id": event.id,
        "requested_quantity": 2,
        "attendees": [{ "name": "Ana", "email": "ana@example.com", "national_id": "1" }],
    });
    let request = Request::post("/checkouts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = send(router(h.app_state()), request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error_code"], "validation_error");
}

#[tokio::test]
async fn non_positive_quantity_is_unprocessable() {
    let h = Harness::new();
    let event = h.seed_event(1200, 5).await;
    for quantity in [0, -2] {
        let body = serde_json::json!({
            "event_id": event.id,
            "requested_quantity": quantity,
            "attendees": [],
        });
        let request = Request::post("/checkouts")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, body) = send(router(h.app_state()), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{quantity}");
        assert_eq!(body["error_code"], "validation_error");
    }
    assert!(h.gateway.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_reference_status_is_not_found() {
    let h = Harness::new();
    for uri in [
        format!("/checkouts/{}", ExternalReference::generate()),
        "/checkouts/not-a-reference".to_string(),
    ] {
        let (status, _) = send(router(h.app_state()), Request::get(&uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
}

// ── ticket lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn redeem_once_then_refuse_second_scan() {
    let h = Harness::new();
    let reference = approved_setup(&h).await;
    send(router(h.app_state()), callback_request("777", signed("777"))).await;
    let code = h.tickets(&reference).await[0].ticket_code.clone();

    let uri = format!("/tickets/{code}/redeem");
    let (status, body) = send(router(h.app_state()), Request::post(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "used");

    let (status, _) = send(router(h.app_state()), Request::post(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn admin_cancel_requires_token() {
    let h = Harness::new();
    let reference = approved_setup(&h).await;
    send(router(h.app_state()), callback_request("777", signed("777"))).await;
    let code = h.tickets(&reference).await[1].ticket_code.clone();
    let uri = format!("/admin/tickets/{code}/cancel");

    let (status, _) = send(router(h.app_state()), Request::post(&uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::post(&uri)
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(router(h.app_state()), wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A prefix of the real token has a different length and must not match.
    let prefix = Request::post(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", &ADMIN_TOKEN[..ADMIN_TOKEN.len() - 1]))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(router(h.app_state()), prefix).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let ok = Request::post(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(router(h.app_state()), ok).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let audit = h.store.audit_entries(code.as_str()).await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, "ticket_cancelled");
    assert_eq!(audit[0].actor, "admin");
}

#[tokio::test]
async fn health_check_answers_ok() {
    let h = Harness::new();
    let response = router(h.app_state())
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
