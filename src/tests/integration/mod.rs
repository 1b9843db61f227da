//! Integration tests
//!
//! Service-level flows over the scripted gateway, then the same flows through
//! the warp routes.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use warp::http::StatusCode;

use crate::application::services::{CaptureSource, NewSubmission};
use crate::domain::submission::{Category, GatewayStatus, LineItem, SubmissionId};
use crate::infrastructure::http::HttpServer;
use crate::shared::context::CallContext;
use crate::shared::error::AppError;
use crate::tests::common::{fixtures, Harness};

fn submission_request(category: Category, sku: &str, quantity: u32) -> NewSubmission {
    NewSubmission {
        category,
        selections: vec![LineItem { sku: sku.to_string(), quantity }],
        cover_fees: false,
        client_total: None,
    }
}

/// Submission with gateway order ORDER-1 already created
async fn submission_with_order(h: &Harness) -> SubmissionId {
    let receipt = h
        .state
        .submissions
        .create(submission_request(Category::Event, "ticket", 3))
        .await
        .unwrap();
    h.gateway.script_create(Ok(fixtures::order("ORDER-1", "CREATED")));
    let order_id = h
        .state
        .controller
        .create_order(&CallContext::background(), &receipt.submission_id)
        .await
        .unwrap();
    assert_eq!(order_id, "ORDER-1");
    receipt.submission_id
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_submission_to_completed_capture() {
        let h = Harness::new();
        let ctx = CallContext::background();
        let receipt = h
            .state
            .submissions
            .create(submission_request(Category::Event, "ticket", 3))
            .await
            .unwrap();
        assert_eq!(receipt.calculated_amount, dec!(105.00));
        let id = receipt.submission_id.clone();

        h.gateway.script_create(Ok(fixtures::order("ORDER-1", "CREATED")));
        let order_id = h.state.controller.create_order(&ctx, &id).await.unwrap();
        assert_eq!(order_id, "ORDER-1");
        {
            let requests = h.gateway.create_requests.lock().unwrap();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].amount_value, "105.00");
            assert_eq!(requests[0].reference, id.as_str());
        }

        h.gateway
            .script_get(Ok(fixtures::order("ORDER-1", "APPROVED")))
            .script_capture(Ok(fixtures::completed_order("ORDER-1", &id, "CAP123")));
        let result = h.state.controller.capture_order(&ctx, &id, "ORDER-1").await.unwrap();
        assert_eq!(result.status, GatewayStatus::Completed);
        assert_eq!(result.capture_id.as_deref(), Some("CAP123"));
        assert_eq!(result.source, CaptureSource::Captured);

        let row = h.state.store.get_by_id(&id).await.unwrap();
        assert!(row.is_completed());
        assert_eq!(row.capture_id().as_deref(), Some("CAP123"));
        assert_eq!(row.gateway_fee(), Some(dec!(3.35)));
        assert!(row.submitted_at.is_some());
    }

    #[tokio::test]
    async fn test_capture_of_completed_submission_skips_gateway() {
        let h = Harness::new();
        let ctx = CallContext::background();
        let id = submission_with_order(&h).await;
        h.gateway
            .script_get(Ok(fixtures::order("ORDER-1", "APPROVED")))
            .script_capture(Ok(fixtures::completed_order("ORDER-1", &id, "CAP123")));
        h.state.controller.capture_order(&ctx, &id, "ORDER-1").await.unwrap();

        let calls = h.gateway.order_calls();
        let again = h.state.controller.capture_order(&ctx, &id, "ORDER-1").await.unwrap();
        assert_eq!(again.source, CaptureSource::Cached);
        assert_eq!(again.capture_id.as_deref(), Some("CAP123"));

        let order_id = h.state.controller.create_order(&ctx, &id).await.unwrap();
        assert_eq!(order_id, "ORDER-1");
        assert_eq!(h.gateway.order_calls(), calls);
    }

    #[tokio::test]
    async fn test_zero_amount_never_reaches_gateway() {
        let h = Harness::new();
        let receipt = h
            .state
            .submissions
            .create(submission_request(Category::Fundraiser, "free", 1))
            .await
            .unwrap();
        assert_eq!(receipt.calculated_amount, dec!(0));

        let err = h
            .state
            .controller
            .create_order(&CallContext::background(), &receipt.submission_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.gateway.order_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_order_fails_and_allows_new_order() {
        let h = Harness::new();
        let ctx = CallContext::background();
        let id = submission_with_order(&h).await;

        h.gateway.script_get(Ok(fixtures::order("ORDER-1", "CANCELLED")));
        let err = h.state.controller.capture_order(&ctx, &id, "ORDER-1").await.unwrap_err();
        assert!(matches!(err, AppError::OrderNotCapturable { ref status } if status == "CANCELLED"));
        assert_eq!(h.gateway.capture_calls.load(Ordering::SeqCst), 0);

        let row = h.state.store.get_by_id(&id).await.unwrap();
        assert_eq!(row.gateway_status, GatewayStatus::Failed("CANCELLED".into()));
        assert!(row.gateway_order_id.is_none());

        h.gateway.script_create(Ok(fixtures::order("ORDER-2", "CREATED")));
        let order_id = h.state.controller.create_order(&ctx, &id).await.unwrap();
        assert_eq!(order_id, "ORDER-2");
        let row = h.state.store.get_by_id(&id).await.unwrap();
        assert_eq!(row.gateway_status, GatewayStatus::Created);
    }

    #[tokio::test]
    async fn test_concurrent_order_creation_keeps_one_order() {
        let h = Harness::new();
        let receipt = h
            .state
            .submissions
            .create(submission_request(Category::Event, "ticket", 3))
            .await
            .unwrap();
        let id = receipt.submission_id;
        h.gateway
            .script_create(Ok(fixtures::order("ORDER-A", "CREATED")))
            .script_create(Ok(fixtures::order("ORDER-B", "CREATED")));
        *h.gateway.create_barrier.lock().unwrap() = Some(Arc::new(tokio::sync::Barrier::new(2)));

        let ctx = CallContext::background();
        let (first, second) = tokio::join!(
            h.state.controller.create_order(&ctx, &id),
            h.state.controller.create_order(&ctx, &id)
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(h.gateway.create_calls.load(Ordering::SeqCst), 2);
        assert_eq!(first, second);

        let row = h.state.store.get_by_id(&id).await.unwrap();
        assert_eq!(row.gateway_order_id.as_deref(), Some(first.as_str()));
        assert_eq!(row.gateway_status, GatewayStatus::Created);
    }

    #[tokio::test]
    async fn test_transient_capture_failure_retries_with_same_request_id() {
        let h = Harness::new();
        let ctx = CallContext::background();
        let id = submission_with_order(&h).await;

        h.gateway
            .script_get(Ok(fixtures::order("ORDER-1", "CREATED")))
            .script_capture(Err(AppError::Transport("connection reset".into())))
            .script_capture(Ok(fixtures::completed_order("ORDER-1", &id, "CAP123")));
        let result = h.state.controller.capture_order(&ctx, &id, "ORDER-1").await.unwrap();
        assert_eq!(result.source, CaptureSource::Captured);

        let request_ids = h.gateway.capture_request_ids.lock().unwrap().clone();
        assert_eq!(request_ids.len(), 2);
        assert_eq!(request_ids[0], request_ids[1]);
    }

    #[tokio::test]
    async fn test_already_captured_converges_through_recovery() {
        let h = Harness::new();
        let ctx = CallContext::background();
        let id = submission_with_order(&h).await;

        h.gateway
            .script_get(Ok(fixtures::order("ORDER-1", "CREATED")))
            .script_capture(Err(fixtures::already_captured()))
            .script_get(Ok(fixtures::completed_order("ORDER-1", &id, "CAP777")));
        let result = h.state.controller.capture_order(&ctx, &id, "ORDER-1").await.unwrap();
        assert_eq!(result.source, CaptureSource::Recovered);
        assert_eq!(result.capture_id.as_deref(), Some("CAP777"));
        assert!(h.state.store.get_by_id(&id).await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_exhausted_retries_leave_record_untouched() {
        let h = Harness::new();
        let ctx = CallContext::background();
        let id = submission_with_order(&h).await;
        for _ in 0..3 {
            h.gateway.script_get(Err(AppError::Transport("timeout".into())));
            h.gateway.script_capture(Err(AppError::Gateway { status: 503, body: String::new() }));
        }

        let err = h.state.controller.capture_order(&ctx, &id, "ORDER-1").await.unwrap_err();
        assert!(matches!(err, AppError::GatewayUnavailable { attempts: 3, .. }));
        let row = h.state.store.get_by_id(&id).await.unwrap();
        assert_eq!(row.gateway_status, GatewayStatus::Created);
        assert_eq!(row.gateway_order_id.as_deref(), Some("ORDER-1"));
    }

    #[tokio::test]
    async fn test_capture_rejects_foreign_order_id() {
        let h = Harness::new();
        let id = submission_with_order(&h).await;
        let err = h
            .state
            .controller
            .capture_order(&CallContext::background(), &id, "ORDER-9")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.gateway.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_capture() {
        let h = Harness::new();
        let id = submission_with_order(&h).await;
        let (cancel, ctx) = CallContext::cancellable();
        cancel.send(true).unwrap();

        let err = h.state.controller.capture_order(&ctx, &id, "ORDER-1").await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(h.state.store.get_by_id(&id).await.unwrap().gateway_status, GatewayStatus::Created);
    }
}

mod webhooks {
    use super::*;

    async fn deliver(h: &Harness, event: &Value, headers: &warp::http::HeaderMap) -> StatusCode {
        let body = serde_json::to_vec(event).unwrap();
        h.state.webhooks.handle(&CallContext::background(), &body, headers).await
    }

    #[tokio::test]
    async fn test_rejected_signature_writes_nothing() {
        let h = Harness::new();
        let id = submission_with_order(&h).await;
        let writes = h.store.writes();

        h.gateway.script_verify(Ok(false));
        let event = fixtures::capture_event(&id, "CAP1", "COMPLETED");
        assert_eq!(deliver(&h, &event, &fixtures::signature_headers()).await, StatusCode::UNAUTHORIZED);

        h.gateway.script_verify(Err(AppError::Transport("verify endpoint down".into())));
        assert_eq!(deliver(&h, &event, &fixtures::signature_headers()).await, StatusCode::UNAUTHORIZED);

        assert_eq!(h.store.writes(), writes);
        assert_eq!(h.state.store.get_by_id(&id).await.unwrap().gateway_status, GatewayStatus::Created);
    }

    #[tokio::test]
    async fn test_missing_signature_headers_skip_verification() {
        let h = Harness::new();
        let id = submission_with_order(&h).await;
        let event = fixtures::capture_event(&id, "CAP1", "COMPLETED");

        let status = deliver(&h, &event, &warp::http::HeaderMap::new()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(h.gateway.verify_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_webhook_completion_then_no_regress() {
        let h = Harness::new();
        let id = submission_with_order(&h).await;

        h.gateway.script_verify(Ok(true));
        let completed = fixtures::capture_event(&id, "CAP9", "COMPLETED");
        assert_eq!(deliver(&h, &completed, &fixtures::signature_headers()).await, StatusCode::OK);
        let row = h.state.store.get_by_id(&id).await.unwrap();
        assert!(row.is_completed());
        assert_eq!(row.capture_id().as_deref(), Some("CAP9"));

        // the capture call short-circuits on the webhook's result
        let calls = h.gateway.order_calls();
        let result = h
            .state
            .controller
            .capture_order(&CallContext::background(), &id, "ORDER-1")
            .await
            .unwrap();
        assert_eq!(result.source, CaptureSource::Cached);
        assert_eq!(h.gateway.order_calls(), calls);

        h.gateway.script_verify(Ok(true));
        let stale = json!({
            "event_type": "CHECKOUT.ORDER.APPROVED",
            "resource": { "id": "ORDER-1", "status": "APPROVED", "purchase_units": [{ "reference_id": id.as_str() }] }
        });
        assert_eq!(deliver(&h, &stale, &fixtures::signature_headers()).await, StatusCode::OK);
        assert!(h.state.store.get_by_id(&id).await.unwrap().is_completed());

        h.gateway.script_verify(Ok(true));
        let refund = fixtures::capture_event(&id, "CAP9", "PARTIALLY_REFUNDED");
        assert_eq!(deliver(&h, &refund, &fixtures::signature_headers()).await, StatusCode::OK);
        assert_eq!(
            h.state.store.get_by_id(&id).await.unwrap().gateway_status,
            GatewayStatus::PartiallyRefunded
        );
    }

    #[tokio::test]
    async fn test_verification_receives_body_as_delivered() {
        let h = Harness::new();
        let id = submission_with_order(&h).await;

        // whitespace and key order differ from what serde_json would emit
        let body = format!(
            r#"{{ "resource": {{"status": "COMPLETED", "id": "CAP5", "custom_id": "{}", "amount": {{"value": "105.00", "currency_code": "USD"}}}},  "event_type": "PAYMENT.CAPTURE.COMPLETED", "id": "WH-5" }}"#,
            id.as_str()
        );
        h.gateway.script_verify(Ok(true));
        let status = h
            .state
            .webhooks
            .handle(&CallContext::background(), body.as_bytes(), &fixtures::signature_headers())
            .await;
        assert_eq!(status, StatusCode::OK);

        let verified = h.gateway.verified_events.lock().unwrap().clone();
        assert_eq!(verified, vec![body.trim().to_string()]);
        assert!(h.state.store.get_by_id(&id).await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_event_for_superseded_order_is_ignored() {
        let h = Harness::new();
        let ctx = CallContext::background();
        let id = submission_with_order(&h).await;

        h.gateway.script_get(Ok(fixtures::order("ORDER-1", "CANCELLED")));
        h.state.controller.capture_order(&ctx, &id, "ORDER-1").await.unwrap_err();
        h.gateway.script_create(Ok(fixtures::order("ORDER-2", "CREATED")));
        assert_eq!(h.state.controller.create_order(&ctx, &id).await.unwrap(), "ORDER-2");
        let writes = h.store.writes();

        h.gateway.script_verify(Ok(true));
        let stale = json!({
            "event_type": "CHECKOUT.ORDER.APPROVED",
            "resource": { "id": "ORDER-1", "status": "APPROVED", "purchase_units": [{ "reference_id": id.as_str() }] }
        });
        assert_eq!(deliver(&h, &stale, &fixtures::signature_headers()).await, StatusCode::OK);

        h.gateway.script_verify(Ok(true));
        let mut old_capture = fixtures::capture_event(&id, "CAP1", "DECLINED");
        old_capture["resource"]["supplementary_data"] = json!({ "related_ids": { "order_id": "ORDER-1" } });
        assert_eq!(deliver(&h, &old_capture, &fixtures::signature_headers()).await, StatusCode::OK);

        assert_eq!(h.store.writes(), writes);
        let row = h.state.store.get_by_id(&id).await.unwrap();
        assert_eq!(row.gateway_order_id.as_deref(), Some("ORDER-2"));
        assert_eq!(row.gateway_status, GatewayStatus::Created);

        h.gateway.script_verify(Ok(true));
        let mut current = fixtures::capture_event(&id, "CAP2", "COMPLETED");
        current["resource"]["supplementary_data"] = json!({ "related_ids": { "order_id": "ORDER-2" } });
        assert_eq!(deliver(&h, &current, &fixtures::signature_headers()).await, StatusCode::OK);
        assert!(h.state.store.get_by_id(&id).await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_store_failure_asks_for_redelivery() {
        let h = Harness::new();
        let id = submission_with_order(&h).await;
        h.store.fail_updates.store(true, Ordering::SeqCst);

        h.gateway.script_verify(Ok(true));
        let event = fixtures::capture_event(&id, "CAP1", "COMPLETED");
        assert_eq!(
            deliver(&h, &event, &fixtures::signature_headers()).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );

        h.store.fail_updates.store(false, Ordering::SeqCst);
        h.gateway.script_verify(Ok(true));
        assert_eq!(deliver(&h, &event, &fixtures::signature_headers()).await, StatusCode::OK);
        assert!(h.state.store.get_by_id(&id).await.unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_unrelated_and_malformed_events() {
        let h = Harness::new();

        h.gateway.script_verify(Ok(true));
        let unrelated = json!({ "event_type": "BILLING.PLAN.CREATED", "resource": { "id": "P-1" } });
        assert_eq!(deliver(&h, &unrelated, &fixtures::signature_headers()).await, StatusCode::OK);

        h.gateway.script_verify(Ok(true));
        let unknown = fixtures::capture_event(&SubmissionId::parse("event-2025-01-01-ghost").unwrap(), "CAP1", "COMPLETED");
        assert_eq!(deliver(&h, &unknown, &fixtures::signature_headers()).await, StatusCode::OK);

        let status = h
            .state
            .webhooks
            .handle(&CallContext::background(), b"{not json", &fixtures::signature_headers())
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod routes {
    use super::*;

    fn body(response: &warp::http::Response<bytes::Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    /// Create a submission over HTTP; returns its id and access token
    async fn create_over_http(h: &Harness) -> (String, String) {
        let routes = HttpServer::with_state(h.state.clone()).routes();
        let response = warp::test::request()
            .method("POST")
            .path("/payments/submissions")
            .json(&json!({
                "category": "event",
                "selections": [{ "sku": "ticket", "quantity": 3 }],
                "coverFees": false,
                "clientTotal": "1.00"
            }))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let receipt = body(&response);
        assert_eq!(receipt["calculated_amount"], "105.00");
        (
            receipt["submission_id"].as_str().unwrap().to_string(),
            receipt["access_token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_order_capture_and_status_over_http() {
        let h = Harness::new();
        let routes = HttpServer::with_state(h.state.clone()).routes();
        let (id, token) = create_over_http(&h).await;
        let submission_id = SubmissionId::parse(&id).unwrap();

        h.gateway.script_create(Ok(fixtures::order("ORDER-1", "CREATED")));
        let response = warp::test::request()
            .method("POST")
            .path(&format!("/payments/{}/order", id))
            .header("x-access-token", &token)
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["order_id"], "ORDER-1");

        h.gateway
            .script_get(Ok(fixtures::order("ORDER-1", "APPROVED")))
            .script_capture(Ok(fixtures::completed_order("ORDER-1", &submission_id, "CAP123")));
        let response = warp::test::request()
            .method("POST")
            .path(&format!("/payments/{}/capture", id))
            .header("x-access-token", &token)
            .json(&json!({ "order_id": "ORDER-1" }))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let captured = body(&response);
        assert_eq!(captured["status"], "COMPLETED");
        assert_eq!(captured["capture_id"], "CAP123");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");

        // the token was consumed by the successful capture
        let response = warp::test::request()
            .method("POST")
            .path(&format!("/payments/{}/capture", id))
            .header("x-access-token", &token)
            .json(&json!({ "order_id": "ORDER-1" }))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = warp::test::request()
            .path(&format!("/payments/{}", id))
            .header("x-access-token", &token)
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let view = body(&response);
        assert_eq!(view["gateway_status"], "COMPLETED");
        assert_eq!(view["capture_id"], "CAP123");
        assert!(view.get("gateway_detail").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_captures_admit_one_holder() {
        let h = Harness::new();
        let routes = HttpServer::with_state(h.state.clone()).routes();
        let (id, token) = create_over_http(&h).await;
        let submission_id = SubmissionId::parse(&id).unwrap();
        h.gateway.script_create(Ok(fixtures::order("ORDER-1", "CREATED")));
        h.state
            .controller
            .create_order(&CallContext::background(), &submission_id)
            .await
            .unwrap();
        h.gateway
            .script_get(Ok(fixtures::order("ORDER-1", "APPROVED")))
            .script_capture(Ok(fixtures::completed_order("ORDER-1", &submission_id, "CAP123")));

        let path = format!("/payments/{}/capture", id);
        let capture = || {
            warp::test::request()
                .method("POST")
                .path(&path)
                .header("x-access-token", &token)
                .json(&json!({ "order_id": "ORDER-1" }))
                .reply(&routes)
        };
        let (first, second) = tokio::join!(capture(), capture());

        let mut statuses = vec![first.status(), second.status()];
        statuses.sort();
        assert_eq!(statuses, vec![StatusCode::OK, StatusCode::FORBIDDEN]);
        assert_eq!(h.gateway.capture_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_access_rules() {
        let h = Harness::new();
        let routes = HttpServer::with_state(h.state.clone()).routes();
        let (id, token) = create_over_http(&h).await;
        let (other_id, _) = create_over_http(&h).await;

        let response = warp::test::request().path(&format!("/payments/{}", id)).reply(&routes).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = warp::test::request()
            .path(&format!("/payments/{}", other_id))
            .header("x-access-token", &token)
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/payments/{}/recover", id))
            .header("x-access-token", &token)
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = warp::test::request()
            .path("/payments/not-a-submission")
            .header("x-access-token", &token)
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_recovery_over_http() {
        let h = Harness::new();
        let routes = HttpServer::with_state(h.state.clone()).routes();
        let (id, _) = create_over_http(&h).await;
        let submission_id = SubmissionId::parse(&id).unwrap();
        h.gateway.script_create(Ok(fixtures::order("ORDER-1", "CREATED")));
        h.state
            .controller
            .create_order(&CallContext::background(), &submission_id)
            .await
            .unwrap();

        h.gateway
            .script_get(Ok(fixtures::completed_order("ORDER-1", &submission_id, "CAP555")));
        let admin = h.state.tokens.generate_admin_at(Utc::now()).unwrap();
        let response = warp::test::request()
            .method("POST")
            .path(&format!("/payments/{}/recover", id))
            .header("authorization", format!("Bearer {}", admin))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let outcome = body(&response);
        assert_eq!(outcome["branch"], "completed");
        assert_eq!(outcome["submission"]["capture_id"], "CAP555");
        assert!(outcome["submission"]["gateway_detail"].is_object());
    }

    #[tokio::test]
    async fn test_webhook_route_requires_signature() {
        let h = Harness::new();
        let routes = HttpServer::with_state(h.state.clone()).routes();
        let response = warp::test::request()
            .method("POST")
            .path("/webhooks/gateway")
            .body(r#"{"event_type":"PAYMENT.CAPTURE.COMPLETED","resource":{}}"#)
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.body().is_empty());
    }

    #[tokio::test]
    async fn test_health_metrics_and_unknown_routes() {
        let h = Harness::new();
        let routes = HttpServer::with_state(h.state.clone()).routes();

        let response = warp::test::request().path("/health").reply(&routes).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response)["status"], "ok");
        assert!(response.headers().contains_key("content-security-policy"));

        let response = warp::test::request().path("/metrics").reply(&routes).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"].to_str().unwrap().starts_with("text/plain"));

        let response = warp::test::request().path("/nowhere").reply(&routes).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(&response)["error"], "not_found");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let h = Harness::new();
        let routes = HttpServer::with_state(h.state.clone()).routes();
        let padding = "x".repeat(h.state.config.server.max_request_size + 1);
        let response = warp::test::request()
            .method("POST")
            .path("/payments/submissions")
            .header("content-type", "application/json")
            .body(format!(r#"{{"category":"event","pad":"{}"}}"#, padding))
            .reply(&routes)
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
