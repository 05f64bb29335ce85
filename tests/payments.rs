//! End-to-end purchase flow tests: initialize, verify, zero-cost bypass,
//! and the capacity and duplicate-purchase guards on the initialize endpoint.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::*;

#[tokio::test]
async fn test_initialize_opens_pending_payment_with_checkout() {
    let (state, _) = create_test_app_state();
    let (event_id, buyer_key) = {
        let conn = state.db.get().unwrap();
        let (organizer, _) = create_test_user(&conn, "org@test.com");
        let (_, buyer_key) = create_test_user(&conn, "buyer@test.com");
        let event = create_test_event(&conn, &organizer.id, 5000, 10);
        (event.id, buyer_key)
    };

    let app = test_app(state.clone());
    let response = app
        .oneshot(request(
            "POST",
            "/payments/initialize",
            Some(&buyer_key),
            Some(json!({ "event_id": event_id })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["amount_cents"], 5000);
    assert!(body["checkout"]["authorization_url"]
        .as_str()
        .unwrap()
        .starts_with("https://checkout.test/"));
    assert!(body.get("ticket").is_none());

    // Ledger row exists and no slot is consumed yet
    let conn = state.db.get().unwrap();
    let reference = body["reference"].as_str().unwrap();
    let payment = queries::get_payment_by_reference(&conn, reference)
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    let event = queries::get_event_by_id(&conn, &event_id).unwrap().unwrap();
    assert_eq!(event.sold_count, 0);
}

#[tokio::test]
async fn test_verify_confirms_and_issues_ticket() {
    let (state, gateway) = create_test_app_state();
    let (event_id, buyer_key) = {
        let conn = state.db.get().unwrap();
        let (organizer, _) = create_test_user(&conn, "org@test.com");
        let (_, buyer_key) = create_test_user(&conn, "buyer@test.com");
        let event = create_test_event(&conn, &organizer.id, 5000, 10);
        (event.id, buyer_key)
    };

    let app = test_app(state.clone());
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/payments/initialize",
            Some(&buyer_key),
            Some(json!({ "event_id": event_id })),
        ))
        .await
        .unwrap();
    let body = response_json(response).await;
    let reference = body["reference"].as_str().unwrap().to_string();

    // Buyer completed checkout
    gateway.set_charge(success_charge(&reference, 5000));

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/payments/verify/{}", reference),
            Some(&buyer_key),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["payment"]["status"], "success");
    assert_eq!(body["ticket"]["status"], "active");

    // Polling again answers from the ledger, same ticket
    let ticket_id = body["ticket"]["id"].as_str().unwrap().to_string();
    let response = app
        .oneshot(request(
            "GET",
            &format!("/payments/verify/{}", reference),
            Some(&buyer_key),
            None,
        ))
        .await
        .unwrap();
    let body = response_json(response).await;
    assert_eq!(body["ticket"]["id"], ticket_id.as_str());
}

#[tokio::test]
async fn test_verify_by_other_buyer_is_forbidden() {
    let (state, _) = create_test_app_state();
    let (reference, other_key) = {
        let conn = state.db.get().unwrap();
        let (organizer, _) = create_test_user(&conn, "org@test.com");
        let (buyer, _) = create_test_user(&conn, "buyer@test.com");
        let (_, other_key) = create_test_user(&conn, "other@test.com");
        let event = create_test_event(&conn, &organizer.id, 5000, 10);
        let payment = create_pending_payment(&conn, &buyer.id, &event.id, None, 5000);
        (payment.reference, other_key)
    };

    let app = test_app(state);
    let response = app
        .oneshot(request(
            "GET",
            &format!("/payments/verify/{}", reference),
            Some(&other_key),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_free_event_issues_ticket_without_gateway() {
    let (state, _) = create_test_app_state();
    let (event_id, buyer_key) = {
        let conn = state.db.get().unwrap();
        let (organizer, _) = create_test_user(&conn, "org@test.com");
        let (_, buyer_key) = create_test_user(&conn, "buyer@test.com");
        let event = create_test_event(&conn, &organizer.id, 0, 10);
        (event.id, buyer_key)
    };

    let app = test_app(state.clone());
    let response = app
        .oneshot(request(
            "POST",
            "/payments/initialize",
            Some(&buyer_key),
            Some(json!({ "event_id": event_id })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["amount_cents"], 0);
    assert!(body.get("checkout").is_none());
    assert_eq!(body["ticket"]["status"], "active");

    let conn = state.db.get().unwrap();
    let event = queries::get_event_by_id(&conn, &event_id).unwrap().unwrap();
    assert_eq!(event.sold_count, 1);
}

#[tokio::test]
async fn test_full_discount_takes_zero_cost_path() {
    let (state, _) = create_test_app_state();
    let (event_id, buyer_key, promo_id) = {
        let conn = state.db.get().unwrap();
        let (organizer, _) = create_test_user(&conn, "org@test.com");
        let (_, buyer_key) = create_test_user(&conn, "buyer@test.com");
        let event = create_test_event(&conn, &organizer.id, 5000, 10);
        let promo = create_test_promo(
            &conn,
            &organizer.id,
            "COMPED",
            DiscountType::Percentage,
            100,
            None,
        );
        (event.id, buyer_key, promo.id)
    };

    let app = test_app(state.clone());
    let response = app
        .oneshot(request(
            "POST",
            "/payments/initialize",
            Some(&buyer_key),
            Some(json!({ "event_id": event_id, "promo_code": "comped" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["discount_cents"], 5000);
    assert!(body["ticket"].is_object());

    let conn = state.db.get().unwrap();
    let promo = queries::get_promo_code_by_id(&conn, &promo_id)
        .unwrap()
        .unwrap();
    assert_eq!(promo.used_count, 1);
}

#[tokio::test]
async fn test_promo_discount_reflected_in_quote() {
    let (state, _) = create_test_app_state();
    let (event_id, buyer_key) = {
        let conn = state.db.get().unwrap();
        let (organizer, _) = create_test_user(&conn, "org@test.com");
        let (_, buyer_key) = create_test_user(&conn, "buyer@test.com");
        let event = create_test_event(&conn, &organizer.id, 5000, 10);
        create_test_promo(
            &conn,
            &organizer.id,
            "LAUNCH20",
            DiscountType::Percentage,
            20,
            Some(10),
        );
        (event.id, buyer_key)
    };

    let app = test_app(state);
    let response = app
        .oneshot(request(
            "POST",
            "/payments/initialize",
            Some(&buyer_key),
            Some(json!({ "event_id": event_id, "promo_code": "LAUNCH20" })),
        ))
        .await
        .unwrap();

    let body = response_json(response).await;
    assert_eq!(body["amount_cents"], 4000);
    assert_eq!(body["discount_cents"], 1000);
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn test_sold_out_event_rejects_initialize() {
    let (state, _) = create_test_app_state();
    let (event_id, buyer_key) = {
        let conn = state.db.get().unwrap();
        let (organizer, _) = create_test_user(&conn, "org@test.com");
        let (_, buyer_key) = create_test_user(&conn, "buyer@test.com");
        let event = create_test_event(&conn, &organizer.id, 5000, 1);
        queries::reserve_slot(&conn, &event.id, None).unwrap();
        (event.id, buyer_key)
    };

    let app = test_app(state);
    let response = app
        .oneshot(request(
            "POST",
            "/payments/initialize",
            Some(&buyer_key),
            Some(json!({ "event_id": event_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_second_purchase_for_same_event_rejected() {
    let (state, _) = create_test_app_state();
    let key = test_scan_key();
    let (event_id, buyer_key) = {
        let mut conn = state.db.get().unwrap();
        let (organizer, _) = create_test_user(&conn, "org@test.com");
        let (buyer, buyer_key) = create_test_user(&conn, "buyer@test.com");
        let event = create_test_event(&conn, &organizer.id, 5000, 10);
        let payment = create_pending_payment(&conn, &buyer.id, &event.id, None, 5000);
        finalize_payment(&mut conn, &key, &success_charge(&payment.reference, 5000)).unwrap();
        (event.id, buyer_key)
    };

    let app = test_app(state);
    let response = app
        .oneshot(request(
            "POST",
            "/payments/initialize",
            Some(&buyer_key),
            Some(json!({ "event_id": event_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_unknown_at_gateway_is_bad_request() {
    let (state, _) = create_test_app_state();
    let (reference, buyer_key) = {
        let conn = state.db.get().unwrap();
        let (organizer, _) = create_test_user(&conn, "org@test.com");
        let (buyer, buyer_key) = create_test_user(&conn, "buyer@test.com");
        let event = create_test_event(&conn, &organizer.id, 5000, 10);
        let payment = create_pending_payment(&conn, &buyer.id, &event.id, None, 5000);
        (payment.reference, buyer_key)
    };

    // The gateway was never told about this charge; its 404 must not read
    // as one of our entities being missing
    let app = test_app(state.clone());
    let response = app
        .oneshot(request(
            "GET",
            &format!("/payments/verify/{}", reference),
            Some(&buyer_key),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The payment stays pending, confirmable once the gateway knows it
    let conn = state.db.get().unwrap();
    let payment = queries::get_payment_by_reference(&conn, &reference)
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_tiered_event_requires_a_tier() {
    let (state, _) = create_test_app_state();
    let (event_id, tier_id, buyer_key) = {
        let conn = state.db.get().unwrap();
        let (organizer, _) = create_test_user(&conn, "org@test.com");
        let (_, buyer_key) = create_test_user(&conn, "buyer@test.com");
        let event = create_test_event(&conn, &organizer.id, 5000, 100);
        let tier = create_test_tier(&conn, &event.id, "GA", 3000, 10);
        (event.id, tier.id, buyer_key)
    };

    let app = test_app(state);

    // No tier on a tiered event
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/payments/initialize",
            Some(&buyer_key),
            Some(json!({ "event_id": event_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Tier price wins over the event price
    let response = app
        .oneshot(request(
            "POST",
            "/payments/initialize",
            Some(&buyer_key),
            Some(json!({ "event_id": event_id, "ticket_type_id": tier_id })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["amount_cents"], 3000);
}

#[tokio::test]
async fn test_initialize_requires_auth() {
    let (state, _) = create_test_app_state();
    let app = test_app(state);

    let response = app
        .oneshot(request(
            "POST",
            "/payments/initialize",
            None,
            Some(json!({ "event_id": "bx_evt_0" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
