//! Surface-level API tests: registration, event setup, and the availability
//! endpoint.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::*;

#[tokio::test]
async fn test_register_returns_api_key_once() {
    let (state, _) = create_test_app_state();
    let app = test_app(state.clone());

    let response = app
        .oneshot(request(
            "POST",
            "/users",
            None,
            Some(json!({ "email": "new@test.com", "name": "New User" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let api_key = body["api_key"].as_str().unwrap();
    assert!(api_key.starts_with("bx_"));
    // The hash never leaves the server
    assert!(body["user"].get("api_key_hash").is_none());

    // The returned key authenticates
    let conn = state.db.get().unwrap();
    let user = queries::get_user_by_api_key(&conn, api_key).unwrap().unwrap();
    assert_eq!(user.email, "new@test.com");
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let (state, _) = create_test_app_state();
    let app = test_app(state);

    let body = json!({ "email": "dup@test.com", "name": "First" });
    let first = app
        .clone()
        .oneshot(request("POST", "/users", None, Some(body.clone())))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(request("POST", "/users", None, Some(body)))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_rejects_invalid_email() {
    let (state, _) = create_test_app_state();
    let app = test_app(state);

    let response = app
        .oneshot(request(
            "POST",
            "/users",
            None,
            Some(json!({ "email": "not-an-email", "name": "X" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_event_and_availability() {
    let (state, _) = create_test_app_state();
    let organizer_key = {
        let conn = state.db.get().unwrap();
        let (_, key) = create_test_user(&conn, "org@test.com");
        key
    };

    let app = test_app(state);
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/events",
            Some(&organizer_key),
            Some(json!({
                "title": "Launch Party",
                "price_cents": 2500,
                "capacity": 50,
                "starts_at": now() + 86400
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let event = response_json(response).await;
    let event_id = event["id"].as_str().unwrap();

    let response = app
        .oneshot(request(
            "GET",
            &format!("/events/{}/availability", event_id),
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["capacity"], 50);
    assert_eq!(body["remaining"], 50);
    assert_eq!(body["sold_out"], false);
}

#[tokio::test]
async fn test_availability_unknown_event_is_not_found() {
    let (state, _) = create_test_app_state();
    let app = test_app(state);

    let response = app
        .oneshot(request(
            "GET",
            "/events/bx_evt_00000000000000000000000000000000/availability",
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ticket_type_requires_organizer() {
    let (state, _) = create_test_app_state();
    let (event_id, other_key) = {
        let conn = state.db.get().unwrap();
        let (organizer, _) = create_test_user(&conn, "org@test.com");
        let (_, other_key) = create_test_user(&conn, "other@test.com");
        let event = create_test_event(&conn, &organizer.id, 5000, 100);
        (event.id, other_key)
    };

    let app = test_app(state);
    let response = app
        .oneshot(request(
            "POST",
            &format!("/events/{}/ticket-types", event_id),
            Some(&other_key),
            Some(json!({ "name": "GA", "price_cents": 3000, "capacity": 50 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_promo_code_scoped_to_own_event_only() {
    let (state, _) = create_test_app_state();
    let (event_id, other_key) = {
        let conn = state.db.get().unwrap();
        let (organizer, _) = create_test_user(&conn, "org@test.com");
        let (_, other_key) = create_test_user(&conn, "other@test.com");
        let event = create_test_event(&conn, &organizer.id, 5000, 100);
        (event.id, other_key)
    };

    let app = test_app(state);
    let response = app
        .oneshot(request(
            "POST",
            "/promo-codes",
            Some(&other_key),
            Some(json!({
                "code": "SNEAKY",
                "discount_type": "percentage",
                "discount_value": 50,
                "event_id": event_id
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_duplicate_promo_code_conflicts() {
    let (state, _) = create_test_app_state();
    let organizer_key = {
        let conn = state.db.get().unwrap();
        let (_, key) = create_test_user(&conn, "org@test.com");
        key
    };

    let app = test_app(state);
    let body = json!({ "code": "REPEAT", "discount_type": "fixed", "discount_value": 500 });

    let first = app
        .clone()
        .oneshot(request(
            "POST",
            "/promo-codes",
            Some(&organizer_key),
            Some(body.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(request(
            "POST",
            "/promo-codes",
            Some(&organizer_key),
            Some(body),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_deactivated_promo_code_rejected_at_quote() {
    let (state, _) = create_test_app_state();
    let (event_id, promo_id, organizer_key, buyer_key) = {
        let conn = state.db.get().unwrap();
        let (organizer, organizer_key) = create_test_user(&conn, "org@test.com");
        let (_, buyer_key) = create_test_user(&conn, "buyer@test.com");
        let event = create_test_event(&conn, &organizer.id, 5000, 10);
        let promo = create_test_promo(
            &conn,
            &organizer.id,
            "BRIEF",
            DiscountType::Fixed,
            500,
            None,
        );
        (event.id, promo.id, organizer_key, buyer_key)
    };

    let app = test_app(state);
    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/promo-codes/{}", promo_id),
            Some(&organizer_key),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request(
            "POST",
            "/payments/initialize",
            Some(&buyer_key),
            Some(json!({ "event_id": event_id, "promo_code": "BRIEF" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_deactivate_requires_creator() {
    let (state, _) = create_test_app_state();
    let (promo_id, other_key) = {
        let conn = state.db.get().unwrap();
        let (organizer, _) = create_test_user(&conn, "org@test.com");
        let (_, other_key) = create_test_user(&conn, "other@test.com");
        let promo = create_test_promo(
            &conn,
            &organizer.id,
            "MINE",
            DiscountType::Fixed,
            500,
            None,
        );
        (promo.id, other_key)
    };

    let app = test_app(state);
    let response = app
        .oneshot(request(
            "DELETE",
            &format!("/promo-codes/{}", promo_id),
            Some(&other_key),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bad_api_key_is_unauthorized() {
    let (state, _) = create_test_app_state();
    let app = test_app(state);

    let response = app
        .oneshot(request(
            "POST",
            "/events",
            Some("bx_nonsense"),
            Some(json!({
                "title": "X",
                "price_cents": 0,
                "capacity": 1,
                "starts_at": 0
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health() {
    let (state, _) = create_test_app_state();
    let app = test_app(state);

    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
