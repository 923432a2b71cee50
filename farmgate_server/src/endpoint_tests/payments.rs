use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use farmgate_engine::{
    db_types::{Order, OrderStatusType, Payment, PaymentStatus},
    helpers::{sign_payload, SIGNATURE_HEADER},
    payment_objects::{PaymentEvent, ReconciliationOutcome},
};
use serde_json::json;

use super::helpers::{as_actor, assert_error, TestMarket, WEBHOOK_SECRET};
use crate::data_objects::WebhookResponse;

async fn pending_order(market: &TestMarket) -> Order {
    let mango = market.add_product("farm-1", "mango", 9_000, 100).await;
    let cart = json!({"items": [{"product_id": mango.id, "quantity": 2}]});
    let req = as_actor(TestRequest::post().uri("/api/orders"), "buyer-1", "BUYER").set_json(cart);
    market.send_expecting(req, StatusCode::CREATED).await
}

async fn start_payment(market: &TestMarket, order: &Order, intent: &str) -> Payment {
    let uri = format!("/api/orders/{}/payment", order.id);
    let body = json!({"method": "promptpay", "provider_intent_id": intent});
    let req = as_actor(TestRequest::post().uri(&uri), "buyer-1", "BUYER").set_json(body);
    market.send_expecting(req, StatusCode::CREATED).await
}

fn notification(event_id: &str, event_type: &str, intent: &str, secret: &str) -> TestRequest {
    let body = serde_json::to_vec(&PaymentEvent::new(event_id, event_type, intent)).unwrap();
    let signature = sign_payload(secret, Utc::now().timestamp(), &body).unwrap();
    TestRequest::post()
        .uri("/payments/webhook")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((SIGNATURE_HEADER, signature))
        .set_payload(body)
}

#[actix_web::test]
async fn unsigned_notifications_are_rejected() {
    let market = TestMarket::new().await;
    let order = pending_order(&market).await;
    start_payment(&market, &order, "pi_unsigned").await;
    let body = serde_json::to_vec(&PaymentEvent::new("evt_1", "payment_intent.succeeded", "pi_unsigned")).unwrap();
    let req = TestRequest::post().uri("/payments/webhook").set_payload(body);
    let res = market.send(req).await;
    assert_error(&res, StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE");

    let res = market.send(notification("evt_2", "payment_intent.succeeded", "pi_unsigned", "whsec_wrong")).await;
    assert_error(&res, StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE");

    // Nothing changed
    let req = as_actor(TestRequest::get().uri(&format!("/api/orders/{}", order.id)), "buyer-1", "BUYER");
    let order: Order = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(order.status, OrderStatusType::Pending);
    market.cleanup().await;
}

#[actix_web::test]
async fn tampered_bodies_are_rejected() {
    let market = TestMarket::new().await;
    let body = serde_json::to_vec(&PaymentEvent::new("evt_1", "payment_intent.succeeded", "pi_a")).unwrap();
    let signature = sign_payload(WEBHOOK_SECRET, Utc::now().timestamp(), &body).unwrap();
    let tampered = serde_json::to_vec(&PaymentEvent::new("evt_1", "payment_intent.succeeded", "pi_b")).unwrap();
    let req =
        TestRequest::post().uri("/payments/webhook").insert_header((SIGNATURE_HEADER, signature)).set_payload(tampered);
    let res = market.send(req).await;
    assert_error(&res, StatusCode::UNAUTHORIZED, "INVALID_SIGNATURE");
    market.cleanup().await;
}

#[actix_web::test]
async fn successful_payment_marks_order_paid_once() {
    let market = TestMarket::new().await;
    let order = pending_order(&market).await;
    let payment = start_payment(&market, &order, "pi_paid").await;
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, order.total);

    let req = notification("evt_1", "payment_intent.succeeded", "pi_paid", WEBHOOK_SECRET);
    let res: WebhookResponse = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(res.outcome, ReconciliationOutcome::Applied);

    let req = as_actor(TestRequest::get().uri(&format!("/api/orders/{}", order.id)), "farm-1", "FARM");
    let paid: Order = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(paid.status, OrderStatusType::Paid);
    assert!(paid.paid_at.is_some());

    // The provider retries the same notification
    let req = notification("evt_1", "payment_intent.succeeded", "pi_paid", WEBHOOK_SECRET);
    let res: WebhookResponse = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(res.outcome, ReconciliationOutcome::Duplicate);

    // A paid order cannot take another payment attempt
    let uri = format!("/api/orders/{}/payment", order.id);
    let body = json!({"method": "promptpay", "provider_intent_id": "pi_again"});
    let req = as_actor(TestRequest::post().uri(&uri), "buyer-1", "BUYER").set_json(body);
    let res = market.send(req).await;
    assert_error(&res, StatusCode::CONFLICT, "INVALID_STATE_TRANSITION");
    market.cleanup().await;
}

#[actix_web::test]
async fn unknown_and_irrelevant_events_are_acknowledged() {
    let market = TestMarket::new().await;
    let req = notification("evt_1", "payment_intent.succeeded", "pi_nobody", WEBHOOK_SECRET);
    let res: WebhookResponse = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(res.outcome, ReconciliationOutcome::UnknownPayment);

    let req = notification("evt_2", "customer.created", "pi_nobody", WEBHOOK_SECRET);
    let res: WebhookResponse = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(res.outcome, ReconciliationOutcome::Ignored);
    market.cleanup().await;
}

#[actix_web::test]
async fn only_the_buyer_starts_payments() {
    let market = TestMarket::new().await;
    let order = pending_order(&market).await;
    let uri = format!("/api/orders/{}/payment", order.id);
    let body = json!({"method": "promptpay", "provider_intent_id": "pi_farm"});
    let req = as_actor(TestRequest::post().uri(&uri), "farm-1", "FARM").set_json(body.clone());
    let res = market.send(req).await;
    assert_error(&res, StatusCode::FORBIDDEN, "FORBIDDEN");

    let req = as_actor(TestRequest::post().uri(&uri), "buyer-2", "BUYER").set_json(body);
    let res = market.send(req).await;
    assert_error(&res, StatusCode::FORBIDDEN, "FORBIDDEN");
    market.cleanup().await;
}

#[actix_web::test]
async fn a_pending_attempt_keeps_its_intent() {
    let market = TestMarket::new().await;
    let order = pending_order(&market).await;
    start_payment(&market, &order, "pi_first").await;
    // Restarting with the same intent is harmless
    start_payment(&market, &order, "pi_first").await;

    let uri = format!("/api/orders/{}/payment", order.id);
    let body = json!({"method": "promptpay", "provider_intent_id": "pi_second"});
    let req = as_actor(TestRequest::post().uri(&uri), "buyer-1", "BUYER").set_json(body);
    let res = market.send(req).await;
    assert_error(&res, StatusCode::CONFLICT, "INVALID_STATE_TRANSITION");

    // The buyer completes the first attempt after all
    let req = notification("evt_1", "payment_intent.succeeded", "pi_first", WEBHOOK_SECRET);
    let res: WebhookResponse = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(res.outcome, ReconciliationOutcome::Applied);
    let req = as_actor(TestRequest::get().uri(&format!("/api/orders/{}", order.id)), "buyer-1", "BUYER");
    let paid: Order = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(paid.status, OrderStatusType::Paid);
    market.cleanup().await;
}

#[actix_web::test]
async fn intents_belong_to_one_order() {
    let market = TestMarket::new().await;
    let first = pending_order(&market).await;
    let second = pending_order(&market).await;
    start_payment(&market, &first, "pi_shared").await;

    let uri = format!("/api/orders/{}/payment", second.id);
    let body = json!({"method": "promptpay", "provider_intent_id": "pi_shared"});
    let req = as_actor(TestRequest::post().uri(&uri), "buyer-1", "BUYER").set_json(body);
    let res = market.send(req).await;
    assert_error(&res, StatusCode::BAD_REQUEST, "INVALID_PAYMENT_EVENT");
    market.cleanup().await;
}
