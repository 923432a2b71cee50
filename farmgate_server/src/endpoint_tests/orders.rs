use actix_web::{http::StatusCode, test::TestRequest};
use farmgate_engine::db_types::{Order, OrderStatusType, Satang};
use serde_json::json;

use super::helpers::{as_actor, assert_error, TestMarket};

#[actix_web::test]
async fn health_check() {
    let market = TestMarket::new().await;
    let (status, body) = market.send(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
    market.cleanup().await;
}

#[actix_web::test]
async fn requests_without_identity_are_unauthorized() {
    let market = TestMarket::new().await;
    let res = market.send(TestRequest::get().uri("/api/orders")).await;
    assert_error(&res, StatusCode::UNAUTHORIZED, "UNAUTHENTICATED");
    // The ACL middleware rejects the request before the body is even read
    let req = TestRequest::post().uri("/api/orders").set_json(json!({"items": []}));
    let res = market.send(req).await;
    assert_error(&res, StatusCode::UNAUTHORIZED, "UNAUTHENTICATED");
    market.cleanup().await;
}

#[actix_web::test]
async fn system_role_cannot_be_claimed() {
    let market = TestMarket::new().await;
    let res = market.send(as_actor(TestRequest::get().uri("/api/orders"), "system", "SYSTEM")).await;
    assert_error(&res, StatusCode::FORBIDDEN, "FORBIDDEN");
    market.cleanup().await;
}

#[actix_web::test]
async fn only_buyers_place_orders() {
    let market = TestMarket::new().await;
    let mango = market.add_product("farm-1", "mango", 9_000, 100).await;
    let cart = json!({"items": [{"product_id": mango.id, "quantity": 5}]});
    let req = as_actor(TestRequest::post().uri("/api/orders"), "farm-1", "FARM").set_json(cart);
    let res = market.send(req).await;
    assert_error(&res, StatusCode::FORBIDDEN, "FORBIDDEN");
    market.cleanup().await;
}

#[actix_web::test]
async fn place_and_fetch_order() {
    let market = TestMarket::new().await;
    let mango = market.add_product("farm-1", "mango", 9_000, 100).await;
    let cart = json!({"items": [{"product_id": mango.id, "quantity": 5}], "delivery_method": "PICKUP"});
    let req = as_actor(TestRequest::post().uri("/api/orders"), "buyer-1", "BUYER").set_json(cart);
    let order: Order = market.send_expecting(req, StatusCode::CREATED).await;
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.farm_id, "farm-1");
    assert_eq!(order.subtotal, Satang::from(45_000));
    assert_eq!(order.total, Satang::from(46_350));
    assert_eq!(order.items.len(), 1);

    // The farm sees the order placed with it
    let uri = format!("/api/orders/{}", order.id);
    let req = as_actor(TestRequest::get().uri(&uri), "farm-1", "FARM");
    let fetched: Order = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(fetched.order_number, order.order_number);

    // Nobody else does
    let req = as_actor(TestRequest::get().uri(&uri), "buyer-2", "BUYER");
    let res = market.send(req).await;
    assert_error(&res, StatusCode::FORBIDDEN, "FORBIDDEN");

    let req = as_actor(TestRequest::get().uri("/api/orders/9999"), "admin", "ADMIN");
    let res = market.send(req).await;
    assert_error(&res, StatusCode::NOT_FOUND, "NOT_FOUND");
    market.cleanup().await;
}

#[actix_web::test]
async fn order_lists_are_scoped_to_the_actor() {
    let market = TestMarket::new().await;
    let mango = market.add_product("farm-1", "mango", 9_000, 100).await;
    for buyer in ["buyer-1", "buyer-1", "buyer-2"] {
        let cart = json!({"items": [{"product_id": mango.id, "quantity": 1}]});
        let req = as_actor(TestRequest::post().uri("/api/orders"), buyer, "BUYER").set_json(cart);
        let _: Order = market.send_expecting(req, StatusCode::CREATED).await;
    }
    let req = as_actor(TestRequest::get().uri("/api/orders"), "buyer-1", "BUYER");
    let orders: Vec<Order> = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.buyer_id == "buyer-1"));

    let req = as_actor(TestRequest::get().uri("/api/orders"), "farm-1", "FARM");
    let orders: Vec<Order> = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(orders.len(), 3);

    let req = as_actor(TestRequest::get().uri("/api/orders"), "farm-2", "FARM");
    let orders: Vec<Order> = market.send_expecting(req, StatusCode::OK).await;
    assert!(orders.is_empty());

    let req = as_actor(TestRequest::get().uri("/api/orders?status=PAID"), "admin", "ADMIN");
    let orders: Vec<Order> = market.send_expecting(req, StatusCode::OK).await;
    assert!(orders.is_empty());

    let req = as_actor(TestRequest::get().uri("/api/orders?status=LOST"), "admin", "ADMIN");
    let res = market.send(req).await;
    assert_error(&res, StatusCode::BAD_REQUEST, "INVALID_REQUEST");
    market.cleanup().await;
}

#[actix_web::test]
async fn invalid_transitions_conflict() {
    let market = TestMarket::new().await;
    let mango = market.add_product("farm-1", "mango", 9_000, 100).await;
    let cart = json!({"items": [{"product_id": mango.id, "quantity": 5}]});
    let req = as_actor(TestRequest::post().uri("/api/orders"), "buyer-1", "BUYER").set_json(cart);
    let order: Order = market.send_expecting(req, StatusCode::CREATED).await;
    let uri = format!("/api/orders/{}/status", order.id);

    // An unpaid order cannot be confirmed
    let req = as_actor(TestRequest::post().uri(&uri), "farm-1", "FARM").set_json(json!({"status": "CONFIRMED"}));
    let res = market.send(req).await;
    assert_error(&res, StatusCode::CONFLICT, "INVALID_STATE_TRANSITION");

    // Buyers cannot mark their own orders as paid
    let req = as_actor(TestRequest::post().uri(&uri), "buyer-1", "BUYER").set_json(json!({"status": "PAID"}));
    let res = market.send(req).await;
    assert_error(&res, StatusCode::FORBIDDEN, "FORBIDDEN");

    let body = json!({"status": "CANCELLED", "reason": "Changed my mind"});
    let req = as_actor(TestRequest::post().uri(&uri), "buyer-1", "BUYER").set_json(body);
    let cancelled: Order = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(cancelled.status, OrderStatusType::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("Changed my mind"));

    let req = as_actor(TestRequest::post().uri(&uri), "buyer-1", "BUYER").set_json(json!({"status": "CANCELLED"}));
    let res = market.send(req).await;
    assert_error(&res, StatusCode::CONFLICT, "INVALID_STATE_TRANSITION");
    market.cleanup().await;
}

#[actix_web::test]
async fn carts_must_come_from_one_farm() {
    let market = TestMarket::new().await;
    let mango = market.add_product("farm-1", "mango", 9_000, 100).await;
    let durian = market.add_product("farm-2", "durian", 25_000, 10).await;
    let cart = json!({"items": [{"product_id": mango.id, "quantity": 1}, {"product_id": durian.id, "quantity": 1}]});
    let req = as_actor(TestRequest::post().uri("/api/orders"), "buyer-1", "BUYER").set_json(cart);
    let res = market.send(req).await;
    assert_error(&res, StatusCode::UNPROCESSABLE_ENTITY, "MULTI_FARM_CART");
    market.cleanup().await;
}

#[actix_web::test]
async fn short_stock_conflicts() {
    let market = TestMarket::new().await;
    let durian = market.add_product("farm-2", "durian", 25_000, 10).await;
    let cart = json!({"items": [{"product_id": durian.id, "quantity": 11}]});
    let req = as_actor(TestRequest::post().uri("/api/orders"), "buyer-1", "BUYER").set_json(cart);
    let res = market.send(req).await;
    assert_error(&res, StatusCode::CONFLICT, "INSUFFICIENT_STOCK");
    market.cleanup().await;
}

#[actix_web::test]
async fn malformed_bodies_are_bad_requests() {
    let market = TestMarket::new().await;
    let req = as_actor(TestRequest::post().uri("/api/orders"), "buyer-1", "BUYER")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"items\": [{\"product_id\": \"one\"}]}");
    let res = market.send(req).await;
    assert_error(&res, StatusCode::BAD_REQUEST, "INVALID_REQUEST");

    let req = as_actor(TestRequest::post().uri("/api/orders"), "buyer-1", "BUYER").set_json(json!({"items": []}));
    let res = market.send(req).await;
    assert_error(&res, StatusCode::BAD_REQUEST, "EMPTY_CART");
    market.cleanup().await;
}
