use actix_web::{http::StatusCode, test::TestRequest};
use farmgate_engine::db_types::{DeliveryMethod, Inquiry, InquiryStatusType, OrderStatusType, Satang};
use serde_json::json;

use super::helpers::{as_actor, assert_error, TestMarket};
use crate::data_objects::ConversionResponse;

async fn open_inquiry(market: &TestMarket, quantity: i64) -> (StatusCode, serde_json::Value) {
    let rice = market.add_wholesale_product("farm-3", "jasmine-rice", 4_500, 1_000, 100).await;
    let body = json!({"product_id": rice.id, "quantity": quantity, "proposed_price": 3_800, "note": "Monthly order"});
    let req = as_actor(TestRequest::post().uri("/api/inquiries"), "buyer-1", "BUYER").set_json(body);
    market.send(req).await
}

#[actix_web::test]
async fn negotiate_and_convert() {
    let market = TestMarket::new().await;
    let (status, body) = open_inquiry(&market, 200).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let inquiry: Inquiry = serde_json::from_value(body).unwrap();
    assert_eq!(inquiry.status, InquiryStatusType::Pending);
    assert_eq!(inquiry.farm_id, "farm-3");
    let base = format!("/api/inquiries/{}", inquiry.id);

    let offer = json!({"body": "We can do 4,000 for 200 kg", "offered_price": 4_000});
    let req = as_actor(TestRequest::post().uri(&format!("{base}/messages")), "farm-3", "FARM").set_json(offer);
    let inquiry: Inquiry = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(inquiry.status, InquiryStatusType::Negotiating);
    assert_eq!(inquiry.counter_price, Some(Satang::from(4_000)));

    // The farm cannot convert on the buyer's behalf
    let req = as_actor(TestRequest::post().uri(&format!("{base}/convert")), "farm-3", "FARM");
    let res = market.send(req).await;
    assert_error(&res, StatusCode::FORBIDDEN, "FORBIDDEN");

    // Buyers cannot name their own price
    let req = as_actor(TestRequest::post().uri(&format!("{base}/accept")), "buyer-1", "BUYER")
        .set_json(json!({"agreed_price": 1}));
    let res = market.send(req).await;
    assert_error(&res, StatusCode::FORBIDDEN, "FORBIDDEN");

    // Accepting without a body takes the farm's counter offer
    let req = as_actor(TestRequest::post().uri(&format!("{base}/accept")), "buyer-1", "BUYER");
    let inquiry: Inquiry = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(inquiry.status, InquiryStatusType::Accepted);
    assert_eq!(inquiry.agreed_price, Some(Satang::from(4_000)));

    let body = json!({"delivery_method": "FARM_DELIVERY"});
    let req = as_actor(TestRequest::post().uri(&format!("{base}/convert")), "buyer-1", "BUYER").set_json(body);
    let converted: ConversionResponse = market.send_expecting(req, StatusCode::CREATED).await;
    assert_eq!(converted.inquiry.status, InquiryStatusType::Converted);
    assert_eq!(converted.inquiry.order_id, Some(converted.order.id));
    assert_eq!(converted.order.status, OrderStatusType::Pending);
    assert_eq!(converted.order.delivery_method, DeliveryMethod::FarmDelivery);
    assert_eq!(converted.order.source_inquiry_id, Some(inquiry.id));
    assert_eq!(converted.order.subtotal, Satang::from(800_000));
    assert_eq!(converted.order.items[0].unit_price, Satang::from(4_000));

    // An inquiry converts at most once
    let req = as_actor(TestRequest::post().uri(&format!("{base}/convert")), "buyer-1", "BUYER");
    let res = market.send(req).await;
    assert_error(&res, StatusCode::CONFLICT, "INVALID_STATE_TRANSITION");

    let req = as_actor(TestRequest::get().uri(&base), "farm-3", "FARM");
    let inquiry: Inquiry = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(inquiry.messages.len(), 2);
    market.cleanup().await;
}

#[actix_web::test]
async fn small_quantities_are_not_wholesale() {
    let market = TestMarket::new().await;
    let res = open_inquiry(&market, 40).await;
    assert_error(&res, StatusCode::UNPROCESSABLE_ENTITY, "BELOW_MINIMUM_ORDER_QUANTITY");
    market.cleanup().await;
}

#[actix_web::test]
async fn only_the_parties_see_an_inquiry() {
    let market = TestMarket::new().await;
    let (status, body) = open_inquiry(&market, 150).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let inquiry: Inquiry = serde_json::from_value(body).unwrap();
    let uri = format!("/api/inquiries/{}", inquiry.id);

    let res = market.send(as_actor(TestRequest::get().uri(&uri), "farm-9", "FARM")).await;
    assert_error(&res, StatusCode::FORBIDDEN, "FORBIDDEN");
    let res = market.send(as_actor(TestRequest::get().uri(&uri), "buyer-2", "BUYER")).await;
    assert_error(&res, StatusCode::FORBIDDEN, "FORBIDDEN");
    let _: Inquiry = market.send_expecting(as_actor(TestRequest::get().uri(&uri), "ops", "ADMIN"), StatusCode::OK).await;

    let req = as_actor(TestRequest::post().uri("/api/inquiries"), "farm-3", "FARM")
        .set_json(json!({"product_id": inquiry.product_id, "quantity": 150, "proposed_price": 3_800}));
    let res = market.send(req).await;
    assert_error(&res, StatusCode::FORBIDDEN, "FORBIDDEN");
    market.cleanup().await;
}

#[actix_web::test]
async fn closed_inquiries_take_no_messages() {
    let market = TestMarket::new().await;
    let (status, body) = open_inquiry(&market, 150).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let inquiry: Inquiry = serde_json::from_value(body).unwrap();
    let base = format!("/api/inquiries/{}", inquiry.id);

    let req = as_actor(TestRequest::post().uri(&format!("{base}/reject")), "farm-3", "FARM");
    let rejected: Inquiry = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(rejected.status, InquiryStatusType::Rejected);

    let req = as_actor(TestRequest::post().uri(&format!("{base}/messages")), "buyer-1", "BUYER")
        .set_json(json!({"body": "Are you sure?"}));
    let res = market.send(req).await;
    assert_error(&res, StatusCode::CONFLICT, "INVALID_STATE_TRANSITION");

    let req = as_actor(TestRequest::post().uri(&format!("{base}/accept")), "buyer-1", "BUYER")
        .set_json(json!({"agreed_price": 4_200}));
    let res = market.send(req).await;
    assert_error(&res, StatusCode::CONFLICT, "INVALID_STATE_TRANSITION");
    market.cleanup().await;
}

#[actix_web::test]
async fn buyers_cannot_accept_their_own_proposal() {
    let market = TestMarket::new().await;
    let (status, body) = open_inquiry(&market, 500).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let inquiry: Inquiry = serde_json::from_value(body).unwrap();
    let base = format!("/api/inquiries/{}", inquiry.id);

    let req = as_actor(TestRequest::post().uri(&format!("{base}/accept")), "buyer-1", "BUYER")
        .set_json(json!({"agreed_price": 1}));
    let res = market.send(req).await;
    assert_error(&res, StatusCode::FORBIDDEN, "FORBIDDEN");
    let req = as_actor(TestRequest::post().uri(&format!("{base}/accept")), "buyer-1", "BUYER");
    let res = market.send(req).await;
    assert_error(&res, StatusCode::FORBIDDEN, "FORBIDDEN");

    // The farm can take the proposal as it stands
    let req = as_actor(TestRequest::post().uri(&format!("{base}/accept")), "farm-3", "FARM");
    let inquiry: Inquiry = market.send_expecting(req, StatusCode::OK).await;
    assert_eq!(inquiry.status, InquiryStatusType::Accepted);
    assert_eq!(inquiry.agreed_price, Some(Satang::from(3_800)));
    market.cleanup().await;
}
