use std::str::FromStr;

use chrono::{Duration, Utc};
use cucumber::{then, when};
use farmgate_engine::{
    db_types::{Actor, DeliveryMethod, InquiryStatusType, OrderStatusType, PaymentStatus, Role, Satang},
    helpers::sign_payload,
    inquiry_objects::{InquiryMessageRequest, NewInquiryRequest},
    order_objects::Cart,
    payment_objects::PaymentEvent,
    InventoryManagement,
    OrderManagement,
    PaymentManagement,
    TransitionDetails,
};

use crate::cucumber::{MarketWorld, WEBHOOK_SECRET};

fn actor(role: &str, id: String) -> Actor {
    let role = Role::from_str(role).expect("Not a valid role");
    Actor::new(id, role)
}

//----------------------------------------------   Orders  ----------------------------------------------------

async fn place_order(world: &mut MarketWorld, buyer: String, cart: Cart) {
    let result = world.system().orders.place_order(&Actor::buyer(buyer), cart).await;
    if let Some(order) = world.record(result) {
        world.last_order = Some(order);
    }
}

#[when(expr = "buyer '{word}' orders {int} kg of '{word}'")]
async fn order_product(world: &mut MarketWorld, buyer: String, quantity: i64, product: String) {
    let cart = Cart::new(DeliveryMethod::Pickup).with_item(world.product(&product).id, quantity);
    place_order(world, buyer, cart).await;
}

#[when(expr = "buyer '{word}' orders {int} kg of '{word}' by {word}")]
async fn order_product_with_delivery(
    world: &mut MarketWorld,
    buyer: String,
    quantity: i64,
    product: String,
    method: String,
) {
    let method = DeliveryMethod::from_str(&method).expect("Not a valid delivery method");
    let cart = Cart::new(method).with_item(world.product(&product).id, quantity);
    place_order(world, buyer, cart).await;
}

#[when(expr = "buyer '{word}' orders {int} kg of '{word}' and {int} kg of '{word}'")]
async fn order_two_products(
    world: &mut MarketWorld,
    buyer: String,
    qty1: i64,
    product1: String,
    qty2: i64,
    product2: String,
) {
    let cart = Cart::new(DeliveryMethod::Pickup)
        .with_item(world.product(&product1).id, qty1)
        .with_item(world.product(&product2).id, qty2);
    place_order(world, buyer, cart).await;
}

#[when(expr = "{word} '{word}' moves the order to {word}")]
async fn move_order(world: &mut MarketWorld, role: String, id: String, status: String) {
    let target = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order_id = world.order().id;
    let result =
        world.system().orders.update_order_status(&actor(&role, id), order_id, target, TransitionDetails::default()).await;
    world.record(result);
}

#[when(expr = "farm '{word}' ships the order with tracking '{word}'")]
async fn ship_order(world: &mut MarketWorld, farm: String, tracking: String) {
    let order_id = world.order().id;
    let details = TransitionDetails::default().with_tracking_number(tracking);
    let result =
        world.system().orders.update_order_status(&Actor::farm(farm), order_id, OrderStatusType::Shipped, details).await;
    world.record(result);
}

#[then(expr = "the order is {word}")]
async fn order_status(world: &mut MarketWorld, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order = world
        .system()
        .db
        .fetch_order(world.order().id)
        .await
        .expect("Error fetching order")
        .expect("Order does not exist");
    assert_eq!(order.status, expected, "Order status is incorrect");
}

#[then(expr = "the order total is {int} satang")]
async fn order_total(world: &mut MarketWorld, total: i64) {
    assert_eq!(world.order().total, Satang::from(total), "Order total is incorrect");
}

#[then(expr = "the order has one item of {int} kg at {int} satang")]
async fn order_single_item(world: &mut MarketWorld, quantity: i64, price: i64) {
    let order = world.order();
    assert_eq!(order.items.len(), 1, "Expected a single order item");
    assert_eq!(order.items[0].quantity, quantity);
    assert_eq!(order.items[0].unit_price, Satang::from(price));
}

#[then(expr = "'{word}' has {int} kg reserved out of {int} kg")]
async fn check_stock(world: &mut MarketWorld, product: String, reserved: i64, total: i64) {
    let id = world.product(&product).id;
    let product = world.system().db.fetch_product(id).await.expect("Error fetching product").expect("No product");
    assert_eq!(product.reserved_stock, reserved, "Reserved stock is incorrect");
    assert_eq!(product.total_stock, total, "Total stock is incorrect");
}

#[then(expr = "the request fails with {word}")]
async fn request_fails(world: &mut MarketWorld, code: String) {
    let err = world.last_error.as_ref().expect("The last request did not fail");
    assert_eq!(err.code(), code, "Unexpected error: {err}");
}

#[then("the request succeeds")]
async fn request_succeeds(world: &mut MarketWorld) {
    assert!(world.last_error.is_none(), "The last request failed: {:?}", world.last_error);
}

//----------------------------------------------  Payments  ----------------------------------------------------

#[when(expr = "buyer '{word}' starts a payment with intent '{word}'")]
async fn start_payment(world: &mut MarketWorld, buyer: String, intent: String) {
    let order_id = world.order().id;
    let result = world.system().orders.start_payment(&Actor::buyer(buyer), order_id, "promptpay", &intent).await;
    world.record(result);
}

#[when(expr = "the provider reports '{word}' for intent '{word}'")]
async fn provider_event(world: &mut MarketWorld, event_type: String, intent: String) {
    let event = PaymentEvent::new(world.next_event_id(), event_type, intent);
    let result = world.system().payments.reconcile(event).await;
    if let Some(outcome) = world.record(result) {
        world.last_outcome = Some(outcome);
    }
}

async fn signed_notification(world: &mut MarketWorld, event_type: String, intent: String, secret: &str) {
    let event = PaymentEvent::new(world.next_event_id(), event_type, intent);
    let body = serde_json::to_vec(&event).expect("Error serializing event");
    let header = sign_payload(secret, Utc::now().timestamp(), &body).expect("Error signing payload");
    let result = world.system().payments.process_webhook(&body, Some(&header)).await;
    world.last_outcome = world.record(result);
}

#[when(expr = "a notification for '{word}' on intent '{word}' arrives signed with '{word}'")]
async fn notification_with_secret(world: &mut MarketWorld, event_type: String, intent: String, secret: String) {
    signed_notification(world, event_type, intent, &secret).await;
}

#[when(expr = "a notification for '{word}' on intent '{word}' arrives signed with the webhook secret")]
async fn notification_with_webhook_secret(world: &mut MarketWorld, event_type: String, intent: String) {
    signed_notification(world, event_type, intent, WEBHOOK_SECRET).await;
}

#[then(expr = "the reconciliation outcome is {word}")]
async fn reconciliation_outcome(world: &mut MarketWorld, expected: String) {
    let outcome = world.last_outcome.as_ref().expect("No notification has been reconciled");
    let outcome = serde_json::to_value(outcome).expect("Error serializing outcome");
    assert_eq!(outcome.as_str(), Some(expected.as_str()), "Reconciliation outcome is incorrect");
}

#[then(expr = "the payment is {word}")]
async fn payment_status(world: &mut MarketWorld, status: String) {
    let expected = match status.as_str() {
        "PENDING" => PaymentStatus::Pending,
        "COMPLETED" => PaymentStatus::Completed,
        "FAILED" => PaymentStatus::Failed,
        "REFUNDED" => PaymentStatus::Refunded,
        _ => panic!("Unknown payment status {status}"),
    };
    let payment = world
        .system()
        .db
        .fetch_payment_for_order(world.order().id)
        .await
        .expect("Error fetching payment")
        .expect("The order has no payment");
    assert_eq!(payment.status, expected, "Payment status is incorrect");
}

//----------------------------------------------  Inquiries ----------------------------------------------------

#[when(expr = "buyer '{word}' asks for a quote on {int} kg of '{word}' at {int} satang")]
async fn submit_inquiry(world: &mut MarketWorld, buyer: String, quantity: i64, product: String, price: i64) {
    let request = NewInquiryRequest::new(world.product(&product).id, quantity, Satang::from(price))
        .with_note("Weekly supply for our restaurant");
    let result = world.system().quotes.submit_inquiry(&Actor::buyer(buyer), request).await;
    if let Some(inquiry) = world.record(result) {
        world.last_inquiry = Some(inquiry);
    }
}

#[when(expr = "farm '{word}' counters at {int} satang")]
async fn counter_offer(world: &mut MarketWorld, farm: String, price: i64) {
    let id = world.inquiry().id;
    let result = world.system().quotes.counter_offer(&Actor::farm(farm), id, Satang::from(price), "Best we can do").await;
    if let Some(inquiry) = world.record(result) {
        world.last_inquiry = Some(inquiry);
    }
}

#[when(expr = "{word} '{word}' replies {string}")]
async fn reply(world: &mut MarketWorld, role: String, id: String, body: String) {
    let inquiry_id = world.inquiry().id;
    let result = world.system().quotes.post_message(&actor(&role, id), inquiry_id, InquiryMessageRequest::new(body)).await;
    if let Some(inquiry) = world.record(result) {
        world.last_inquiry = Some(inquiry);
    }
}

#[when(expr = "{word} '{word}' accepts the quote")]
async fn accept_quote(world: &mut MarketWorld, role: String, id: String) {
    let inquiry_id = world.inquiry().id;
    let result = world.system().quotes.accept_inquiry(&actor(&role, id), inquiry_id, None).await;
    if let Some(inquiry) = world.record(result) {
        world.last_inquiry = Some(inquiry);
    }
}

#[when(expr = "{word} '{word}' rejects the quote")]
async fn reject_quote(world: &mut MarketWorld, role: String, id: String) {
    let inquiry_id = world.inquiry().id;
    let result = world.system().quotes.reject_inquiry(&actor(&role, id), inquiry_id).await;
    if let Some(inquiry) = world.record(result) {
        world.last_inquiry = Some(inquiry);
    }
}

#[when(expr = "{word} '{word}' converts the quote into an order")]
async fn convert_quote(world: &mut MarketWorld, role: String, id: String) {
    let inquiry_id = world.inquiry().id;
    let result = world.system().quotes.convert_to_order(&actor(&role, id), inquiry_id, DeliveryMethod::Pickup).await;
    if let Some((inquiry, order)) = world.record(result) {
        world.last_inquiry = Some(inquiry);
        world.last_order = Some(order);
    }
}

#[when(expr = "the expiry sweep runs {int} days from now")]
async fn expiry_sweep(world: &mut MarketWorld, days: i64) {
    let now = Utc::now() + Duration::days(days);
    let result = world.system().quotes.expire_inquiries(now).await;
    world.record(result);
}

#[then(expr = "the inquiry is {word}")]
async fn inquiry_status(world: &mut MarketWorld, status: String) {
    let expected = InquiryStatusType::from_str(&status).expect("Not a valid inquiry status");
    let inquiry = world
        .system()
        .quotes
        .fetch_inquiry(&Actor::system(), world.inquiry().id)
        .await
        .expect("Error fetching inquiry");
    assert_eq!(inquiry.status, expected, "Inquiry status is incorrect");
}

#[then(expr = "the agreed price is {int} satang")]
async fn agreed_price(world: &mut MarketWorld, price: i64) {
    assert_eq!(world.inquiry().agreed_price, Some(Satang::from(price)), "Agreed price is incorrect");
}

#[then(expr = "the inquiry has {int} messages")]
async fn inquiry_messages(world: &mut MarketWorld, count: usize) {
    assert_eq!(world.inquiry().messages.len(), count, "Message count is incorrect");
}
