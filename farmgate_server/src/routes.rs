//! Request handler definitions
//!
//! Define each route and its handler here. Handlers should do no more than extract the request, call the engine API
//! and shape the response. Marketplace rules live in `farmgate_engine`.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution.
//!
//! ## Identity
//! Every `/api` route needs the `X-Actor-Id` and `X-Actor-Role` headers (see [`crate::auth`]). Routes declared with
//! `requires [...]` reject other roles before the handler runs. Whether an actor may touch a particular order or
//! inquiry is decided by the engine.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use farmgate_engine::{
    db_types::Role,
    helpers::SIGNATURE_HEADER,
    inquiry_objects::{AcceptInquiryRequest, ConvertInquiryRequest, InquiryMessageRequest, NewInquiryRequest},
    order_objects::{Cart, OrderQueryFilter},
    MarketplaceDatabase,
    OrderFlowApi,
    PaymentReconciliationApi,
    QuoteApi,
};
use log::*;

use crate::{
    auth::AuthenticatedActor,
    data_objects::{ConversionResponse, OrderListParams, StartPaymentRequest, StatusUpdateRequest, WebhookResponse},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $bound:path) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $bound + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $bound:path where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $bound + 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(place_order => Post "/orders" impl MarketplaceDatabase where requires [Role::Buyer]);
/// Route handler for placing an order
///
/// The body is a cart: `{"items": [{"product_id": 1, "quantity": 5}], "delivery_method": "PICKUP"}`. All items must
/// come from the same farm. Prices are resolved at the time of the request and stock is reserved immediately. If any
/// line cannot be reserved, nothing is reserved and the request fails with `409 Conflict`.
pub async fn place_order<B: MarketplaceDatabase>(
    actor: AuthenticatedActor,
    body: web::Json<Cart>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let cart = body.into_inner();
    debug!("💻️ POST order for {} with {} lines", actor.actor(), cart.items.len());
    let order = api.place_order(actor.actor(), cart).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(orders => Get "/orders" impl MarketplaceDatabase);
/// Route handler for listing orders
///
/// Buyers see the orders they placed, farms see the orders placed with them and admins see every order. The list can
/// be narrowed to a single status with `?status=PAID`.
pub async fn orders<B: MarketplaceDatabase>(
    actor: AuthenticatedActor,
    params: web::Query<OrderListParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = params.into_inner();
    debug!("💻️ GET orders for {}", actor.actor());
    let mut query = OrderQueryFilter::default();
    if let Some(status) = params.status {
        query = query.with_status(status);
    }
    let orders = api.search_orders(actor.actor(), query).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{id}" impl MarketplaceDatabase);
pub async fn order_by_id<B: MarketplaceDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id} for {}", actor.actor());
    let order = api.fetch_order(actor.actor(), order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_status => Post "/orders/{id}/status" impl MarketplaceDatabase);
/// Route handler for order status changes
///
/// Body: `{"status": "SHIPPED", "tracking_number": "TH0123", "reason": null}`. Which changes an actor may request
/// depends on their role. Farms confirm, ship and refund. Buyers cancel unpaid orders and confirm delivery. Courier
/// orders need a tracking number to ship.
pub async fn update_order_status<B: MarketplaceDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let request = body.into_inner();
    debug!("💻️ POST status {} for order {order_id} by {}", request.status, actor.actor());
    let order = api.update_order_status(actor.actor(), order_id, request.status, request.details()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(start_payment => Post "/orders/{id}/payment" impl MarketplaceDatabase where requires [Role::Buyer]);
/// Route handler for starting a payment
///
/// Records the provider's payment intent for the order so that later notifications can be matched to it. Calling it
/// again for the same order replaces the previous attempt.
pub async fn start_payment<B: MarketplaceDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    body: web::Json<StartPaymentRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let request = body.into_inner();
    debug!("💻️ POST payment {} for order {order_id}", request.provider_intent_id);
    let payment = api.start_payment(actor.actor(), order_id, &request.method, &request.provider_intent_id).await?;
    Ok(HttpResponse::Created().json(payment))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(payment_webhook => Post "/payments/webhook" impl MarketplaceDatabase);
/// Route handler for payment provider notifications
///
/// The body must be passed to the engine exactly as received, since the signature in the `X-Farmgate-Signature`
/// header covers the raw bytes. An invalid signature is answered with `401 Unauthorized`. Any notification that passes
/// the signature check is answered with `200 OK` and the outcome, including replays and unknown intents, so that the
/// provider stops retrying.
pub async fn payment_webhook<B: MarketplaceDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<PaymentReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received payment notification");
    let signature = match req.headers().get(SIGNATURE_HEADER).map(|v| v.to_str()) {
        Some(Ok(s)) => Some(s),
        Some(Err(e)) => {
            debug!("💻️ The signature header is not valid text. {e}");
            None
        },
        None => None,
    };
    let outcome = api.process_webhook(&body, signature).await?;
    info!("💻️ Payment notification processed. Outcome: {outcome:?}");
    Ok(HttpResponse::Ok().json(WebhookResponse { outcome }))
}

//----------------------------------------------   Inquiries  ----------------------------------------------------
route!(submit_inquiry => Post "/inquiries" impl MarketplaceDatabase where requires [Role::Buyer]);
/// Route handler for wholesale quote requests
///
/// Body: `{"product_id": 4, "quantity": 200, "proposed_price": 8500, "note": "Weekly delivery"}`. The quantity must
/// meet the product's wholesale minimum.
pub async fn submit_inquiry<B: MarketplaceDatabase>(
    actor: AuthenticatedActor,
    body: web::Json<NewInquiryRequest>,
    api: web::Data<QuoteApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST inquiry for product {} by {}", request.product_id, actor.actor());
    let inquiry = api.submit_inquiry(actor.actor(), request).await?;
    Ok(HttpResponse::Created().json(inquiry))
}

route!(inquiry_by_id => Get "/inquiries/{id}" impl MarketplaceDatabase);
pub async fn inquiry_by_id<B: MarketplaceDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    api: web::Data<QuoteApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let inquiry_id = path.into_inner();
    debug!("💻️ GET inquiry {inquiry_id} for {}", actor.actor());
    let inquiry = api.fetch_inquiry(actor.actor(), inquiry_id).await?;
    Ok(HttpResponse::Ok().json(inquiry))
}

route!(post_inquiry_message => Post "/inquiries/{id}/messages" impl MarketplaceDatabase);
/// Route handler for inquiry messages
///
/// Either party may post. When a farm includes `offered_price`, the message is a counter offer.
pub async fn post_inquiry_message<B: MarketplaceDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    body: web::Json<InquiryMessageRequest>,
    api: web::Data<QuoteApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let inquiry_id = path.into_inner();
    debug!("💻️ POST message on inquiry {inquiry_id} by {}", actor.actor());
    let inquiry = api.post_message(actor.actor(), inquiry_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(inquiry))
}

route!(accept_inquiry => Post "/inquiries/{id}/accept" impl MarketplaceDatabase);
/// Route handler for accepting a quote
///
/// The body is optional. Farms may name an `agreed_price`; without one, their latest counter offer is accepted, or
/// failing that, the buyer's proposal. Buyers can only accept the farm's counter offer.
pub async fn accept_inquiry<B: MarketplaceDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    body: Option<web::Json<AcceptInquiryRequest>>,
    api: web::Data<QuoteApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let inquiry_id = path.into_inner();
    let request = body.map(|b| b.into_inner()).unwrap_or_default();
    debug!("💻️ POST accept inquiry {inquiry_id} by {}", actor.actor());
    let inquiry = api.accept_inquiry(actor.actor(), inquiry_id, request.agreed_price).await?;
    Ok(HttpResponse::Ok().json(inquiry))
}

route!(reject_inquiry => Post "/inquiries/{id}/reject" impl MarketplaceDatabase);
pub async fn reject_inquiry<B: MarketplaceDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    api: web::Data<QuoteApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let inquiry_id = path.into_inner();
    debug!("💻️ POST reject inquiry {inquiry_id} by {}", actor.actor());
    let inquiry = api.reject_inquiry(actor.actor(), inquiry_id).await?;
    Ok(HttpResponse::Ok().json(inquiry))
}

route!(convert_inquiry => Post "/inquiries/{id}/convert" impl MarketplaceDatabase where requires [Role::Buyer]);
/// Route handler for converting an accepted quote into an order at the agreed price.
pub async fn convert_inquiry<B: MarketplaceDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    body: Option<web::Json<ConvertInquiryRequest>>,
    api: web::Data<QuoteApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let inquiry_id = path.into_inner();
    let request = body.map(|b| b.into_inner()).unwrap_or_default();
    debug!("💻️ POST convert inquiry {inquiry_id} by {}", actor.actor());
    let (inquiry, order) = api.convert_to_order(actor.actor(), inquiry_id, request.delivery_method).await?;
    Ok(HttpResponse::Created().json(ConversionResponse { inquiry, order }))
}

/// Registers every route on the app. The server and the endpoint tests share this so that they see the same routes.
pub fn configure_routes<B: MarketplaceDatabase + 'static>(cfg: &mut web::ServiceConfig) {
    let api_scope = web::scope("/api")
        .service(PlaceOrderRoute::<B>::new())
        .service(OrdersRoute::<B>::new())
        .service(OrderByIdRoute::<B>::new())
        .service(UpdateOrderStatusRoute::<B>::new())
        .service(StartPaymentRoute::<B>::new())
        .service(SubmitInquiryRoute::<B>::new())
        .service(InquiryByIdRoute::<B>::new())
        .service(PostInquiryMessageRoute::<B>::new())
        .service(AcceptInquiryRoute::<B>::new())
        .service(RejectInquiryRoute::<B>::new())
        .service(ConvertInquiryRoute::<B>::new());
    cfg.service(health).service(PaymentWebhookRoute::<B>::new()).service(api_scope);
}
