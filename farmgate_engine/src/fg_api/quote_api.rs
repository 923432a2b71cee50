use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    db_types::{
        Actor,
        DeliveryMethod,
        Inquiry,
        InquiryStatusType,
        NewInquiry,
        NewInquiryMessage,
        NewOrder,
        NewOrderItem,
        Order,
        Role,
        Satang,
    },
    events::{EventProducers, InquiryRespondedEvent},
    fg_api::{
        inquiry_objects::{InquiryMessageRequest, NewInquiryRequest},
        order_flow_api::apply_fees,
        order_objects::FeeSchedule,
    },
    helpers::{new_inquiry_number, new_order_number},
    lifecycle::InvalidTransition,
    traits::{MarketplaceDatabase, MarketplaceError, SweepResult},
};

/// The number of hours an inquiry stays open for negotiation, unless configured otherwise.
pub const DEFAULT_INQUIRY_TTL_HOURS: i64 = 7 * 24;

/// `QuoteApi` runs wholesale price negotiations between a buyer and a farm.
///
/// A buyer opens an inquiry for a quantity of one product at a proposed unit price. The parties exchange messages (the
/// farm may make counter offers) until one of them accepts or rejects the deal. An accepted inquiry can be converted
/// into exactly one order at the agreed price. Open inquiries that are not settled within the time-to-live are expired
/// by a periodic sweep.
///
/// No stock is reserved while negotiating. Stock is reserved only when the inquiry is converted.
pub struct QuoteApi<B> {
    db: B,
    producers: EventProducers,
    inquiry_ttl: Duration,
    fees: FeeSchedule,
}

impl<B> Debug for QuoteApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "QuoteApi (ttl: {}h, {:?})", self.inquiry_ttl.num_hours(), self.fees)
    }
}

impl<B> QuoteApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        let inquiry_ttl = Duration::hours(DEFAULT_INQUIRY_TTL_HOURS);
        Self { db, producers, inquiry_ttl, fees: FeeSchedule::default() }
    }

    pub fn with_inquiry_ttl(mut self, ttl: Duration) -> Self {
        self.inquiry_ttl = ttl;
        self
    }

    pub fn with_fee_schedule(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    pub fn inquiry_ttl(&self) -> Duration {
        self.inquiry_ttl
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

fn ensure_party(actor: &Actor, inquiry: &Inquiry) -> Result<(), MarketplaceError> {
    if actor.owns(&inquiry.buyer_id, &inquiry.farm_id) {
        Ok(())
    } else {
        Err(MarketplaceError::ForbiddenAccess(format!("{actor} may not access inquiry {}", inquiry.inquiry_number)))
    }
}

fn ensure_not_expired(inquiry: &Inquiry, now: DateTime<Utc>) -> Result<(), MarketplaceError> {
    if inquiry.status.is_open() && inquiry.is_past_expiry(now) {
        Err(MarketplaceError::InquiryExpired(inquiry.inquiry_number.clone()))
    } else {
        Ok(())
    }
}

/// The price an acceptance by `actor` settles on.
///
/// * Farms (and admins) agree on `price` if given, else their counter offer, else the buyer's proposal.
/// * Buyers may only accept the farm's counter offer. Naming any other price, or accepting before the farm has
///   countered, is forbidden.
pub fn agreed_price_for(actor: &Actor, inquiry: &Inquiry, price: Option<Satang>) -> Result<Satang, MarketplaceError> {
    let agreed_price = match actor.role {
        Role::Buyer => match (inquiry.counter_price, price) {
            (Some(counter), None) => counter,
            (Some(counter), Some(p)) if p == counter => counter,
            (Some(_), Some(p)) => {
                return Err(MarketplaceError::ForbiddenAccess(format!(
                    "{actor} cannot set the price of inquiry {} to {p}. Only the farm's offer can be accepted",
                    inquiry.inquiry_number
                )));
            },
            (None, _) => {
                return Err(MarketplaceError::ForbiddenAccess(format!(
                    "{actor} cannot accept inquiry {} before the farm has made an offer",
                    inquiry.inquiry_number
                )));
            },
        },
        Role::Farm | Role::Admin | Role::System => {
            price.or(inquiry.counter_price).unwrap_or(inquiry.proposed_price)
        },
    };
    if agreed_price.is_positive() {
        Ok(agreed_price)
    } else {
        Err(MarketplaceError::InvalidPrice(agreed_price))
    }
}

impl<B> QuoteApi<B>
where B: MarketplaceDatabase
{
    /// Opens a new inquiry on behalf of a buyer.
    ///
    /// The product must exist, the quantity must be at least the product's wholesale minimum, and the proposed price
    /// must be positive. These checks all run before anything is stored.
    pub async fn submit_inquiry(&self, actor: &Actor, request: NewInquiryRequest) -> Result<Inquiry, MarketplaceError> {
        if actor.role != Role::Buyer {
            return Err(MarketplaceError::ForbiddenAccess(format!("{actor} cannot open inquiries")));
        }
        if request.quantity <= 0 {
            return Err(MarketplaceError::InvalidQuantity(request.quantity));
        }
        if !request.proposed_price.is_positive() {
            return Err(MarketplaceError::InvalidPrice(request.proposed_price));
        }
        let product = self
            .db
            .fetch_product(request.product_id)
            .await?
            .ok_or(MarketplaceError::ProductNotFound(request.product_id))?;
        if request.quantity < product.moq_wholesale {
            return Err(MarketplaceError::BelowMinimumOrderQuantity {
                product_id: product.id,
                requested: request.quantity,
                minimum: product.moq_wholesale,
            });
        }
        let now = Utc::now();
        let note = request.note.filter(|n| !n.trim().is_empty());
        let inquiry = NewInquiry {
            inquiry_number: new_inquiry_number(now),
            buyer_id: actor.id.clone(),
            farm_id: product.farm_id.clone(),
            product_id: product.id,
            quantity: request.quantity,
            proposed_price: request.proposed_price,
            expires_at: now + self.inquiry_ttl,
            note,
        };
        let inquiry = self.db.insert_inquiry(inquiry).await?;
        info!(
            "🤝️ Inquiry {} opened by {actor} for {} {} of '{}' at {} per {}",
            inquiry.inquiry_number, inquiry.quantity, product.unit, product.name, inquiry.proposed_price, product.unit
        );
        Ok(inquiry)
    }

    pub async fn fetch_inquiry(&self, actor: &Actor, inquiry_id: i64) -> Result<Inquiry, MarketplaceError> {
        let inquiry =
            self.db.fetch_inquiry(inquiry_id).await?.ok_or(MarketplaceError::InquiryNotFound(inquiry_id))?;
        ensure_party(actor, &inquiry)?;
        Ok(inquiry)
    }

    /// Posts a message to an open inquiry.
    ///
    /// The first message after the inquiry was opened moves it from `PENDING` to `NEGOTIATING`. If a farm includes a
    /// price, it becomes the farm's current counter offer. A price posted by the buyer is kept with the message only.
    pub async fn post_message(
        &self,
        actor: &Actor,
        inquiry_id: i64,
        request: InquiryMessageRequest,
    ) -> Result<Inquiry, MarketplaceError> {
        let inquiry = self.fetch_inquiry(actor, inquiry_id).await?;
        ensure_not_expired(&inquiry, Utc::now())?;
        if !inquiry.status.is_open() {
            return Err(InvalidTransition::new("Inquiry", inquiry.status, InquiryStatusType::Negotiating).into());
        }
        let mut message = NewInquiryMessage::new(actor, request.body);
        let mut counter_price = None;
        if let Some(price) = request.offered_price {
            if !price.is_positive() {
                return Err(MarketplaceError::InvalidPrice(price));
            }
            message = message.with_offer(price);
            if actor.role == Role::Farm {
                counter_price = Some(price);
            }
        }
        let transition = match inquiry.status {
            InquiryStatusType::Pending => Some(inquiry.status.transition_to(InquiryStatusType::Negotiating)?),
            _ => None,
        };
        let updated =
            self.db.append_inquiry_message(inquiry.id, inquiry.status, transition, message, counter_price).await?;
        match counter_price {
            Some(price) => info!("🤝️ {actor} made a counter offer of {price} on inquiry {}", updated.inquiry_number),
            None => debug!("🤝️ {actor} posted a message on inquiry {}", updated.inquiry_number),
        }
        if actor.role == Role::Farm {
            self.producers.publish_inquiry_responded(InquiryRespondedEvent::new(updated.clone())).await;
        }
        Ok(updated)
    }

    /// A farm's counter offer: a message carrying the unit price the farm is prepared to sell at.
    pub async fn counter_offer(
        &self,
        actor: &Actor,
        inquiry_id: i64,
        price: Satang,
        body: &str,
    ) -> Result<Inquiry, MarketplaceError> {
        if actor.role != Role::Farm {
            return Err(MarketplaceError::ForbiddenAccess(format!("{actor} cannot make counter offers")));
        }
        self.post_message(actor, inquiry_id, InquiryMessageRequest::new(body).with_offer(price)).await
    }

    /// Accepts the deal on an open inquiry.
    ///
    /// The farm accepts either the buyer's proposal outright, its own counter offer, or an explicit price of its
    /// choosing. The buyer can only take up the farm's current counter offer. See [`agreed_price_for`].
    pub async fn accept_inquiry(
        &self,
        actor: &Actor,
        inquiry_id: i64,
        price: Option<Satang>,
    ) -> Result<Inquiry, MarketplaceError> {
        let inquiry = self.fetch_inquiry(actor, inquiry_id).await?;
        ensure_not_expired(&inquiry, Utc::now())?;
        let transition = inquiry.status.transition_to(InquiryStatusType::Accepted)?;
        let agreed_price = agreed_price_for(actor, &inquiry, price)?;
        let updated = self.db.transition_inquiry(inquiry.id, transition, Some(agreed_price)).await?;
        info!("🤝️ Inquiry {} accepted by {actor} at {agreed_price}", updated.inquiry_number);
        Ok(updated)
    }

    pub async fn reject_inquiry(&self, actor: &Actor, inquiry_id: i64) -> Result<Inquiry, MarketplaceError> {
        let inquiry = self.fetch_inquiry(actor, inquiry_id).await?;
        ensure_not_expired(&inquiry, Utc::now())?;
        let transition = inquiry.status.transition_to(InquiryStatusType::Rejected)?;
        let updated = self.db.transition_inquiry(inquiry.id, transition, None).await?;
        info!("🤝️ Inquiry {} rejected by {actor}", updated.inquiry_number);
        Ok(updated)
    }

    /// Expires every open inquiry whose deadline lies before `now`.
    pub async fn expire_inquiries(&self, now: DateTime<Utc>) -> Result<SweepResult<Inquiry>, MarketplaceError> {
        let expired = self.db.expire_inquiries(now).await?;
        if !expired.is_empty() {
            info!("🕰️ {} inquiries expired", expired.len());
        }
        Ok(SweepResult::new(expired, now))
    }

    /// Turns an accepted inquiry into an order at the agreed price.
    ///
    /// Only the buyer may convert. Stock is reserved, the order is stored and the inquiry moves to `CONVERTED` in a
    /// single transaction, so an inquiry yields at most one order.
    pub async fn convert_to_order(
        &self,
        actor: &Actor,
        inquiry_id: i64,
        delivery_method: DeliveryMethod,
    ) -> Result<(Inquiry, Order), MarketplaceError> {
        let inquiry = self.fetch_inquiry(actor, inquiry_id).await?;
        if actor.role != Role::Buyer {
            return Err(MarketplaceError::ForbiddenAccess(format!("{actor} cannot convert inquiries into orders")));
        }
        let transition = inquiry.status.transition_to(InquiryStatusType::Converted)?;
        let agreed_price = inquiry.agreed_price.ok_or(MarketplaceError::MissingAgreedPrice(inquiry.id))?;
        let order = self.negotiated_order(&inquiry, agreed_price, delivery_method)?;
        let (inquiry, order) = self.db.convert_inquiry(inquiry.id, transition, order).await?;
        info!(
            "🤝️ Inquiry {} converted into order {} for {} by {actor}",
            inquiry.inquiry_number, order.order_number, order.total
        );
        Ok((inquiry, order))
    }

    fn negotiated_order(
        &self,
        inquiry: &Inquiry,
        agreed_price: Satang,
        delivery_method: DeliveryMethod,
    ) -> Result<NewOrder, MarketplaceError> {
        let order = NewOrder::new(new_order_number(Utc::now()), inquiry.buyer_id.as_str(), inquiry.farm_id.as_str())
            .with_delivery_method(delivery_method)
            .with_item(NewOrderItem::new(inquiry.product_id, inquiry.quantity, agreed_price))
            .with_source_inquiry(inquiry.id);
        apply_fees(order, &self.fees)
    }
}
