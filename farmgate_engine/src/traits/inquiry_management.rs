use chrono::{DateTime, Utc};

use crate::{
    db_types::{Inquiry, InquiryStatusType, NewInquiry, NewInquiryMessage, NewOrder, Order, Satang},
    lifecycle::InquiryTransition,
    traits::MarketplaceError,
};

/// The `InquiryManagement` trait defines how wholesale inquiries and their negotiation history are persisted.
///
/// As with orders, every status change is a compare-and-set on the status column. If the inquiry has moved on in the
/// meantime, the change fails with [`MarketplaceError::InvalidStateTransition`].
#[allow(async_fn_in_trait)]
pub trait InquiryManagement {
    /// Stores a new `PENDING` inquiry. If the inquiry carries an opening note, it is stored as the first message.
    async fn insert_inquiry(&self, inquiry: NewInquiry) -> Result<Inquiry, MarketplaceError>;

    /// Fetches the inquiry with the given id, along with all of its messages, oldest first.
    async fn fetch_inquiry(&self, inquiry_id: i64) -> Result<Option<Inquiry>, MarketplaceError>;

    /// Appends a message to the inquiry's history.
    ///
    /// The inquiry must still be in `expected` status. If `transition` is given, the status moves as part of the same
    /// transaction. A `counter_price` replaces the inquiry's current counter offer.
    async fn append_inquiry_message(
        &self,
        inquiry_id: i64,
        expected: InquiryStatusType,
        transition: Option<InquiryTransition>,
        message: NewInquiryMessage,
        counter_price: Option<Satang>,
    ) -> Result<Inquiry, MarketplaceError>;

    /// Applies a validated status change. An `agreed_price` is stored along with the change.
    async fn transition_inquiry(
        &self,
        inquiry_id: i64,
        transition: InquiryTransition,
        agreed_price: Option<Satang>,
    ) -> Result<Inquiry, MarketplaceError>;

    /// In one atomic transaction, moves the inquiry from `ACCEPTED` to `CONVERTED`, reserves stock for the order and
    /// stores it. Exactly one order is ever created for an inquiry.
    async fn convert_inquiry(
        &self,
        inquiry_id: i64,
        transition: InquiryTransition,
        order: NewOrder,
    ) -> Result<(Inquiry, Order), MarketplaceError>;

    /// Moves every `PENDING` or `NEGOTIATING` inquiry whose `expires_at` lies before `now` to `EXPIRED`.
    async fn expire_inquiries(&self, now: DateTime<Utc>) -> Result<Vec<Inquiry>, MarketplaceError>;
}
