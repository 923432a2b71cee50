use chrono::{Duration, Utc};
use farmgate_engine::{
    db_types::{Inquiry, Order},
    events::EventProducers,
    order_objects::FeeSchedule,
    OrderFlowApi,
    QuoteApi,
    SqliteDatabase,
};
use log::*;
use tokio::task::JoinHandle;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each tick closes open inquiries that are past their expiry time and, when `unpaid_order_timeout` is set, cancels
/// `PENDING` orders that have waited longer than that for payment.
pub fn start_expiry_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    fees: FeeSchedule,
    inquiry_ttl: Duration,
    unpaid_order_timeout: Option<Duration>,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let quotes = QuoteApi::new(db.clone(), producers.clone()).with_inquiry_ttl(inquiry_ttl).with_fee_schedule(fees);
        let orders = OrderFlowApi::new(db, producers).with_fee_schedule(fees);
        info!("🕰️ Expiry worker started. Sweeping every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running inquiry expiry job");
            match quotes.expire_inquiries(Utc::now()).await {
                Ok(result) if !result.is_empty() => {
                    info!("🕰️ {} inquiries expired", result.count());
                    debug!("🕰️ Expired inquiries: {}", inquiry_list(&result.affected));
                },
                Ok(_) => {},
                Err(e) => error!("🕰️ Error running inquiry expiry job: {e}"),
            }
            let Some(timeout) = unpaid_order_timeout else { continue };
            trace!("🕰️ Running unpaid order expiry job");
            match orders.cancel_stale_orders(timeout).await {
                Ok(result) if !result.is_empty() => {
                    debug!("🕰️ Cancelled unpaid orders: {}", order_list(&result.affected));
                },
                Ok(_) => {},
                Err(e) => error!("🕰️ Error running unpaid order expiry job: {e}"),
            }
        }
    })
}

fn inquiry_list(inquiries: &[Inquiry]) -> String {
    inquiries
        .iter()
        .map(|i| format!("[{}] {} buyer: {} farm: {}", i.id, i.inquiry_number, i.buyer_id, i.farm_id))
        .collect::<Vec<String>>()
        .join(", ")
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] {} buyer: {} farm: {}", o.id, o.order_number, o.buyer_id, o.farm_id))
        .collect::<Vec<String>>()
        .join(", ")
}
