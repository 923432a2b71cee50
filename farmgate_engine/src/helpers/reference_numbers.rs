//! Human-legible references for orders and inquiries, e.g. `FG-261019-7K3QXH`.
//!
//! The suffix alphabet leaves out characters that are easily confused when read over the phone (`0`/`O`, `1`/`I`).
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::db_types::OrderNumber;

const ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
const SUFFIX_LEN: usize = 6;

fn reference(prefix: &str, at: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect();
    format!("{prefix}-{}-{suffix}", at.format("%y%m%d"))
}

pub fn new_order_number(at: DateTime<Utc>) -> OrderNumber {
    OrderNumber(reference("FG", at))
}

pub fn new_inquiry_number(at: DateTime<Utc>) -> String {
    reference("QT", at)
}
