mod reference_numbers;
mod webhook_signature;

pub use reference_numbers::{new_inquiry_number, new_order_number};
pub use webhook_signature::{sign_payload, verify_webhook_signature, SignatureError, WebhookSignature, SIGNATURE_HEADER};
