//! Signs a payment notification the way the payment provider does, for poking at a running server by hand:
//!
//! ```text
//! cargo run --example sign_webhook -- whsec_local event.json
//! ```
//!
//! Prints the `X-Farmgate-Signature` header value for the file's exact bytes.
use chrono::Utc;
use farmgate_engine::helpers::{sign_payload, SIGNATURE_HEADER};

fn main() {
    let mut args = std::env::args();
    args.next(); // executable name
    let Some(secret) = args.next() else {
        println!("The webhook secret is required");
        return;
    };
    let Some(path) = args.next() else {
        println!("The path to the notification body is required");
        return;
    };
    let body = match std::fs::read(&path) {
        Ok(body) => body,
        Err(e) => {
            eprintln!("Could not read {path}. {e}");
            return;
        },
    };

    match sign_payload(&secret, Utc::now().timestamp(), &body) {
        Ok(signature) => println!("{SIGNATURE_HEADER}: {signature}"),
        Err(e) => eprintln!("Invalid input. {e}"),
    }
}
