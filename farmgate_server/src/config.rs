use std::env;

use chrono::Duration;
use farmgate_common::{helpers::parse_boolean_flag, Satang, Secret};
use farmgate_engine::{order_objects::FeeSchedule, DEFAULT_INQUIRY_TTL_HOURS, DEFAULT_SIGNATURE_TOLERANCE};
use log::*;

const DEFAULT_FG_HOST: &str = "127.0.0.1";
const DEFAULT_FG_PORT: u16 = 8380;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/farmgate.db";
const DEFAULT_EXPIRY_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the embedded schema migrations are applied when the server starts.
    pub run_migrations: bool,
    pub payment: PaymentConfig,
    pub fees: FeeSchedule,
    /// The time a wholesale inquiry stays open before the expiry worker closes it.
    pub inquiry_ttl: Duration,
    /// When set, `PENDING` orders older than this are cancelled and their stock released.
    pub unpaid_order_timeout: Option<Duration>,
    /// The time between runs of the expiry worker.
    pub expiry_sweep_interval: std::time::Duration,
}

#[derive(Clone, Debug)]
pub struct PaymentConfig {
    /// The secret shared with the payment provider for signing notifications. If empty, every notification is
    /// rejected.
    pub webhook_secret: Secret<String>,
    /// The maximum age of a notification signature. `None` disables the timestamp check.
    pub signature_tolerance: Option<Duration>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self { webhook_secret: Secret::default(), signature_tolerance: Some(Duration::seconds(DEFAULT_SIGNATURE_TOLERANCE)) }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FG_HOST.to_string(),
            port: DEFAULT_FG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            run_migrations: true,
            payment: PaymentConfig::default(),
            fees: FeeSchedule::default(),
            inquiry_ttl: Duration::hours(DEFAULT_INQUIRY_TTL_HOURS),
            unpaid_order_timeout: None,
            expiry_sweep_interval: DEFAULT_EXPIRY_SWEEP_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let host = env::var("FG_HOST").ok().unwrap_or_else(|| DEFAULT_FG_HOST.into());
        let port = parse_env("FG_PORT", DEFAULT_FG_PORT);
        let database_url = env::var("FG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ FG_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let run_migrations = parse_boolean_flag(env::var("FG_RUN_MIGRATIONS").ok(), true);
        let payment = PaymentConfig::from_env_or_default();
        let fees = FeeSchedule {
            farm_delivery_fee: Satang::from(parse_env("FG_DELIVERY_FEE_FARM", defaults.fees.farm_delivery_fee.value())),
            courier_fee: Satang::from(parse_env("FG_DELIVERY_FEE_COURIER", defaults.fees.courier_fee.value())),
            platform_fee_bps: parse_env("FG_PLATFORM_FEE_BPS", defaults.fees.platform_fee_bps),
        };
        let inquiry_ttl = parse_hours(env::var("FG_INQUIRY_TTL").ok())
            .map_err(|e| {
                if let Some(e) = e {
                    warn!("🪛️ Invalid configuration value for FG_INQUIRY_TTL. {e}");
                }
                info!("🪛️ Using the default inquiry lifetime of {DEFAULT_INQUIRY_TTL_HOURS} hrs.");
            })
            .unwrap_or(defaults.inquiry_ttl);
        let unpaid_order_timeout = match parse_hours(env::var("FG_UNPAID_ORDER_TIMEOUT").ok()) {
            Ok(timeout) => {
                info!("🪛️ Unpaid orders will be cancelled after {} hrs.", timeout.num_hours());
                Some(timeout)
            },
            Err(None) => {
                info!("🪛️ FG_UNPAID_ORDER_TIMEOUT is not set. Unpaid orders will never be cancelled automatically.");
                None
            },
            Err(Some(e)) => {
                warn!("🪛️ Invalid configuration value for FG_UNPAID_ORDER_TIMEOUT. {e} The timeout is disabled.");
                None
            },
        };
        let interval = parse_env("FG_EXPIRY_SWEEP_INTERVAL", DEFAULT_EXPIRY_SWEEP_INTERVAL.as_secs()).max(1);
        let expiry_sweep_interval = std::time::Duration::from_secs(interval);
        Self {
            host,
            port,
            database_url,
            run_migrations,
            payment,
            fees,
            inquiry_ttl,
            unpaid_order_timeout,
            expiry_sweep_interval,
        }
    }
}

impl PaymentConfig {
    pub fn from_env_or_default() -> Self {
        let webhook_secret = env::var("FG_PAYMENT_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ FG_PAYMENT_WEBHOOK_SECRET is not set. Every payment notification will be rejected until it is \
                 configured."
            );
            String::default()
        });
        let tolerance = parse_env("FG_PAYMENT_SIGNATURE_TOLERANCE", DEFAULT_SIGNATURE_TOLERANCE);
        let signature_tolerance = signature_tolerance(tolerance);
        if signature_tolerance.is_none() {
            warn!("🚨️ The payment signature timestamp check is disabled. Replayed notifications will be accepted.");
        }
        Self { webhook_secret: Secret::new(webhook_secret), signature_tolerance }
    }
}

/// Zero or negative values disable the timestamp check.
fn signature_tolerance(seconds: i64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::seconds(seconds))
}

/// Parses a positive number of hours. `Err(None)` means the value was not given at all.
fn parse_hours(value: Option<String>) -> Result<Duration, Option<String>> {
    let value = value.ok_or(None)?;
    match value.trim().parse::<i64>() {
        Ok(hours) if hours > 0 => Ok(Duration::hours(hours)),
        Ok(hours) => Err(Some(format!("{hours} is not a positive number of hours."))),
        Err(e) => Err(Some(format!("{value} is not a number of hours. {e}"))),
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}
