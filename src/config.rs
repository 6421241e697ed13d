//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `VELOCITY_MAX_EVENTS` (optional): transactions allowed per merchant per window, defaults to 10
/// - `VELOCITY_WINDOW_SECS` (optional): sliding window length in seconds, defaults to 60
/// - `MAX_PAYMENT_AMOUNT` (optional): upper bound on a single payment amount, defaults to 1000000
/// - `CALLBACK_SECRET` (optional): shared secret for HMAC verification of provider callbacks;
///   when unset, callback signatures are not checked
/// - `BOOTSTRAP_API_KEY` (optional): raw API key seeded into an empty `api_keys` table at startup
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_velocity_max_events")]
    pub velocity_max_events: usize,

    #[serde(default = "default_velocity_window_secs")]
    pub velocity_window_secs: u64,

    #[serde(default = "default_max_payment_amount")]
    pub max_payment_amount: Decimal,

    pub callback_secret: Option<String>,

    pub bootstrap_api_key: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_velocity_max_events() -> usize {
    10
}

fn default_velocity_window_secs() -> u64 {
    60
}

fn default_max_payment_amount() -> Decimal {
    Decimal::from(1_000_000)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Parse environment variables into Config struct
        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }
}
