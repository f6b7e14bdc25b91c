//! Storefront configuration

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use jiff::{Zoned, civil::Date};
use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use thiserror::Error;

use crate::{cart::totals::VatRate, money::find_currency};

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// VAT can't be negative.
    #[error("VAT rate must not be negative, got {0}")]
    NegativeVatRate(Decimal),

    /// VAT is a percentage.
    #[error("VAT rate must not exceed 100, got {0}")]
    VatRateTooHigh(Decimal),

    /// Not an ISO 4217 code.
    #[error("unknown currency code {0:?}")]
    UnknownCurrency(String),
}

/// Log output format.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Pricing settings as given on the command line or environment.
#[derive(Debug, Args)]
pub struct PricingConfig {
    /// VAT percentage applied to the discounted subtotal
    #[arg(long, env = "VAT_RATE", default_value = "20")]
    pub vat_rate: Decimal,

    /// ISO 4217 currency code used for rounding
    #[arg(long, env = "STORE_CURRENCY", default_value = "GBP")]
    pub currency: String,
}

impl PricingConfig {
    /// Validate into settings the cart service can use.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NegativeVatRate`]: the VAT rate is below zero.
    /// - [`ConfigError::VatRateTooHigh`]: the VAT rate is above 100.
    /// - [`ConfigError::UnknownCurrency`]: the currency code isn't recognised.
    pub fn settings(&self) -> Result<PricingSettings, ConfigError> {
        let vat_rate = VatRate::new(self.vat_rate)?;

        let currency = find_currency(&self.currency)
            .ok_or_else(|| ConfigError::UnknownCurrency(self.currency.clone()))?;

        Ok(PricingSettings { vat_rate, currency })
    }
}

/// Validated pricing settings.
#[derive(Debug, Clone, Copy)]
pub struct PricingSettings {
    /// VAT rate for totals
    pub vat_rate: VatRate,

    /// Currency whose minor units amounts are rounded to
    pub currency: &'static Currency,
}

/// Shopfront command line configuration
#[derive(Debug, Parser)]
#[command(name = "shopfront", about = "Cart reconciliation and promotion engine", long_about = None)]
pub struct StorefrontConfig {
    /// Pricing settings.
    #[command(flatten)]
    pub pricing: PricingConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Directory holding fixture sets
    #[arg(long, env = "FIXTURES_PATH", default_value = "./fixtures")]
    pub fixtures: PathBuf,

    /// Fixture set to load
    #[arg(long, env = "FIXTURE_SET", default_value = "default")]
    pub fixture_set: String,

    /// Evaluation date (YYYY-MM-DD); defaults to today in the system time zone
    #[arg(long, env = "STORE_TODAY")]
    pub today: Option<Date>,

    /// Operation to run.
    #[command(subcommand)]
    pub command: Command,
}

impl StorefrontConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// The evaluation date.
    #[must_use]
    pub fn today(&self) -> Date {
        self.today.unwrap_or_else(|| Zoned::now().date())
    }
}

/// Shopfront operations.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile a stored cart and print the report
    Validate {
        /// Cart owner key
        #[arg(long)]
        cart: String,
    },

    /// Apply a promotion code to a stored cart
    Apply {
        /// Cart owner key
        #[arg(long)]
        cart: String,

        /// Promotion code, matched case-sensitively
        #[arg(long)]
        code: String,
    },

    /// Deactivate promotions whose end date has passed
    Expire,
}
