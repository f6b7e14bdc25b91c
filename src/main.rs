//! Shopfront CLI

use std::{process::ExitCode, sync::Arc};

use anyhow::Context;
use serde::Serialize;
use tracing::{error, info};

use shopfront::{
    config::{Command, StorefrontConfig},
    fixtures::Fixture,
    observability,
    service::{CartService, ServiceError},
    store::OwnerKey,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExpireReport {
    deactivated: usize,
}

#[derive(Debug, Serialize)]
struct ErrorReport {
    error: &'static str,
    message: String,
}

/// Shopfront CLI entry point
fn main() -> ExitCode {
    let config = StorefrontConfig::load().unwrap_or_else(|e| e.exit());

    if let Err(e) = observability::init_subscriber(&config.logging) {
        #[expect(
            clippy::print_stderr,
            reason = "logging failed to initialise, must use eprintln"
        )]
        {
            eprintln!("Logging error: {e}");
        }

        return ExitCode::FAILURE;
    }

    match run(&config) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");

            ExitCode::FAILURE
        }
    }
}

fn run(config: &StorefrontConfig) -> anyhow::Result<ExitCode> {
    let pricing = config
        .pricing
        .settings()
        .context("invalid pricing configuration")?;

    let fixture = Fixture::with_base_path(&config.fixtures)
        .into_set(&config.fixture_set)
        .with_context(|| format!("failed to load fixture set {:?}", config.fixture_set))?;

    let service = CartService::new(
        Arc::new(fixture.catalog()),
        Arc::new(fixture.promotion_repository()?),
        Arc::new(fixture.cart_store()),
        pricing,
    );

    let today = config.today();

    info!(%today, set = %config.fixture_set, "loaded fixtures");

    let result = match &config.command {
        Command::Validate { cart } => service
            .validate_cart(&OwnerKey::from(cart.as_str()), today)
            .map(|report| to_json(&report)),
        Command::Apply { cart, code } => service
            .apply_promotion(&OwnerKey::from(cart.as_str()), code, today)
            .map(|report| to_json(&report)),
        Command::Expire => service
            .expire_promotions(today)
            .map(|deactivated| to_json(&ExpireReport { deactivated })),
    };

    match result {
        Ok(json) => {
            print(&json?);

            Ok(ExitCode::SUCCESS)
        }
        Err(err) if err.is_user_facing() => {
            print(&rejection(&err)?);

            Ok(ExitCode::from(2))
        }
        Err(err) => Err(err.into()),
    }
}

fn rejection(err: &ServiceError) -> serde_json::Result<String> {
    to_json(&ErrorReport {
        error: err.kind(),
        message: err.to_string(),
    })
}

fn to_json(value: &impl Serialize) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

fn print(json: &str) {
    #[expect(clippy::print_stdout, reason = "command output is the JSON report")]
    {
        println!("{json}");
    }
}
