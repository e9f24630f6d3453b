//! Crier: scheduled outbound voice notifications against a daily roster.
//!
//! Main binary with subcommands:
//! - `run`: one scheduling pass (intended to be invoked by cron or similar)
//! - `daemon`: run passes on a fixed interval until ctrl-c
//! - `provision`: materialize today's roster sheet without placing calls

use std::path::PathBuf;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use miette::Result;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crier_engine::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_REFERENCE_OFFSET, DEFAULT_RETRY_DELAY_MINUTES, Driver,
    MediaLibrary, PassSummary, ReferenceZone, RetryPolicy,
};
use crier_roster::{RosterClient, ensure_daily_sheet};
use crier_telephony::VoiceClient;

mod daemon;

#[derive(Parser)]
#[command(name = "crier")]
#[command(about = "Scheduled outbound voice notifications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Roster store connection.
#[derive(Args)]
struct StoreArgs {
    /// Sheet API base URL
    #[arg(
        long,
        env = "CRIER_SHEETS_URL",
        default_value = "https://sheets.googleapis.com"
    )]
    sheets_url: String,

    /// Sheet API access token
    #[arg(long, env = "CRIER_SHEETS_TOKEN", hide_env_values = true)]
    sheets_token: String,

    /// Workbook holding the template and daily roster sheets
    #[arg(long, env = "CRIER_WORKBOOK")]
    workbook: String,

    /// Template sheet the daily roster is provisioned from
    #[arg(long, env = "CRIER_TEMPLATE_SHEET", default_value = "master")]
    template_sheet: String,

    /// Reference timezone offset for persisted timestamps (e.g. +05:30)
    #[arg(long, env = "CRIER_UTC_OFFSET", default_value = DEFAULT_REFERENCE_OFFSET)]
    utc_offset: String,
}

/// Telephony provider account.
#[derive(Args)]
struct ProviderArgs {
    /// Provider API base URL
    #[arg(
        long,
        env = "CRIER_PROVIDER_URL",
        default_value = "https://api.twilio.com"
    )]
    provider_url: String,

    /// Provider account SID
    #[arg(long, env = "CRIER_ACCOUNT_SID")]
    account_sid: String,

    /// Provider auth token
    #[arg(long, env = "CRIER_AUTH_TOKEN", hide_env_values = true)]
    auth_token: String,

    /// Number outbound calls are placed from
    #[arg(long, env = "CRIER_CALLER_NUMBER")]
    caller_number: String,
}

/// Scheduling policy.
#[derive(Args)]
struct PolicyArgs {
    /// Media library JSON file mapping locations to audio URLs
    #[arg(long, env = "CRIER_MEDIA_MAP")]
    media_map: PathBuf,

    /// Minutes between retry attempts
    #[arg(long, env = "CRIER_RETRY_DELAY", default_value_t = DEFAULT_RETRY_DELAY_MINUTES)]
    retry_delay: i64,

    /// Maximum placed-call attempts per recipient per day
    #[arg(long, env = "CRIER_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scheduling pass over today's roster
    Run {
        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        provider: ProviderArgs,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Run scheduling passes on a fixed interval until ctrl-c
    Daemon {
        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        provider: ProviderArgs,

        #[command(flatten)]
        policy: PolicyArgs,

        /// Seconds between passes
        #[arg(long, env = "CRIER_INTERVAL", default_value = "300")]
        interval: u64,
    },

    /// Materialize today's roster sheet from the template, placing no calls
    Provision {
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "crier=info,crier_engine=info,crier_roster=info,crier_telephony=info".to_string()
            }),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            store,
            provider,
            policy,
        } => {
            let template = store.template_sheet.clone();
            let driver = build_driver(store, provider, policy)?;
            run_pass(&driver, &template).await?;
            Ok(())
        }

        Commands::Daemon {
            store,
            provider,
            policy,
            interval,
        } => {
            let template = store.template_sheet.clone();
            let driver = build_driver(store, provider, policy)?;
            daemon::run(driver, template, interval).await
        }

        Commands::Provision { store } => {
            let zone = parse_zone(&store.utc_offset)?;
            let roster = RosterClient::new(store.sheets_url, store.workbook, store.sheets_token);
            let sheet = ensure_daily_sheet(&roster, &store.template_sheet, Utc::now(), zone.offset())
                .await
                .map_err(|e| miette::miette!("{}", e))?;
            tracing::info!(sheet = %sheet, "roster provisioned");
            Ok(())
        }
    }
}

fn parse_zone(offset: &str) -> Result<ReferenceZone> {
    ReferenceZone::parse(offset).map_err(|e| miette::miette!("{}", e))
}

/// Assemble the driver from parsed configuration. Everything the pass needs
/// is constructed here, once, and owned by the driver.
fn build_driver(store: StoreArgs, provider: ProviderArgs, policy: PolicyArgs) -> Result<Driver> {
    let zone = parse_zone(&store.utc_offset)?;

    let media = MediaLibrary::load(&policy.media_map).map_err(|e| miette::miette!("{}", e))?;
    if media.is_empty() {
        warn!(path = %policy.media_map.display(), "media library is empty, every due row will be skipped");
    }

    let roster = RosterClient::new(store.sheets_url, store.workbook, store.sheets_token);
    let voice = VoiceClient::new(
        provider.provider_url,
        provider.account_sid,
        provider.auth_token,
        provider.caller_number,
    );

    Ok(Driver::new(
        roster,
        voice,
        media,
        RetryPolicy::new(policy.retry_delay, policy.max_attempts),
        zone,
    ))
}

/// Ensure today's sheet exists, then run one pass over it.
async fn run_pass(driver: &Driver, template: &str) -> Result<PassSummary> {
    let now = Utc::now();

    let sheet = ensure_daily_sheet(driver.roster(), template, now, driver.zone().offset())
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    driver
        .run_once(&sheet, now)
        .await
        .map_err(|e| miette::miette!("{}", e))
}
