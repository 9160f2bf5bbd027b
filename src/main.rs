use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, error};
use tokio_util::sync::CancellationToken;

use daysync::config::Config;
use daysync::days_api::DaysApiClient;
use daysync::http_server;
use daysync::presence::Scanner;
use daysync::sync_service::SyncService;

#[derive(Parser)]
#[command(name = "daysync")]
#[command(about = "Counts days spent per country from location emails and syncs them to the days API")]
#[command(version = "0.1.0")]
struct Args {
    /// Run one count and exit
    #[arg(long)]
    count_only: bool,

    /// Keep the days API in sync in the background
    #[arg(long)]
    update: bool,

    /// Check the configuration without connecting
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::init();

    let config = Config::new().context("Invalid configuration")?;

    if args.check_config {
        println!("✅ Configuration valid!");
        println!("📧 IMAP: {}@{}:{} mailbox '{}'", config.imap.username, config.imap.host, config.imap.port, config.imap.mailbox);
        println!("🌍 Countries: {}", config.scan.countries.join(", "));
        println!("🕐 Time zone: {}", config.scan.timezone);
        println!("🧹 Cleanup: {:?} above {} email(s) per day", config.scan.cleanup, config.scan.dedup_threshold);
        match &config.days_api {
            Some(api) => println!("🗓️  Days API: {} every {:?}", api.url, config.sync.interval),
            None => println!("🗓️  Days API: not configured"),
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping");
                signal_cancel.cancel();
            }
            Err(e) => error!("Unable to listen for interrupt signal: {}", e),
        }
    });

    let scanner = Arc::new(Scanner::new(config.imap.clone(), config.scan.clone()));

    if args.count_only {
        let summary = scanner.scan(&cancel).await.context("Count failed")?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if args.update {
        let api_config = config.days_api
            .as_ref()
            .context("--update requires DAYS_API, DAYS_API_USER and DAYS_API_PASS")?;

        let service = SyncService::new(scanner.clone(), DaysApiClient::new(api_config), config.sync.interval);
        let sync_cancel = cancel.clone();
        tokio::spawn(async move {
            service.run(sync_cancel).await;
        });
    }

    if let Err(e) = http_server::serve(config.http.port, scanner, cancel).await {
        error!("❌ {:#}", e);
        return Err(e);
    }

    Ok(())
}
