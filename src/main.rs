use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tallyfolio::core::parse_address_list;
use tallyfolio::util::display::{print_portfolio, print_progress, print_status_messages};
use tallyfolio::{Config, ProviderApi, ProxyClient, RenderScheduler, RenderSink, ScanStatus, ScannerContext};

#[derive(Parser, Debug)]
#[command(name = "tallyfolio")]
#[command(about = "Multi-chain wallet holdings and 24h change", long_about = None)]
struct Args {
    /// Wallet addresses, separated by spaces, commas or semicolons
    addresses: Vec<String>,

    /// Config file; `tallyfolio.toml` is read when present and none is given
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the smaller worker pool
    #[arg(long)]
    constrained: bool,

    /// Show holdings below the dust threshold
    #[arg(long)]
    include_dust: bool,

    /// Retry failed wallets once after the scan
    #[arg(long)]
    retry_failed: bool,
}

fn init_tracing() -> Result<()> {
    // Create logs directory if it doesn't exist
    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::daily("logs", "tallyfolio.log");
    let (non_blocking_file, _guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_level(true)
        .compact();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .json()
        .with_current_span(false)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Keep the file writer alive for the whole process
    std::mem::forget(_guard);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    let mut config = Config::load(args.config.as_deref())?;
    if args.constrained {
        config.scan.constrained = true;
    }

    let parsed = parse_address_list(&args.addresses.join(" "));
    for (raw, kind) in &parsed.rejected {
        warn!("Skipping {} ({:?})", raw, kind);
    }
    if parsed.wallets.is_empty() {
        anyhow::bail!("No Solana or EVM wallet addresses given");
    }
    info!("👛 {} wallets to scan", parsed.wallets.len());

    let api: Arc<dyn ProviderApi> = Arc::new(ProxyClient::new(config.provider.clone())?);
    let render = RenderScheduler::new(&config.render);
    let ctx = Arc::new(ScannerContext::new(api, &config).with_render(render.clone()));

    let shutdown = CancellationToken::new();
    let sink: Arc<dyn RenderSink> = {
        let ctx = ctx.clone();
        Arc::new(move || print_progress(&ctx.progress()))
    };
    let render_task = render.spawn(sink, shutdown.clone());

    let ctrl_c = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("🛑 Stop requested");
                    ctx.cancel();
                }
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        })
    };

    let mut summary = ctx.scan(&parsed.wallets).await?;
    if args.retry_failed && summary.status == ScanStatus::Completed && summary.failed > 0 {
        info!("🔁 Retrying {} failed wallets", summary.failed);
        summary = ctx.retry_failed().await?;
    }

    ctrl_c.abort();
    shutdown.cancel();
    render_task.await?;

    print_portfolio(&ctx.view(), &config.display, args.include_dust);
    print_status_messages(&ctx.messages());

    info!(
        "Scan {:?} in {}ms ({} ok, {} failed)",
        summary.status, summary.elapsed_ms, summary.succeeded, summary.failed
    );
    Ok(())
}
