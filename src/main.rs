use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{error, info, warn};

use breakout_scanner::config::AppConfig;
use breakout_scanner::data::YahooChartSource;
use breakout_scanner::logging::init_logging;
use breakout_scanner::notification::DiscordNotifier;
use breakout_scanner::report::{ReportFormat, ScanReport};
use breakout_scanner::scan::ScanEngine;
use breakout_scanner::universe::{TwseIsinProvider, UniverseCache};

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();

    // Optional config file path as the only argument
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(Path::new(&path))?,
        None => AppConfig::default(),
    };

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting breakout-scanner"
    );

    config.scan.validate()?;

    let engine = ScanEngine::new(
        config.scan.clone(),
        Arc::new(TwseIsinProvider::new()),
        Arc::new(UniverseCache::new()),
        Arc::new(YahooChartSource::new()),
    );

    let result = engine.run_scan().await?;
    let report = ScanReport::new(&result);

    if config.output.local_report_enabled {
        for format_name in &config.output.report_formats {
            match format_name.parse::<ReportFormat>() {
                Ok(format) => {
                    if let Err(e) = report.save_to_file(&config.output.report_dir, format) {
                        error!(format = %format_name, error = %e, "Failed to save report");
                    }
                }
                Err(e) => warn!(format = %format_name, error = %e, "Skipping unknown report format"),
            }
        }
    }

    let notifier = DiscordNotifier::new(
        config.output.discord_webhook_url.clone(),
        config.output.webhook_retry_count,
    );
    if notifier.is_enabled() {
        if let Err(e) = notifier.send(&report.to_webhook_message()).await {
            error!(error = %e, "Webhook notification failed");
        }
    }

    info!(
        elapsed_secs = start.elapsed().as_secs_f64(),
        candidates = result.candidates.len(),
        "Scan complete"
    );

    Ok(())
}
