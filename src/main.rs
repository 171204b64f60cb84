use clap::{Args, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use pagespeed_bulk::auth::{self, SharedToken};
use pagespeed_bulk::config::{AuthConfig, ConfigLoader, Overrides, ScanConfig};
use pagespeed_bulk::fallback::{self, AgentBrowser, FallbackScraper};
use pagespeed_bulk::metrics::collector::MetricsCollector;
use pagespeed_bulk::metrics::snapshot::MetricsSnapshot;
use pagespeed_bulk::pagespeed::PageSpeedClient;
use pagespeed_bulk::scanner::ScanEngine;
use pagespeed_bulk::sheet::{RowReader, SheetsClient, SheetsSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pagespeed-bulk")]
#[command(version)]
#[command(about = "Bulk PageSpeed Insights scanner with Google Sheets output", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the configuration file (JSON/YAML/TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Spreadsheet ID, overriding the config file
    #[arg(long)]
    spreadsheet: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan every URL in column A and write results to columns B..N
    Scan {
        #[command(flatten)]
        config: ConfigArgs,

        /// Start from this URL index (0-based)
        #[arg(long)]
        start: Option<usize>,

        /// Parallel workers
        #[arg(long)]
        workers: Option<usize>,

        /// PageSpeed API key (overrides GOOGLE_PAGESPEED_API_TOKEN)
        #[arg(long)]
        api_key: Option<String>,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Re-measure rows marked ERROR by scraping the rendered dashboard
    Retry {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Validate a configuration file
    Check {
        /// Path to the configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn init_logging(multi: Option<&MultiProgress>) -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    let logger = env_logger::Builder::from_default_env().build();
    let level = logger.filter();

    match multi {
        Some(multi) => {
            indicatif_log_bridge::LogWrapper::new(multi.clone(), logger).try_init()?;
        }
        None => {
            log::set_boxed_logger(Box::new(logger))?;
        }
    }
    log::set_max_level(level);
    Ok(())
}

async fn connect_sheet(
    config: &ScanConfig,
    metrics: Arc<MetricsCollector>,
) -> anyhow::Result<Arc<SheetsClient>> {
    match &config.auth {
        AuthConfig::ServiceAccount { credentials, .. } => {
            log::info!("Auth: service account ({})", credentials)
        }
        AuthConfig::Cli { account, command, .. } => log::info!("Auth: {} CLI ({})", command, account),
    }

    let provider = auth::provider_from_config(&config.auth)?;
    let token = Arc::new(SharedToken::acquire(provider).await?.with_metrics(metrics));
    let sheets = SheetsClient::connect(SheetsSettings::from_config(config), token).await?;
    if let Some(name) = sheets.sheet_name() {
        log::info!("Sheet: {}", name);
    }
    Ok(Arc::new(sheets))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            config,
            start,
            workers,
            api_key,
            no_progress,
        } => {
            let multi = MultiProgress::new();
            let progress = !no_progress;
            init_logging(progress.then_some(&multi))?;

            let overrides = Overrides {
                spreadsheet_id: config.spreadsheet,
                api_key,
                workers,
                start_index: start,
            };
            log::info!("Loading config from {:?}", config.config);
            let config_data = ConfigLoader::load_with(&config.config, overrides)?;
            let api_key = ConfigLoader::require_api_key(&config_data)?;

            let metrics = Arc::new(MetricsCollector::new());
            let sheets = connect_sheet(&config_data, metrics.clone()).await?;
            let urls = sheets.read_urls().await?;

            let analyzer = Arc::new(PageSpeedClient::new(
                config_data.pagespeed_endpoint.clone(),
                api_key,
                Duration::from_secs(config_data.api_timeout_secs),
            )?);
            let engine = ScanEngine::new(analyzer, sheets, config_data.workers, Some(metrics))
                .with_progress_every(config_data.progress_every);

            let mut progress_bar: Option<ProgressBar> = None;
            let mut _progress_task = None;
            if progress {
                let pb = multi.add(ProgressBar::new(0));
                pb.set_style(ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
                    .progress_chars("#>-"));

                let mut metrics_rx = engine.watch_metrics();
                let pb_clone = pb.clone();
                progress_bar = Some(pb);
                _progress_task = Some(tokio::spawn(async move {
                    while metrics_rx.changed().await.is_ok() {
                        let snapshot: MetricsSnapshot = metrics_rx.borrow().clone();
                        pb_clone.set_length(snapshot.urls_queued);
                        pb_clone.set_position(snapshot.urls_done);
                        pb_clone.set_message(format!(
                            "Errors: {} | Active: {} | {:.1} URLs/min",
                            snapshot.urls_failed, snapshot.active_workers, snapshot.urls_per_minute
                        ));
                    }
                }));
            }

            let counters = engine.run(&urls, config_data.start_index).await;

            if let Some(task) = _progress_task {
                task.abort();
            }
            if let Some(pb) = progress_bar {
                pb.finish_and_clear();
            }

            let final_metrics = engine.get_metrics();
            println!("\n✅ Scan Completed:");
            println!("   URLs Processed: {}", counters.done);
            println!("   Errors: {}", counters.errors);
            println!(
                "   Field / Lab: {} / {}",
                final_metrics.field_rows, final_metrics.lab_rows
            );
            println!(
                "   Rows Written: {} ({} abandoned)",
                final_metrics.rows_written, final_metrics.writes_abandoned
            );
            println!("   Average API Call: {}ms", final_metrics.avg_response_time_ms);
            println!("   Token Refreshes: {}", final_metrics.token_refreshes);
            println!("   Total Time: {:.1}s", final_metrics.elapsed_seconds);
        }
        Commands::Retry { config } => {
            init_logging(None)?;

            let overrides = Overrides {
                spreadsheet_id: config.spreadsheet,
                ..Default::default()
            };
            let config_data = ConfigLoader::load_with(&config.config, overrides)?;
            let sheets = connect_sheet(&config_data, Arc::new(MetricsCollector::new())).await?;

            log::info!("Finding error rows...");
            let rows = sheets.read_rows().await?;
            let error_rows = fallback::find_error_rows(&rows);
            log::info!(
                "Found {} error rows to retry via rendered-page scraping",
                error_rows.len()
            );
            if error_rows.is_empty() {
                println!("No errors to retry!");
                return Ok(());
            }

            let settings = &config_data.fallback;
            let browser = Arc::new(AgentBrowser::new(
                settings.browser_command.clone(),
                Duration::from_secs(settings.command_timeout_secs),
                settings.text_limit,
            ));
            let scraper = FallbackScraper::new(browser, sheets, settings.analysis_url.clone())
                .with_delays(
                    Duration::from_secs(settings.settle_secs),
                    Duration::from_secs(settings.pause_secs),
                )
                .with_text_limit(settings.text_limit);

            let summary = scraper.run(&error_rows).await;
            println!("\n✅ Retry Completed:");
            println!("   Fixed: {}", summary.fixed);
            println!("   Still Broken: {}", summary.still_broken);
            println!("   Write Failures: {}", summary.write_failures);
        }
        Commands::Check { config } => match ConfigLoader::load(&config) {
            Ok(cfg) => {
                println!("✅ Config is valid:");
                println!("   Spreadsheet: {}", cfg.spreadsheet_id);
                println!("   Workers: {}", cfg.workers);
                println!("   Start Index: {}", cfg.start_index);
                println!(
                    "   API Key: {}",
                    if cfg.resolve_api_key().is_some() { "set" } else { "missing" }
                );
            }
            Err(e) => {
                eprintln!("❌ Config error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
