use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use tracing::{info, warn};

use magpie_harvester::collect::ScrollCollector;
use magpie_harvester::config::AppConfig;
use magpie_harvester::export::{self, artifact_paths};
use magpie_harvester::extract::{FieldExtractor, Selectors};
use magpie_harvester::keywords::KeywordSet;
use magpie_harvester::matcher::annotate_records;
use magpie_harvester::progress::{LogProgressSink, ProgressBridge, ProgressSink};
use magpie_harvester::report::build_report;
use magpie_harvester::session::{ChromeSession, PageProgressSink};

/// Harvests product listings from an infinite-scroll shopping feed into
/// CSV, JSON, and an interactive HTML report.
#[derive(Parser, Debug)]
#[command(name = "magpie-harvester", version)]
struct Cli {
    /// Feed URL to open (defaults to the configured home page)
    url: Option<String>,

    /// Keyword to match against titles and sellers (repeatable)
    #[arg(short, long = "keyword")]
    keyword: Vec<String>,

    /// File with one keyword per line
    #[arg(long)]
    keywords_file: Option<PathBuf>,

    /// Directory for the CSV/JSON/HTML artifacts
    #[arg(long)]
    output_dir: Option<String>,

    /// Run the browser headless (implies starting without the button gate)
    #[arg(long)]
    headless: bool,

    /// Start scrolling immediately instead of waiting for the start button
    #[arg(long)]
    auto_start: bool,

    /// Do not paint report progress into the live page
    #[arg(long)]
    no_overlay: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("magpie_harvester=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if cli.headless {
        config.session.headless = true;
    }
    if let Some(dir) = &cli.output_dir {
        config.report.output_dir = dir.clone();
    }
    if cli.no_overlay {
        config.report.overlay = false;
    }
    config.validate()?;

    let mut keywords = KeywordSet::new(cli.keyword.clone());
    if let Some(path) = &cli.keywords_file {
        keywords = keywords.merge(KeywordSet::from_file(path)?);
    }
    if keywords.is_empty() {
        info!("No keywords given; matching and highlighting are disabled");
    } else {
        info!("Matching against {} keywords", keywords.len());
    }

    let selectors = Selectors::compile(&config.selectors)?;
    let extractor = FieldExtractor::new(selectors);

    let session = ChromeSession::launch(&config.session)?;
    let target_url = cli
        .url
        .clone()
        .unwrap_or_else(|| config.session.home_url.clone());
    session.open(&target_url).await?;

    let collector = ScrollCollector::new(&session, &extractor, config.collector.clone());
    let cancel = collector.cancel_flag();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, finishing the current pass");
                cancel.store(true, Ordering::SeqCst);
            }
        }
    });

    if !(cli.auto_start || config.session.headless)
        && !session.wait_for_start_signal(&cancel).await?
    {
        info!("Cancelled before the start signal");
        return Ok(());
    }

    let outcome = collector.run().await?;
    info!(
        "Acquisition finished after {} scrolls: {} records, {} card nodes skipped ({:?})",
        outcome.scrolls,
        outcome.records.len(),
        outcome.skipped_cards,
        outcome.reason
    );

    let mut records = outcome.records;
    if records.is_empty() {
        info!("Nothing harvested; no artifacts written");
        return Ok(());
    }

    let summary = annotate_records(&mut records, &keywords);
    if summary.keywords > 0 {
        info!("Matched {} of {} records", summary.matched, summary.total);
    }

    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let paths = artifact_paths(Path::new(&config.report.output_dir), &stamp);

    // Tabular artifacts are best effort; the report below is the deliverable
    if let Err(e) = export::write_csv(&paths.csv, &records) {
        warn!("CSV export failed: {}", e);
    }
    if let Err(e) = export::write_json(&paths.json, &records) {
        warn!("JSON export failed: {}", e);
    }

    let use_overlay = config.report.overlay && !config.session.headless;
    let sink: Box<dyn ProgressSink> = if use_overlay {
        Box::new(PageProgressSink::new(session.tab()))
    } else {
        Box::new(LogProgressSink)
    };
    let bridge = ProgressBridge::new(sink);

    let html = bridge
        .run_reported(move |reporter| build_report(&records, &stamp, &keywords, Some(&reporter)))
        .await?;
    export::write_html(&paths.html, &html)?;

    info!("Harvest complete; report at {}", paths.html.display());
    Ok(())
}
