use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use hangar::db;
use hangar::fetch::{ApiRateLimiter, FetchClient};
use hangar::http::reqwest_transport::ReqwestTransport;
use hangar::source::{
    CorpusSource, LegacyImageSource, SourceAdapter, StorefrontSource, WikiSource,
};
use hangar::sync::{CategoryOutcome, RunReport, SyncEngine, SyncScope};
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::progress::ProgressReporter;

/// Per-request timeout for upstream HTTP calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Args)]
pub(crate) struct SyncArgs {
    /// Category to sync, or `all` for every category in dependency order
    #[arg(default_value = "all")]
    pub scope: SyncScope,

    /// Per-category timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Rows per INSERT batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Disable proactive rate limiting (429 responses are still honored)
    #[arg(long)]
    pub no_rate_limit: bool,
}

#[derive(Debug, Tabled)]
struct OutcomeDisplay {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Records")]
    records: usize,
    #[tabled(rename = "Unmatched")]
    unmatched: usize,
    #[tabled(rename = "Skipped")]
    skipped: usize,
    #[tabled(rename = "Error")]
    error: String,
}

impl From<&CategoryOutcome> for OutcomeDisplay {
    fn from(o: &CategoryOutcome) -> Self {
        Self {
            category: o.category.to_string(),
            source: o.source.clone(),
            status: o.status.to_string(),
            records: o.counts.records,
            unmatched: o.counts.unmatched,
            skipped: o.counts.skipped,
            error: o.error.clone().unwrap_or_default(),
        }
    }
}

/// Upstream adapters enabled by `config`.
fn build_sources(config: &Config, client: &FetchClient) -> Vec<Arc<dyn SourceAdapter>> {
    let mut sources: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(WikiSource::new(client.clone(), config.wiki())),
        Arc::new(StorefrontSource::new(client.clone(), config.store())),
    ];

    match config.corpus() {
        Some(corpus) => sources.push(Arc::new(CorpusSource::new(client.clone(), corpus))),
        None => tracing::warn!("No [corpus] owner/repo configured, paints and loaners have no source"),
    }

    match config.legacy() {
        Some(legacy) => sources.push(Arc::new(LegacyImageSource::new(client.clone(), legacy))),
        None => tracing::warn!("No [legacy] base_url configured, images have no source"),
    }

    sources
}

fn print_report(report: &RunReport) {
    let rows: Vec<OutcomeDisplay> = report.outcomes.iter().map(OutcomeDisplay::from).collect();
    if rows.is_empty() {
        return;
    }
    let mut table = tabled::Table::new(rows);
    table.with(tabled::settings::Style::rounded());
    println!("{table}");

    if report.cancelled {
        println!("Run {} was cancelled before all categories ran.", report.run_id);
    } else {
        println!("Run {}. Details: hangar status --run {}", report.run_id, report.run_id);
    }
}

/// Run a sync and print its summary. Returns whether every required category succeeded.
pub(crate) async fn handle_sync(
    args: SyncArgs,
    config: &Config,
    database_url: &str,
    cancel: CancellationToken,
) -> Result<bool, Box<dyn std::error::Error>> {
    let db = db::connect_and_migrate(database_url).await?;

    let transport = Arc::new(ReqwestTransport::with_timeout(HTTP_TIMEOUT)?);
    let limiter = if args.no_rate_limit {
        ApiRateLimiter::unlimited()
    } else {
        ApiRateLimiter::new(config.rate_limit())
    };
    let client = FetchClient::new(transport, limiter);

    let mut options = config.sync_options();
    if let Some(secs) = args.timeout {
        options.category_timeout = Duration::from_secs(secs);
    }
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size;
    }

    let reporter = Arc::new(ProgressReporter::new());
    let mut builder = SyncEngine::builder()
        .database(db)
        .options(options)
        .progress(reporter.as_callback());
    for source in build_sources(config, &client) {
        builder = builder.source(source);
    }
    let engine = builder.build()?;

    let result = engine.run(args.scope, &cancel).await;
    reporter.finish();
    let report = result?;

    print_report(&report);
    Ok(report.is_success())
}
