use anyhow::{Context, Result};
use clap::Parser;
use navtrack_core::config::{AppConfig, LogFormat, LoggingConfig};
use navtrack_core::TargetReport;
use navtrack_tracker::{
    install_prometheus_exporter, ChangeNotifier, MetricsRegistry, RedrawThrottle,
    RefreshListener, SweepScheduler, TargetEvent, TargetListener, TargetRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// NavTrack - live maritime target registry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, env = "NAVTRACK_CONFIG")]
    config: Option<PathBuf>,

    /// Decoded reports as JSON lines, or '-' for stdin
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Keep running after the input ends, until interrupted
    #[arg(short, long)]
    follow: bool,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

/// Logs every change event.
struct EventLogger;

impl TargetListener for EventLogger {
    fn on_event(&self, event: &TargetEvent) -> anyhow::Result<()> {
        match event {
            TargetEvent::Created { state } => info!(
                identity = %state.identity,
                kind = %state.kind,
                phase = %state.phase,
                name = state.name().unwrap_or("-"),
                "Target created"
            ),
            TargetEvent::Updated {
                state,
                force_refresh,
            } => debug!(
                identity = %state.identity,
                phase = %state.phase,
                reports = state.report_count,
                force_refresh,
                "Target updated"
            ),
            TargetEvent::Removed { identity, reason } => {
                info!(identity = %identity, reason = %reason, "Target removed")
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_config_builder(path)
            .with_context(|| format!("Failed to load config file: {:?}", path))?,
        None => AppConfig::default(),
    };
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.logging);

    info!(
        expiry_timeout_secs = config.tracker.expiry_timeout_secs,
        stale_after_secs = config.tracker.stale_after_secs,
        sweep_interval_secs = config.tracker.sweep_interval_secs,
        min_refresh_interval_ms = config.throttle.min_refresh_interval_ms,
        "Starting NavTrack"
    );

    install_prometheus_exporter(&config.metrics).context("Failed to start metrics exporter")?;

    let shutdown = CancellationToken::new();

    let notifier = Arc::new(ChangeNotifier::new());
    let registry = Arc::new(TargetRegistry::new(&config.tracker, Arc::clone(&notifier))?);
    let throttle = Arc::new(RedrawThrottle::new(&config.throttle)?.with_shutdown(&shutdown));
    let sweeper =
        SweepScheduler::new(Arc::clone(&registry), &config.tracker).with_shutdown(&shutdown);
    let metrics = MetricsRegistry::new(registry.metrics(), notifier.metrics(), throttle.metrics());

    notifier.subscribe(Arc::new(EventLogger));
    notifier.subscribe(Arc::new(RefreshListener::new(Arc::clone(&throttle))));

    throttle.start();
    sweeper.start();

    let render_stop = CancellationToken::new();
    let renderer = spawn_renderer(&throttle, Arc::clone(&registry), render_stop.clone());

    let reader = open_input(&args.input).await?;
    let ingest = ingest(reader, Arc::clone(&registry));

    tokio::select! {
        result = ingest => {
            let lines = result.context("Failed to read input")?;
            info!(lines, "Input finished");
            if args.follow {
                signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
                info!("Shutdown signal received");
            }
        }
        result = signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
    }

    shutdown.cancel();
    sweeper.stop().await;
    notifier.shutdown().await;
    throttle.stop().await;
    render_stop.cancel();
    if let Err(e) = renderer.await {
        error!(error = %e, "Renderer task failed");
    }

    let stats = registry.stats();
    info!(
        targets = stats.total,
        active = stats.active,
        stale = stats.stale,
        vessels = stats.vessels,
        names_known = registry.names().len(),
        "Final registry state"
    );

    let snapshot = metrics.snapshot();
    info!(
        applied = snapshot.reports_applied,
        ignored = snapshot.reports_ignored,
        rejected = snapshot.reports_rejected,
        marked_stale = snapshot.targets_marked_stale,
        refreshes = snapshot.refreshes_fired,
        listener_failures = snapshot.listener_failures,
        "NavTrack stopped"
    );

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directives()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.file_line)
        .with_line_number(logging.file_line);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn open_input(input: &str) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if input == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }

    let file = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("Failed to open input: {}", input))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Feeds JSON-line reports into the registry until the input ends.
///
/// Lines that do not decode are logged and skipped. Returns the number of
/// lines read.
async fn ingest(
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    registry: Arc<TargetRegistry>,
) -> Result<u64> {
    let mut lines = reader.lines();
    let mut line_number = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let report: TargetReport = match serde_json::from_str(line) {
            Ok(report) => report,
            Err(e) => {
                warn!(line = line_number, error = %e, "Skipping undecodable report");
                continue;
            }
        };

        if let Err(e) = registry.apply(&report) {
            warn!(line = line_number, identity = %report.identity, error = %e, "Report rejected");
        }
    }

    Ok(line_number)
}

/// Stands in for the display: redraws the snapshot on every refresh signal.
fn spawn_renderer(
    throttle: &RedrawThrottle,
    registry: Arc<TargetRegistry>,
    stop: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let signals = throttle.signals();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                signal = signals.recv_async() => match signal {
                    Ok(signal) => render(&registry, signal.sequence, signal.coalesced_requests),
                    Err(_) => return,
                },
            }
        }

        for signal in signals.try_iter() {
            render(&registry, signal.sequence, signal.coalesced_requests);
        }
    })
}

fn render(registry: &TargetRegistry, sequence: u64, coalesced: u64) {
    let snapshot = registry.snapshot();
    let renderable = snapshot
        .iter()
        .filter(|state| state.phase.is_renderable())
        .count();
    let routes = snapshot.iter().filter(|state| state.route_visible()).count();

    info!(
        sequence,
        coalesced,
        targets = snapshot.len(),
        renderable,
        routes,
        "Redraw"
    );
}
