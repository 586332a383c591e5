use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use netprobe_rs::pool::WorkerPool;
use netprobe_rs::report::{self, Summary};
use netprobe_rs::{logging, probe, scope, targets};

/// netprobe-rs — check HTTP, TCP and DNS endpoints concurrently and report their health.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "netprobe-rs",
    version,
    about = "Check HTTP, TCP and DNS endpoints concurrently and report their health.",
    long_about = None
)]
struct Cli {
    /// Path to the JSON target list.
    #[arg(long, env = "NETPROBE_TARGETS")]
    targets: PathBuf,

    /// Number of concurrent probe workers.
    #[arg(long, env = "NETPROBE_WORKERS", default_value_t = 8)]
    workers: usize,

    /// Overall deadline for the whole run in milliseconds (optional).
    #[arg(long = "deadline-ms", env = "NETPROBE_DEADLINE_MS")]
    deadline_ms: Option<u64>,

    /// Print results as pretty JSON instead of a table.
    #[arg(long, env = "NETPROBE_JSON", default_value_t = false)]
    json: bool,

    /// Also write results as pretty JSON to this path.
    #[arg(long, env = "NETPROBE_OUTPUT")]
    output: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long = "log-level", env = "NETPROBE_LOG", default_value = logging::DEFAULT_FILTER)]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level)?;

    let targets = targets::load_targets_from_path(&cli.targets)?;
    let total = targets.len();
    let pool = WorkerPool::new(cli.workers);
    info!(
        targets = total,
        workers = pool.workers(),
        deadline_ms = cli.deadline_ms,
        "starting checks"
    );

    let cancel = CancellationToken::new();
    scope::cancel_on_ctrl_c(&cancel);
    let deadline = cli
        .deadline_ms
        .map(|ms| scope::with_deadline(&cancel, Duration::from_millis(ms)));
    let run_scope = deadline.as_deref().unwrap_or(&cancel);

    let mut results = pool.run(run_scope, targets, probe::check).await;
    if results.len() < total {
        warn!(
            completed = results.len(),
            total, "run cancelled before every target was checked"
        );
    }
    results.sort_by(|a, b| a.name.cmp(&b.name));

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print!("{}", report::render_table(&results));
        println!("\n{}", Summary::new(total, &results));
    }

    if let Some(path) = cli.output.as_deref() {
        report::write_results_json(path, &results)?;
        info!(path = %path.display(), "wrote JSON results");
    }

    Ok(())
}
