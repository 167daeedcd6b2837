#![forbid(unsafe_code)]

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use zkvm_ambassador::config::AmbassadorConfig;
use zkvm_ambassador::gateway::{HttpGateway, MockGateway, ProvingGateway};
use zkvm_ambassador::pipeline::{OperationDispatcher, load_variables};
use zkvm_ambassador::queue::{JobQueue, JobWorker, RestJobQueue, run_workers};
use zkvm_ambassador::{AmbassadorError, AmbassadorResult};

#[derive(Parser, Debug)]
#[command(name = "zkvm-ambassador")]
#[command(about = "Drives a zkVM proof-chain pipeline for a workflow engine", long_about = None)]
struct Cli {
    /// Enable verbose logging (or set ZKVM_AMBASSADOR_LOG)
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open one worker per job type and serve jobs until `exit` is read on stdin
    Run {
        /// Path to the ambassador config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run a single job's variables through the pipeline and print the output delta
    Dispatch {
        /// Job type (proving-job, verify-job, compose-job, combine-job)
        #[arg(long)]
        job_type: String,
        /// JSON file holding the job variables
        #[arg(long)]
        variables: PathBuf,
        /// Path to the ambassador config (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Answer from the in-process mock backend instead of the configured one
        #[arg(long)]
        mock: bool,
    },
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("ZKVM_AMBASSADOR_LOG").unwrap_or_else(|_| {
        if verbose {
            "zkvm_ambassador=debug".to_string()
        } else {
            "zkvm_ambassador=info".to_string()
        }
    });
    let _ = tracing_subscriber::fmt()
        .with_span_events(FmtSpan::ACTIVE)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn run(config: Option<PathBuf>) -> AmbassadorResult<()> {
    let config = AmbassadorConfig::load(config.as_deref())?;
    let gateway = Arc::new(HttpGateway::new(config.gateway_config())?);
    let queue: Arc<dyn JobQueue> = Arc::new(RestJobQueue::new(config.queue.url.clone())?);
    let dispatcher = OperationDispatcher::new(gateway);

    let workers: Vec<JobWorker> = dispatcher
        .job_types()
        .map(|job_type| {
            JobWorker::new(queue.clone(), dispatcher.clone(), config.worker_options(job_type))
        })
        .collect();

    tracing::info!(
        "Opening job workers against {} (backend {})",
        config.queue.url,
        config.gateway.url
    );
    let stop = Arc::new(AtomicBool::new(false));
    // Detached: a blocked stdin read must not keep the process alive once the
    // workers are gone.
    let stop_on_exit = stop.clone();
    std::thread::spawn(move || {
        if wait_for_exit_command(std::io::stdin().lock()) {
            tracing::info!("Exit requested, closing job workers");
            stop_on_exit.store(true, Ordering::SeqCst);
        }
    });
    run_workers(&workers, &stop)
}

/// Blocks until a line containing `exit` arrives. Returns `false` on end of
/// input, in which case the workers keep serving until the process is killed.
fn wait_for_exit_command(input: impl BufRead) -> bool {
    for line in input.lines() {
        match line {
            Ok(line) if line.contains("exit") => return true,
            Ok(_) => {}
            Err(_) => return false,
        }
    }
    false
}

fn dispatch(
    job_type: &str,
    variables: &Path,
    config: Option<PathBuf>,
    mock: bool,
) -> AmbassadorResult<()> {
    let variables = load_variables(variables)?;

    let gateway: Arc<dyn ProvingGateway> = if mock {
        Arc::new(MockGateway::default_mock())
    } else {
        let config = AmbassadorConfig::load(config.as_deref())?;
        Arc::new(HttpGateway::new(config.gateway_config())?)
    };
    let outcome = OperationDispatcher::new(gateway).dispatch(job_type, &variables)?;

    let json = serde_json::to_string_pretty(&outcome.variables)
        .map_err(|e| AmbassadorError::Message(format!("failed to render output: {e}")))?;
    println!("{json}");
    Ok(())
}

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run { config } => run(config),
        Commands::Dispatch {
            job_type,
            variables,
            config,
            mock,
        } => dispatch(&job_type, &variables, config, mock),
    };

    if let Err(e) = result {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}
