use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ps_engine::{RunMode, SubprocessDispatcher, SweepDriver, SweepParams, WorkerDispatcher};

#[derive(Parser, Debug)]
#[command(name = "param-sweeps", about = "Run every trial of a parameter sweep")]
struct Cli {
    /// Sweep descriptor (`*_sweep.ui.json`).
    file: PathBuf,
    /// Write trial artifacts and the lookup table without running the worker.
    #[arg(long)]
    files_only: bool,
    /// Run this program on each trial descriptor instead of the Python module
    /// named by `run_command`.
    #[arg(long, value_name = "PROGRAM")]
    worker_program: Option<String>,
    /// Extra argument for `--worker-program`, placed before the descriptor path.
    #[arg(long = "worker-arg", value_name = "ARG", requires = "worker_program")]
    worker_args: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let dispatcher: Box<dyn WorkerDispatcher> = match cli.worker_program {
        Some(program) => Box::new(SubprocessDispatcher::program(program, cli.worker_args)),
        None => {
            let params = SweepParams::from_path(&cli.file)?;
            Box::new(SubprocessDispatcher::python_module(params.run_command))
        }
    };

    let mode = if cli.files_only {
        RunMode::FilesOnly
    } else {
        RunMode::Full
    };

    let driver = SweepDriver::from_sweep_file(&cli.file, dispatcher)?;
    let summary = driver.run(mode).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
