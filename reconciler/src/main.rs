//! Reconciler binary.
//!
//! Resolves the dataset named on the command line, exports it and its legacy counterpart from the
//! configured bulk export service, and writes `<dataset>.csv` mapping every migrated record to the
//! owner of the legacy record it originates from.

use clap::Parser;
use recon::error::ErrorKind;
use recon_config::shared::ReconcilerConfig;
use recon_telemetry::tracing::init_tracing;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

use crate::config::load_reconciler_config_for;
use crate::core::start_reconciliation_with_config;
use crate::error::{ReconcilerError, ReconcilerResult};

mod config;
mod core;
mod error;

#[derive(Debug, Parser)]
#[command(name = "reconciler", version, about = "Maps migrated records to their legacy owners")]
struct Args {
    /// Name of the migrated dataset to reconcile.
    #[arg(short = 'n', long)]
    name: String,

    /// Directory receiving the output file, overriding `output.directory`.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(ReconcilerError::Recon(err)) if err.kind() == ErrorKind::UnsupportedDataset => {
            println!("SUPPORTED OBJECTS");
            for name in err.detail().unwrap_or_default().lines() {
                println!("{name}");
            }
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err}");
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> ReconcilerResult<()> {
    let mut reconciler_config = load_reconciler_config_for(&args.name)?;
    if let Some(output_dir) = args.output_dir {
        reconciler_config.output.directory = output_dir;
    }

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(ReconcilerError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(reconciler_config, args.name))
}

async fn async_main(reconciler_config: ReconcilerConfig, dataset: String) -> ReconcilerResult<()> {
    start_reconciliation_with_config(reconciler_config, &dataset).await?;

    Ok(())
}
