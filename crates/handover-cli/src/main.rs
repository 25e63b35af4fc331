use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use handover_core::InstallerError;

mod dispatch;
mod render;
mod report;

#[derive(Parser, Debug)]
#[command(name = "handover")]
#[command(about = "Retires a previous installation before an upgrade", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Close the running app, stop its service and run the recorded uninstaller
    UninstallPrev(UninstallPrevArgs),
    /// Print the product config with defaults applied
    ShowConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
struct UninstallPrevArgs {
    #[arg(long)]
    config: PathBuf,
    /// Remove settings and per-user data instead of keeping them
    #[arg(long)]
    factory_reset: bool,
    /// Directory holding the bundled archives
    #[arg(long)]
    archive_dir: Option<PathBuf>,
    /// Read settings from TOML files under this directory
    #[arg(long)]
    settings_dir: Option<PathBuf>,
    /// Per-user application data root
    #[arg(long)]
    data_root: Option<PathBuf>,
    #[arg(long)]
    json: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().default_filter_or(default_level);
    let _ = env_logger::Builder::from_env(env).try_init();
    log::debug!("logger initialized at {default_level}");
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch::run_cli(cli) {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(InstallerError::Other.code())
        }
    }
}
