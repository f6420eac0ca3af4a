//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use blockview::cli::{ScanOutcome, histogram_lines};
use blockview::cli::scan::read_session;
use blockview::cli::signals::InterruptFlag;
use blockview::cli::simulate::{SimulationPlan, simulate_session};
use blockview::core::config::Config;
use blockview::core::errors::BvError;
use blockview::render::SessionSummary;
use blockview::render::legend::Legend;
use blockview::render::canvas::group_thousands;
use blockview::tui::surface::{CrosstermSurface, DiscardSurface, Surface};
use blockview::tui::terminal_guard::TerminalGuard;

/// blockview: live latency/error map for block-device scans.
#[derive(Debug, Parser)]
#[command(
    name = "blockview",
    author,
    version,
    about = "Live terminal dashboard for block-device scans",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Read a device or image end to end and visualize every block.
    Read(ReadArgs),
    /// Drive the dashboard with synthetic reports.
    Simulate(SimulateArgs),
    /// Print the effective configuration as TOML.
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
struct ReadArgs {
    /// Block device or image file to read.
    #[arg(value_name = "PATH")]
    path: PathBuf,
    /// Bytes per read.
    #[arg(long, default_value_t = 65_536, value_name = "BYTES")]
    block_size: u64,
    /// Drop every frame and print only the summary.
    #[arg(long)]
    headless: bool,
}

#[derive(Debug, Clone, Args)]
struct SimulateArgs {
    /// Number of synthetic blocks.
    #[arg(long, default_value_t = 100_000)]
    blocks: u64,
    /// Bytes per synthetic block.
    #[arg(long, default_value_t = 65_536, value_name = "BYTES")]
    block_size: u64,
    /// Fail every Nth block (0 = never).
    #[arg(long, default_value_t = 0, value_name = "N")]
    error_every: u64,
    /// Pause after each block.
    #[arg(long, default_value_t = 50, value_name = "MICROSECONDS")]
    delay_us: u64,
    /// Drop every frame and print only the summary.
    #[arg(long)]
    headless: bool,
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    /// Print the config file path instead of its contents.
    #[arg(long)]
    path: bool,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Library failure.
    #[error(transparent)]
    Blockview(#[from] BvError),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Blockview(e) if e.is_fatal() => 3,
            Self::Blockview(_) | Self::Io(_) => 2,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Read(args) => run_read(cli, args),
        Command::Simulate(args) => run_simulate(cli, args),
        Command::Config(args) => run_config(cli, args),
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Ok(Config::load(cli.config.as_deref())?)
}

fn run_read(cli: &Cli, args: &ReadArgs) -> Result<(), CliError> {
    if args.block_size == 0 {
        return Err(CliError::User("--block-size must be greater than zero".to_string()));
    }
    let config = load_config(cli)?;
    let interrupt = InterruptFlag::install();

    let (summary, outcome) = with_surface(args.headless, &config, |surface, config| {
        read_session(
            &args.path,
            args.block_size,
            config,
            surface,
            interrupt.as_atomic(),
        )
    })?;
    print_summary(&summary, &outcome, &Legend::from_config(&config.legend))
}

fn run_simulate(cli: &Cli, args: &SimulateArgs) -> Result<(), CliError> {
    if args.blocks == 0 || args.block_size == 0 {
        return Err(CliError::User(
            "--blocks and --block-size must be greater than zero".to_string(),
        ));
    }
    let config = load_config(cli)?;
    let interrupt = InterruptFlag::install();
    let plan = SimulationPlan {
        blocks: args.blocks,
        block_size: args.block_size,
        error_every: args.error_every,
        delay: if args.headless {
            Duration::ZERO
        } else {
            Duration::from_micros(args.delay_us)
        },
    };

    let (summary, outcome) = with_surface(args.headless, &config, |surface, config| {
        simulate_session(&plan, config, surface, interrupt.as_atomic())
    })?;
    print_summary(&summary, &outcome, &Legend::from_config(&config.legend))
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    if args.path {
        let path = cli.config.clone().unwrap_or_else(Config::default_path);
        writeln!(stdout, "{}", path.display())?;
        return Ok(());
    }
    let config = load_config(cli)?;
    write!(stdout, "{}", config.to_toml()?)?;
    Ok(())
}

/// Run `session` on the real terminal, or headless on a surface that drops
/// every frame and never waits for a key.
fn with_surface<T>(
    headless: bool,
    config: &Config,
    session: impl FnOnce(Box<dyn Surface>, &Config) -> blockview::core::errors::Result<T>,
) -> Result<T, CliError> {
    if headless {
        let mut config = config.clone();
        config.session.wait_for_key = false;
        config.session.bell = false;
        return Ok(session(Box::new(DiscardSurface::new(120, 40)), &config)?);
    }

    if !io::stdout().is_terminal() {
        return Err(CliError::User(
            "stdout is not a terminal; rerun with --headless".to_string(),
        ));
    }
    let _guard = TerminalGuard::new()?;
    Ok(session(Box::new(CrosstermSurface::new()), config)?)
}

fn print_summary(
    summary: &SessionSummary,
    outcome: &ScanOutcome,
    legend: &Legend,
) -> Result<(), CliError> {
    let stats = &summary.stats;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", if summary.interrupted { "Aborted." } else { "Completed." })?;
    writeln!(stdout, "  {outcome}")?;
    writeln!(
        stdout,
        "  rendered {} of {} reports",
        group_thousands(stats.reports),
        group_thousands(summary.reports_published)
    )?;
    if summary.overwritten > 0 {
        writeln!(
            stdout,
            "  {} reports overwritten before display",
            group_thousands(summary.overwritten)
        )?;
    }
    if stats.avg_speed > 0 {
        writeln!(stdout, "  average speed {} kb/s", group_thousands(stats.avg_speed / 1024))?;
    }
    for line in histogram_lines(stats, legend) {
        writeln!(stdout, "  {line}")?;
    }
    Ok(())
}
