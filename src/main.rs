use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ykneo::constants::BASE_MODE_MASK;
use ykneo::dump::DumpTransport;
use ykneo::mode::{parse_mode_token, render_mode_byte, split_mode_byte};
use ykneo::{CommitDecision, DeviceConfig, ModeSelection, ModeSwitch, NeoError, Outcome, PcscSession, StatusRecord, Transport};

/// Exit status when the user declines the commit prompt.
const EXIT_CANCELLED: u8 = 3;

const MODE_HELP: &str = "\
Possible MODE arguments are:
  0    HID device only.
  1    CCID device only.
  2    HID/CCID composite device.
Add 80 to set MODE_FLAG_EJECT, for example: 81";

/// Set the USB operation mode of the YubiKey NEO.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = MODE_HELP)]
struct Cli {
    /// USB operation mode, one or two hex digits.
    #[arg(short, long, value_name = "MODE")]
    mode: Option<String>,
    /// Always commit (do not prompt).
    #[arg(short = 'y', long = "yes")]
    yes: bool,
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

fn setup_logging(verbosity: &Verbosity<WarnLevel>) {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time();

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry().with(filter).with(console_layer).init();
}

fn print_config(status: &StatusRecord, config: &DeviceConfig) {
    println!(
        "\nVersion:       {}.{}.{}",
        status.version_major, status.version_minor, status.version_build
    );
    println!("Seq:           {}", status.pgm_seq);
    println!("Mode:          {:02x}", config.mode & BASE_MODE_MASK);
    println!("Flags:         {:02x}", config.mode & !BASE_MODE_MASK);
    println!("CR timeout:    {}", config.cr_timeout);
    println!("Eject time:    {}", config.auto_eject_time.get());
    info!("Current mode: {}", split_mode_byte(config.mode));
}

fn ask_commit(autocommit: bool) -> Result<CommitDecision> {
    eprint!("\nCommit? (y/n) [n]: ");
    if autocommit {
        println!("yes");
        return Ok(CommitDecision::Commit);
    }
    io::stderr().flush().context("Failed to flush prompt")?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read commit answer")?;
    Ok(CommitDecision::from_answer(&answer))
}

/// Read, confirm, write, verify. Exchange failures are reported here and
/// do not change the exit status; only a declined commit does.
fn run<T: Transport>(transport: &mut T, selection: ModeSelection, autocommit: bool) -> Result<ExitCode> {
    let mut switch = ModeSwitch::new(transport);

    match switch.read_config() {
        Ok((status, config)) => print_config(&status, &config),
        Err(e) => {
            println!("Reading device configuration failed: {}", e);
            return Ok(ExitCode::SUCCESS);
        }
    }

    let decision = ask_commit(autocommit)?;
    match switch.commit(decision, selection) {
        Ok(Outcome::Cancelled) => {
            println!("Update cancelled");
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Ok(Outcome::Verified { after, .. }) => {
            println!("\nSeq:           {}", after.pgm_seq);
            println!("Update successful");
            Ok(ExitCode::SUCCESS)
        }
        Err(NeoError::SequenceMismatch { observed, .. }) => {
            println!("\nSeq:           {}", observed);
            println!("Update failed");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("Update failed: {}", e);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli.verbose);

    let Some(token) = cli.mode.as_deref() else {
        eprintln!("{}", Cli::command().render_help());
        return ExitCode::SUCCESS;
    };

    // Validate before the device is touched
    let selection = match parse_mode_token(token).and_then(|s| render_mode_byte(s).map(|_| s)) {
        Ok(selection) => selection,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Requested mode: {}", selection);

    let mut session = match PcscSession::open() {
        Ok(session) => session,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = if cli.verbose.tracing_level_filter() >= LevelFilter::INFO {
        run(&mut DumpTransport::new(&mut session), selection, cli.yes)
    } else {
        run(&mut session, selection, cli.yes)
    };

    if let Err(e) = session.close() {
        warn!("{}", e);
    }

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
