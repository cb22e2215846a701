//! Runs the Imlac emulator from the command line, without a display.
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use tracing::{event, Level};
use tracing_subscriber::prelude::*;

use base::prelude::*;
use cpu::{BreakpointKinds, Configuration, ExecutionState, Imlac, StopReason};

mod pacing;
mod report;

use pacing::PacedConsole;
use report::ReportWriter;

#[derive(Debug)]
struct Fail(String);

impl Display for Fail {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Error for Fail {}

fn parse_address(s: &str) -> Result<Word, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    Word::from_str_radix(digits, 8).map_err(|e| format!("'{s}' is not an octal address: {e}"))
}

/// Emulate the Imlac PDS-1 and PDS-4 graphics computers
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// Which model to emulate (PDS-1 or PDS-4).
    #[clap(long, default_value = "pds1")]
    cpu: CpuType,

    /// Enable the MIT display modifications.
    #[clap(long)]
    mit: bool,

    /// Memory size in words (4096, 8192 or 16384).
    #[clap(long, default_value_t = 16384)]
    memory: usize,

    /// Log unimplemented instructions and carry on, instead of
    /// stopping.
    #[clap(long)]
    continue_on_invalid: bool,

    /// Bootstrap loader image (040 words, loaded at 040).
    #[clap(long, conflicts_with = "image")]
    bootstrap: Option<PathBuf>,

    /// Memory image of big-endian 16-bit words.
    #[clap(long)]
    image: Option<PathBuf>,

    /// Octal address at which to load the memory image.
    #[clap(long, value_parser = parse_address, default_value = "0")]
    start: Word,

    /// Octal address at which to start the main processor.
    #[clap(long, value_parser = parse_address)]
    pc: Option<Word>,

    /// Paper tape to mount in the reader.
    #[clap(long)]
    tape: Option<PathBuf>,

    /// File whose contents the TTY receives.
    #[clap(long, conflicts_with = "tty_telnet")]
    tty_file: Option<PathBuf>,

    /// Connect the TTY to a telnet server (HOST:PORT).
    #[clap(long)]
    tty_telnet: Option<String>,

    /// Stop when the main processor reaches this octal address.
    #[clap(long = "break", value_parser = parse_address)]
    breakpoints: Vec<Word>,

    /// Stop after this many display frames.
    #[clap(long)]
    frames: Option<u64>,

    /// Run this many times faster than real-time ('MAX' for as-fast-as-possible)
    #[clap(long)]
    speed_multiplier: Option<String>,
}

fn speed_multiplier(arg: Option<&str>) -> Result<Option<f64>, Fail> {
    match arg {
        None => {
            event!(
                Level::INFO,
                "No --speed-multiplier option specified, using multiplier of 1.0"
            );
            Ok(Some(1.0))
        }
        Some("MAX") => {
            event!(
                Level::INFO,
                "--speed-multiplier=MAX, running at maximum speed"
            );
            Ok(None)
        }
        Some(s) => match s.parse::<f64>() {
            Ok(x) if x > 0.0 => {
                event!(
                    Level::INFO,
                    "--speed-multiplier={}, running at speed multiplier {}",
                    s,
                    x
                );
                Ok(Some(x))
            }
            Ok(_) => Err(Fail(format!("speed multiplier {s} should be positive"))),
            Err(e) => Err(Fail(format!("invalid speed multiplier {s}: {e}"))),
        },
    }
}

fn run_emulator() -> Result<i32, Box<dyn Error>> {
    let cli = Cli::parse();

    // See
    // https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
    // for how to select which trace messages get printed; for
    // example RUST_LOG=imlac::display=debug.
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let multiplier = speed_multiplier(cli.speed_multiplier.as_deref())?;
    let config = Configuration {
        cpu_type: cli.cpu,
        mit_mode: cli.mit,
        halt_on_invalid_opcodes: !cli.continue_on_invalid,
        memory_size: cli.memory,
    };
    let stop = Arc::new(AtomicBool::new(false));
    let console = PacedConsole::new(multiplier, cli.frames, Arc::clone(&stop));
    let mut imlac = Imlac::new(config, console)?;

    if let Some(path) = &cli.bootstrap {
        imlac.bootstrap(path)?;
    }
    if let Some(path) = &cli.image {
        let words = imlac.load_memory(path, cli.start, cli.memory)?;
        event!(Level::DEBUG, "memory image holds {} words", words);
    }
    if let Some(pc) = cli.pc {
        imlac.processor_mut().set_pc(pc);
    }
    if let Some(path) = &cli.tape {
        imlac.load_paper_tape(path)?;
    }
    if let Some(path) = &cli.tty_file {
        imlac.attach_tty_file(path)?;
    }
    if let Some(address) = &cli.tty_telnet {
        imlac.attach_tty_telnet(address)?;
    }
    for address in &cli.breakpoints {
        imlac.set_breakpoint(*address, BreakpointKinds::EXECUTION);
    }
    imlac.breakpoints_mut().set_enabled(!cli.breakpoints.is_empty());

    let reason = imlac.run(ExecutionState::Running, &stop);
    let headline = match &reason {
        StopReason::UserBreak if imlac.console().budget_exhausted() => {
            format!("Displayed {} frames.", imlac.console().frames())
        }
        other => other.to_string(),
    };
    let mut report = ReportWriter::new();
    let written = report.write_stop(&reason, &headline, &imlac.status_text());
    report.disconnect();
    imlac.detach_tty();
    written?;

    Ok(match reason {
        StopReason::Error(_) => 1,
        _ => 0,
    })
}

fn main() {
    match run_emulator() {
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        Ok(code) => {
            std::process::exit(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("40"), Ok(0o40));
        assert_eq!(parse_address("0o17777"), Ok(0o17777));
        assert!(parse_address("9").is_err());
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from([
            "imlac", "--cpu", "pds4", "--image", "a.bin", "--start", "100", "--break", "44",
            "--break", "50", "--frames", "3",
        ])
        .expect("valid arguments");
        assert_eq!(cli.cpu, CpuType::Pds4);
        assert_eq!(cli.start, 0o100);
        assert_eq!(cli.breakpoints, vec![0o44, 0o50]);
        assert_eq!(cli.frames, Some(3));
        assert!(Cli::try_parse_from(["imlac", "--bootstrap", "b", "--image", "i"]).is_err());
    }

    #[test]
    fn test_speed_multiplier() {
        assert_eq!(speed_multiplier(Some("MAX")).expect("valid"), None);
        assert_eq!(speed_multiplier(Some("2.5")).expect("valid"), Some(2.5));
        assert!(speed_multiplier(Some("0")).is_err());
        assert!(speed_multiplier(Some("fast")).is_err());
    }
}
