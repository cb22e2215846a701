//! Tells the user why the emulator stopped.
use std::io::Write;

use termcolor::{self, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::{event, Level};

use cpu::StopReason;

fn get_colour_choice() -> termcolor::ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

fn stop_colour(reason: &StopReason) -> termcolor::Color {
    match reason {
        StopReason::Error(_) => termcolor::Color::Red,
        StopReason::Breakpoint { .. } | StopReason::DisplayBreakpoint { .. } => {
            termcolor::Color::Yellow
        }
        _ => termcolor::Color::Green,
    }
}

pub struct ReportWriter {
    stream: StandardStream,
}

impl ReportWriter {
    pub fn new() -> ReportWriter {
        ReportWriter {
            stream: StandardStream::stdout(get_colour_choice()),
        }
    }

    fn set_colour(&mut self, colour: Option<termcolor::Color>) {
        let mut spec = ColorSpec::new();
        spec.set_fg(colour).set_bold(colour.is_some());
        if let Err(e) = self.stream.set_color(&spec) {
            event!(Level::ERROR, "Failed to select colour {:?}: {}", spec, e);
        }
    }

    /// Writes the stop reason (in colour, if the terminal has it)
    /// followed by `details`.
    pub fn write_stop(
        &mut self,
        reason: &StopReason,
        headline: &str,
        details: &str,
    ) -> Result<(), std::io::Error> {
        self.set_colour(Some(stop_colour(reason)));
        writeln!(self.stream, "{headline}")?;
        self.set_colour(None);
        writeln!(self.stream, "{details}")?;
        self.stream.flush()
    }

    pub fn disconnect(&mut self) {
        if let Err(e) = self.stream.reset() {
            event!(Level::ERROR, "Failed to reset terminal: {}", e);
        }
    }
}
