//! Output sink abstraction and rendering helpers for CLI commands.
//!
//! Command output goes to stdout, errors go to stderr. Tracing diagnostics are
//! handled separately by `flagdeck-telemetry` and never pass through here.

use std::io::{self, Write as _};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::anyhow;
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Text style understood by every sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// No styling.
    Plain,
    /// Success marker.
    Green,
    /// Failure marker.
    Red,
    /// Warnings and hints.
    Yellow,
    /// Identifiers.
    Cyan,
    /// Headings.
    Bold,
}

/// Append-only destination for user-facing text.
pub trait OutputSink: Send + Sync {
    /// Write text to stdout without a trailing newline.
    fn write(&self, text: &str);

    /// Write styled text to stdout without a trailing newline.
    fn write_styled(&self, text: &str, style: Style);

    /// Write a line to stderr.
    fn error(&self, text: &str);

    /// Toggle verbose mode.
    fn set_verbose(&self, verbose: bool);

    /// Whether verbose mode is active.
    fn is_verbose(&self) -> bool;

    /// Write text followed by a newline.
    fn write_line(&self, text: &str) {
        self.write(text);
        self.write("\n");
    }

    /// Terminate the current line.
    fn line(&self) {
        self.write("\n");
    }

    /// Write a line only when verbose mode is active.
    fn verbose(&self, text: &str) {
        if self.is_verbose() {
            self.write_styled(text, Style::Yellow);
            self.line();
        }
    }
}

/// Sink writing to the process terminal with ANSI colors.
#[derive(Debug, Default)]
pub struct TerminalOutput {
    verbose: AtomicBool,
}

impl TerminalOutput {
    /// Create a terminal sink with verbose mode disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for TerminalOutput {
    fn write(&self, text: &str) {
        emit("stdout", &mut io::stdout().lock(), text);
    }

    fn write_styled(&self, text: &str, style: Style) {
        let styled = match style {
            Style::Plain => text.normal(),
            Style::Green => text.green(),
            Style::Red => text.red(),
            Style::Yellow => text.yellow(),
            Style::Cyan => text.cyan(),
            Style::Bold => text.bold(),
        };
        self.write(&styled.to_string());
    }

    fn error(&self, text: &str) {
        emit("stderr", &mut io::stderr().lock(), &format!("{}\n", text.red()));
    }

    fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }
}

/// Write and flush, logging failures such as a closed pipe.
fn emit(stream: &'static str, writer: &mut dyn io::Write, text: &str) -> bool {
    match writer
        .write_all(text.as_bytes())
        .and_then(|()| writer.flush())
    {
        Ok(()) => true,
        Err(err) => {
            debug!(stream, error = %err, "terminal write failed");
            false
        }
    }
}

/// Sink capturing everything in memory, without styling.
#[derive(Debug, Default)]
pub struct BufferedOutput {
    stdout: Mutex<String>,
    stderr: Mutex<String>,
    verbose: AtomicBool,
}

impl BufferedOutput {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written to stdout so far.
    #[must_use]
    pub fn stdout(&self) -> String {
        self.stdout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Everything written to stderr so far.
    #[must_use]
    pub fn stderr(&self) -> String {
        self.stderr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OutputSink for BufferedOutput {
    fn write(&self, text: &str) {
        self.stdout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
    }

    fn write_styled(&self, text: &str, _style: Style) {
        self.write(text);
    }

    fn error(&self, text: &str) {
        let mut stderr = self.stderr.lock().unwrap_or_else(PoisonError::into_inner);
        stderr.push_str(text);
        stderr.push('\n');
    }

    fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }
}

/// Render rows as a left-aligned text table with a header line.
#[must_use]
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.len()).collect();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let format_row = |cells: Vec<&str>| {
        let mut line = cells
            .iter()
            .zip(widths.iter().copied())
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        line.truncate(line.trim_end().len());
        line
    };

    let mut rendered = format_row(headers.to_vec());
    rendered.push('\n');
    for row in rows {
        rendered.push_str(&format_row(row.iter().map(String::as_str).collect()));
        rendered.push('\n');
    }
    rendered
}

/// Render a value as pretty JSON.
///
/// # Errors
///
/// Returns [`CliError::Failure`] when the value cannot be serialised.
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_output_separates_streams() {
        let output = BufferedOutput::new();
        output.write("Deleting Tag... ");
        output.write_styled("Ok.", Style::Green);
        output.line();
        output.error("boom");

        assert_eq!(output.stdout(), "Deleting Tag... Ok.\n");
        assert_eq!(output.stderr(), "boom\n");
    }

    struct ClosedPipe;

    impl io::Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn emit_reports_write_failures() {
        let mut buffer = Vec::new();
        assert!(emit("stdout", &mut buffer, "Ok.\n"));
        assert_eq!(buffer, b"Ok.\n");
        assert!(!emit("stdout", &mut ClosedPipe, "Ok.\n"));
    }

    #[test]
    fn verbose_lines_respect_mode() {
        let output = BufferedOutput::new();
        output.verbose("hidden");
        output.set_verbose(true);
        output.verbose("shown");
        assert_eq!(output.stdout(), "shown\n");
    }

    #[test]
    fn table_pads_columns() {
        let rendered = render_table(
            &["ID", "NAME"],
            &[
                vec!["1".into(), "Beta".into()],
                vec!["1234".into(), "Stable".into()],
            ],
        );
        assert_eq!(rendered, "ID    NAME\n1     Beta\n1234  Stable\n");
    }

    #[test]
    fn json_is_pretty_printed() -> CliResult<()> {
        let rendered = render_json(&serde_json::json!({"a": 1}))?;
        assert_eq!(rendered, "{\n  \"a\": 1\n}");
        Ok(())
    }
}
