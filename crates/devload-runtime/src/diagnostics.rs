//! Load-failure diagnostics.

use devload_core::LoadError;

const RED: &str = "\x1b[31m";
const RED_CLOSE: &str = "\x1b[39m";
const BOLD: &str = "\x1b[1m";
const BOLD_CLOSE: &str = "\x1b[22m";

/// Destination for load-failure diagnostics.
pub trait DiagnosticSink {
    fn report(&self, diagnostic: &str);
}

/// Writes diagnostics to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&self, diagnostic: &str) {
        eprintln!("{diagnostic}");
    }
}

impl<F: Fn(&str)> DiagnosticSink for F {
    fn report(&self, diagnostic: &str) {
        self(diagnostic);
    }
}

/// Render the diagnostic for a failed load of `file`.
///
/// Errors carrying a source frame show the emphasized message followed by
/// the frame; all others show their full stack.
#[must_use]
pub fn format_load_error(file: &str, err: &LoadError, color: bool) -> String {
    let body = match err.frame() {
        Some(frame) => format!("{}\n{frame}", paint(BOLD, BOLD_CLOSE, &err.message(), color)),
        None => err.stack(),
    };
    paint(
        RED,
        RED_CLOSE,
        &format!("Error while loading module {file}:\n{body}"),
        color,
    )
}

fn paint(open: &str, close: &str, text: &str, color: bool) -> String {
    if color {
        format!("{open}{text}{close}")
    } else {
        text.to_string()
    }
}
