//! Diagnostic reporting for the millet compiler.
//!
//! Compact, rustc-style error output on stderr: a red `error:` line, a
//! `--> file:line:col` locator when a span is available, a few lines of
//! source context with a caret under the offending column, and optional
//! blue `note:` annotations. Reporting is decoupled from propagation:
//! callers print through these helpers and then bail with `anyhow`.

use std::sync::atomic::{AtomicBool, Ordering};

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(true);

const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const RESET: &str = "\x1b[0m";

/// Prints an error message with optional file context.
pub fn report_error(file: Option<&str>, message: &str, note: Option<&str>) {
    if !DIAGNOSTICS_ENABLED.load(Ordering::SeqCst) {
        return;
    }
    eprintln!("{}error{}: {}", RED, RESET, message);
    if let Some(path) = file {
        eprintln!("  --> {}", sanitize_file_path(path));
    }
    if let Some(note) = note {
        eprintln!("{}note{}: {}", BLUE, RESET, note);
    }
}

/// Prints an error and returns an `anyhow::Error` so callers can `?` out.
pub fn report_error_and_bail<T>(
    file: Option<&str>,
    message: &str,
    note: Option<&str>,
) -> anyhow::Result<T> {
    report_error(file, message, note);
    Err(anyhow::anyhow!("{}", message))
}

/// Prints a span-aware diagnostic with a caret under the error column.
///
/// `span_start` is a zero-based byte index into `source`. The index is
/// converted to line:column coordinates; if it falls outside the text the
/// last line is used as a fallback so reporting never panics.
pub fn report_error_span(
    file: Option<&str>,
    source: &str,
    span_start: usize,
    message: &str,
    note: Option<&str>,
) {
    if !DIAGNOSTICS_ENABLED.load(Ordering::SeqCst) {
        return;
    }
    let mut byte_idx = 0usize;
    let mut line_no = source.lines().count().max(1);
    let mut col = 0usize;
    for (lineno, line) in source.lines().enumerate() {
        let line_len = line.len() + 1;
        if span_start >= byte_idx && span_start < byte_idx + line_len {
            line_no = lineno + 1;
            col = span_start - byte_idx;
            break;
        }
        byte_idx += line_len;
    }

    eprintln!("{}error{}: {}", RED, RESET, message);
    if let Some(path) = file {
        eprintln!("  --> {}:{}:{}", sanitize_file_path(path), line_no, col + 1);
    }

    let lines: Vec<&str> = source.lines().collect();
    let idx = line_no.saturating_sub(1);
    let start = idx.saturating_sub(1);
    for (i, line) in lines.iter().enumerate().take(idx + 1).skip(start) {
        eprintln!("{:4} | {}", i + 1, line);
        if i == idx {
            eprintln!("     | {}^", " ".repeat(col));
        }
    }

    if let Some(note) = note {
        eprintln!("{}note{}: {}", BLUE, RESET, note);
    }
}

/// Span-aware variant of [`report_error_and_bail`].
pub fn report_error_span_and_bail<T>(
    file: Option<&str>,
    source: &str,
    span_start: usize,
    message: &str,
    note: Option<&str>,
) -> anyhow::Result<T> {
    report_error_span(file, source, span_start, message, note);
    Err(anyhow::anyhow!("{}", message))
}

// Only the file name is echoed back, never the full path.
fn sanitize_file_path(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string()
}

/// Silences diagnostic output until the returned guard is dropped.
///
/// Tests that exercise error paths use this to keep stderr clean while
/// still asserting on the propagated `anyhow` message.
pub fn suppress() -> SuppressGuard {
    let prev = DIAGNOSTICS_ENABLED.swap(false, Ordering::SeqCst);
    SuppressGuard { prev }
}

pub struct SuppressGuard {
    prev: bool,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        DIAGNOSTICS_ENABLED.store(self.prev, Ordering::SeqCst);
    }
}
