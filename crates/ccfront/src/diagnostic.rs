//! Diagnostics engine and consumers
//!
//! The [`DiagnosticsEngine`] collects the diagnostics a session produces.
//! Once parsing is done they are handed to a [`DiagnosticConsumer`], such as the
//! in-memory [`TextDiagnosticPrinter`], which renders and counts them.

use log::trace;
use std::fmt;
use std::fmt::Write as _;

use crate::lang_options::LangOptions;
use crate::source_manager::{SourceLocation, SourceManager};

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Note,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Level::Note => "note",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Fatal => "fatal error",
        };
        f.write_str(text)
    }
}

/// A single diagnostic message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub location: SourceLocation,
    pub message: String,
}

/// Collector of diagnostics for one session
///
/// After a fatal error every further diagnostic is dropped, including notes
/// that would attach to a dropped diagnostic.
#[derive(Debug, Default)]
pub struct DiagnosticsEngine {
    diagnostics: Vec<Diagnostic>,
    num_errors: usize,
    num_warnings: usize,
    fatal_occurred: bool,
    last_dropped: bool,
}

impl DiagnosticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, level: Level, location: SourceLocation, message: impl Into<String>) {
        let dropped = match level {
            Level::Note => self.last_dropped,
            _ => self.fatal_occurred,
        };
        if level != Level::Note {
            self.last_dropped = dropped;
        }
        if dropped {
            return;
        }

        match level {
            Level::Note => {}
            Level::Warning => self.num_warnings += 1,
            Level::Error => self.num_errors += 1,
            Level::Fatal => {
                self.num_errors += 1;
                self.fatal_occurred = true;
            }
        }

        let message = message.into();
        trace!("Diagnostic reported: {level}: {message}");
        self.diagnostics.push(Diagnostic {
            level,
            location,
            message,
        });
    }

    pub fn error(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.report(Level::Error, location, message);
    }

    pub fn warning(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.report(Level::Warning, location, message);
    }

    pub fn note(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.report(Level::Note, location, message);
    }

    pub fn fatal(&mut self, location: SourceLocation, message: impl Into<String>) {
        self.report(Level::Fatal, location, message);
    }

    pub fn has_error_occurred(&self) -> bool {
        self.num_errors > 0
    }

    pub fn has_fatal_error_occurred(&self) -> bool {
        self.fatal_occurred
    }

    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Hand every collected diagnostic to `consumer`, emptying the engine
    pub fn drain_into(&mut self, consumer: &mut dyn DiagnosticConsumer, sm: &SourceManager) {
        for diag in self.diagnostics.drain(..) {
            consumer.handle_diagnostic(&diag, sm);
        }
    }
}

/// Receiver of rendered diagnostics
pub trait DiagnosticConsumer {
    fn begin_source_file(&mut self, _lang_opts: &LangOptions) {}

    fn end_source_file(&mut self) {}

    fn handle_diagnostic(&mut self, diag: &Diagnostic, sm: &SourceManager);

    fn num_errors(&self) -> usize;

    fn num_warnings(&self) -> usize;
}

/// Renders diagnostics as text into an in-memory buffer
///
/// Layout: `file:line:col: level: message`, then the source line and a caret
/// under the column.
#[derive(Debug, Default)]
pub struct TextDiagnosticPrinter {
    output: String,
    num_errors: usize,
    num_warnings: usize,
    show_source: bool,
}

impl TextDiagnosticPrinter {
    pub fn new() -> Self {
        Self {
            show_source: true,
            ..Default::default()
        }
    }

    /// Disable the source line and caret
    pub fn without_source(mut self) -> Self {
        self.show_source = false;
        self
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_output(self) -> String {
        self.output
    }
}

impl DiagnosticConsumer for TextDiagnosticPrinter {
    fn handle_diagnostic(&mut self, diag: &Diagnostic, sm: &SourceManager) {
        match diag.level {
            Level::Note => {}
            Level::Warning => self.num_warnings += 1,
            Level::Error | Level::Fatal => self.num_errors += 1,
        }

        let presumed = sm.presumed_loc(diag.location);
        // Writing into a String cannot fail
        let _ = match &presumed {
            Some(loc) => writeln!(
                self.output,
                "{}:{}:{}: {}: {}",
                loc.filename, loc.line, loc.column, diag.level, diag.message
            ),
            None => writeln!(self.output, "{}: {}", diag.level, diag.message),
        };

        if !self.show_source {
            return;
        }
        if let (Some(loc), Some(line)) = (presumed, sm.line_text(diag.location)) {
            let caret_pad: String = line
                .bytes()
                .take(loc.column - 1)
                .map(|b| if b == b'\t' { '\t' } else { ' ' })
                .collect();
            let _ = writeln!(self.output, "{line}\n{caret_pad}^");
        }
    }

    fn num_errors(&self) -> usize {
        self.num_errors
    }

    fn num_warnings(&self) -> usize {
        self.num_warnings
    }
}
