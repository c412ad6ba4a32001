//! Public entry point: configure once, parse many buffers

use ccfront_api::{AstCallbackType, FrontendResult, Settings, Status, StatusCode};
use log::debug;

use crate::ast::{AstContext, Decl};
use crate::diagnostic::{DiagnosticConsumer, TextDiagnosticPrinter};
use crate::dispatch::{AstCallbackMap, CallbackParameter};
use crate::session::{create_session, Session};
use crate::source_manager::SourceManager;

/// Name the processed buffer is registered under
pub const DEFAULT_BUFFER_NAME: &str = "main.cpp";

/// A configured C/C++ front end
///
/// Holds the settings, the callback table and the callback parameter. Every
/// [`process_buffer`](Self::process_buffer) call builds a fresh session, so
/// nothing carries over between calls.
///
/// # Example
///
/// ```rust
/// use ccfront::CompilerInstance;
/// use ccfront_api::{AstCallbackType, Language, Settings, StatusCode};
///
/// let mut instance = CompilerInstance::create(Settings::new(Language::C, 99)).unwrap();
/// instance.register_ast_callback(AstCallbackType::Function, |decl, _, _, _| {
///     println!("{}", decl.name().unwrap_or_default());
///     true
/// });
///
/// let status = instance.process_buffer("int main(void) { return 0; }\n");
/// assert_eq!(status.code(), StatusCode::Ok);
/// ```
#[derive(Debug)]
pub struct CompilerInstance {
    settings: Settings,
    callbacks: AstCallbackMap,
    callback_parameter: CallbackParameter,
}

impl CompilerInstance {
    /// Capture `settings`; validation happens on each parse
    pub fn create(settings: Settings) -> Result<Self, Status> {
        let mut callbacks = AstCallbackMap::new();
        callbacks.try_reserve(1).map_err(Status::from)?;

        Ok(Self {
            settings,
            callbacks,
            callback_parameter: CallbackParameter::none(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Install `callback` for `kind`, replacing any earlier one
    pub fn register_ast_callback<F>(&mut self, kind: AstCallbackType, callback: F)
    where
        F: Fn(&Decl<'_>, &AstContext, &SourceManager, &CallbackParameter) -> bool
            + Send
            + Sync
            + 'static,
    {
        if self.callbacks.register(kind, Box::new(callback)).is_some() {
            debug!("Replaced {kind} callback");
        }
    }

    /// Value passed to every callback
    pub fn set_ast_callback_parameter(&mut self, parameter: CallbackParameter) {
        self.callback_parameter = parameter;
    }

    /// Parse `buffer` as [`DEFAULT_BUFFER_NAME`] and dispatch its declarations
    pub fn process_buffer(&self, buffer: &str) -> Status {
        self.process_named_buffer(DEFAULT_BUFFER_NAME, buffer)
    }

    /// Like [`process_buffer`](Self::process_buffer) with an explicit buffer name
    ///
    /// The name shows up in diagnostics and in the presumed locations handed
    /// to callbacks. Quoted includes resolve against the current directory
    /// when the name has no directory part.
    pub fn process_named_buffer(&self, name: &str, buffer: &str) -> Status {
        let mut session = match create_session(&self.settings, &self.callbacks, &self.callback_parameter)
        {
            Ok(session) => session,
            Err(status) => return status,
        };

        match run(&mut session, name, buffer) {
            Ok(status) => status,
            Err(e) => {
                debug!("Processing '{name}' failed: {e}");
                e.into()
            }
        }
    }
}

fn run(session: &mut Session<'_>, name: &str, buffer: &str) -> FrontendResult<Status> {
    session.create_main_file(name, buffer)?;

    let mut printer = TextDiagnosticPrinter::new();
    printer.begin_source_file(session.lang_opts());
    let parsed = session.parse();
    session.emit_diagnostics(&mut printer);
    printer.end_source_file();
    parsed?;

    let (errors, warnings) = (printer.num_errors(), printer.num_warnings());
    debug!("Finished '{name}': {errors} errors, {warnings} warnings");

    let status = if errors > 0 {
        Status::with_message(false, StatusCode::CompilationError, printer.into_output())
    } else if warnings > 0 {
        Status::with_message(true, StatusCode::CompilationWarning, printer.into_output())
    } else {
        Status::ok()
    };
    Ok(status)
}
