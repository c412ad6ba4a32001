//! Per-call front-end session
//!
//! [`create_session`] turns [`Settings`] into a fully wired front end: header
//! search, dialect options, target, file and source managers, preprocessor,
//! builtins, the dispatch consumer and an empty AST context. A session serves
//! exactly one buffer and is dropped at the end of the call.

use std::str::FromStr;

use ccfront_api::{FrontendError, FrontendResult, Language, Settings, Status};
use log::debug;
use target_lexicon::Triple;

use crate::ast::{AstConsumer, AstContext};
use crate::builtins::BuiltinInfo;
use crate::diagnostic::{DiagnosticConsumer, DiagnosticsEngine};
use crate::dispatch::{AstCallbackMap, CallbackParameter, DispatchConsumer};
use crate::file_manager::FileManager;
use crate::header_search::{HeaderSearch, HeaderSearchOptions, IncludeDirGroup};
use crate::lang_options::{LangOptions, LangStandard};
use crate::parse;
use crate::preprocessor::{Preprocessor, PreprocessorOptions, TranslationUnitKind};
use crate::source_manager::{FileId, SourceManager};
use crate::target::{default_target_triple, TargetInfo, TargetOptions};

/// Options a session was built from
#[derive(Debug, Clone, Default)]
pub struct CompilerInvocation {
    pub lang_opts: LangOptions,
    pub header_search_opts: HeaderSearchOptions,
    pub preprocessor_opts: PreprocessorOptions,
    pub target_opts: TargetOptions,
}

/// Front-end state for a single parse
pub struct Session<'a> {
    pub(crate) invocation: CompilerInvocation,
    pub(crate) target: TargetInfo,
    pub(crate) file_manager: FileManager,
    pub(crate) source_manager: SourceManager,
    pub(crate) diagnostics: DiagnosticsEngine,
    pub(crate) preprocessor: Preprocessor,
    pub(crate) builtins: BuiltinInfo,
    pub(crate) consumer: Box<dyn AstConsumer + 'a>,
    pub(crate) ast_context: AstContext,
}

impl<'a> Session<'a> {
    pub fn invocation(&self) -> &CompilerInvocation {
        &self.invocation
    }

    pub fn lang_opts(&self) -> &LangOptions {
        &self.invocation.lang_opts
    }

    pub fn target(&self) -> &TargetInfo {
        &self.target
    }

    pub fn source_manager(&self) -> &SourceManager {
        &self.source_manager
    }

    pub fn diagnostics(&self) -> &DiagnosticsEngine {
        &self.diagnostics
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn builtins(&self) -> &BuiltinInfo {
        &self.builtins
    }

    pub fn ast_context(&self) -> &AstContext {
        &self.ast_context
    }

    /// Register `buffer` as the main file of the translation unit
    pub fn create_main_file(&mut self, name: &str, buffer: &str) -> FrontendResult<FileId> {
        let file = self.source_manager.create_file_id(name, buffer)?;
        self.source_manager.set_main_file_id(file);
        debug!("Main file '{}' registered ({} bytes)", name, buffer.len());
        Ok(file)
    }

    /// Preprocess, parse and check the main file, then hand the result to the consumer
    pub fn parse(&mut self) -> FrontendResult<()> {
        parse::parse_ast(self)
    }

    /// Forward the collected diagnostics to `consumer`
    pub fn emit_diagnostics(&mut self, consumer: &mut dyn DiagnosticConsumer) {
        self.diagnostics
            .drain_into(consumer, &self.source_manager);
    }
}

/// Build a session for `settings`
///
/// Configuration failures come back as the matching [`Status`]; nothing is
/// parsed and no callback runs.
pub fn create_session<'a>(
    settings: &Settings,
    callbacks: &'a AstCallbackMap,
    parameter: &'a CallbackParameter,
) -> Result<Session<'a>, Status> {
    build_session(settings, callbacks, parameter).map_err(|e| {
        debug!("Session creation failed: {e}");
        Status::from(e)
    })
}

fn build_session<'a>(
    settings: &Settings,
    callbacks: &'a AstCallbackMap,
    parameter: &'a CallbackParameter,
) -> FrontendResult<Session<'a>> {
    let language = settings.language;
    let system_paths = settings.profile.system_paths(language);
    let externc_paths = settings.profile.externc_system_paths(language);

    // Step 1: session state
    let mut invocation = CompilerInvocation::default();
    invocation.header_search_opts.entries.try_reserve(
        system_paths.len() + externc_paths.len() + settings.additional_include_folders.len(),
    )?;
    debug!("Step 1: session state allocated");

    // Step 2: header search
    let hs = &mut invocation.header_search_opts;
    hs.use_builtin_includes = false;
    hs.use_standard_system_includes = false;
    hs.use_standard_cxx_includes = false;
    hs.resource_dir = settings.profile.resource_dir.clone();
    for path in system_paths {
        hs.add_path(path, IncludeDirGroup::System);
    }
    for path in externc_paths {
        hs.add_path(path, IncludeDirGroup::ExternCSystem);
    }
    for folder in &settings.additional_include_folders {
        match std::path::absolute(folder) {
            Ok(path) => hs.add_path(path, IncludeDirGroup::System),
            Err(e) => debug!("Skipping include folder '{}': {e}", folder.display()),
        }
    }
    debug!(
        "Step 2: {} header search entries for {}",
        hs.entries.len(),
        language.name()
    );

    // Step 3: language and standard
    let standard = LangStandard::from_version(language, settings.language_standard)?;
    debug!("Step 3: language standard {}", standard.name());

    // Step 4: dialect switches
    let lang_opts = &mut invocation.lang_opts;
    let cplusplus = language == Language::Cxx;
    lang_opts.cplusplus = cplusplus;
    lang_opts.rtti = cplusplus;
    lang_opts.cxx_exceptions = cplusplus;
    lang_opts.gnu_keywords = true;
    lang_opts.bool_type = true;
    lang_opts.gnu_mode = settings.enable_gnu_extensions;
    debug!(
        "Step 4: dialect cplusplus={} gnu_mode={}",
        cplusplus, settings.enable_gnu_extensions
    );

    // Step 5: standard-dependent defaults
    invocation.target_opts.triple = settings
        .target_triple
        .clone()
        .unwrap_or_else(default_target_triple);
    let triple = Triple::from_str(&invocation.target_opts.triple)
        .map_err(|_| FrontendError::UnknownTarget(invocation.target_opts.triple.clone()))?;
    invocation
        .lang_opts
        .set_lang_defaults(standard.input_kind(), &triple, standard);
    debug!("Step 5: language defaults set");

    // Step 6: target
    let target = TargetInfo::create(&invocation.target_opts)?;
    debug!("Step 6: target {}", target.triple());

    // Step 7: file and source managers
    let mut file_manager = FileManager::new();
    let source_manager = SourceManager::new();
    debug!("Step 7: file and source managers created");

    // Step 8: preprocessor
    invocation.preprocessor_opts.use_predefines = false;
    let header_search = HeaderSearch::new(
        &invocation.header_search_opts,
        &invocation.lang_opts,
        &mut file_manager,
    );
    let preprocessor = Preprocessor::new(
        invocation.preprocessor_opts.clone(),
        &invocation.lang_opts,
        &target,
        header_search,
        TranslationUnitKind::Complete,
    );
    debug!(
        "Step 8: preprocessor with {} search directories",
        preprocessor.header_search().search_dirs().len()
    );

    // Step 9: builtins
    let mut builtins = BuiltinInfo::new();
    builtins.initialize_builtins(&invocation.lang_opts);
    debug!("Step 9: {} builtins", builtins.len());

    // Step 10: consumer
    let consumer: Box<dyn AstConsumer + 'a> = Box::new(DispatchConsumer::new(callbacks, parameter));
    debug!("Step 10: dispatch consumer installed ({} callbacks)", callbacks.len());

    // Step 11: AST context
    let ast_context = AstContext::new(&invocation.lang_opts, &target);
    debug!("Step 11: AST context created");

    Ok(Session {
        invocation,
        target,
        file_manager,
        source_manager,
        diagnostics: DiagnosticsEngine::new(),
        preprocessor,
        builtins,
        consumer,
        ast_context,
    })
}
