//! Preprocessor
//!
//! Produces the text of the whole translation unit for the parser. Directive
//! lines and skipped conditional blocks are blanked (replaced by spaces with
//! their byte length and newlines kept), included files are spliced in after
//! the `#include` line, and macro uses are expanded in place. A function-like
//! invocation whose arguments continue on later lines is expanded as a whole.
//!
//! Every byte of the output maps back to a [`SourceLocation`] through the
//! segment map of [`PreprocessedUnit`].

use ccfront_api::{FrontendError, FrontendResult};
use log::{debug, trace};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::conditionals::{evaluate_condition, ConditionalStack};
use crate::diagnostic::DiagnosticsEngine;
use crate::file_manager::FileManager;
use crate::header_search::{HeaderSearch, IncludeDirGroup};
use crate::lang_options::LangOptions;
use crate::macros::{blank_comments, MacroInfo, MacroTable};
use crate::source_manager::{FileId, SourceLocation, SourceManager};
use crate::target::TargetInfo;

/// Deepest include nesting accepted by default
pub const MAX_INCLUDE_DEPTH: usize = 200;

const BUILTIN_BUFFER_NAME: &str = "<built-in>";

static RE_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*#[ \t]*([A-Za-z_]\w*)?").unwrap());
static RE_INCLUDE_OPERAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(?:"([^"\n]*)"|<([^>\n]*)>)"#).unwrap());
static RE_MACRO_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_$][\w$]*)").unwrap());

/// Whether the translation unit is complete or a prefix (such as a PCH)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationUnitKind {
    Complete,
    Prefix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessorOptions {
    /// Inject the compiler's predefined macros
    pub use_predefines: bool,
    pub max_include_depth: usize,
}

impl Default for PreprocessorOptions {
    fn default() -> Self {
        Self {
            use_predefines: true,
            max_include_depth: MAX_INCLUDE_DEPTH,
        }
    }
}

/// Origin of a run of translation-unit text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Copied (or blanked) byte for byte from a file
    File,
    /// Macro expansion; every byte maps to the invocation
    Expansion,
    /// Text the preprocessor inserted, such as implicit `extern "C"` blocks
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub unit_offset: usize,
    pub location: SourceLocation,
    pub kind: SegmentKind,
}

/// Preprocessed translation unit
#[derive(Debug, Default)]
pub struct PreprocessedUnit {
    text: String,
    segments: Vec<Segment>,
}

impl PreprocessedUnit {
    /// Unit consisting of `text` copied verbatim from a file starting at `start`
    pub fn from_file_text(text: &str, start: SourceLocation) -> Self {
        let mut unit = Self::default();
        unit.push(text, start, SegmentKind::File);
        unit
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Source location of byte `offset` of the unit text
    pub fn location_of(&self, offset: usize) -> SourceLocation {
        let index = self.segments.partition_point(|seg| seg.unit_offset <= offset);
        let Some(segment) = index.checked_sub(1).map(|i| &self.segments[i]) else {
            return SourceLocation::invalid();
        };

        match segment.kind {
            SegmentKind::File => segment
                .location
                .offset_by((offset - segment.unit_offset) as u32),
            SegmentKind::Expansion | SegmentKind::Synthetic => segment.location,
        }
    }

    fn push(&mut self, text: &str, location: SourceLocation, kind: SegmentKind) {
        if text.is_empty() {
            return;
        }

        let continues_last = self.segments.last().is_some_and(|last| {
            kind == SegmentKind::File
                && last.kind == SegmentKind::File
                && last
                    .location
                    .offset_by((self.text.len() - last.unit_offset) as u32)
                    == location
        });
        if !continues_last {
            self.segments.push(Segment {
                unit_offset: self.text.len(),
                location,
                kind,
            });
        }
        self.text.push_str(text);
    }

    /// Append `text` with everything but newlines replaced by spaces
    fn push_blank(&mut self, text: &str, location: SourceLocation) {
        let blanked: String = text
            .bytes()
            .map(|b| if b == b'\n' { '\n' } else { ' ' })
            .collect();
        self.push(&blanked, location, SegmentKind::File);
    }
}

/// Mutable session state borrowed for one preprocessing run
struct Run<'r> {
    fm: &'r mut FileManager,
    sm: &'r mut SourceManager,
    diags: &'r mut DiagnosticsEngine,
    unit: PreprocessedUnit,
}

/// File being read
struct FileCtx<'f> {
    id: FileId,
    path: Option<&'f Path>,
    depth: usize,
}

impl FileCtx<'_> {
    fn dir(&self) -> Option<&Path> {
        self.path.and_then(Path::parent)
    }
}

pub struct Preprocessor {
    options: PreprocessorOptions,
    lang_opts: LangOptions,
    header_search: HeaderSearch,
    tu_kind: TranslationUnitKind,
    predefines: String,
    macros: MacroTable,
    conditionals: ConditionalStack,
    pragma_once: HashSet<PathBuf>,
}

impl Preprocessor {
    pub fn new(
        options: PreprocessorOptions,
        lang_opts: &LangOptions,
        target: &TargetInfo,
        header_search: HeaderSearch,
        tu_kind: TranslationUnitKind,
    ) -> Self {
        let predefines = if options.use_predefines {
            build_predefines(lang_opts, target)
        } else {
            String::new()
        };

        Self {
            options,
            lang_opts: lang_opts.clone(),
            header_search,
            tu_kind,
            predefines,
            macros: MacroTable::new(),
            conditionals: ConditionalStack::new(),
            pragma_once: HashSet::new(),
        }
    }

    pub fn tu_kind(&self) -> TranslationUnitKind {
        self.tu_kind
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn header_search(&self) -> &HeaderSearch {
        &self.header_search
    }

    pub fn lang_opts(&self) -> &LangOptions {
        &self.lang_opts
    }

    /// Preprocess the main file of `sm`
    ///
    /// Problems in the source are reported to `diags`; only allocation
    /// failures and a missing main file are returned as errors.
    pub fn preprocess(
        &mut self,
        fm: &mut FileManager,
        sm: &mut SourceManager,
        diags: &mut DiagnosticsEngine,
    ) -> FrontendResult<PreprocessedUnit> {
        let main = sm
            .main_file_id()
            .ok_or_else(|| FrontendError::Engine("no main file to preprocess".to_string()))?;

        let mut unit = PreprocessedUnit::default();
        unit.text
            .try_reserve(sm.buffer_data(main).map_or(0, str::len))?;
        let mut run = Run { fm, sm, diags, unit };

        if !self.predefines.is_empty() {
            let builtin = run.sm.create_file_id(BUILTIN_BUFFER_NAME, &self.predefines)?;
            self.enter_file(
                &mut run,
                FileCtx {
                    id: builtin,
                    path: None,
                    depth: 0,
                },
            )?;
        }

        self.enter_file(
            &mut run,
            FileCtx {
                id: main,
                path: None,
                depth: 0,
            },
        )?;

        debug!(
            "Preprocessed translation unit: {} bytes, {} segments, {} macros",
            run.unit.text.len(),
            run.unit.segments.len(),
            self.macros.len()
        );
        Ok(run.unit)
    }

    fn enter_file(&mut self, run: &mut Run<'_>, file: FileCtx<'_>) -> FrontendResult<()> {
        let buffer = run.sm.buffer_data(file.id).unwrap_or_default().to_string();
        let base_depth = self.conditionals.depth();
        let mut in_comment = false;
        let mut pos = 0;

        while pos < buffer.len() {
            let line_end = next_line_end(&buffer, pos);
            let line = &buffer[pos..line_end];
            let loc = run.sm.location_for(file.id, pos as u32);

            if !in_comment && RE_DIRECTIVE.is_match(line) {
                let mut end = line_end;
                while end < buffer.len() && has_continuation(&buffer[pos..end]) {
                    end = next_line_end(&buffer, end);
                }
                let raw = &buffer[pos..end];
                run.unit.push_blank(raw, loc);

                let (logical, still_open) = blank_comments(&join_continuations(raw), false);
                in_comment = still_open;
                self.handle_directive(run, &file, &logical, pos)?;
                pos = end;
            } else if self.conditionals.is_active() {
                let mut end = line_end;
                while end < buffer.len()
                    && !RE_DIRECTIVE.is_match(&buffer[end..next_line_end(&buffer, end)])
                    && self
                        .macros
                        .has_open_invocation(&blank_comments(&buffer[pos..end], in_comment).0)
                {
                    end = next_line_end(&buffer, end);
                }
                in_comment = self.push_code(run, file.id, &buffer[pos..end], pos, in_comment);
                pos = end;
            } else {
                run.unit.push_blank(line, loc);
                in_comment = blank_comments(line, in_comment).1;
                pos = line_end;
            }
        }

        if !buffer.is_empty() && !buffer.ends_with('\n') {
            let eof = run.sm.location_for(file.id, buffer.len() as u32);
            run.unit.push("\n", eof, SegmentKind::Synthetic);
        }

        for if_loc in self.conditionals.truncate(base_depth) {
            run.diags.error(if_loc, "unterminated conditional directive");
        }
        Ok(())
    }

    /// Copy lines of code, expanding macro uses
    ///
    /// Returns whether the text ends inside a block comment.
    fn push_code(
        &self,
        run: &mut Run<'_>,
        file: FileId,
        text: &str,
        pos: usize,
        in_comment: bool,
    ) -> bool {
        let (scan, open) = blank_comments(text, in_comment);
        let expansions = self.macros.expansions(&scan);
        if expansions.is_empty() {
            let loc = run.sm.location_for(file, pos as u32);
            run.unit.push(text, loc, SegmentKind::File);
            return open;
        }

        let mut flushed = 0;
        for expansion in expansions {
            let before = run.sm.location_for(file, (pos + flushed) as u32);
            let invocation = run.sm.location_for(file, (pos + expansion.start) as u32);
            run.unit
                .push(&text[flushed..expansion.start], before, SegmentKind::File);

            match expansion.text {
                Ok(expanded) => {
                    trace!(
                        "Expanded '{}' to '{}'",
                        text[expansion.start..expansion.end].trim(),
                        expanded.trim()
                    );
                    run.unit
                        .push(&format!(" {expanded} "), invocation, SegmentKind::Expansion);
                }
                Err(e) => {
                    run.diags.error(invocation, e.to_string());
                    run.unit.push(
                        &text[expansion.start..expansion.end],
                        invocation,
                        SegmentKind::File,
                    );
                }
            }
            flushed = expansion.end;
        }
        let tail = run.sm.location_for(file, (pos + flushed) as u32);
        run.unit.push(&text[flushed..], tail, SegmentKind::File);

        open
    }

    fn handle_directive(
        &mut self,
        run: &mut Run<'_>,
        file: &FileCtx<'_>,
        text: &str,
        pos: usize,
    ) -> FrontendResult<()> {
        let Some(caps) = RE_DIRECTIVE.captures(text) else {
            return Ok(());
        };
        let (name, name_start, rest_start) = match caps.get(1) {
            Some(m) => (m.as_str(), m.start(), m.end()),
            None => ("", caps[0].len(), caps[0].len()),
        };
        let rest = &text[rest_start..];
        let name_loc = run.sm.location_for(file.id, (pos + name_start) as u32);
        let rest_loc = run.sm.location_for(file.id, (pos + rest_start) as u32);
        let operand_offset = (rest.len() - rest.trim_start().len()) as u32;
        let active = self.conditionals.is_active();

        match name {
            "if" => {
                let taken = active && self.eval_condition(run, "#if", rest, name_loc);
                self.conditionals.push_if(taken, name_loc);
            }
            "ifdef" | "ifndef" => {
                let taken = active
                    && self
                        .macro_name(run, rest, name, rest_loc)
                        .is_some_and(|(macro_name, _)| {
                            self.macros.is_defined(macro_name) == (name == "ifdef")
                        });
                self.conditionals.push_if(taken, name_loc);
            }
            "elif" => {
                let taken = self.conditionals.elif_needs_evaluation()
                    && self.eval_condition(run, "#elif", rest, name_loc);
                if let Err(e) = self.conditionals.enter_elif(taken) {
                    run.diags.error(name_loc, e.to_string());
                }
            }
            "else" | "endif" => {
                let result = if name == "else" {
                    self.conditionals.enter_else()
                } else {
                    self.conditionals.exit()
                };
                match result {
                    Err(e) => run.diags.error(name_loc, e.to_string()),
                    Ok(()) if active && !rest.trim().is_empty() => run.diags.warning(
                        rest_loc.offset_by(operand_offset),
                        format!("extra tokens at end of #{name} directive"),
                    ),
                    Ok(()) => {}
                }
            }
            _ if !active => {}
            "include" | "include_next" => {
                let operand_loc = rest_loc.offset_by(operand_offset);
                self.handle_include(run, file, rest, operand_loc)?;
            }
            "define" => self.handle_define(run, rest, rest_loc),
            "undef" => {
                if let Some((macro_name, _)) = self.macro_name(run, rest, name, rest_loc) {
                    self.macros.undefine(macro_name);
                }
            }
            "error" => {
                let message = rest.trim();
                run.diags
                    .error(name_loc, if message.is_empty() { "#error" } else { message });
            }
            "warning" => {
                let message = rest.trim();
                run.diags
                    .warning(name_loc, if message.is_empty() { "#warning" } else { message });
            }
            "pragma" => {
                if rest.split_whitespace().next() == Some("once") {
                    match file.path {
                        Some(path) => {
                            self.pragma_once.insert(path.to_path_buf());
                        }
                        None if run.sm.main_file_id() == Some(file.id) => {
                            run.diags.warning(name_loc, "#pragma once in main file")
                        }
                        None => {}
                    }
                }
            }
            // Null directive, GNU line markers and directives without effect here
            "" | "line" | "ident" | "sccs" | "assert" | "unassert" => {}
            _ => run.diags.error(name_loc, "invalid preprocessing directive"),
        }

        Ok(())
    }

    fn eval_condition(
        &self,
        run: &mut Run<'_>,
        directive: &str,
        expr: &str,
        loc: SourceLocation,
    ) -> bool {
        if expr.trim().is_empty() {
            run.diags.error(loc, format!("{directive} with no expression"));
            return false;
        }

        match evaluate_condition(expr, &self.macros, &self.lang_opts) {
            Ok(value) => value,
            Err(e) => {
                run.diags.error(loc, e.to_string());
                false
            }
        }
    }

    /// Parse the macro name operand of `#define`, `#undef`, `#ifdef`, `#ifndef`
    ///
    /// Returns the name and the offset just past it within `rest`.
    fn macro_name<'t>(
        &self,
        run: &mut Run<'_>,
        rest: &'t str,
        directive: &str,
        rest_loc: SourceLocation,
    ) -> Option<(&'t str, usize)> {
        let leading = rest.len() - rest.trim_start().len();
        let operand = rest.trim_start();
        let loc = rest_loc.offset_by(leading as u32);

        if operand.is_empty() {
            run.diags.error(loc, "macro name missing");
            return None;
        }
        let Some(m) = RE_MACRO_NAME.find(operand) else {
            run.diags.error(loc, "macro name must be an identifier");
            return None;
        };
        if m.as_str() == "defined" {
            run.diags
                .error(loc, "'defined' cannot be used as a macro name");
            return None;
        }

        let end = leading + m.end();
        if directive != "define" && !rest[end..].trim().is_empty() {
            run.diags.warning(
                rest_loc.offset_by(end as u32),
                format!("extra tokens at end of #{directive} directive"),
            );
        }
        Some((m.as_str(), end))
    }

    fn handle_define(&mut self, run: &mut Run<'_>, rest: &str, rest_loc: SourceLocation) {
        let Some((name, name_end)) = self.macro_name(run, rest, "define", rest_loc) else {
            return;
        };
        let name_loc = rest_loc.offset_by((name_end - name.len()) as u32);
        let after = &rest[name_end..];

        let mut info = MacroInfo::object_like(name, after, name_loc);
        if let Some(params_text) = after.strip_prefix('(') {
            let Some(close) = params_text.find(')') else {
                run.diags
                    .error(name_loc, "missing ')' in macro parameter list");
                return;
            };
            match parse_params(&params_text[..close]) {
                Some((params, variadic)) => {
                    info.params = Some(params);
                    info.variadic = variadic;
                    info.body = params_text[close + 1..].trim().to_string();
                }
                None => {
                    run.diags
                        .error(name_loc, "invalid token in macro parameter list");
                    return;
                }
            }
        }

        if let Some(previous) = self.macros.get(name) {
            if !previous.is_identical_to(&info) {
                run.diags
                    .warning(name_loc, format!("'{name}' macro redefined"));
                run.diags
                    .note(previous.location, "previous definition is here");
            }
        }
        trace!("Defined macro '{name}'");
        self.macros.define(info);
    }

    fn handle_include(
        &mut self,
        run: &mut Run<'_>,
        file: &FileCtx<'_>,
        rest: &str,
        operand_loc: SourceLocation,
    ) -> FrontendResult<()> {
        let expanded;
        let operand = if RE_INCLUDE_OPERAND.is_match(rest) {
            rest
        } else {
            match self.macros.expand_text(rest) {
                Ok(text) => {
                    expanded = text;
                    expanded.as_str()
                }
                Err(e) => {
                    run.diags.error(operand_loc, e.to_string());
                    return Ok(());
                }
            }
        };

        let Some(caps) = RE_INCLUDE_OPERAND.captures(operand) else {
            run.diags
                .error(operand_loc, "expected \"FILENAME\" or <FILENAME>");
            return Ok(());
        };
        let (filename, is_angled) = match (caps.get(1), caps.get(2)) {
            (Some(quoted), _) => (quoted.as_str(), false),
            (None, Some(angled)) => (angled.as_str(), true),
            (None, None) => return Ok(()),
        };
        if filename.is_empty() {
            run.diags.error(operand_loc, "empty filename");
            return Ok(());
        }

        let Some(found) = self
            .header_search
            .lookup_file(filename, is_angled, file.dir(), run.fm)
        else {
            run.diags
                .fatal(operand_loc, format!("'{filename}' file not found"));
            return Ok(());
        };

        if self.pragma_once.contains(found.file.path()) {
            trace!("Skipping #pragma once file {}", found.file.path().display());
            return Ok(());
        }
        if file.depth + 1 > self.options.max_include_depth {
            run.diags.error(operand_loc, "#include nested too deeply");
            return Ok(());
        }

        let name = found.file.path().display().to_string();
        let id = run.sm.create_file_id(&name, found.file.contents())?;
        trace!("Entering {name} at depth {}", file.depth + 1);

        let extern_c = self.lang_opts.cplusplus && found.group == Some(IncludeDirGroup::ExternCSystem);
        if !run.unit.text.is_empty() && !run.unit.text.ends_with('\n') {
            run.unit.push("\n", operand_loc, SegmentKind::Synthetic);
        }
        if extern_c {
            run.unit
                .push("extern \"C\" {\n", operand_loc, SegmentKind::Synthetic);
        }

        self.enter_file(
            run,
            FileCtx {
                id,
                path: Some(found.file.path()),
                depth: file.depth + 1,
            },
        )?;

        if extern_c {
            run.unit.push("}\n", operand_loc, SegmentKind::Synthetic);
        }
        Ok(())
    }
}

fn next_line_end(buffer: &str, pos: usize) -> usize {
    buffer[pos..]
        .find('\n')
        .map_or(buffer.len(), |offset| pos + offset + 1)
}

/// Whether a physical line ends with a backslash-newline
fn has_continuation(line: &str) -> bool {
    line.ends_with('\n')
        && line
            .trim_end_matches('\n')
            .trim_end_matches('\r')
            .ends_with('\\')
}

/// Splice continued lines, replacing each backslash-newline with spaces
fn join_continuations(raw: &str) -> String {
    raw.replace("\\\r\n", "   ").replace("\\\n", "  ")
}

/// Parse a macro parameter list, returning the names and whether it is variadic
fn parse_params(text: &str) -> Option<(Vec<String>, bool)> {
    let mut params = Vec::new();
    if text.trim().is_empty() {
        return Some((params, false));
    }

    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    let last = parts.len() - 1;
    for (index, part) in parts.into_iter().enumerate() {
        if part == "..." && index == last {
            params.push("__VA_ARGS__".to_string());
            return Some((params, true));
        }
        let (name, variadic) = match part.strip_suffix("...") {
            Some(named) if index == last => (named.trim_end(), true),
            Some(_) => return None,
            None => (part, false),
        };
        if RE_MACRO_NAME.find(name).map(|m| m.as_str()) != Some(name) {
            return None;
        }
        params.push(name.to_string());
        if variadic {
            return Some((params, true));
        }
    }
    Some((params, false))
}

/// `#define` lines for the compiler's predefined macros
fn build_predefines(lang_opts: &LangOptions, target: &TargetInfo) -> String {
    let mut defines: Vec<(&str, String)> = vec![
        ("__STDC__", "1".to_string()),
        ("__STDC_HOSTED__", "1".to_string()),
        ("__GNUC__", "4".to_string()),
        ("__GNUC_MINOR__", "2".to_string()),
    ];

    if let Some((name, value)) = lang_opts.standard.and_then(|s| s.version_macro()) {
        defines.push((name, value.to_string()));
    }
    if !lang_opts.gnu_mode {
        defines.push(("__STRICT_ANSI__", "1".to_string()));
    }
    if lang_opts.cplusplus && lang_opts.rtti {
        defines.push(("__GXX_RTTI", "1".to_string()));
    }
    if lang_opts.cplusplus && lang_opts.cxx_exceptions {
        defines.push(("__EXCEPTIONS", "1".to_string()));
    }
    if target.pointer_width() == 64 && target.long_width() == 64 {
        defines.push(("__LP64__", "1".to_string()));
        defines.push(("_LP64", "1".to_string()));
    }
    defines.push((
        "__SIZEOF_POINTER__",
        (target.pointer_width() / 8).to_string(),
    ));
    defines.push(("__SIZEOF_LONG__", (target.long_width() / 8).to_string()));
    if !target.char_is_signed() {
        defines.push(("__CHAR_UNSIGNED__", "1".to_string()));
    }
    if target.is_big_endian() {
        defines.push(("__BIG_ENDIAN__", "1".to_string()));
    }
    if let Some(arch) = target.arch_macro() {
        defines.push((arch, "1".to_string()));
    }

    defines
        .into_iter()
        .map(|(name, value)| format!("#define {name} {value}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Level;
    use crate::header_search::HeaderSearchOptions;
    use crate::lang_options::{InputKind, LangStandard};
    use crate::target::TargetOptions;
    use std::fs;
    use std::str::FromStr;
    use target_lexicon::Triple;

    struct Output {
        unit: PreprocessedUnit,
        sm: SourceManager,
        diags: DiagnosticsEngine,
    }

    fn lang(cplusplus: bool) -> LangOptions {
        let triple = Triple::from_str("x86_64-unknown-linux-gnu").unwrap();
        let mut opts = LangOptions::new();
        opts.cplusplus = cplusplus;
        if cplusplus {
            opts.set_lang_defaults(InputKind::Cxx, &triple, LangStandard::Cxx11);
        } else {
            opts.set_lang_defaults(InputKind::C, &triple, LangStandard::C99);
        }
        opts
    }

    fn run(
        source: &str,
        lang_opts: LangOptions,
        search: HeaderSearchOptions,
        options: PreprocessorOptions,
    ) -> Output {
        let target = TargetInfo::create(&TargetOptions {
            triple: "x86_64-unknown-linux-gnu".to_string(),
        })
        .unwrap();
        let mut fm = FileManager::new();
        let mut sm = SourceManager::new();
        let mut diags = DiagnosticsEngine::new();

        let main = sm.create_file_id("main.c", source).unwrap();
        sm.set_main_file_id(main);
        let header_search = HeaderSearch::new(&search, &lang_opts, &mut fm);
        let mut pp = Preprocessor::new(
            options,
            &lang_opts,
            &target,
            header_search,
            TranslationUnitKind::Complete,
        );
        let unit = pp.preprocess(&mut fm, &mut sm, &mut diags).unwrap();
        Output { unit, sm, diags }
    }

    fn no_injection() -> HeaderSearchOptions {
        HeaderSearchOptions {
            use_builtin_includes: false,
            use_standard_system_includes: false,
            use_standard_cxx_includes: false,
            ..HeaderSearchOptions::new()
        }
    }

    fn no_predefines() -> PreprocessorOptions {
        PreprocessorOptions {
            use_predefines: false,
            ..PreprocessorOptions::default()
        }
    }

    fn preprocess(source: &str) -> Output {
        run(source, lang(false), no_injection(), no_predefines())
    }

    fn messages(diags: &DiagnosticsEngine) -> Vec<(Level, &str)> {
        diags
            .diagnostics()
            .iter()
            .map(|d| (d.level, d.message.as_str()))
            .collect()
    }

    #[test]
    fn test_directives_are_blanked_and_macros_expanded() {
        let out = preprocess("#define N 10\nint a[N];\n");
        assert_eq!(out.unit.text(), "            \nint a[ 10 ];\n");
        assert!(out.diags.diagnostics().is_empty());

        // Bytes of the expansion map to the invocation
        let offset = out.unit.text().find("10").unwrap();
        let presumed = out.sm.presumed_loc(out.unit.location_of(offset)).unwrap();
        assert_eq!((presumed.line, presumed.column), (2, 7));

        // Text after the expansion maps back to the file
        let offset = out.unit.text().find("];").unwrap();
        let presumed = out.sm.presumed_loc(out.unit.location_of(offset)).unwrap();
        assert_eq!((presumed.line, presumed.column), (2, 8));
    }

    #[test]
    fn test_function_like_invocation_across_lines() {
        let out = preprocess("#define DECLARE(name) int name(void);\nDECLARE(\n  foo)\nint after;\n");
        assert!(out.diags.diagnostics().is_empty());
        let text = out.unit.text();

        let offset = text.find("int foo(void);").unwrap();
        let presumed = out.sm.presumed_loc(out.unit.location_of(offset)).unwrap();
        assert_eq!((presumed.line, presumed.column), (2, 1));

        let offset = text.find("int after;").unwrap();
        let presumed = out.sm.presumed_loc(out.unit.location_of(offset)).unwrap();
        assert_eq!((presumed.line, presumed.column), (4, 1));
    }

    #[test]
    fn test_invocation_errors() {
        let out = preprocess("#define ID(x) x\nint a = ID(1, 2);\nint b = ID(1;\n");
        assert_eq!(
            messages(&out.diags),
            [
                (
                    Level::Error,
                    "too many arguments provided to function-like macro invocation"
                ),
                (Level::Error, "unterminated function-like macro invocation"),
            ]
        );

        let first = out.sm.presumed_loc(out.diags.diagnostics()[0].location).unwrap();
        assert_eq!((first.line, first.column), (2, 9));
    }

    #[test]
    fn test_function_like_macro_in_condition() {
        let out = preprocess("#define VERSION(major, minor) ((major) * 100 + (minor))\n#if VERSION(2, 5) >= 205\nint new_api;\n#endif\n");
        assert!(out.diags.diagnostics().is_empty());
        assert!(out.unit.text().contains("int new_api;"));
    }

    #[test]
    fn test_conditional_blocks() {
        let source = "#if 0\nint a;\n#elif 1\nint b;\n#else\nint c;\n#endif\nint d;\n";
        let out = preprocess(source);

        assert_eq!(out.unit.text().len(), source.len());
        assert!(!out.unit.text().contains("int a;"));
        assert!(out.unit.text().contains("int b;"));
        assert!(!out.unit.text().contains("int c;"));
        assert!(out.unit.text().contains("int d;"));
    }

    #[test]
    fn test_ifdef_and_continuation() {
        let source = "#define A 1 + \\\n  2\n#ifdef A\nint x = A;\n#endif\n#ifndef A\nint y;\n#endif\n";
        let out = preprocess(source);

        let text = out.unit.text();
        assert!(text.contains("int x ="));
        assert!(!text.contains("int y;"));
        let expansion: Vec<&str> = text[text.find("int x =").unwrap()..]
            .split_whitespace()
            .take(5)
            .collect();
        assert_eq!(expansion, ["int", "x", "=", "1", "+"]);
    }

    #[test]
    fn test_predefines_only_when_enabled() {
        let source = "#ifdef __STDC__\nint stdc;\n#endif\n#if __STDC_VERSION__ >= 199901L\nint c99;\n#endif\n";

        let out = preprocess(source);
        assert!(!out.unit.text().contains("int stdc;"));
        assert!(!out.unit.text().contains("int c99;"));

        let out = run(
            source,
            lang(false),
            no_injection(),
            PreprocessorOptions::default(),
        );
        assert!(out.unit.text().contains("int stdc;"));
        assert!(out.unit.text().contains("int c99;"));
    }

    #[test]
    fn test_include_from_search_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("helper.h"), "int helper(void);").unwrap();

        let mut search = no_injection();
        search.add_path(dir.path(), IncludeDirGroup::System);
        let out = run(
            "#include <helper.h>\nint main(void);\n",
            lang(false),
            search,
            no_predefines(),
        );

        assert!(out.diags.diagnostics().is_empty());
        let text = out.unit.text();
        let offset = text.find("int helper").unwrap();
        let presumed = out.sm.presumed_loc(out.unit.location_of(offset)).unwrap();
        assert!(presumed.filename.ends_with("helper.h"));
        assert!(text.contains("int helper(void);\nint main(void);"));
    }

    #[test]
    fn test_extern_c_system_header_in_cxx() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("c.h"), "int f(void);\n").unwrap();

        let mut search = no_injection();
        search.add_path(dir.path(), IncludeDirGroup::ExternCSystem);
        let out = run("#include <c.h>\n", lang(true), search.clone(), no_predefines());
        assert!(out.unit.text().contains("extern \"C\" {\nint f(void);\n}\n"));

        // C has no linkage blocks
        let out = run("#include <c.h>\n", lang(false), search, no_predefines());
        assert!(!out.unit.text().contains("extern"));
    }

    #[test]
    fn test_missing_include_is_fatal() {
        let out = preprocess("#include \"missing.h\"\n#error after\n");
        assert_eq!(
            messages(&out.diags),
            [(Level::Fatal, "'missing.h' file not found")]
        );
    }

    #[test]
    fn test_pragma_once_and_include_depth() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("once.h"), "#pragma once\nint once;\n").unwrap();
        fs::write(dir.path().join("loop.h"), "#include \"loop.h\"\n").unwrap();

        let mut search = no_injection();
        search.add_path(dir.path(), IncludeDirGroup::System);
        let out = run(
            "#include <once.h>\n#include <once.h>\n",
            lang(false),
            search.clone(),
            no_predefines(),
        );
        assert_eq!(out.unit.text().matches("int once;").count(), 1);

        let out = run(
            "#include <loop.h>\n",
            lang(false),
            search,
            PreprocessorOptions {
                use_predefines: false,
                max_include_depth: 5,
            },
        );
        assert_eq!(
            messages(&out.diags),
            [(Level::Error, "#include nested too deeply")]
        );
    }

    #[test]
    fn test_conditional_errors() {
        let out = preprocess("#endif\n#else\n#if 1\n#else\n#elif 1\n#endif\n#if 1\n");
        assert_eq!(
            messages(&out.diags),
            [
                (Level::Error, "#endif without #if"),
                (Level::Error, "#else without #if"),
                (Level::Error, "#elif after #else"),
                (Level::Error, "unterminated conditional directive"),
            ]
        );
    }

    #[test]
    fn test_user_diagnostics_and_redefinition() {
        let out = preprocess("#warning careful\n#define X 1\n#define X 2\n#define X 2\n#bogus\n#error stop\n");
        assert_eq!(
            messages(&out.diags),
            [
                (Level::Warning, "careful"),
                (Level::Warning, "'X' macro redefined"),
                (Level::Note, "previous definition is here"),
                (Level::Error, "invalid preprocessing directive"),
                (Level::Error, "stop"),
            ]
        );
    }

    #[test]
    fn test_macro_name_errors() {
        let out = preprocess("#define\n#define 1X\n#undef defined\n");
        assert_eq!(
            messages(&out.diags),
            [
                (Level::Error, "macro name missing"),
                (Level::Error, "macro name must be an identifier"),
                (Level::Error, "'defined' cannot be used as a macro name"),
            ]
        );
    }

    #[test]
    fn test_comments_do_not_hide_code_or_start_directives() {
        let source = "/* start\n#define HIDDEN 1\nend */ int HIDDEN;\n#define F(x) x // comment\nint g = F(1);\n";
        let out = preprocess(source);
        let text = out.unit.text();

        assert!(text.contains("int HIDDEN;"));
        assert!(text.contains("int g =  1 ;"));
        assert!(out.diags.diagnostics().is_empty());
    }

    #[test]
    fn test_params() {
        assert_eq!(
            parse_params("a, b"),
            Some((vec!["a".to_string(), "b".to_string()], false))
        );
        assert_eq!(
            parse_params("fmt, ..."),
            Some((vec!["fmt".to_string(), "__VA_ARGS__".to_string()], true))
        );
        assert_eq!(parse_params("args..."), Some((vec!["args".to_string()], true)));
        assert_eq!(parse_params(""), Some((vec![], false)));
        assert_eq!(parse_params("1a"), None);
        assert_eq!(parse_params("..., a"), None);
    }
}
