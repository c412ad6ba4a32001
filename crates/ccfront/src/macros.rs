//! Macro table and macro expansion
//!
//! Expansion works on source text: a use of an object-like macro, or a
//! function-like macro name followed by a parenthesised argument list, is
//! replaced by its replacement list with arguments substituted (`#`, `##`,
//! `__VA_ARGS__`, `__VA_OPT__`) and the result rescanned. A macro is never
//! re-entered while its own expansion is being rescanned.

use std::cmp::Ordering;
use std::collections::HashMap;

use thiserror::Error;

use crate::source_manager::SourceLocation;

/// Malformed macro invocation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpansionError {
    #[error("unterminated function-like macro invocation")]
    Unterminated,
    #[error("too many arguments provided to function-like macro invocation")]
    TooManyArgs,
    #[error("too few arguments provided to function-like macro invocation")]
    TooFewArgs,
}

/// A `#define`d macro
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroInfo {
    pub name: String,
    /// Parameter names for function-like macros
    pub params: Option<Vec<String>>,
    pub variadic: bool,
    /// Replacement list with comments removed
    pub body: String,
    pub location: SourceLocation,
}

impl MacroInfo {
    pub fn object_like(name: &str, body: &str, location: SourceLocation) -> Self {
        Self {
            name: name.to_string(),
            params: None,
            variadic: false,
            body: body.trim().to_string(),
            location,
        }
    }

    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    /// Whether a redefinition with `other` is benign
    ///
    /// Replacement lists compare equal when their tokens match, regardless of
    /// how much whitespace separates them.
    pub fn is_identical_to(&self, other: &MacroInfo) -> bool {
        self.params == other.params
            && self.variadic == other.variadic
            && self.body.split_whitespace().eq(other.body.split_whitespace())
    }
}

/// Lexical class of a chunk of C source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Chunk {
    Ident,
    Number,
    /// String or character literal
    Literal,
    /// `/* ... */`; `closed` is false if the comment runs past the text
    BlockComment { closed: bool },
    LineComment,
    Other,
}

pub(crate) fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

pub(crate) fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Classify the chunk starting at `start` and return it with its end offset
///
/// `start` must lie on a char boundary; the returned end always does.
pub(crate) fn scan_chunk(text: &str, start: usize) -> (Chunk, usize) {
    let bytes = text.as_bytes();
    let n = bytes.len();
    let c = bytes[start];
    let next = bytes.get(start + 1).copied();

    match c {
        b'"' | b'\'' => {
            let mut j = start + 1;
            while j < n && bytes[j] != c && bytes[j] != b'\n' {
                j += if bytes[j] == b'\\' { 2 } else { 1 };
            }
            // Unterminated literals stop before the newline
            let end = if j < n && bytes[j] == c { j + 1 } else { j.min(n) };
            (Chunk::Literal, end)
        }
        b'/' if next == Some(b'*') => match text[start + 2..].find("*/") {
            Some(pos) => (Chunk::BlockComment { closed: true }, start + 2 + pos + 2),
            None => (Chunk::BlockComment { closed: false }, n),
        },
        b'/' if next == Some(b'/') => {
            let end = text[start..].find('\n').map_or(n, |pos| start + pos);
            (Chunk::LineComment, end)
        }
        _ if is_ident_start(c) => {
            let mut j = start + 1;
            while j < n && is_ident_continue(bytes[j]) {
                j += 1;
            }
            (Chunk::Ident, j)
        }
        _ if c.is_ascii_digit() || (c == b'.' && next.is_some_and(|b| b.is_ascii_digit())) => {
            // Preprocessing number: digits, letters, dots and signed exponents
            let mut j = start + 1;
            while j < n {
                let b = bytes[j];
                let signed_exponent = (b == b'+' || b == b'-')
                    && matches!(bytes[j - 1], b'e' | b'E' | b'p' | b'P');
                if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || signed_exponent {
                    j += 1;
                } else {
                    break;
                }
            }
            (Chunk::Number, j)
        }
        _ => {
            let len = text[start..].chars().next().map_or(1, char::len_utf8);
            (Chunk::Other, start + len)
        }
    }
}

/// Replace comments with spaces, keeping byte offsets and newlines
///
/// `in_comment` says whether `text` starts inside a block comment; the returned
/// flag says whether it ends inside one.
pub(crate) fn blank_comments(text: &str, in_comment: bool) -> (String, bool) {
    fn blank(out: &mut String, text: &str) {
        out.extend(text.bytes().map(|b| if b == b'\n' { '\n' } else { ' ' }));
    }

    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    if in_comment {
        match text.find("*/") {
            Some(pos) => {
                blank(&mut out, &text[..pos + 2]);
                i = pos + 2;
            }
            None => {
                blank(&mut out, text);
                return (out, true);
            }
        }
    }

    while i < text.len() {
        let (chunk, end) = scan_chunk(text, i);
        match chunk {
            Chunk::BlockComment { closed } => {
                blank(&mut out, &text[i..end]);
                if !closed {
                    return (out, true);
                }
            }
            Chunk::LineComment => blank(&mut out, &text[i..end]),
            _ => out.push_str(&text[i..end]),
        }
        i = end;
    }

    (out, false)
}

/// All macros currently defined
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<String, MacroInfo>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a macro, returning the definition it replaces
    pub fn define(&mut self, info: MacroInfo) -> Option<MacroInfo> {
        self.macros.insert(info.name.clone(), info)
    }

    pub fn undefine(&mut self, name: &str) -> Option<MacroInfo> {
        self.macros.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&MacroInfo> {
        self.macros.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Top-level macro uses in `text`, each with its full expansion
    ///
    /// Ranges are byte offsets into `text` and never overlap. Comments must
    /// already be blanked.
    pub fn expansions(&self, text: &str) -> Vec<Expansion> {
        let expander = Expander {
            macros: self,
            keep_defined: false,
        };
        let mut found = Vec::new();
        let mut i = 0;

        while i < text.len() {
            let (chunk, end) = scan_chunk(text, i);
            if chunk != Chunk::Ident {
                i = end;
                continue;
            }

            match expander.use_at(text, i, end, &[]) {
                Ok(Some(found_use)) => {
                    let use_end = found_use.end;
                    let result = expander.expand_use(&found_use, &mut Vec::new());
                    found.push(Expansion {
                        start: i,
                        end: use_end,
                        text: result,
                    });
                    i = use_end;
                }
                Ok(None) => i = end,
                Err(e) => {
                    found.push(Expansion {
                        start: i,
                        end,
                        text: Err(e),
                    });
                    i = end;
                }
            }
        }
        found
    }

    /// `text` with every macro use expanded
    pub fn expand_text(&self, text: &str) -> Result<String, ExpansionError> {
        let mut out = String::with_capacity(text.len());
        Expander {
            macros: self,
            keep_defined: false,
        }
        .expand_into(text, &mut Vec::new(), &mut out)?;
        Ok(out)
    }

    /// Expand the controlling expression of `#if`, leaving `defined` operands alone
    pub fn expand_condition(&self, text: &str) -> Result<String, ExpansionError> {
        let mut out = String::with_capacity(text.len());
        Expander {
            macros: self,
            keep_defined: true,
        }
        .expand_into(text, &mut Vec::new(), &mut out)?;
        Ok(out)
    }

    /// Whether `text` ends inside a function-like macro invocation
    ///
    /// A function-like macro name followed only by whitespace counts as open,
    /// since its argument list may start on the next line.
    pub fn has_open_invocation(&self, text: &str) -> bool {
        let mut i = 0;
        while i < text.len() {
            let (chunk, end) = scan_chunk(text, i);
            let function_like = chunk == Chunk::Ident
                && self
                    .get(&text[i..end])
                    .is_some_and(MacroInfo::is_function_like);
            i = end;
            if !function_like {
                continue;
            }

            let open = skip_whitespace(text, end);
            if open == text.len() {
                return true;
            }
            if text.as_bytes()[open] == b'(' {
                match split_args(text, open) {
                    Some((_, close)) => i = close + 1,
                    None => return true,
                }
            }
        }
        false
    }
}

/// A macro use found in a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub start: usize,
    pub end: usize,
    pub text: Result<String, ExpansionError>,
}

struct MacroUse<'t, 'm> {
    info: &'m MacroInfo,
    text: &'t str,
    /// Argument ranges of a function-like invocation
    args: Vec<(usize, usize)>,
    end: usize,
}

struct Expander<'m> {
    macros: &'m MacroTable,
    /// Copy `defined X` and `defined(X)` through unexpanded
    keep_defined: bool,
}

impl<'m> Expander<'m> {
    /// The macro use starting with identifier `text[start..end]`, if any
    fn use_at<'t>(
        &self,
        text: &'t str,
        start: usize,
        end: usize,
        active: &[&str],
    ) -> Result<Option<MacroUse<'t, 'm>>, ExpansionError> {
        let word = &text[start..end];
        if active.contains(&word) {
            return Ok(None);
        }
        let Some(info) = self.macros.get(word) else {
            return Ok(None);
        };
        if !info.is_function_like() {
            return Ok(Some(MacroUse {
                info,
                text,
                args: Vec::new(),
                end,
            }));
        }

        let open = skip_whitespace(text, end);
        if text.as_bytes().get(open) != Some(&b'(') {
            return Ok(None);
        }
        let (args, close) = split_args(text, open).ok_or(ExpansionError::Unterminated)?;
        Ok(Some(MacroUse {
            info,
            text,
            args,
            end: close + 1,
        }))
    }

    fn expand_use(
        &self,
        found: &MacroUse<'_, 'm>,
        active: &mut Vec<&'m str>,
    ) -> Result<String, ExpansionError> {
        let replaced = match &found.info.params {
            None => found.info.body.clone(),
            Some(params) => {
                let bound = bind_args(found.info, params, found.text, &found.args)?;
                let tokens = body_tokens(&found.info.body);
                let mut out = String::with_capacity(found.info.body.len());
                self.substitute(&tokens, params, &bound, active, &mut out)?;
                out
            }
        };

        active.push(found.info.name.as_str());
        let mut out = String::with_capacity(replaced.len());
        let result = self.expand_into(&replaced, active, &mut out);
        active.pop();
        result.map(|()| out)
    }

    /// Expand every macro use in `text` into `out`
    fn expand_into(
        &self,
        text: &str,
        active: &mut Vec<&'m str>,
        out: &mut String,
    ) -> Result<(), ExpansionError> {
        let mut i = 0;
        while i < text.len() {
            let (chunk, end) = scan_chunk(text, i);
            let word = &text[i..end];

            if chunk != Chunk::Ident {
                out.push_str(word);
                i = end;
                continue;
            }
            if self.keep_defined && word == "defined" {
                let operand_end = defined_operand_end(text, end);
                out.push_str(&text[i..operand_end]);
                i = operand_end;
                continue;
            }

            match self.use_at(text, i, end, active)? {
                Some(found) => {
                    let expanded = self.expand_use(&found, active)?;
                    out.push(' ');
                    out.push_str(&expanded);
                    out.push(' ');
                    i = found.end;
                }
                None => {
                    out.push_str(word);
                    i = end;
                }
            }
        }
        Ok(())
    }

    /// Substitute bound arguments into replacement tokens
    ///
    /// Operands of `#` and `##` use the argument as written; every other
    /// parameter use is replaced by the fully expanded argument.
    fn substitute(
        &self,
        tokens: &[BodyToken<'_>],
        params: &[String],
        bound: &BoundArgs<'_>,
        active: &mut Vec<&'m str>,
        out: &mut String,
    ) -> Result<(), ExpansionError> {
        let param = |token: &BodyToken<'_>| params.iter().position(|p| p == token.text);
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];

            if token.text == "#" {
                if let Some(index) = tokens.get(i + 1).and_then(param) {
                    push_spaced(out, token.space_before, &stringize(bound.args[index]));
                    i += 2;
                    continue;
                }
            }

            if token.text == "##" {
                trim_trailing_whitespace(out);
                let Some(next) = tokens.get(i + 1) else {
                    break;
                };
                match param(next) {
                    Some(index) if bound.is_va_args(index) && bound.va_args_empty() => {
                        // `, ## __VA_ARGS__` drops the comma when no variadic arguments are given
                        if out.ends_with(',') {
                            out.pop();
                        }
                    }
                    Some(index) => out.push_str(bound.args[index].trim()),
                    None => out.push_str(next.text),
                }
                i += 2;
                continue;
            }

            if token.text == "__VA_OPT__" && bound.variadic {
                if let Some(close) = va_opt_close(tokens, i + 1) {
                    if !bound.va_args_empty() {
                        self.substitute(&tokens[i + 2..close], params, bound, active, out)?;
                    }
                    i = close + 1;
                    continue;
                }
            }

            match param(token) {
                Some(index) if tokens.get(i + 1).is_some_and(|next| next.text == "##") => {
                    push_spaced(out, token.space_before, bound.args[index].trim());
                }
                Some(index) => {
                    let mut expanded = String::new();
                    self.expand_into(bound.args[index], active, &mut expanded)?;
                    push_spaced(out, token.space_before, expanded.trim());
                }
                None => push_spaced(out, token.space_before, token.text),
            }
            i += 1;
        }
        Ok(())
    }
}

/// Arguments bound to the parameters of a function-like macro
struct BoundArgs<'t> {
    /// One entry per parameter; the variadic one spans all trailing arguments
    args: Vec<&'t str>,
    variadic: bool,
}

impl BoundArgs<'_> {
    fn is_va_args(&self, index: usize) -> bool {
        self.variadic && index + 1 == self.args.len()
    }

    fn va_args_empty(&self) -> bool {
        !self.variadic || self.args.last().map_or(true, |va| va.trim().is_empty())
    }
}

fn bind_args<'t>(
    info: &MacroInfo,
    params: &[String],
    text: &'t str,
    ranges: &[(usize, usize)],
) -> Result<BoundArgs<'t>, ExpansionError> {
    // `F()` passes a single empty argument, which zero parameters accept
    let ranges: &[(usize, usize)] = match ranges {
        [(start, end)] if params.is_empty() && text[*start..*end].trim().is_empty() => &[],
        _ => ranges,
    };

    if !info.variadic {
        return match ranges.len().cmp(&params.len()) {
            Ordering::Less => Err(ExpansionError::TooFewArgs),
            Ordering::Greater => Err(ExpansionError::TooManyArgs),
            Ordering::Equal => Ok(BoundArgs {
                args: ranges.iter().map(|&(start, end)| &text[start..end]).collect(),
                variadic: false,
            }),
        };
    }

    let named = params.len() - 1;
    if ranges.len() < named {
        return Err(ExpansionError::TooFewArgs);
    }
    let mut args: Vec<&'t str> = ranges[..named]
        .iter()
        .map(|&(start, end)| &text[start..end])
        .collect();
    let va_args = match (ranges.get(named), ranges.last()) {
        (Some(&(start, _)), Some(&(_, end))) => &text[start..end],
        _ => "",
    };
    args.push(va_args);
    Ok(BoundArgs {
        args,
        variadic: true,
    })
}

/// Split the argument list whose `(` is at `open`
///
/// Returns the argument ranges and the offset of the closing `)`, or `None` if
/// the list is not closed within `text`.
fn split_args(text: &str, open: usize) -> Option<(Vec<(usize, usize)>, usize)> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut arg_start = open + 1;
    let mut i = open + 1;

    while i < text.len() {
        let (chunk, end) = scan_chunk(text, i);
        if chunk == Chunk::Other {
            match text.as_bytes()[i] {
                b'(' => depth += 1,
                b')' if depth == 0 => {
                    args.push((arg_start, i));
                    return Some((args, i));
                }
                b')' => depth -= 1,
                b',' if depth == 0 => {
                    args.push((arg_start, i));
                    arg_start = i + 1;
                }
                _ => {}
            }
        }
        i = end;
    }
    None
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    text[from..]
        .find(|c: char| !c.is_whitespace())
        .map_or(text.len(), |offset| from + offset)
}

/// End of the operand of a `defined` operator ending at `from`
fn defined_operand_end(text: &str, from: usize) -> usize {
    let start = skip_whitespace(text, from);
    let bytes = text.as_bytes();
    match bytes.get(start) {
        Some(b'(') => text[start..].find(')').map_or(text.len(), |close| start + close + 1),
        Some(&b) if is_ident_start(b) => scan_chunk(text, start).1,
        _ => from,
    }
}

/// Token of a replacement list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BodyToken<'b> {
    text: &'b str,
    space_before: bool,
}

fn body_tokens(body: &str) -> Vec<BodyToken<'_>> {
    let mut tokens = Vec::new();
    let mut space_before = false;
    let mut i = 0;

    while i < body.len() {
        let (chunk, mut end) = scan_chunk(body, i);
        if chunk == Chunk::Other && body[i..end].trim().is_empty() {
            space_before = true;
            i = end;
            continue;
        }
        if body[i..].starts_with("##") {
            end = i + 2;
        }
        tokens.push(BodyToken {
            text: &body[i..end],
            space_before,
        });
        space_before = false;
        i = end;
    }
    tokens
}

/// Index of the `)` closing the `__VA_OPT__` group that opens at `open`
fn va_opt_close(tokens: &[BodyToken<'_>], open: usize) -> Option<usize> {
    if tokens.get(open)?.text != "(" {
        return None;
    }
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate().skip(open) {
        match token.text {
            "(" => depth += 1,
            ")" => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

fn push_spaced(out: &mut String, space_before: bool, text: &str) {
    if space_before && !out.is_empty() && !out.ends_with(' ') {
        out.push(' ');
    }
    out.push_str(text);
}

fn trim_trailing_whitespace(out: &mut String) {
    let len = out.trim_end().len();
    out.truncate(len);
}

/// `#arg`: the argument as a string literal
fn stringize(arg: &str) -> String {
    let arg = arg.trim();
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');

    let mut pending_space = false;
    let mut i = 0;
    while i < arg.len() {
        let (chunk, end) = scan_chunk(arg, i);
        let piece = &arg[i..end];
        if chunk == Chunk::Other && piece.trim().is_empty() {
            pending_space = true;
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            if chunk == Chunk::Literal {
                for c in piece.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
            } else {
                out.push_str(piece);
            }
        }
        i = end;
    }

    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(defs: &[(&str, &str)]) -> MacroTable {
        let mut macros = MacroTable::new();
        for (name, body) in defs {
            macros.define(MacroInfo::object_like(name, body, SourceLocation::invalid()));
        }
        macros
    }

    #[test]
    fn test_scan_chunks() {
        let text = r#"foo 0x1Fu "a\"b" 1e+5 /* c */ // d"#;
        let mut kinds = Vec::new();
        let mut i = 0;
        while i < text.len() {
            let (chunk, end) = scan_chunk(text, i);
            if chunk != Chunk::Other {
                kinds.push((chunk, &text[i..end]));
            }
            i = end;
        }

        assert_eq!(
            kinds,
            vec![
                (Chunk::Ident, "foo"),
                (Chunk::Number, "0x1Fu"),
                (Chunk::Literal, r#""a\"b""#),
                (Chunk::Number, "1e+5"),
                (Chunk::BlockComment { closed: true }, "/* c */"),
                (Chunk::LineComment, "// d"),
            ]
        );
    }

    #[test]
    fn test_blank_comments_keeps_offsets() {
        let (out, open) = blank_comments("a /* b */ c // d", false);
        assert_eq!(out, "a         c     ");
        assert!(!open);

        let (out, open) = blank_comments("x /* start\n", false);
        assert_eq!(out, "x         \n");
        assert!(open);

        let (out, open) = blank_comments("end */ y", true);
        assert_eq!(out, "       y");
        assert!(!open);
    }

    fn function_like(macros: &mut MacroTable, name: &str, params: &[&str], body: &str) {
        let variadic = params.last() == Some(&"__VA_ARGS__");
        macros.define(MacroInfo {
            params: Some(params.iter().map(|p| p.to_string()).collect()),
            variadic,
            ..MacroInfo::object_like(name, body, SourceLocation::invalid())
        });
    }

    fn squash(text: &str) -> String {
        text.split_whitespace().collect()
    }

    #[test]
    fn test_nested_expansion() {
        let macros = table(&[("A", "B + 1"), ("B", "2")]);
        let expanded = macros.expand_text("A").unwrap();
        assert_eq!(expanded.split_whitespace().collect::<Vec<_>>(), ["2", "+", "1"]);
    }

    #[test]
    fn test_self_reference_is_not_expanded() {
        let mut macros = table(&[("X", "X + Y"), ("Y", "X")]);
        function_like(&mut macros, "f", &["x"], "f(x + 1)");

        let expanded = macros.expand_text("X").unwrap();
        assert_eq!(expanded.split_whitespace().collect::<Vec<_>>(), ["X", "+", "X"]);
        assert_eq!(squash(&macros.expand_text("f(1)").unwrap()), "f(1+1)");
    }

    #[test]
    fn test_function_like_substitution() {
        let mut macros = table(&[("ONE", "1")]);
        function_like(&mut macros, "DECLARE", &["name"], "int name(void);");
        function_like(&mut macros, "ID", &["x"], "x");
        function_like(&mut macros, "__P", &["args"], "args");

        assert_eq!(
            macros.expand_text("DECLARE(foo)").unwrap().trim(),
            "int foo(void);"
        );
        assert_eq!(macros.expand_text("ID(ONE)").unwrap().trim(), "1");
        assert_eq!(macros.expand_text("ID(ID(2))").unwrap().trim(), "2");
        assert_eq!(
            squash(&macros.expand_text("int old __P((int a, char *b));").unwrap()),
            "intold(inta,char*b);"
        );
        // A function-like name without arguments is an ordinary identifier
        assert_eq!(macros.expand_text("DECLARE + 1").unwrap(), "DECLARE + 1");
    }

    #[test]
    fn test_arguments_span_lines_and_nested_parens() {
        let mut macros = MacroTable::new();
        function_like(&mut macros, "__nonnull", &["params"], "__attribute__ ((__nonnull__ params))");
        function_like(&mut macros, "PAIR", &["a", "b"], "a + b");

        assert_eq!(
            squash(&macros.expand_text("char *f(char *d) __nonnull ((1, 2));").unwrap()),
            "char*f(char*d)__attribute__((__nonnull__(1,2)));"
        );
        assert_eq!(
            squash(&macros.expand_text("PAIR(\n  g(1, 2),\n  \",\")").unwrap()),
            "g(1,2)+\",\""
        );
    }

    #[test]
    fn test_stringize_and_paste() {
        let mut macros = MacroTable::new();
        function_like(&mut macros, "MK", &["n"], "int fn_##n(void) { return n; }");
        function_like(&mut macros, "S", &["x"], "#x");

        assert_eq!(
            macros.expand_text("MK(1)").unwrap().trim(),
            "int fn_1(void) { return 1; }"
        );
        assert_eq!(
            macros.expand_text("S( a   \"b\\n\" )").unwrap().trim(),
            r#""a \"b\\n\"""#
        );
    }

    #[test]
    fn test_variadic_macros() {
        let mut macros = MacroTable::new();
        function_like(&mut macros, "LOG", &["fmt", "__VA_ARGS__"], "printf(fmt, ## __VA_ARGS__)");
        function_like(&mut macros, "CALL", &["__VA_ARGS__"], "f(__VA_ARGS__)");
        function_like(&mut macros, "OPT", &["a", "__VA_ARGS__"], "g(a __VA_OPT__(,) __VA_ARGS__)");

        assert_eq!(squash(&macros.expand_text("LOG(\"x\")").unwrap()), "printf(\"x\")");
        assert_eq!(
            squash(&macros.expand_text("LOG(\"%d %d\", 1, 2)").unwrap()),
            "printf(\"%d%d\",1,2)"
        );
        assert_eq!(squash(&macros.expand_text("CALL(1, (2, 3))").unwrap()), "f(1,(2,3))");
        assert_eq!(squash(&macros.expand_text("CALL()").unwrap()), "f()");
        assert_eq!(squash(&macros.expand_text("OPT(1)").unwrap()), "g(1)");
        assert_eq!(squash(&macros.expand_text("OPT(1, 2)").unwrap()), "g(1,2)");
    }

    #[test]
    fn test_argument_count_errors() {
        let mut macros = MacroTable::new();
        function_like(&mut macros, "ONE", &["a"], "a");
        function_like(&mut macros, "TWO", &["a", "b"], "a b");
        function_like(&mut macros, "NONE", &[], "0");

        assert_eq!(macros.expand_text("ONE()").unwrap().trim(), "");
        assert_eq!(macros.expand_text("NONE()").unwrap().trim(), "0");
        assert_eq!(macros.expand_text("ONE(1, 2)"), Err(ExpansionError::TooManyArgs));
        assert_eq!(macros.expand_text("NONE(1)"), Err(ExpansionError::TooManyArgs));
        assert_eq!(macros.expand_text("TWO(1)"), Err(ExpansionError::TooFewArgs));
        assert_eq!(macros.expand_text("ONE(1"), Err(ExpansionError::Unterminated));
    }

    #[test]
    fn test_expansions_report_ranges() {
        let mut macros = table(&[("N", "3")]);
        function_like(&mut macros, "ID", &["x"], "x");

        let found = macros.expansions("int a = ID(1) + N;\nID(");
        let ranges: Vec<(usize, usize)> = found.iter().map(|e| (e.start, e.end)).collect();
        assert_eq!(ranges, [(8, 13), (16, 17), (19, 21)]);
        assert_eq!(found[0].text.as_deref().map(str::trim), Ok("1"));
        assert_eq!(found[1].text.as_deref().map(str::trim), Ok("3"));
        assert_eq!(found[2].text, Err(ExpansionError::Unterminated));
    }

    #[test]
    fn test_open_invocation() {
        let mut macros = table(&[("N", "3")]);
        function_like(&mut macros, "ID", &["x"], "x");

        assert!(macros.has_open_invocation("int x = ID(1,\n"));
        assert!(macros.has_open_invocation("int x = ID\n"));
        assert!(!macros.has_open_invocation("int x = ID(1);\n"));
        assert!(!macros.has_open_invocation("int ID;\n"));
        assert!(!macros.has_open_invocation("int x = N\n"));
    }

    #[test]
    fn test_condition_keeps_defined_operands() {
        let mut macros = table(&[("A", "1")]);
        function_like(&mut macros, "F", &["x"], "x");

        let expanded = macros.expand_condition("defined(A) && defined F && F(A)").unwrap();
        assert_eq!(squash(&expanded), "defined(A)&&definedF&&1");
    }

    #[test]
    fn test_redefinition_comparison() {
        let loc = SourceLocation::invalid();
        let a = MacroInfo::object_like("A", "1 +  2", loc);
        let b = MacroInfo::object_like("A", "1 + 2", loc);
        let c = MacroInfo::object_like("A", "1 + 3", loc);
        assert!(a.is_identical_to(&b));
        assert!(!a.is_identical_to(&c));
    }
}
