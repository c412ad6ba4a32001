//! Preprocessor conditional evaluation
//!
//! Tracks `#if`/`#elif`/`#else`/`#endif` nesting and evaluates the integer
//! constant expressions of `#if` and `#elif`.

use thiserror::Error;

use crate::lang_options::LangOptions;
use crate::macros::{is_ident_continue, is_ident_start, ExpansionError, MacroTable};
use crate::source_manager::SourceLocation;

/// Misplaced conditional directive
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalError {
    #[error("#elif without #if")]
    ElifWithoutIf,
    #[error("#else without #if")]
    ElseWithoutIf,
    #[error("#endif without #if")]
    EndifWithoutIf,
    #[error("#elif after #else")]
    ElifAfterElse,
    #[error("#else after #else")]
    ElseAfterElse,
}

/// Malformed or invalid `#if` expression
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("expected value in expression")]
    ExpectedValue,
    #[error("invalid token at start of a preprocessor expression")]
    InvalidToken,
    #[error("token is not a valid binary operator in a preprocessor subexpression")]
    NotBinaryOperator,
    #[error("expected ')' in preprocessor expression")]
    MissingParen,
    #[error("expected ':' in preprocessor expression")]
    MissingColon,
    #[error("operator 'defined' requires an identifier")]
    DefinedWithoutIdentifier,
    #[error("invalid digit in integer constant '{0}'")]
    InvalidNumber(String),
    #[error("division by zero in preprocessor expression")]
    DivisionByZero,
    #[error("unterminated character constant")]
    UnterminatedChar,
    #[error(transparent)]
    Macro(#[from] ExpansionError),
}

/// State of the innermost conditional block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalState {
    /// Current branch is included
    Active,
    /// Current branch is skipped and no earlier branch was taken
    Disabled,
    /// An earlier branch was taken, or the enclosing block is skipped
    Done,
}

#[derive(Debug, Clone)]
struct ConditionalFrame {
    state: ConditionalState,
    seen_else: bool,
    if_loc: SourceLocation,
}

/// Nesting of open conditional blocks
#[derive(Debug, Default)]
pub struct ConditionalStack {
    frames: Vec<ConditionalFrame>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether text at the current position is included
    pub fn is_active(&self) -> bool {
        self.frames
            .last()
            .map_or(true, |frame| frame.state == ConditionalState::Active)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether the condition of an `#elif` here must be evaluated
    pub fn elif_needs_evaluation(&self) -> bool {
        self.frames
            .last()
            .is_some_and(|frame| frame.state == ConditionalState::Disabled && !frame.seen_else)
    }

    /// Open a block for `#if`, `#ifdef` or `#ifndef`
    ///
    /// `taken` is ignored when the enclosing block is skipped.
    pub fn push_if(&mut self, taken: bool, if_loc: SourceLocation) {
        let state = if !self.is_active() {
            ConditionalState::Done
        } else if taken {
            ConditionalState::Active
        } else {
            ConditionalState::Disabled
        };
        self.frames.push(ConditionalFrame {
            state,
            seen_else: false,
            if_loc,
        });
    }

    pub fn enter_elif(&mut self, taken: bool) -> Result<(), ConditionalError> {
        let frame = self
            .frames
            .last_mut()
            .ok_or(ConditionalError::ElifWithoutIf)?;
        if frame.seen_else {
            return Err(ConditionalError::ElifAfterElse);
        }

        frame.state = match frame.state {
            ConditionalState::Disabled if taken => ConditionalState::Active,
            ConditionalState::Disabled => ConditionalState::Disabled,
            ConditionalState::Active | ConditionalState::Done => ConditionalState::Done,
        };
        Ok(())
    }

    pub fn enter_else(&mut self) -> Result<(), ConditionalError> {
        let frame = self
            .frames
            .last_mut()
            .ok_or(ConditionalError::ElseWithoutIf)?;
        if frame.seen_else {
            return Err(ConditionalError::ElseAfterElse);
        }

        frame.seen_else = true;
        frame.state = match frame.state {
            ConditionalState::Disabled => ConditionalState::Active,
            ConditionalState::Active | ConditionalState::Done => ConditionalState::Done,
        };
        Ok(())
    }

    pub fn exit(&mut self) -> Result<(), ConditionalError> {
        self.frames
            .pop()
            .map(|_| ())
            .ok_or(ConditionalError::EndifWithoutIf)
    }

    /// Close every block opened above `depth`, returning their `#if` locations
    pub fn truncate(&mut self, depth: usize) -> Vec<SourceLocation> {
        if depth >= self.frames.len() {
            return Vec::new();
        }
        self.frames
            .drain(depth..)
            .map(|frame| frame.if_loc)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Num(i64),
    Ident(String),
    Punct(&'static str),
}

const PUNCTUATORS: &[&str] = &[
    "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+", "-", "*", "/", "%", "<", ">", "&",
    "|", "^", "!", "~", "(", ")", "?", ":", ",",
];

/// Evaluate the controlling expression of `#if` or `#elif`
pub fn evaluate_condition(
    expr: &str,
    macros: &MacroTable,
    lang_opts: &LangOptions,
) -> Result<bool, ExprError> {
    let expanded = macros.expand_condition(expr)?;
    let tokens = resolve_defined(&tokenize(&expanded)?, macros)?;

    let mut parser = ExprParser {
        tokens: &tokens,
        pos: 0,
        cplusplus: lang_opts.cplusplus,
    };
    let value = parser.parse_expr(0, true)?;
    match parser.peek() {
        None => Ok(value != 0),
        Some(Token::Punct(")")) => Err(ExprError::InvalidToken),
        Some(_) => Err(ExprError::NotBinaryOperator),
    }
}

fn tokenize(expr: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
        } else if c == b'\'' || (c == b'L' && bytes.get(i + 1) == Some(&b'\'')) {
            let (value, end) = parse_char(expr, i)?;
            tokens.push(Token::Num(value));
            i = end;
        } else if is_ident_start(c) {
            let start = i;
            while i < bytes.len() && is_ident_continue(bytes[i]) {
                i += 1;
            }
            tokens.push(Token::Ident(expr[start..i].to_string()));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'\'') {
                i += 1;
            }
            tokens.push(Token::Num(parse_number(&expr[start..i])?));
        } else if let Some(p) = PUNCTUATORS.iter().find(|p| expr[i..].starts_with(**p)) {
            tokens.push(Token::Punct(*p));
            i += p.len();
        } else {
            return Err(ExprError::InvalidToken);
        }
    }

    Ok(tokens)
}

fn parse_number(text: &str) -> Result<i64, ExprError> {
    let invalid = || ExprError::InvalidNumber(text.to_string());
    let digits = text.replace('\'', "");
    let lower = digits.to_ascii_lowercase();

    let (radix, body) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };

    let suffix_start = body
        .find(|ch: char| !ch.is_digit(radix))
        .unwrap_or(body.len());
    let (number, suffix) = body.split_at(suffix_start);
    if !matches!(suffix, "" | "u" | "l" | "ul" | "lu" | "ll" | "ull" | "llu") {
        return Err(invalid());
    }
    if number.is_empty() {
        // A lone "0" is consumed as the octal prefix
        return if radix == 8 { Ok(0) } else { Err(invalid()) };
    }

    u64::from_str_radix(number, radix)
        .map(|value| value as i64)
        .map_err(|_| invalid())
}

fn parse_char(expr: &str, start: usize) -> Result<(i64, usize), ExprError> {
    let bytes = expr.as_bytes();
    let mut i = if bytes[start] == b'L' { start + 2 } else { start + 1 };

    let value = match bytes.get(i) {
        Some(b'\\') => {
            i += 1;
            let esc = *bytes.get(i).ok_or(ExprError::UnterminatedChar)?;
            i += 1;
            match esc {
                b'n' => 10,
                b't' => 9,
                b'r' => 13,
                b'a' => 7,
                b'b' => 8,
                b'f' => 12,
                b'v' => 11,
                b'x' => {
                    let hex_start = i;
                    while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
                        i += 1;
                    }
                    i64::from_str_radix(&expr[hex_start..i], 16)
                        .map_err(|_| ExprError::UnterminatedChar)?
                }
                b'0'..=b'7' => {
                    let oct_start = i - 1;
                    while i < bytes.len() && i < oct_start + 3 && (b'0'..=b'7').contains(&bytes[i])
                    {
                        i += 1;
                    }
                    i64::from_str_radix(&expr[oct_start..i], 8)
                        .map_err(|_| ExprError::UnterminatedChar)?
                }
                other => other as i64,
            }
        }
        Some(b'\'') | None => return Err(ExprError::UnterminatedChar),
        Some(_) => {
            let ch = expr[i..].chars().next().ok_or(ExprError::UnterminatedChar)?;
            i += ch.len_utf8();
            ch as i64
        }
    };

    if bytes.get(i) != Some(&b'\'') {
        return Err(ExprError::UnterminatedChar);
    }
    Ok((value, i + 1))
}

/// Replace `defined X` and `defined(X)` with 0 or 1
fn resolve_defined(tokens: &[Token], macros: &MacroTable) -> Result<Vec<Token>, ExprError> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            Token::Ident(name) if name == "defined" => {
                let operand = (tokens.get(i + 1), tokens.get(i + 2), tokens.get(i + 3));
                let (target, consumed) = match operand {
                    (Some(Token::Punct("(")), Some(Token::Ident(id)), Some(Token::Punct(")"))) => {
                        (id, 4)
                    }
                    (Some(Token::Ident(id)), _, _) => (id, 2),
                    _ => return Err(ExprError::DefinedWithoutIdentifier),
                };
                out.push(Token::Num(macros.is_defined(target) as i64));
                i += consumed;
            }
            tok => {
                out.push(tok.clone());
                i += 1;
            }
        }
    }

    Ok(out)
}

fn binary_precedence(op: &str) -> Option<u8> {
    let prec = match op {
        "?" => 1,
        "||" => 2,
        "&&" => 3,
        "|" => 4,
        "^" => 5,
        "&" => 6,
        "==" | "!=" => 7,
        "<" | ">" | "<=" | ">=" => 8,
        "<<" | ">>" => 9,
        "+" | "-" => 10,
        "*" | "/" | "%" => 11,
        _ => return None,
    };
    Some(prec)
}

struct ExprParser<'t> {
    tokens: &'t [Token],
    pos: usize,
    cplusplus: bool,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    /// Precedence climbing; `live` is false inside short-circuited operands
    fn parse_expr(&mut self, min_prec: u8, live: bool) -> Result<i64, ExprError> {
        let mut lhs = self.parse_unary(live)?;

        loop {
            let op = match self.peek() {
                Some(Token::Punct(op)) => *op,
                _ => break,
            };
            let prec = match binary_precedence(op) {
                Some(prec) if prec >= min_prec => prec,
                _ => break,
            };
            self.pos += 1;

            lhs = match op {
                "?" => {
                    let then_value = self.parse_expr(0, live && lhs != 0)?;
                    if self.next() != Some(&Token::Punct(":")) {
                        return Err(ExprError::MissingColon);
                    }
                    // Right associative
                    let else_value = self.parse_expr(prec, live && lhs == 0)?;
                    if lhs != 0 {
                        then_value
                    } else {
                        else_value
                    }
                }
                "&&" => {
                    let rhs = self.parse_expr(prec + 1, live && lhs != 0)?;
                    (lhs != 0 && rhs != 0) as i64
                }
                "||" => {
                    let rhs = self.parse_expr(prec + 1, live && lhs == 0)?;
                    (lhs != 0 || rhs != 0) as i64
                }
                _ => {
                    let rhs = self.parse_expr(prec + 1, live)?;
                    apply_binary(op, lhs, rhs, live)?
                }
            };
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self, live: bool) -> Result<i64, ExprError> {
        let tok = self.next().cloned().ok_or(ExprError::ExpectedValue)?;
        match tok {
            Token::Num(value) => Ok(value),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" if self.cplusplus => 1,
                // Identifiers left after expansion are not macros
                _ => 0,
            }),
            Token::Punct("(") => {
                let value = self.parse_expr(0, live)?;
                if self.next() != Some(&Token::Punct(")")) {
                    return Err(ExprError::MissingParen);
                }
                Ok(value)
            }
            Token::Punct("!") => Ok((self.parse_unary(live)? == 0) as i64),
            Token::Punct("~") => Ok(!self.parse_unary(live)?),
            Token::Punct("-") => Ok(self.parse_unary(live)?.wrapping_neg()),
            Token::Punct("+") => self.parse_unary(live),
            Token::Punct(")") => Err(ExprError::ExpectedValue),
            Token::Punct(_) => Err(ExprError::InvalidToken),
        }
    }
}

fn apply_binary(op: &str, lhs: i64, rhs: i64, live: bool) -> Result<i64, ExprError> {
    let value = match op {
        "+" => lhs.wrapping_add(rhs),
        "-" => lhs.wrapping_sub(rhs),
        "*" => lhs.wrapping_mul(rhs),
        "/" | "%" if rhs == 0 => {
            if live {
                return Err(ExprError::DivisionByZero);
            }
            0
        }
        "/" => lhs.wrapping_div(rhs),
        "%" => lhs.wrapping_rem(rhs),
        "<<" => lhs.wrapping_shl(rhs as u32),
        ">>" => lhs.wrapping_shr(rhs as u32),
        "<" => (lhs < rhs) as i64,
        ">" => (lhs > rhs) as i64,
        "<=" => (lhs <= rhs) as i64,
        ">=" => (lhs >= rhs) as i64,
        "==" => (lhs == rhs) as i64,
        "!=" => (lhs != rhs) as i64,
        "&" => lhs & rhs,
        "|" => lhs | rhs,
        "^" => lhs ^ rhs,
        _ => return Err(ExprError::NotBinaryOperator),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::MacroInfo;

    fn eval(expr: &str) -> Result<bool, ExprError> {
        let mut macros = MacroTable::new();
        for (name, body) in [("ONE", "1"), ("TWO", "(ONE + ONE)"), ("EMPTY", "")] {
            macros.define(MacroInfo::object_like(name, body, SourceLocation::invalid()));
        }
        macros.define(MacroInfo {
            params: Some(vec!["x".to_string()]),
            ..MacroInfo::object_like("F", "x", SourceLocation::invalid())
        });
        evaluate_condition(expr, &macros, &LangOptions::new())
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("0"), Ok(false));
        assert_eq!(eval("1"), Ok(true));
        assert_eq!(eval("0x10 == 16"), Ok(true));
        assert_eq!(eval("010 == 8"), Ok(true));
        assert_eq!(eval("0b101 == 5"), Ok(true));
        assert_eq!(eval("199901L >= 199901UL"), Ok(true));
        assert_eq!(eval("'A' == 65"), Ok(true));
        assert_eq!(eval("'\\n' == 10"), Ok(true));
        assert!(matches!(eval("12abc"), Err(ExprError::InvalidNumber(_))));
    }

    #[test]
    fn test_defined_and_macros() {
        assert_eq!(eval("defined ONE"), Ok(true));
        assert_eq!(eval("defined(ONE) && !defined(NOPE)"), Ok(true));
        assert_eq!(eval("TWO == 2"), Ok(true));
        assert_eq!(eval("UNDEFINED_NAME"), Ok(false));
        assert_eq!(eval("defined"), Err(ExprError::DefinedWithoutIdentifier));
    }

    #[test]
    fn test_function_like_macros() {
        assert_eq!(eval("F(1)"), Ok(true));
        assert_eq!(eval("F(0)"), Ok(false));
        assert_eq!(eval("F(TWO) == 2 && defined(F)"), Ok(true));
        // Without arguments the name is an ordinary identifier
        assert_eq!(eval("F"), Ok(false));
        assert_eq!(
            eval("F(1, 2)"),
            Err(ExprError::Macro(ExpansionError::TooManyArgs))
        );
    }

    #[test]
    fn test_operators_and_precedence() {
        assert_eq!(eval("1 + 2 * 3 == 7"), Ok(true));
        assert_eq!(eval("(1 + 2) * 3 == 9"), Ok(true));
        assert_eq!(eval("1 << 4 == 16"), Ok(true));
        assert_eq!(eval("-1 < 0"), Ok(true));
        assert_eq!(eval("~0 == -1"), Ok(true));
        assert_eq!(eval("1 ? 2 : 0"), Ok(true));
        assert_eq!(eval("0 ? 1 : 0 ? 1 : 0"), Ok(false));
        assert_eq!(eval("7 % 4 == 3 && 7 / 2 == 3"), Ok(true));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(eval("1 / 0"), Err(ExprError::DivisionByZero));
        assert_eq!(eval("0 && 1 / 0"), Ok(false));
        assert_eq!(eval("1 || 1 % 0"), Ok(true));
    }

    #[test]
    fn test_malformed_expressions() {
        assert_eq!(eval(""), Err(ExprError::ExpectedValue));
        assert_eq!(eval("EMPTY"), Err(ExprError::ExpectedValue));
        assert_eq!(eval("(1"), Err(ExprError::MissingParen));
        assert_eq!(eval("1 2"), Err(ExprError::NotBinaryOperator));
        assert_eq!(eval("1 ? 2"), Err(ExprError::MissingColon));
    }

    #[test]
    fn test_cxx_boolean_literals() {
        let macros = MacroTable::new();
        let cxx = LangOptions {
            cplusplus: true,
            ..LangOptions::new()
        };
        assert_eq!(evaluate_condition("true", &macros, &cxx), Ok(true));
        assert_eq!(evaluate_condition("true", &macros, &LangOptions::new()), Ok(false));
    }

    #[test]
    fn test_conditional_stack() {
        let loc = SourceLocation::invalid();
        let mut stack = ConditionalStack::new();
        assert!(stack.is_active());

        stack.push_if(false, loc);
        assert!(!stack.is_active());
        assert!(stack.elif_needs_evaluation());
        stack.enter_elif(true).unwrap();
        assert!(stack.is_active());
        stack.enter_else().unwrap();
        assert!(!stack.is_active());
        assert_eq!(stack.enter_else(), Err(ConditionalError::ElseAfterElse));
        assert_eq!(stack.enter_elif(true), Err(ConditionalError::ElifAfterElse));
        stack.exit().unwrap();

        assert!(stack.is_active());
        assert_eq!(stack.exit(), Err(ConditionalError::EndifWithoutIf));
        assert_eq!(stack.enter_else(), Err(ConditionalError::ElseWithoutIf));
    }

    #[test]
    fn test_nested_block_in_skipped_region() {
        let loc = SourceLocation::invalid();
        let mut stack = ConditionalStack::new();
        stack.push_if(false, loc);
        stack.push_if(true, loc);
        assert!(!stack.is_active());
        stack.enter_else().unwrap();
        assert!(!stack.is_active());

        assert_eq!(stack.truncate(0).len(), 2);
        assert_eq!(stack.depth(), 0);
    }
}
