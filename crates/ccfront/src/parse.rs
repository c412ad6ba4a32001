//! Parsing driver
//!
//! Preprocesses the main file, parses the result with the tree-sitter grammar
//! of the dialect, reports syntax errors, runs the semantic checks and hands
//! the translation unit to the session's AST consumer.

use ccfront_api::{FrontendError, FrontendResult};
use log::{debug, trace};
use tree_sitter::{Node, Parser};

use crate::ast::{AstContext, TranslationUnit};
use crate::diagnostic::DiagnosticsEngine;
use crate::sema::Sema;
use crate::session::Session;

const MAX_TOKEN_PREVIEW: usize = 32;

/// Parse the session's main file and notify its consumer
///
/// Syntax and semantic problems are reported as diagnostics; the consumer
/// still sees whatever the parser recovered.
pub fn parse_ast(session: &mut Session<'_>) -> FrontendResult<()> {
    let unit = session.preprocessor.preprocess(
        &mut session.file_manager,
        &mut session.source_manager,
        &mut session.diagnostics,
    )?;

    let cplusplus = session.ast_context.lang_opts().cplusplus;
    let mut parser = Parser::new();
    let language = if cplusplus {
        tree_sitter_cpp::language()
    } else {
        tree_sitter_c::language()
    };
    debug!(
        "Parsing {} bytes as {}",
        unit.text().len(),
        if cplusplus { "C++" } else { "C" }
    );
    parser
        .set_language(&language)
        .map_err(|e| FrontendError::Engine(format!("failed to load grammar: {e}")))?;
    let tree = parser
        .parse(unit.text(), None)
        .ok_or_else(|| FrontendError::Engine("parser produced no tree".to_string()))?;

    session
        .ast_context
        .set_translation_unit(TranslationUnit::new(unit, tree));

    report_syntax_errors(&session.ast_context, &mut session.diagnostics);

    Sema::new(
        &session.ast_context,
        &session.builtins,
        session.preprocessor.macros(),
        session.preprocessor.tu_kind(),
    )
    .check(&mut session.diagnostics);

    session.consumer.initialize(&session.ast_context);
    session
        .consumer
        .handle_translation_unit(&session.ast_context, &session.source_manager);
    Ok(())
}

/// Report one error per maximal error region and per missing token
fn report_syntax_errors(ctx: &AstContext, diags: &mut DiagnosticsEngine) {
    let Some(unit) = ctx.translation_unit() else {
        return;
    };
    let root = unit.tree().root_node();
    if !root.has_error() {
        return;
    }

    let mut reported = 0usize;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() {
            diags.error(ctx.location_of(node), unexpected_message(ctx, node));
            reported += 1;
            continue;
        }
        if node.is_missing() {
            diags.error(ctx.location_of(node), missing_message(node));
            reported += 1;
            continue;
        }
        if !node.has_error() {
            continue;
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    trace!("Reported {} syntax errors", reported);
}

fn missing_message(node: Node<'_>) -> String {
    if node.is_named() {
        format!("expected {}", node.kind().replace('_', " "))
    } else {
        format!("expected '{}'", node.kind())
    }
}

fn unexpected_message(ctx: &AstContext, node: Node<'_>) -> String {
    let token = first_token(node).map(|token| ctx.source_text(token).trim());
    let expected = match node.parent().map(|parent| parent.kind()) {
        Some("translation_unit" | "declaration_list" | "field_declaration_list") => {
            "declaration"
        }
        _ => "expression",
    };

    match token.filter(|token| !token.is_empty()) {
        Some(token) => {
            let preview: String = token.chars().take(MAX_TOKEN_PREVIEW).collect();
            format!("expected {expected} before '{preview}'")
        }
        None => format!("expected {expected}"),
    }
}

/// First leaf below `node`
fn first_token(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node;
    while current.child_count() > 0 {
        current = current.child(0)?;
    }
    (current.start_byte() < current.end_byte()).then_some(current)
}
