//! Abstract syntax tree access
//!
//! - [`AstContext`]: the parsed translation unit plus dialect and target
//! - [`Decl`] / [`FunctionDecl`]: read-only views over declarations
//! - [`RecursiveAstVisitor`]: pre-order walk with per-kind hooks
//! - [`AstConsumer`]: receiver of the finished translation unit

pub mod context;
pub mod decl;
pub mod visitor;

pub use context::{AstContext, TranslationUnit};
pub use decl::{Decl, DeclKind, FunctionDecl, Parameter};
pub use visitor::RecursiveAstVisitor;

use crate::source_manager::SourceManager;

/// Receives the translation unit once parsing and semantic checks are done
pub trait AstConsumer {
    fn initialize(&mut self, _ctx: &AstContext) {}

    fn handle_translation_unit(&mut self, ctx: &AstContext, sm: &SourceManager);
}
