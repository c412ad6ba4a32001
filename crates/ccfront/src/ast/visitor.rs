//! Recursive declaration visitor

use crate::ast::decl::{decls_at, Decl, FunctionDecl};

/// Pre-order traversal over every declaration below a root
///
/// Implementors override the `visit_*` hooks they care about. A hook
/// returning `false` stops the whole traversal.
pub trait RecursiveAstVisitor<'a> {
    /// Called for every declaration
    fn visit_decl(&mut self, _decl: &Decl<'a>) -> bool {
        true
    }

    /// Called for function declarations and definitions, after `visit_decl`
    fn visit_function_decl(&mut self, _decl: &FunctionDecl<'a>) -> bool {
        true
    }

    /// Run the hooks of a single declaration, most generic first
    fn walk_up_from_decl(&mut self, decl: &Decl<'a>) -> bool {
        if !self.visit_decl(decl) {
            return false;
        }
        match decl.as_function() {
            Some(function) => self.visit_function_decl(&function),
            None => true,
        }
    }

    /// Visit `root` and everything nested in it
    ///
    /// Nested declarations include members of namespaces, classes and
    /// linkage blocks, declarations inside function bodies and anything the
    /// parser recovered inside error regions. Returns `false` if a hook
    /// aborted the walk.
    fn traverse_decl(&mut self, root: &Decl<'a>) -> bool {
        let ctx = root.context();
        let mut cursor = root.node().walk();
        let mut depth = 0usize;

        loop {
            for decl in decls_at(ctx, cursor.node()) {
                if !self.walk_up_from_decl(&decl) {
                    return false;
                }
            }

            if cursor.goto_first_child() {
                depth += 1;
                continue;
            }
            loop {
                if depth == 0 {
                    return true;
                }
                if cursor.goto_next_sibling() {
                    break;
                }
                cursor.goto_parent();
                depth -= 1;
            }
        }
    }
}
