//! Semantic checks over the parsed translation unit
//!
//! The checks are name based: a name counts as declared once any declarator,
//! type, enumerator or macro introduces it. C requires the declaration to
//! precede the use, C++ accepts it anywhere in the unit.

use std::collections::{HashMap, HashSet};

use log::debug;
use tree_sitter::Node;

use crate::ast::decl::innermost_declarator;
use crate::ast::{AstContext, FunctionDecl, RecursiveAstVisitor};
use crate::builtins::BuiltinInfo;
use crate::diagnostic::DiagnosticsEngine;
use crate::macros::MacroTable;
use crate::preprocessor::TranslationUnitKind;
use crate::source_manager::SourceLocation;

/// Names declared in the unit and the calls that use them
struct SymbolIndex<'a> {
    /// Name to offset of its first declaration
    declared: HashMap<&'a str, usize>,
    /// Callee identifiers of call expressions, in source order
    calls: Vec<Node<'a>>,
}

impl<'a> SymbolIndex<'a> {
    fn build(ctx: &'a AstContext, root: Node<'a>) -> Self {
        let mut declared = HashMap::new();
        let mut calls = Vec::new();

        let mut cursor = root.walk();
        let mut depth = 0usize;
        loop {
            let node = cursor.node();
            if matches!(
                node.kind(),
                "identifier" | "field_identifier" | "type_identifier" | "namespace_identifier"
            ) && matches!(cursor.field_name(), Some("declarator" | "name"))
            {
                declared
                    .entry(ctx.source_text(node))
                    .or_insert(node.start_byte());
            }
            if node.kind() == "call_expression" {
                if let Some(callee) = node
                    .child_by_field_name("function")
                    .filter(|callee| callee.kind() == "identifier")
                {
                    calls.push(callee);
                }
            }

            if cursor.goto_first_child() {
                depth += 1;
                continue;
            }
            loop {
                if depth == 0 {
                    return Self { declared, calls };
                }
                if cursor.goto_next_sibling() {
                    break;
                }
                cursor.goto_parent();
                depth -= 1;
            }
        }
    }

    fn is_declared_before(&self, name: &str, offset: usize) -> bool {
        self.declared.get(name).is_some_and(|&at| at < offset)
    }

    fn is_declared(&self, name: &str) -> bool {
        self.declared.contains_key(name)
    }
}

#[derive(Default)]
struct FunctionIndex {
    /// Static, non-member declarations without a body, in source order
    static_decls: Vec<(String, SourceLocation)>,
    defined: HashSet<String>,
}

impl<'a> RecursiveAstVisitor<'a> for FunctionIndex {
    fn visit_function_decl(&mut self, decl: &FunctionDecl<'a>) -> bool {
        let Some(name) = decl.name() else {
            return true;
        };
        if decl.is_definition() {
            self.defined.insert(name.to_string());
        } else if decl.is_static() && !has_ancestor(decl.decl().node(), &["field_declaration_list"]) {
            self.static_decls.push((name.to_string(), decl.location()));
        }
        true
    }
}

fn has_ancestor(node: Node<'_>, kinds: &[&str]) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if kinds.contains(&parent.kind()) {
            return true;
        }
        current = parent.parent();
    }
    false
}

/// Function definition whose declarator names a qualified member (`S::f`)
fn in_out_of_line_member(node: Node<'_>) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if parent.kind() == "function_definition" {
            let qualified = parent
                .child_by_field_name("declarator")
                .and_then(|d| innermost_declarator(d).1)
                .is_some_and(|name| {
                    matches!(name.kind(), "qualified_identifier" | "operator_name")
                });
            if qualified {
                return true;
            }
        }
        current = parent.parent();
    }
    false
}

/// Whether a function definition sits at namespace scope
fn is_file_scope(node: Node<'_>) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        match parent.kind() {
            "translation_unit" => return true,
            "linkage_specification" | "declaration_list" | "namespace_definition" => {}
            _ => return false,
        }
        current = parent.parent();
    }
    false
}

/// Semantic analysis of one translation unit
pub struct Sema<'s> {
    ctx: &'s AstContext,
    builtins: &'s BuiltinInfo,
    macros: &'s MacroTable,
    tu_kind: TranslationUnitKind,
}

impl<'s> Sema<'s> {
    pub fn new(
        ctx: &'s AstContext,
        builtins: &'s BuiltinInfo,
        macros: &'s MacroTable,
        tu_kind: TranslationUnitKind,
    ) -> Self {
        Self {
            ctx,
            builtins,
            macros,
            tu_kind,
        }
    }

    /// Run every check, reporting into `diags`
    pub fn check(&self, diags: &mut DiagnosticsEngine) {
        let Some(root) = self.ctx.translation_unit_decl() else {
            return;
        };
        let symbols = SymbolIndex::build(self.ctx, root.node());
        debug!(
            "Semantic checks over {} names and {} calls",
            symbols.declared.len(),
            symbols.calls.len()
        );

        self.check_calls(&symbols, diags);
        self.check_redefinitions(root.node(), diags);

        if self.tu_kind == TranslationUnitKind::Complete {
            let mut functions = FunctionIndex::default();
            functions.traverse_decl(&root);
            self.check_undefined_internal(&functions, &symbols, diags);
        }
    }

    fn check_calls(&self, symbols: &SymbolIndex<'_>, diags: &mut DiagnosticsEngine) {
        let lang_opts = self.ctx.lang_opts();
        let mut implicitly_declared = HashSet::new();

        for &callee in &symbols.calls {
            let name = self.ctx.source_text(callee);
            let declared = if lang_opts.cplusplus {
                symbols.is_declared(name)
            } else {
                symbols.is_declared_before(name, callee.start_byte())
            };
            if declared
                || self.macros.is_defined(name)
                || self.builtins.is_compiler_builtin(name)
                || name.starts_with("__builtin_")
                || implicitly_declared.contains(name)
            {
                continue;
            }

            let location = self.ctx.location_of(callee);
            if lang_opts.cplusplus {
                if has_ancestor(callee, &["field_declaration_list", "template_declaration"])
                    || in_out_of_line_member(callee)
                {
                    continue;
                }
                diags.error(location, format!("use of undeclared identifier '{name}'"));
                continue;
            }

            implicitly_declared.insert(name);
            if let Some(header) = self.builtins.library_header(name) {
                diags.warning(
                    location,
                    format!("implicitly declaring library function '{name}'"),
                );
                diags.note(
                    location,
                    format!(
                        "include the header <{header}> or explicitly provide a declaration for '{name}'"
                    ),
                );
            } else if !lang_opts.implicit_function_declarations {
                diags.warning(
                    location,
                    format!(
                        "call to undeclared function '{name}'; ISO C99 and later do not support implicit function declarations"
                    ),
                );
            }
        }
    }

    fn check_redefinitions(&self, root: Node<'_>, diags: &mut DiagnosticsEngine) {
        let mut definitions: HashMap<String, SourceLocation> = HashMap::new();

        let mut cursor = root.walk();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.kind() == "function_definition" {
                if is_file_scope(node) {
                    self.record_definition(node, &mut definitions, diags);
                }
                // Nested definitions are never file scope
                continue;
            }
            let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }

    fn record_definition(
        &self,
        node: Node<'_>,
        definitions: &mut HashMap<String, SourceLocation>,
        diags: &mut DiagnosticsEngine,
    ) {
        let Some(declarator) = node.child_by_field_name("declarator") else {
            return;
        };
        let Some(name_node) = innermost_declarator(declarator).1 else {
            return;
        };
        let name = self.ctx.source_text(name_node);
        let location = self.ctx.location_of(name_node);

        // C++ overloads differ in their parameter lists, so the whole
        // declarator is part of the key
        let key = if self.ctx.lang_opts().cplusplus {
            let mut scope = Vec::new();
            let mut current = node.parent();
            while let Some(parent) = current {
                if parent.kind() == "namespace_definition" {
                    scope.push(
                        parent
                            .child_by_field_name("name")
                            .map_or("", |n| self.ctx.source_text(n)),
                    );
                }
                current = parent.parent();
            }
            scope.reverse();
            let declarator_text = self
                .ctx
                .source_text(declarator)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            format!("{}::{}", scope.join("::"), declarator_text)
        } else {
            name.to_string()
        };

        match definitions.get(&key) {
            Some(&previous) => {
                diags.error(location, format!("redefinition of '{name}'"));
                diags.note(previous, "previous definition is here");
            }
            None => {
                definitions.insert(key, location);
            }
        }
    }

    fn check_undefined_internal(
        &self,
        functions: &FunctionIndex,
        symbols: &SymbolIndex<'_>,
        diags: &mut DiagnosticsEngine,
    ) {
        let mut reported = HashSet::new();
        for (name, location) in &functions.static_decls {
            if functions.defined.contains(name) || !reported.insert(name.as_str()) {
                continue;
            }
            let Some(&use_site) = symbols
                .calls
                .iter()
                .find(|&&callee| self.ctx.source_text(callee) == name)
            else {
                continue;
            };
            diags.warning(
                *location,
                format!("function '{name}' has internal linkage but is not defined"),
            );
            diags.note(self.ctx.location_of(use_site), "used here");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TranslationUnit;
    use crate::diagnostic::Level;
    use crate::lang_options::{InputKind, LangOptions, LangStandard};
    use crate::macros::MacroInfo;
    use crate::preprocessor::PreprocessedUnit;
    use crate::source_manager::SourceManager;
    use crate::target::{TargetInfo, TargetOptions};
    use ccfront_api::Language;
    use std::str::FromStr;
    use target_lexicon::Triple;
    use tree_sitter::Parser;

    fn check_with(
        source: &str,
        language: Language,
        version: u32,
        macros: &MacroTable,
        tu_kind: TranslationUnitKind,
    ) -> Vec<(Level, String)> {
        let standard = LangStandard::from_version(language, version).unwrap();
        let mut lang_opts = LangOptions {
            cplusplus: language == Language::Cxx,
            ..LangOptions::new()
        };
        let triple = Triple::from_str("x86_64-unknown-linux-gnu").unwrap();
        lang_opts.set_lang_defaults(standard.input_kind(), &triple, standard);

        let mut parser = Parser::new();
        if standard.input_kind() == InputKind::Cxx {
            parser.set_language(&tree_sitter_cpp::language()).unwrap();
        } else {
            parser.set_language(&tree_sitter_c::language()).unwrap();
        }
        let tree = parser.parse(source, None).unwrap();
        let mut sm = SourceManager::new();
        let file = sm.create_file_id("main.cpp", source).unwrap();
        let unit = PreprocessedUnit::from_file_text(source, sm.start_of_file(file));

        let target = TargetInfo::create(&TargetOptions {
            triple: triple.to_string(),
        })
        .unwrap();
        let mut ctx = AstContext::new(&lang_opts, &target);
        ctx.set_translation_unit(TranslationUnit::new(unit, tree));

        let mut builtins = BuiltinInfo::new();
        builtins.initialize_builtins(&lang_opts);

        let mut diags = DiagnosticsEngine::new();
        Sema::new(&ctx, &builtins, macros, tu_kind).check(&mut diags);
        diags
            .diagnostics()
            .iter()
            .map(|d| (d.level, d.message.clone()))
            .collect()
    }

    fn check(source: &str, language: Language, version: u32) -> Vec<(Level, String)> {
        check_with(
            source,
            language,
            version,
            &MacroTable::new(),
            TranslationUnitKind::Complete,
        )
    }

    #[test]
    fn test_undeclared_call_c99_warns_once() {
        let diags = check("int main(void) { helper(); helper(); return 0; }\n", Language::C, 99);
        assert_eq!(
            diags,
            [(
                Level::Warning,
                "call to undeclared function 'helper'; ISO C99 and later do not support implicit function declarations".to_string()
            )]
        );
    }

    #[test]
    fn test_undeclared_call_c89_is_silent() {
        assert!(check("int main() { helper(); return 0; }\n", Language::C, 89).is_empty());
    }

    #[test]
    fn test_declared_before_use_in_c() {
        let source = "int helper(void);\nint main(void) { return helper(); }\n";
        assert!(check(source, Language::C, 99).is_empty());

        let source = "int main(void) { return helper(); }\nint helper(void) { return 1; }\n";
        assert_eq!(check(source, Language::C, 11).len(), 1);
    }

    #[test]
    fn test_library_function_names_header() {
        let diags = check("int main(void) { printf(\"hi\"); return 0; }\n", Language::C, 89);
        assert_eq!(
            diags,
            [
                (
                    Level::Warning,
                    "implicitly declaring library function 'printf'".to_string()
                ),
                (
                    Level::Note,
                    "include the header <stdio.h> or explicitly provide a declaration for 'printf'"
                        .to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_compiler_builtins_and_macros_are_declared() {
        let mut macros = MacroTable::new();
        macros.define(MacroInfo::object_like("CALL", "", SourceLocation::invalid()));
        let source = "int main(void) { __builtin_trap(); CALL(); return 0; }\n";
        let diags = check_with(source, Language::C, 99, &macros, TranslationUnitKind::Complete);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_undeclared_identifier_in_cxx() {
        let diags = check("int main() { missing(); return 0; }\n", Language::Cxx, 11);
        assert_eq!(
            diags,
            [(Level::Error, "use of undeclared identifier 'missing'".to_string())]
        );
    }

    #[test]
    fn test_cxx_accepts_later_declarations() {
        let source = r#"
struct S {
    int a() { return b(); }
    int b() { return 1; }
};
int S_helper();
int main() { return S_helper() + later(); }
int later() { return 0; }
template <typename T> int g(T t) { return dependent(t); }
int S::c() { return member(); }
"#;
        assert!(check(source, Language::Cxx, 14).is_empty());
    }

    #[test]
    fn test_redefinition() {
        let diags = check(
            "int f(void) { return 0; }\nint f(void) { return 1; }\n",
            Language::C,
            99,
        );
        assert_eq!(
            diags,
            [
                (Level::Error, "redefinition of 'f'".to_string()),
                (Level::Note, "previous definition is here".to_string()),
            ]
        );
    }

    #[test]
    fn test_cxx_overloads_and_namespaces_are_not_redefinitions() {
        let source = r#"
int f(int a) { return a; }
int f(double a) { return 0; }
namespace a { int g() { return 0; } }
namespace b { int g() { return 0; } }
"#;
        assert!(check(source, Language::Cxx, 11).is_empty());
    }

    #[test]
    fn test_undefined_internal_function() {
        let source = "static int hidden(void);\nint main(void) { return hidden(); }\n";
        let diags = check(source, Language::C, 99);
        assert_eq!(
            diags,
            [
                (
                    Level::Warning,
                    "function 'hidden' has internal linkage but is not defined".to_string()
                ),
                (Level::Note, "used here".to_string()),
            ]
        );

        let prefix = check_with(
            source,
            Language::C,
            99,
            &MacroTable::new(),
            TranslationUnitKind::Prefix,
        );
        assert!(prefix.is_empty());

        let unused = "static int hidden(void);\nint main(void) { return 0; }\n";
        assert!(check(unused, Language::C, 99).is_empty());
    }
}
