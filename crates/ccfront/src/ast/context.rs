//! Semantic context of a parsed translation unit

use std::collections::HashMap;
use std::ops::Range;

use tree_sitter::{Node, Tree};

use crate::ast::decl::{innermost_declarator, Decl, DeclKind};
use crate::lang_options::LangOptions;
use crate::preprocessor::PreprocessedUnit;
use crate::source_manager::{SourceLocation, SourceRange};
use crate::target::TargetInfo;

/// Preprocessed text of a translation unit and its syntax tree
#[derive(Debug)]
pub struct TranslationUnit {
    unit: PreprocessedUnit,
    tree: Tree,
}

impl TranslationUnit {
    pub fn new(unit: PreprocessedUnit, tree: Tree) -> Self {
        Self { unit, tree }
    }

    pub fn text(&self) -> &str {
        self.unit.text()
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn preprocessed(&self) -> &PreprocessedUnit {
        &self.unit
    }
}

/// Typedef name that stands for a function type
#[derive(Debug, Clone)]
struct FunctionTypedef {
    /// Offset from which the name is in scope
    visible_from: usize,
    /// Byte range of the function declarator spelling the type
    declarator: Range<usize>,
}

/// Everything known about the translation unit being processed
///
/// Created empty by the session; the translation unit is attached once the
/// parse has run.
#[derive(Debug)]
pub struct AstContext {
    lang_opts: LangOptions,
    target: TargetInfo,
    unit: Option<TranslationUnit>,
    function_typedefs: HashMap<String, Vec<FunctionTypedef>>,
}

impl AstContext {
    pub fn new(lang_opts: &LangOptions, target: &TargetInfo) -> Self {
        Self {
            lang_opts: lang_opts.clone(),
            target: target.clone(),
            unit: None,
            function_typedefs: HashMap::new(),
        }
    }

    pub fn lang_opts(&self) -> &LangOptions {
        &self.lang_opts
    }

    pub fn target_info(&self) -> &TargetInfo {
        &self.target
    }

    pub fn set_translation_unit(&mut self, unit: TranslationUnit) {
        self.function_typedefs = collect_function_typedefs(&unit);
        self.unit = Some(unit);
    }

    pub fn translation_unit(&self) -> Option<&TranslationUnit> {
        self.unit.as_ref()
    }

    /// Root declaration of the translation unit, once parsed
    pub fn translation_unit_decl(&self) -> Option<Decl<'_>> {
        let unit = self.unit.as_ref()?;
        Some(Decl::new(
            self,
            unit.tree.root_node(),
            None,
            DeclKind::TranslationUnit,
        ))
    }

    /// Source location of the first byte of `node`
    pub fn location_of(&self, node: Node<'_>) -> SourceLocation {
        self.location_at(node.start_byte())
    }

    /// Source range covered by `node`
    pub fn range_of(&self, node: Node<'_>) -> SourceRange {
        SourceRange {
            begin: self.location_at(node.start_byte()),
            end: self.location_at(node.end_byte()),
        }
    }

    /// Translation-unit text of `node`
    pub fn source_text<'a>(&'a self, node: Node<'_>) -> &'a str {
        self.unit
            .as_ref()
            .and_then(|unit| unit.text().get(node.byte_range()))
            .unwrap_or("")
    }

    /// Function type named by typedef `name` as visible at byte `at`
    ///
    /// Returns the function declarator spelling the type and the node holding
    /// its return type (the `typedef` or the type of a `using` alias).
    pub(crate) fn function_typedef(&self, name: &str, at: usize) -> Option<(Node<'_>, Node<'_>)> {
        let unit = self.unit.as_ref()?;
        let typedef = self
            .function_typedefs
            .get(name)?
            .iter()
            .rev()
            .find(|typedef| typedef.visible_from <= at)?;

        let mut declarator = unit
            .tree
            .root_node()
            .descendant_for_byte_range(typedef.declarator.start, typedef.declarator.end)?;
        while !is_function_type_declarator(declarator) {
            declarator = declarator.parent()?;
        }
        let mut owner = declarator.parent()?;
        while !matches!(owner.kind(), "type_definition" | "type_descriptor") {
            owner = owner.parent()?;
        }
        Some((declarator, owner))
    }

    fn location_at(&self, offset: usize) -> SourceLocation {
        self.unit
            .as_ref()
            .map_or_else(SourceLocation::invalid, |unit| unit.unit.location_of(offset))
    }
}

fn is_function_type_declarator(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "function_declarator" | "abstract_function_declarator"
    )
}

/// Typedef and alias names of function types, in declaration order
fn collect_function_typedefs(unit: &TranslationUnit) -> HashMap<String, Vec<FunctionTypedef>> {
    let text = unit.text();
    let mut typedefs: HashMap<String, Vec<FunctionTypedef>> = HashMap::new();
    let resolve = |typedefs: &HashMap<String, Vec<FunctionTypedef>>, ty: Node<'_>, at: usize| {
        if ty.kind() != "type_identifier" {
            return None;
        }
        typedefs
            .get(&text[ty.byte_range()])?
            .iter()
            .rev()
            .find(|typedef| typedef.visible_from <= at)
            .map(|typedef| typedef.declarator.clone())
    };

    let mut stack = vec![unit.tree().root_node()];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "type_definition" => {
                let base = node
                    .child_by_field_name("type")
                    .and_then(|ty| resolve(&typedefs, ty, node.start_byte()));
                let mut cursor = node.walk();
                for declarator in node.children_by_field_name("declarator", &mut cursor) {
                    let (constructor, name) = innermost_declarator(declarator);
                    let Some(name) = name else {
                        continue;
                    };
                    let range = match constructor {
                        Some(constructor) if constructor.kind() == "function_declarator" => {
                            constructor.byte_range()
                        }
                        None => match &base {
                            Some(range) => range.clone(),
                            None => continue,
                        },
                        Some(_) => continue,
                    };
                    typedefs
                        .entry(text[name.byte_range()].to_string())
                        .or_default()
                        .push(FunctionTypedef {
                            visible_from: name.end_byte(),
                            declarator: range,
                        });
                }
            }
            "alias_declaration" => {
                let (Some(name), Some(descriptor)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("type"),
                ) else {
                    continue;
                };
                let range = match descriptor.child_by_field_name("declarator") {
                    Some(declarator) if is_function_type_declarator(declarator) => {
                        Some(declarator.byte_range())
                    }
                    Some(_) => None,
                    None => descriptor
                        .child_by_field_name("type")
                        .and_then(|ty| resolve(&typedefs, ty, node.start_byte())),
                };
                if let Some(range) = range {
                    typedefs
                        .entry(text[name.byte_range()].to_string())
                        .or_default()
                        .push(FunctionTypedef {
                            visible_from: node.end_byte(),
                            declarator: range,
                        });
                }
            }
            _ => {
                let mut cursor = node.walk();
                let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
                stack.extend(children.into_iter().rev());
            }
        }
    }
    typedefs
}
