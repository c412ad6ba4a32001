//! Declarations
//!
//! A [`Decl`] is a view over the syntax tree: the node that introduces the
//! declaration plus, for declarations with several declarators, the declarator
//! it stands for. `int a, f(void);` yields a variable and a function.

use std::fmt;
use tree_sitter::Node;

use crate::ast::context::AstContext;
use crate::source_manager::{SourceLocation, SourceRange};

/// Kind of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    TranslationUnit,
    Function,
    Var,
    Field,
    Record,
    Enum,
    Typedef,
    Namespace,
    LinkageSpec,
}

/// A declaration in the translation unit
#[derive(Clone, Copy)]
pub struct Decl<'a> {
    ctx: &'a AstContext,
    node: Node<'a>,
    declarator: Option<Node<'a>>,
    kind: DeclKind,
}

impl<'a> Decl<'a> {
    pub(crate) fn new(
        ctx: &'a AstContext,
        node: Node<'a>,
        declarator: Option<Node<'a>>,
        kind: DeclKind,
    ) -> Self {
        Self {
            ctx,
            node,
            declarator,
            kind,
        }
    }

    pub fn kind(&self) -> DeclKind {
        self.kind
    }

    /// Syntax node introducing the declaration
    pub fn node(&self) -> Node<'a> {
        self.node
    }

    /// Declarator this declaration stands for, if any
    pub fn declarator(&self) -> Option<Node<'a>> {
        self.declarator
    }

    pub fn context(&self) -> &'a AstContext {
        self.ctx
    }

    /// Location of the declared name, or of the declaration if unnamed
    pub fn location(&self) -> SourceLocation {
        let anchor = self.name_node().unwrap_or(self.node);
        self.ctx.location_of(anchor)
    }

    pub fn range(&self) -> SourceRange {
        self.ctx.range_of(self.node)
    }

    /// Text of the whole declaration
    pub fn source_text(&self) -> &'a str {
        self.ctx.source_text(self.node)
    }

    /// Declared name as written, including any qualification
    pub fn name(&self) -> Option<&'a str> {
        self.name_node().map(|node| self.ctx.source_text(node))
    }

    pub fn as_function(&self) -> Option<FunctionDecl<'a>> {
        if self.kind != DeclKind::Function {
            return None;
        }
        let (function_declarator, signature) =
            function_signature(self.ctx, self.node, self.declarator?)?;
        Some(FunctionDecl {
            decl: *self,
            function_declarator,
            signature,
        })
    }

    fn name_node(&self) -> Option<Node<'a>> {
        match self.declarator {
            Some(declarator) => innermost_declarator(declarator).1,
            None => self.node.child_by_field_name("name"),
        }
    }
}

impl fmt::Debug for Decl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decl")
            .field("kind", &self.kind)
            .field("name", &self.name())
            .field("node", &self.node.kind())
            .finish()
    }
}

/// A function parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter<'a> {
    pub name: Option<&'a str>,
    /// Declared type without the declarator
    pub type_name: &'a str,
    /// Full parameter text
    pub text: &'a str,
}

/// A function declaration or definition
#[derive(Clone, Copy)]
pub struct FunctionDecl<'a> {
    decl: Decl<'a>,
    /// Declarator carrying the parameter list
    function_declarator: Node<'a>,
    /// Node whose `type` field is the return type; a typedef for `fn_t f;`
    signature: Node<'a>,
}

impl<'a> FunctionDecl<'a> {
    pub fn decl(&self) -> &Decl<'a> {
        &self.decl
    }

    pub fn name(&self) -> Option<&'a str> {
        self.decl.name()
    }

    pub fn location(&self) -> SourceLocation {
        self.decl.location()
    }

    pub fn is_definition(&self) -> bool {
        self.decl.node.kind() == "function_definition"
    }

    /// Body of the definition
    pub fn body(&self) -> Option<Node<'a>> {
        self.decl.node.child_by_field_name("body")
    }

    pub fn is_static(&self) -> bool {
        let mut cursor = self.decl.node.walk();
        let is_static = self
            .decl
            .node
            .children(&mut cursor)
            .any(|child| {
                child.kind() == "storage_class_specifier"
                    && self.decl.ctx.source_text(child) == "static"
            });
        is_static
    }

    /// Whether the function has C language linkage through `extern "C"`
    pub fn is_extern_c(&self) -> bool {
        let mut current = self.decl.node.parent();
        while let Some(node) = current {
            if node.kind() == "linkage_specification" {
                return node
                    .child_by_field_name("value")
                    .is_some_and(|value| self.decl.ctx.source_text(value) == "\"C\"");
            }
            current = node.parent();
        }
        false
    }

    pub fn is_variadic(&self) -> bool {
        self.parameter_list().is_some_and(|params| {
            let mut cursor = params.walk();
            let variadic = params
                .children(&mut cursor)
                .any(|child| matches!(child.kind(), "variadic_parameter" | "..."));
            variadic
        })
    }

    /// Declared return type, without pointer or reference declarators
    pub fn return_type(&self) -> Option<&'a str> {
        self.signature
            .child_by_field_name("type")
            .map(|node| self.decl.ctx.source_text(node))
    }

    pub fn parameters(&self) -> Vec<Parameter<'a>> {
        let Some(params) = self.parameter_list() else {
            return Vec::new();
        };
        let ctx = self.decl.ctx;

        let mut cursor = params.walk();
        params
            .named_children(&mut cursor)
            .filter(|child| {
                matches!(
                    child.kind(),
                    "parameter_declaration" | "optional_parameter_declaration"
                )
            })
            .map(|param| Parameter {
                name: param
                    .child_by_field_name("declarator")
                    .and_then(|d| innermost_declarator(d).1)
                    .map(|node| ctx.source_text(node)),
                type_name: param
                    .child_by_field_name("type")
                    .map_or("", |node| ctx.source_text(node)),
                text: ctx.source_text(param),
            })
            // `f(void)` declares no parameters
            .filter(|param| !(param.name.is_none() && param.text == "void"))
            .collect()
    }

    fn parameter_list(&self) -> Option<Node<'a>> {
        self.function_declarator.child_by_field_name("parameters")
    }
}

impl fmt::Debug for FunctionDecl<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDecl")
            .field("name", &self.name())
            .field("is_definition", &self.is_definition())
            .finish()
    }
}

/// Step from a declarator to the declarator it wraps
fn inner_declarator(node: Node<'_>) -> Option<Node<'_>> {
    if let Some(inner) = node.child_by_field_name("declarator") {
        return Some(inner);
    }
    match node.kind() {
        "attributed_declarator" => node.named_child(0),
        _ => node.named_child(node.named_child_count().checked_sub(1)?),
    }
}

/// Walk a declarator down to the declared name
///
/// Returns the type constructor closest to the name (function, pointer,
/// array or reference declarator) and the name node. `int *f(void)` is a
/// function; `int (*fp)(int)` is a pointer.
pub(crate) fn innermost_declarator(declarator: Node<'_>) -> (Option<Node<'_>>, Option<Node<'_>>) {
    let mut node = declarator;
    let mut constructor = None;

    loop {
        match node.kind() {
            "function_declarator" | "pointer_declarator" | "array_declarator"
            | "reference_declarator" => constructor = Some(node),
            "parenthesized_declarator" | "attributed_declarator" | "init_declarator" => {}
            _ => return (constructor, Some(node)),
        }
        match inner_declarator(node) {
            Some(inner) => node = inner,
            None => return (constructor, None),
        }
    }
}

/// Function declarator giving `declarator` its type, and the node holding the return type
///
/// A declarator without a type constructor has the type of the declaration,
/// which may be a typedef of a function type: `typedef int fn_t(int); fn_t f;`
/// declares a function.
fn function_signature<'a>(
    ctx: &'a AstContext,
    node: Node<'a>,
    declarator: Node<'a>,
) -> Option<(Node<'a>, Node<'a>)> {
    match innermost_declarator(declarator).0 {
        Some(constructor) if constructor.kind() == "function_declarator" => {
            Some((constructor, node))
        }
        Some(_) => None,
        None => {
            let ty = node
                .child_by_field_name("type")
                .filter(|ty| ty.kind() == "type_identifier")?;
            ctx.function_typedef(ctx.source_text(ty), node.start_byte())
        }
    }
}

/// Declarations introduced directly by `node`
pub(crate) fn decls_at<'a>(ctx: &'a AstContext, node: Node<'a>) -> Vec<Decl<'a>> {
    let per_declarator = |other_kind: DeclKind| {
        // C fields cannot have function type
        let typedefs_allowed = other_kind == DeclKind::Var || ctx.lang_opts().cplusplus;
        let mut cursor = node.walk();
        let decls: Vec<Decl<'a>> = node
            .children_by_field_name("declarator", &mut cursor)
            .map(|declarator| {
                let is_function = match innermost_declarator(declarator).0 {
                    Some(constructor) => constructor.kind() == "function_declarator",
                    None => {
                        typedefs_allowed
                            && function_signature(ctx, node, declarator).is_some()
                    }
                };
                let kind = if is_function {
                    DeclKind::Function
                } else {
                    other_kind
                };
                Decl::new(ctx, node, Some(declarator), kind)
            })
            .collect();
        decls
    };

    match node.kind() {
        "translation_unit" => vec![Decl::new(ctx, node, None, DeclKind::TranslationUnit)],
        "function_definition" => node
            .child_by_field_name("declarator")
            .map(|declarator| Decl::new(ctx, node, Some(declarator), DeclKind::Function))
            .into_iter()
            .collect(),
        "declaration" => per_declarator(DeclKind::Var),
        "field_declaration" => per_declarator(DeclKind::Field),
        "type_definition" => {
            let mut cursor = node.walk();
            let decls: Vec<Decl<'a>> = node
                .children_by_field_name("declarator", &mut cursor)
                .map(|declarator| Decl::new(ctx, node, Some(declarator), DeclKind::Typedef))
                .collect();
            decls
        }
        "alias_declaration" => vec![Decl::new(ctx, node, None, DeclKind::Typedef)],
        "struct_specifier" | "union_specifier" | "class_specifier"
            if node.child_by_field_name("body").is_some() =>
        {
            vec![Decl::new(ctx, node, None, DeclKind::Record)]
        }
        "enum_specifier" if node.child_by_field_name("body").is_some() => {
            vec![Decl::new(ctx, node, None, DeclKind::Enum)]
        }
        "namespace_definition" => vec![Decl::new(ctx, node, None, DeclKind::Namespace)],
        "linkage_specification" => vec![Decl::new(ctx, node, None, DeclKind::LinkageSpec)],
        _ => Vec::new(),
    }
}
