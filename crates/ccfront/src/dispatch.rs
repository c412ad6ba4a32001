//! Routing of AST declarations to registered callbacks

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ccfront_api::{AstCallbackType, FrontendResult};
use log::{debug, trace};

use crate::ast::{AstConsumer, AstContext, Decl, FunctionDecl, RecursiveAstVisitor};
use crate::source_manager::SourceManager;

/// Callback invoked for a declaration
///
/// Returning `false` stops the traversal of the translation unit.
pub type AstCallback =
    Box<dyn Fn(&Decl<'_>, &AstContext, &SourceManager, &CallbackParameter) -> bool + Send + Sync>;

/// Opaque user value handed to every callback
#[derive(Clone, Default)]
pub struct CallbackParameter(Option<Arc<dyn Any + Send + Sync>>);

impl CallbackParameter {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn from_arc(value: Arc<dyn Any + Send + Sync>) -> Self {
        Self(Some(value))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.0.as_deref()
    }

    /// The parameter as a `T`, if it holds one
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|value| value.downcast_ref::<T>())
    }
}

impl fmt::Debug for CallbackParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("CallbackParameter(Some(..))"),
            None => f.write_str("CallbackParameter(None)"),
        }
    }
}

/// Callbacks keyed by the declaration category they handle
#[derive(Default)]
pub struct AstCallbackMap {
    callbacks: HashMap<AstCallbackType, AstCallback>,
}

impl AstCallbackMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_reserve(&mut self, additional: usize) -> FrontendResult<()> {
        self.callbacks.try_reserve(additional)?;
        Ok(())
    }

    /// Install `callback` for `kind`, returning the one it replaces
    pub fn register(&mut self, kind: AstCallbackType, callback: AstCallback) -> Option<AstCallback> {
        self.callbacks.insert(kind, callback)
    }

    pub fn get(&self, kind: AstCallbackType) -> Option<&AstCallback> {
        self.callbacks.get(&kind)
    }

    pub fn contains(&self, kind: AstCallbackType) -> bool {
        self.callbacks.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl fmt::Debug for AstCallbackMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.callbacks.keys()).finish()
    }
}

struct DispatchVisitor<'c, 's> {
    callbacks: &'c AstCallbackMap,
    parameter: &'c CallbackParameter,
    ctx: &'s AstContext,
    sm: &'s SourceManager,
    dispatched: usize,
}

impl<'a> RecursiveAstVisitor<'a> for DispatchVisitor<'_, '_> {
    fn visit_function_decl(&mut self, decl: &FunctionDecl<'a>) -> bool {
        let Some(callback) = self.callbacks.get(AstCallbackType::Function) else {
            return true;
        };

        trace!(
            "Dispatching function '{}'",
            decl.name().unwrap_or("<anonymous>")
        );
        self.dispatched += 1;
        callback(decl.decl(), self.ctx, self.sm, self.parameter)
    }
}

/// AST consumer that walks the translation unit and feeds the callbacks
pub struct DispatchConsumer<'c> {
    callbacks: &'c AstCallbackMap,
    parameter: &'c CallbackParameter,
}

impl<'c> DispatchConsumer<'c> {
    pub fn new(callbacks: &'c AstCallbackMap, parameter: &'c CallbackParameter) -> Self {
        Self {
            callbacks,
            parameter,
        }
    }
}

impl AstConsumer for DispatchConsumer<'_> {
    fn handle_translation_unit(&mut self, ctx: &AstContext, sm: &SourceManager) {
        let Some(root) = ctx.translation_unit_decl() else {
            return;
        };
        if self.callbacks.is_empty() {
            debug!("No AST callbacks registered, skipping dispatch");
            return;
        }

        let mut visitor = DispatchVisitor {
            callbacks: self.callbacks,
            parameter: self.parameter,
            ctx,
            sm,
            dispatched: 0,
        };
        let completed = visitor.traverse_decl(&root);

        if completed {
            debug!("Dispatched {} declarations", visitor.dispatched);
        } else {
            debug!(
                "Dispatch stopped by callback after {} declarations",
                visitor.dispatched
            );
        }
    }
}
