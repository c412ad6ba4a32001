use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of AST node a callback can be registered for
///
/// Adding a category means adding a variant here and a matching hook in the
/// front end's AST visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AstCallbackType {
    /// Function declarations and definitions, including methods
    Function,
}

impl fmt::Display for AstCallbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstCallbackType::Function => f.write_str("function"),
        }
    }
}
