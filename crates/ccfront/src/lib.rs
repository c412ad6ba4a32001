//! # ccfront
//!
//! C/C++ front-end session driver - configures a parse of a single translation
//! unit and hands every function declaration to user callbacks.
//!
//! ## Features
//!
//! - C89/C94/C99/C11 and C++98/C++11/C++14 dialects, optional GNU mode
//! - Include-path profiles with system and extern-C system directories
//! - Preprocessing: includes, object- and function-like macros, conditional compilation
//! - Clang-style diagnostics captured into the returned [`Status`]
//! - Pre-order AST traversal with abortable callbacks
//!
//! ## Quick Start
//!
//! ```rust
//! use ccfront::{CallbackParameter, CompilerInstance};
//! use ccfront_api::{AstCallbackType, Language, Settings, StatusCode};
//! use std::sync::{Arc, Mutex};
//!
//! let names = Arc::new(Mutex::new(Vec::<String>::new()));
//!
//! let mut instance = CompilerInstance::create(Settings::new(Language::Cxx, 14)).unwrap();
//! instance.set_ast_callback_parameter(CallbackParameter::from_arc(names.clone()));
//! instance.register_ast_callback(AstCallbackType::Function, |decl, _ctx, _sm, param| {
//!     if let Some(names) = param.downcast_ref::<Mutex<Vec<String>>>() {
//!         names.lock().unwrap().push(decl.name().unwrap_or_default().to_string());
//!     }
//!     true
//! });
//!
//! let status = instance.process_buffer("int add(int a, int b) { return a + b; }\n");
//! assert_eq!(status.code(), StatusCode::Ok);
//! assert_eq!(*names.lock().unwrap(), ["add"]);
//! ```

pub mod ast;
pub mod builtins;
pub mod compiler_instance;
pub mod conditionals;
pub mod diagnostic;
pub mod dispatch;
pub mod file_manager;
pub mod header_search;
pub mod lang_options;
pub mod macros;
mod parse;
pub mod preprocessor;
pub mod sema;
pub mod session;
pub mod source_manager;
pub mod target;

pub use ast::{AstConsumer, AstContext, Decl, DeclKind, FunctionDecl, Parameter, RecursiveAstVisitor};
pub use compiler_instance::{CompilerInstance, DEFAULT_BUFFER_NAME};
pub use diagnostic::{Diagnostic, DiagnosticConsumer, DiagnosticsEngine, Level, TextDiagnosticPrinter};
pub use dispatch::{AstCallback, AstCallbackMap, CallbackParameter};
pub use session::{create_session, Session};
pub use source_manager::{FileId, PresumedLoc, SourceLocation, SourceManager, SourceRange};

// Re-export the shared API types
pub use ccfront_api::{AstCallbackType, FrontendError, FrontendResult, Language, Profile, Settings, Status, StatusCode};
