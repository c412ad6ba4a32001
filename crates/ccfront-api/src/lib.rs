//! ccfront API
//!
//! Shared types for driving a ccfront parse session.
//!
//! This crate defines the data that crosses the boundary between the caller and
//! the front end:
//!
//! - **Settings**: language, standard, GNU mode, include-path profile
//! - **Status**: the outcome of a parse, with the captured diagnostic text
//! - **Callback kinds**: the AST node categories callbacks can be registered for
//! - **Error handling**: the internal error type and its mapping onto [`Status`]
//!
//! # Example
//!
//! ```rust
//! use ccfront_api::{Language, Settings};
//!
//! let settings = Settings::new(Language::C, 99).with_gnu_extensions(true);
//! assert_eq!(settings.language, Language::C);
//! ```

pub mod callbacks;
pub mod errors;
pub mod settings;
pub mod status;

// Re-export commonly used types
pub use callbacks::AstCallbackType;
pub use errors::{FrontendError, FrontendResult};
pub use settings::{Language, Profile, Settings};
pub use status::{Status, StatusCode};
