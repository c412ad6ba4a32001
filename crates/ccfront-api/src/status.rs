use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome category of a compiler instance operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Ok,
    MemoryAllocationFailure,
    InvalidLanguage,
    InvalidLanguageStandard,
    /// The target triple could not be turned into target information
    InvalidTarget,
    CompilationError,
    CompilationWarning,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StatusCode::Ok => "ok",
            StatusCode::MemoryAllocationFailure => "memory allocation failure",
            StatusCode::InvalidLanguage => "invalid language",
            StatusCode::InvalidLanguageStandard => "invalid language standard",
            StatusCode::InvalidTarget => "invalid target",
            StatusCode::CompilationError => "compilation error",
            StatusCode::CompilationWarning => "compilation warning",
        };
        f.write_str(text)
    }
}

/// Result of a compiler instance operation
///
/// `message` carries the diagnostic output of the parse (possibly empty). Its
/// layout belongs to the diagnostic printer and is not meant to be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    succeeded: bool,
    code: StatusCode,
    message: String,
}

impl Status {
    /// Successful status with no message
    pub fn ok() -> Self {
        Self::new(true, StatusCode::Ok)
    }

    pub fn new(succeeded: bool, code: StatusCode) -> Self {
        Self {
            succeeded,
            code,
            message: String::new(),
        }
    }

    pub fn with_message(succeeded: bool, code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            succeeded,
            code,
            message: message.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}
