use crate::settings::Language;
use crate::status::{Status, StatusCode};
use std::collections::TryReserveError;
use thiserror::Error;

/// Errors that can occur while configuring or running a parse session
#[derive(Error, Debug)]
pub enum FrontendError {
    /// Language the front end cannot parse
    #[error("unsupported language '{0}'")]
    InvalidLanguage(Language),

    /// Standard version not known for the language
    #[error("invalid standard {standard} for language '{language}'")]
    InvalidLanguageStandard { language: Language, standard: u32 },

    /// Target triple that cannot be turned into target information
    #[error("unknown target triple '{0}'")]
    UnknownTarget(String),

    /// Allocation of session state failed
    #[error("memory allocation failed: {0}")]
    AllocationFailure(#[from] TryReserveError),

    /// The parsing engine could not be run
    #[error("parser engine failure: {0}")]
    Engine(String),
}

impl FrontendError {
    /// Status code reported to the caller for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            FrontendError::InvalidLanguage(_) => StatusCode::InvalidLanguage,
            FrontendError::InvalidLanguageStandard { .. } => StatusCode::InvalidLanguageStandard,
            FrontendError::UnknownTarget(_) => StatusCode::InvalidTarget,
            FrontendError::AllocationFailure(_) => StatusCode::MemoryAllocationFailure,
            FrontendError::Engine(_) => StatusCode::CompilationError,
        }
    }
}

impl From<FrontendError> for Status {
    fn from(error: FrontendError) -> Self {
        Status::with_message(false, error.status_code(), error.to_string())
    }
}

/// Result type for front-end operations
pub type FrontendResult<T> = Result<T, FrontendError>;
