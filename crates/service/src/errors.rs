use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("could not allocate a free id after {0} attempts")]
    IdExhausted(u32),
    #[error("credential error: {0}")]
    Credential(String),
}

impl ServiceError {
    pub fn storage(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::Storage(format!("{}: {}", path.display(), err))
    }

    /// Storage-class faults: the backing file or id space, not the caller's input.
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::IdExhausted(_))
    }
}
