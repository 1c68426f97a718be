#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("this operation cannot be undone; resend with confirm=true")]
    ConfirmationRequired,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PortalError {
    pub fn code(&self) -> &'static str {
        match self {
            PortalError::ConfirmationRequired => "confirmation_required",
            PortalError::Storage(_) | PortalError::Serialization(_) => "storage_failed",
            PortalError::Other(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
