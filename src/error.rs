use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Upload target is unknown or already used")]
    UploadTarget,

    #[error("Stored value is unreadable: {0}")]
    Corrupt(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type PortalResult<T> = Result<T, PortalError>;

impl PortalError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        PortalError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
