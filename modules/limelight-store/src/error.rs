use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt row in {table}: {message}")]
    Corrupt { table: String, message: String },

    #[error("Run conflict: {0}")]
    RunConflict(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub(crate) fn corrupt(table: &str, message: impl std::fmt::Display) -> Self {
        StoreError::Corrupt {
            table: table.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<StoreError> for limelight_common::PipelineError {
    fn from(e: StoreError) -> Self {
        limelight_common::PipelineError::Persistence(e.to_string())
    }
}
