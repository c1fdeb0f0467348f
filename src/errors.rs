use thiserror::Error;

/// Errors that can occur while linking relationships in the code graph.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("file error: {message} (path: {path})")]
    File { message: String, path: String },

    #[error("database error: {message} (operation: {operation})")]
    Database { message: String, operation: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("resolution pass failed: {message}")]
    Pass { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sql error: {0}")]
    Sql(#[from] libsql::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LinkError {
    /// Builds a `Database` error tagged with the operation that failed.
    pub fn database(operation: &str, message: impl std::fmt::Display) -> Self {
        LinkError::Database {
            message: message.to_string(),
            operation: operation.to_string(),
        }
    }
}

/// Convenience alias for results using `LinkError`.
pub type Result<T> = std::result::Result<T, LinkError>;
