use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid object path \"{path}\": {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Storage I/O error at \"{path}\": {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage provider misconfigured: {0}")]
    Misconfigured(String),

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
