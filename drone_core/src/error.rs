use std::error::Error as StdError;

/// Common error type for `drone_core`.
///
/// Warehouse and feed implementations should preserve the underlying error
/// chain where possible via `Error::fetch` / `Error::storage`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("fetch error: {context}")]
    Fetch {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("fetch error: {0}")]
    FetchMessage(String),

    #[error("storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    #[error("storage error: {0}")]
    StorageMessage(String),

    #[error("cancelled during {0}")]
    Cancelled(String),
}

/// Coarse error category, stable across the message/source variants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    InvalidInput,
    Fetch,
    Storage,
    Cancelled,
}

impl Error {
    #[tracing::instrument(level = "debug", name = "drone.error.fetch", skip(source))]
    pub fn fetch(
        context: impl Into<String> + std::fmt::Debug,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Fetch {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[tracing::instrument(level = "debug", name = "drone.error.storage", skip(source))]
    pub fn storage(
        context: impl Into<String> + std::fmt::Debug,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Fetch { .. } | Error::FetchMessage(_) => ErrorKind::Fetch,
            Error::Storage { .. } | Error::StorageMessage(_) => ErrorKind::Storage,
            Error::Cancelled(_) => ErrorKind::Cancelled,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
