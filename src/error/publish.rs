use thiserror::Error;

use super::{ConfigError, TransportError};

/// Ошибка публикации сообщения.
///
/// Ошибки конструирования (`MissingCorrelation`, `Serialization`)
/// возникают синхронно, до любого сетевого вызова; транспортные —
/// асинхронно, как результат неудавшейся операции.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("missing required correlation field `{field}`")]
    MissingCorrelation { field: &'static str },

    #[error("message payload is not JSON-serializable: {0}")]
    Serialization(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialization(err.to_string())
    }
}

pub type PublishResult<T> = Result<T, PublishError>;
