use thiserror::Error;

/// Ошибка транспортного уровня: установление соединения, команды,
/// дисциплина режимов соединений.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to connect to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("transport retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("operation exceeded the specified timeout")]
    Timeout,

    #[error("ordinary command issued on a subscribe-mode connection")]
    SubscribeMode,

    #[error("subscribe issued on a standard-mode connection")]
    NotSubscriber,

    #[error("connection is closed")]
    Closed,

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("pipeline aborted at command {index}: {reason}")]
    PipelineAborted { index: usize, reason: String },
}

impl TransportError {
    /// Имеет ли смысл повторять операцию: сетевые сбои и таймауты —
    /// временные, нарушения дисциплины режимов и прерванные конвейеры — нет.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionFailed { .. } | TransportError::Timeout
        )
    }
}
