//! Транспортный уровень.
//!
//! Ядро видит pub/sub-и-журнал транспорт как внешнего участника с узким
//! контрактом: `publish`, `append_to_log`, `pipeline`, `subscribe`,
//! `unsubscribe`. Модули:
//!
//! - `memory`: внутрипроцессная реализация (hub) для тестов и embedded-сценариев.
//! - `pool`: дедупликация соединений по `(host, port, db, username)`.
//! - `retry`: ограниченный экспоненциальный backoff.

mod intern;
pub mod memory;
pub mod pool;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;

use crate::{ConnectionSettings, TransportError};

pub(crate) use intern::intern_channel;
pub use memory::{LogRecord, MemoryConnector, MemoryHub, MemoryTransport};
pub use pool::ConnectionPool;
pub use retry::{with_retry, RetryPolicy};

/// Режим соединения.
///
/// Соединение в режиме подписки не может выполнять обычные команды,
/// поэтому пул держит такие соединения отдельно.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionMode {
    Standard,
    Subscribe,
}

/// Сообщение broadcast-канала в сыром виде.
#[derive(Debug, Clone)]
pub struct TransportMessage {
    pub channel: Arc<str>,
    pub payload: Bytes,
}

impl TransportMessage {
    pub fn new(channel: impl Into<Arc<str>>, payload: impl Into<Bytes>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Единица пакетной доставки: команды выполняются в порядке добавления
/// внутри одного конвейерного round-trip.
#[derive(Debug, Clone)]
pub enum TransportCommand {
    Publish {
        channel: String,
        payload: Bytes,
    },
    Append {
        stream_key: String,
        fields: Vec<(String, String)>,
    },
}

/// Узкий контракт внешнего транспорта.
///
/// Возвращаемый `subscribe` приёмник жив, пока канал не удалён
/// `unsubscribe` и соединение не закрыто.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Режим, в котором было открыто соединение.
    fn mode(&self) -> ConnectionMode;

    /// Широковещательная публикация без durability.
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Добавляет запись в durable-журнал; возвращает id записи.
    async fn append_to_log(
        &self,
        stream_key: &str,
        fields: &[(String, String)],
    ) -> Result<String, TransportError>;

    /// Выполняет команды одним конвейером; первая ошибка прерывает
    /// остаток и поднимается как `PipelineAborted`.
    async fn pipeline(&self, commands: Vec<TransportCommand>) -> Result<(), TransportError>;

    /// Подписка на канал (только соединения в режиме подписки).
    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<broadcast::Receiver<TransportMessage>, TransportError>;

    /// Снимает подписку на канал.
    async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError>;

    /// Закрывает соединение; дальнейшие операции дают `Closed`.
    async fn close(&self);
}

/// Фабрика соединений, внедряемая в пул.
///
/// Хост-приложение подключает реальный транспорт, тесты — `MemoryConnector`.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        settings: &ConnectionSettings,
        mode: ConnectionMode,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}
