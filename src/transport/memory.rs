use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use super::{
    intern_channel, ConnectionMode, Connector, Transport, TransportCommand, TransportMessage,
};
use crate::{ConnectionSettings, EndpointKey, TransportError};

type ChannelKey = Arc<str>;

/// Запись durable-журнала.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Монотонно возрастающий идентификатор записи
    pub entry_id: String,
    /// Пары поле/значение, как их положил продюсер
    pub fields: Vec<(String, String)>,
}

/// Внутрипроцессный транспорт: broadcast-каналы плюс append-only журналы.
///
/// Поддерживает:
/// - Точные подписки по имени канала
/// - Durable-журналы с монотонными id записей
/// - Автоматическое удаление каналов без подписчиков
/// - Статистику публикаций и инъекцию сбоев для тестов
pub struct MemoryHub {
    /// Каналы → `Sender`
    channels: DashMap<ChannelKey, broadcast::Sender<TransportMessage>>,
    /// Журналы → записи
    streams: DashMap<String, Vec<LogRecord>>,
    /// Ёмкость буфера каждого `broadcast::channel`
    default_capacity: usize,
    /// Счётчик для id записей журнала
    next_entry: AtomicU64,
    /// Общее количество успешных `publish`
    pub publish_count: AtomicUsize,
    /// Общее количество успешных `append`
    pub append_count: AtomicUsize,
    /// Количество неудачных `send` (нет подписчиков)
    pub send_error_count: AtomicUsize,
    /// Инъекция сбоя durable-журнала
    fail_appends: AtomicBool,
    /// Инъекция сбоя broadcast-публикации
    fail_publishes: AtomicBool,
}

impl MemoryHub {
    /// Создаёт новый hub с заданной буферной ёмкостью каналов.
    pub fn new(default_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            channels: DashMap::new(),
            streams: DashMap::new(),
            default_capacity,
            next_entry: AtomicU64::new(1),
            publish_count: AtomicUsize::new(0),
            append_count: AtomicUsize::new(0),
            send_error_count: AtomicUsize::new(0),
            fail_appends: AtomicBool::new(false),
            fail_publishes: AtomicBool::new(false),
        })
    }

    /// Включает/выключает имитацию сбоя журнала (для тестов fallback-а).
    pub fn fail_appends(&self, enabled: bool) {
        self.fail_appends.store(enabled, Ordering::SeqCst);
    }

    /// Включает/выключает имитацию сбоя broadcast-публикации.
    pub fn fail_publishes(&self, enabled: bool) {
        self.fail_publishes.store(enabled, Ordering::SeqCst);
    }

    /// Копия журнала по ключу (пустой вектор, если журнала нет).
    pub fn stream(&self, stream_key: &str) -> Vec<LogRecord> {
        self.streams
            .get(stream_key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Количество записей в журнале.
    pub fn stream_len(&self, stream_key: &str) -> usize {
        self.streams
            .get(stream_key)
            .map(|entry| entry.value().len())
            .unwrap_or(0)
    }

    /// Есть ли активный broadcast-канал с таким именем.
    pub fn channel_exists(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Число активных подписчиков канала.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|entry| entry.value().receiver_count())
            .unwrap_or(0)
    }

    fn do_publish(&self, channel: &str, payload: Bytes) -> Result<(), TransportError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed {
                address: "<memory>".to_string(),
                reason: "publish failure injected".to_string(),
            });
        }
        self.publish_count.fetch_add(1, Ordering::Relaxed);

        if let Some(entry) = self.channels.get_mut(channel) {
            let tx = entry.value().clone();
            let msg = TransportMessage::new(entry.key().clone(), payload);
            if tx.send(msg).is_err() {
                self.send_error_count.fetch_add(1, Ordering::Relaxed);
            }
            // каналы без подписчиков удаляются, чтобы не копить мёртвые Sender-ы
            if tx.receiver_count() == 0 {
                let key = entry.key().clone();
                drop(entry);
                self.channels.remove(&*key);
            }
        }
        Ok(())
    }

    fn do_append(
        &self,
        stream_key: &str,
        fields: &[(String, String)],
    ) -> Result<String, TransportError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed {
                address: "<memory>".to_string(),
                reason: "append failure injected".to_string(),
            });
        }
        self.append_count.fetch_add(1, Ordering::Relaxed);

        let seq = self.next_entry.fetch_add(1, Ordering::Relaxed);
        let entry_id = format!("{seq}-0");
        self.streams
            .entry(stream_key.to_string())
            .or_default()
            .push(LogRecord {
                entry_id: entry_id.clone(),
                fields: fields.to_vec(),
            });
        trace!(stream = stream_key, entry = %entry_id, "log entry appended");
        Ok(entry_id)
    }

    fn do_subscribe(&self, channel: &str) -> broadcast::Receiver<TransportMessage> {
        let key: ChannelKey = intern_channel(channel);
        self.channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(self.default_capacity).0)
            .subscribe()
    }

    fn do_unsubscribe(&self, channel: &str) {
        self.channels.remove(channel);
    }
}

/// Одно соединение с hub-ом в фиксированном режиме.
///
/// Дисциплина режимов повторяет транспортную: соединение в режиме
/// подписки отвергает обычные команды, стандартное — подписки.
pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    mode: ConnectionMode,
    closed: AtomicBool,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("mode", &self.mode)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl MemoryTransport {
    pub fn new(hub: Arc<MemoryHub>, mode: ConnectionMode) -> Self {
        Self {
            hub,
            mode,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn ensure_standard(&self) -> Result<(), TransportError> {
        self.ensure_open()?;
        if self.mode != ConnectionMode::Standard {
            return Err(TransportError::SubscribeMode);
        }
        Ok(())
    }

    fn ensure_subscriber(&self) -> Result<(), TransportError> {
        self.ensure_open()?;
        if self.mode != ConnectionMode::Subscribe {
            return Err(TransportError::NotSubscriber);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn mode(&self) -> ConnectionMode {
        self.mode
    }

    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), TransportError> {
        self.ensure_standard()?;
        self.hub.do_publish(channel, payload)
    }

    async fn append_to_log(
        &self,
        stream_key: &str,
        fields: &[(String, String)],
    ) -> Result<String, TransportError> {
        self.ensure_standard()?;
        self.hub.do_append(stream_key, fields)
    }

    async fn pipeline(&self, commands: Vec<TransportCommand>) -> Result<(), TransportError> {
        self.ensure_standard()?;
        for (index, command) in commands.into_iter().enumerate() {
            let result = match command {
                TransportCommand::Publish { channel, payload } => {
                    self.hub.do_publish(&channel, payload)
                }
                TransportCommand::Append { stream_key, fields } => {
                    self.hub.do_append(&stream_key, &fields).map(|_| ())
                }
            };
            if let Err(err) = result {
                return Err(TransportError::PipelineAborted {
                    index,
                    reason: err.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<broadcast::Receiver<TransportMessage>, TransportError> {
        self.ensure_subscriber()?;
        Ok(self.hub.do_subscribe(channel))
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.ensure_subscriber()?;
        self.hub.do_unsubscribe(channel);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Фабрика соединений с общим hub-ом.
///
/// Считает установленные соединения по ключу эндпоинта, чтобы тесты
/// пула могли проверять дедупликацию, и умеет имитировать серию
/// неудачных подключений для тестов backoff-а.
pub struct MemoryConnector {
    hub: Arc<MemoryHub>,
    connects: DashMap<EndpointKey, usize>,
    fail_next: AtomicUsize,
}

impl MemoryConnector {
    pub fn new(hub: Arc<MemoryHub>) -> Self {
        Self {
            hub,
            connects: DashMap::new(),
            fail_next: AtomicUsize::new(0),
        }
    }

    /// Следующие `count` подключений завершатся ошибкой.
    pub fn fail_next_connects(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Сколько соединений было установлено для данного эндпоинта.
    pub fn connects_for(&self, key: &EndpointKey) -> usize {
        self.connects.get(key).map(|entry| *entry.value()).unwrap_or(0)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        settings: &ConnectionSettings,
        mode: ConnectionMode,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::ConnectionFailed {
                address: settings.address(),
                reason: "connect failure injected".to_string(),
            });
        }

        *self.connects.entry(settings.endpoint_key()).or_insert(0) += 1;
        Ok(Arc::new(MemoryTransport::new(self.hub.clone(), mode)))
    }
}
