use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use tokio::{sync::broadcast, sync::Mutex, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    transport::{Transport, TransportMessage},
    MessageEnvelope, RecvError, TransportError,
};

/// Входящее сообщение, уже десериализованное для обработчиков.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel: Arc<str>,
    pub envelope: MessageEnvelope,
}

type Handler = Arc<dyn Fn(InboundMessage) -> anyhow::Result<()> + Send + Sync>;
type SharedHandlers = Arc<RwLock<Vec<(u64, Handler)>>>;

struct ChannelEntry {
    handlers: SharedHandlers,
    next_id: u64,
    task: JoinHandle<()>,
}

type ChannelMap = Arc<Mutex<HashMap<String, ChannelEntry>>>;

/// Двунаправленный менеджер подписок.
///
/// Транспортная подписка на канал выполняется один раз — при первом
/// обработчике — и снимается один раз, когда отписывается последний
/// (подсчёт по размеру множества обработчиков). Сообщение в канал без
/// обработчиков молча отбрасывается: подписки нет, буферизации нет.
pub struct EventBus {
    transport: Arc<dyn Transport>,
    channels: ChannelMap,
}

impl EventBus {
    /// Создаёт шину поверх соединения в режиме подписки.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Регистрирует обработчик на канал.
    ///
    /// Ошибка обработчика логируется и не мешает остальным обработчикам
    /// того же события. Возвращённый guard отписывает обработчик явно
    /// (`unsubscribe`, идемпотентно) или при Drop.
    pub async fn subscribe<F>(
        &self,
        channel: &str,
        handler: F,
    ) -> Result<Subscription, TransportError>
    where
        F: Fn(InboundMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let mut channels = self.channels.lock().await;

        if let Some(entry) = channels.get_mut(channel) {
            let id = entry.next_id;
            entry.next_id += 1;
            entry.handlers.write().push((id, handler));
            debug!(
                channel,
                handlers = entry.handlers.read().len(),
                "handler registered on existing subscription"
            );
            return Ok(Subscription::new(
                channel.to_string(),
                id,
                self.channels.clone(),
                self.transport.clone(),
            ));
        }

        // первый обработчик канала: подписываем транспорт и поднимаем
        // задачу диспетчеризации
        let rx = self.transport.subscribe(channel).await?;
        let handlers: SharedHandlers = Arc::new(RwLock::new(vec![(0, handler)]));
        let task = tokio::spawn(dispatch_loop(channel.to_string(), rx, handlers.clone()));
        channels.insert(
            channel.to_string(),
            ChannelEntry {
                handlers,
                next_id: 1,
                task,
            },
        );
        debug!(channel, "transport subscription issued");

        Ok(Subscription::new(
            channel.to_string(),
            0,
            self.channels.clone(),
            self.transport.clone(),
        ))
    }

    /// Число обработчиков канала (для диагностики и тестов).
    pub async fn handler_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .await
            .get(channel)
            .map(|entry| entry.handlers.read().len())
            .unwrap_or(0)
    }

    /// Есть ли активная транспортная подписка на канал.
    pub async fn is_subscribed(&self, channel: &str) -> bool {
        self.channels.lock().await.contains_key(channel)
    }

    /// Снимает все подписки и останавливает диспетчеризацию.
    pub async fn close(&self) {
        let drained: Vec<(String, ChannelEntry)> =
            self.channels.lock().await.drain().collect();
        for (channel, entry) in drained {
            entry.task.abort();
            if let Err(err) = self.transport.unsubscribe(&channel).await {
                debug!(channel = %channel, %err, "transport unsubscribe failed during close");
            }
        }
    }
}

/// Цикл диспетчеризации одного канала.
///
/// Неразбираемые payload-ы логируются и отбрасываются, не убивая цикл.
/// Список обработчиков снимается под локом, вызывается — вне его,
/// поэтому отписка во время диспетчеризации безопасна.
async fn dispatch_loop(
    channel: String,
    mut rx: broadcast::Receiver<TransportMessage>,
    handlers: SharedHandlers,
) {
    loop {
        match rx.recv().await {
            Ok(msg) => {
                let envelope: MessageEnvelope = match serde_json::from_slice(&msg.payload) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        let err = RecvError::Malformed(err.to_string());
                        warn!(channel = %channel, %err, "dropping inbound message");
                        continue;
                    }
                };
                let inbound = InboundMessage {
                    channel: msg.channel,
                    envelope,
                };
                let snapshot: Vec<Handler> =
                    handlers.read().iter().map(|(_, h)| h.clone()).collect();
                for handler in snapshot {
                    if let Err(err) = handler(inbound.clone()) {
                        warn!(channel = %channel, %err, "event handler failed");
                    }
                }
            }
            Err(err) => match RecvError::from(err) {
                RecvError::Lagged(missed) => {
                    warn!(channel = %channel, missed, "subscriber lagged, messages dropped");
                }
                _ => {
                    debug!(channel = %channel, "broadcast closed, dispatch loop exiting");
                    break;
                }
            },
        }
    }
}

struct SubscriptionInner {
    channel: String,
    id: u64,
    channels: ChannelMap,
    transport: Arc<dyn Transport>,
    released: AtomicBool,
}

/// Guard одной подписки обработчика.
///
/// `unsubscribe` идемпотентна; когда отписывается последний обработчик
/// канала, снимается и транспортная подписка.
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    fn new(channel: String, id: u64, channels: ChannelMap, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                channel,
                id,
                channels,
                transport,
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Имя канала, на который подписан обработчик.
    pub fn channel(&self) -> &str {
        &self.inner.channel
    }

    /// Явно отписывает обработчик. Повторные вызовы — no-op.
    pub async fn unsubscribe(&self) {
        Self::release(&self.inner).await;
    }

    async fn release(inner: &Arc<SubscriptionInner>) {
        if inner.released.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut channels = inner.channels.lock().await;
        let teardown = if let Some(entry) = channels.get_mut(&inner.channel) {
            entry.handlers.write().retain(|(id, _)| *id != inner.id);
            entry.handlers.read().is_empty()
        } else {
            false
        };

        if teardown {
            if let Some(entry) = channels.remove(&inner.channel) {
                entry.task.abort();
            }
            drop(channels);
            if let Err(err) = inner.transport.unsubscribe(&inner.channel).await {
                warn!(channel = %inner.channel, %err, "transport unsubscribe failed");
            }
            debug!(channel = %inner.channel, "last handler removed, channel subscription torn down");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.inner.released.load(Ordering::SeqCst) {
            return;
        }
        // вне рантайма отпускать нечем; обработчик доживёт до close()
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let inner = self.inner.clone();
            let _ = handle.spawn(async move {
                Subscription::release(&inner).await;
            });
        }
    }
}
