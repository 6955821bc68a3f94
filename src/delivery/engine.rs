use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::{
    transport::{with_retry, RetryPolicy, Transport, TransportCommand},
    MessageEnvelope, PublishResult,
};

/// Движок доставки.
///
/// Разрешает канал назначения, один раз сериализует конверт и доставляет
/// его двумя путями в фиксированном порядке: (a) запись в durable-журнал
/// для потребителей с replay-семантикой, (b) broadcast для потребителей
/// с низкой задержкой.
///
/// Асимметрия fallback-а намеренная: сбой журнала не фатален — сообщение
/// уходит broadcast-ом без durability; фатален только сбой broadcast-а.
pub struct DeliveryEngine {
    transport: Arc<dyn Transport>,
    namespace: String,
    default_channel: String,
    durable: bool,
    retry: RetryPolicy,
}

impl DeliveryEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        namespace: impl Into<String>,
        default_channel: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            namespace: namespace.into(),
            default_channel: default_channel.into(),
            durable: true,
            retry: RetryPolicy::default(),
        }
    }

    /// Отключает durable-путь для деплойментов без журнала.
    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Явный канал вызова, иначе канал по умолчанию.
    pub fn resolve_channel<'a>(&'a self, channel: Option<&'a str>) -> &'a str {
        channel.unwrap_or(&self.default_channel)
    }

    /// Namespace-квалифицированное имя потока журнала для канала.
    pub fn stream_key(&self, channel: &str) -> String {
        format!("{}:log:{}", self.namespace, channel)
    }

    /// Поля записи журнала: канал, conversationId, временная метка и
    /// providerId дублируются вне JSON, чтобы потребитель мог фильтровать
    /// записи без десериализации полного конверта.
    fn log_fields(
        envelope: &MessageEnvelope,
        channel: &str,
        payload: &Bytes,
    ) -> Vec<(String, String)> {
        vec![
            ("channel".to_string(), channel.to_string()),
            (
                "conversationId".to_string(),
                envelope.conversation_id.clone(),
            ),
            ("timestamp".to_string(), envelope.timestamp.to_string()),
            ("providerId".to_string(), envelope.provider_id.clone()),
            (
                "payload".to_string(),
                String::from_utf8_lossy(payload).into_owned(),
            ),
        ]
    }

    /// Доставляет один конверт.
    ///
    /// Ошибка сериализации фатальна и возникает до любого I/O. Сбой
    /// журнала логируется и понижает доставку до broadcast-only; сбой
    /// broadcast-а (после ограниченных повторов) — единственная
    /// терминальная транспортная ошибка.
    pub async fn deliver(
        &self,
        envelope: &MessageEnvelope,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let channel = self.resolve_channel(channel);
        let payload = Bytes::from(serde_json::to_vec(envelope)?);

        if self.durable {
            let stream_key = self.stream_key(channel);
            let fields = Self::log_fields(envelope, channel, &payload);
            if let Err(err) = self.transport.append_to_log(&stream_key, &fields).await {
                warn!(
                    stream = %stream_key,
                    %err,
                    "durable append failed, falling back to broadcast-only delivery"
                );
            }
        }

        with_retry(&self.retry, || {
            self.transport.publish(channel, payload.clone())
        })
        .await?;

        trace!(channel, kind = %envelope.kind.tag(), id = %envelope.id, "message delivered");
        Ok(())
    }

    /// Пакетная доставка: все конверты сериализуются заранее, затем
    /// уходят одним конвейером в порядке добавления. Ошибка внутри
    /// конвейера прерывает остаток и поднимается единой ошибкой —
    /// частичный успех не сигнализируется и пакет не повторяется.
    pub async fn deliver_batch(
        &self,
        batch: &[(MessageEnvelope, Option<String>)],
    ) -> PublishResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut commands = Vec::with_capacity(batch.len() * 2);
        for (envelope, channel) in batch {
            let channel = self.resolve_channel(channel.as_deref());
            let payload = Bytes::from(serde_json::to_vec(envelope)?);
            if self.durable {
                commands.push(TransportCommand::Append {
                    stream_key: self.stream_key(channel),
                    fields: Self::log_fields(envelope, channel, &payload),
                });
            }
            commands.push(TransportCommand::Publish {
                channel: channel.to_string(),
                payload,
            });
        }

        self.transport.pipeline(commands).await?;
        debug!(count = batch.len(), "batch delivered");
        Ok(())
    }
}
