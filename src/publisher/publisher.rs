use std::sync::Arc;

use serde_json::Value;

use crate::{
    delivery::DeliveryEngine,
    message::{
        Correlation, ConversationState, EnvelopeBuilder, KindTag, MessageEnvelope, MessageKind,
        NodeEvent, NodeStatus, NoticeLevel,
    },
    PublishResult,
};

/// Типизированный публикатор одного вида сообщений.
///
/// Тонкий слой над билдером конверта и движком доставки: каждый метод
/// собирает конверт с корректно заполненной полезной нагрузкой своего
/// вида — единственный способ выставить `kind`, не заполнив его поля.
/// Конверт после сборки не мутируется.
pub struct Publisher {
    tag: KindTag,
    identity: String,
    engine: Arc<DeliveryEngine>,
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("tag", &self.tag)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl Publisher {
    pub fn new(tag: KindTag, identity: impl Into<String>, engine: Arc<DeliveryEngine>) -> Self {
        Self {
            tag,
            identity: identity.into(),
            engine,
        }
    }

    /// Вид сообщений, под который создан этот публикатор.
    pub fn tag(&self) -> KindTag {
        self.tag
    }

    /// Идентификатор продюсера (providerId по умолчанию).
    pub fn identity(&self) -> &str {
        &self.identity
    }

    fn envelope(
        &self,
        correlation: &Correlation,
        state: ConversationState,
        kind: MessageKind,
    ) -> PublishResult<MessageEnvelope> {
        EnvelopeBuilder::new()
            .correlation(correlation)
            .provider_id(self.identity.clone())
            .state(state)
            .kind(kind)
            .build()
    }

    /// Отправляет заранее собранный конверт без изменений.
    pub async fn send(
        &self,
        envelope: MessageEnvelope,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        self.engine.deliver(&envelope, channel).await
    }

    /// Пакетная отправка в порядке добавления.
    pub async fn send_batch(
        &self,
        envelopes: Vec<MessageEnvelope>,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let batch: Vec<_> = envelopes
            .into_iter()
            .map(|envelope| (envelope, channel.map(str::to_string)))
            .collect();
        self.engine.deliver_batch(&batch).await
    }

    /// Обычный текст.
    pub async fn text(
        &self,
        correlation: &Correlation,
        text: impl Into<String>,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let envelope = self.envelope(
            correlation,
            ConversationState::Responding,
            MessageKind::Text { text: text.into() },
        )?;
        self.engine.deliver(&envelope, channel).await
    }

    /// Фрагмент потокового текста.
    pub async fn stream_chunk(
        &self,
        correlation: &Correlation,
        text: impl Into<String>,
        sequence: Option<u64>,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let envelope = self.envelope(
            correlation,
            ConversationState::Responding,
            MessageKind::StreamChunk {
                text: text.into(),
                sequence,
            },
        )?;
        self.engine.deliver(&envelope, channel).await
    }

    /// Структурированный JSON.
    pub async fn structured(
        &self,
        correlation: &Correlation,
        data: Value,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let envelope = self.envelope(
            correlation,
            ConversationState::Active,
            MessageKind::StructuredData { data },
        )?;
        self.engine.deliver(&envelope, channel).await
    }

    /// Результат выполнения инструмента.
    pub async fn tool_result(
        &self,
        correlation: &Correlation,
        tool: impl Into<String>,
        result: Value,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let envelope = self.envelope(
            correlation,
            ConversationState::Active,
            MessageKind::ToolResult {
                tool: tool.into(),
                result,
            },
        )?;
        self.engine.deliver(&envelope, channel).await
    }

    /// Ссылка на изображение.
    pub async fn image(
        &self,
        correlation: &Correlation,
        url: impl Into<String>,
        alt: Option<String>,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let envelope = self.envelope(
            correlation,
            ConversationState::Responding,
            MessageKind::Image {
                url: url.into(),
                alt,
            },
        )?;
        self.engine.deliver(&envelope, channel).await
    }

    /// Аудио-фрагмент с обратной ссылкой на озвученный текст.
    #[allow(clippy::too_many_arguments)]
    pub async fn audio(
        &self,
        correlation: &Correlation,
        audio: impl Into<String>,
        format: impl Into<String>,
        duration: Option<f64>,
        text: Option<String>,
        source_kind: Option<String>,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let envelope = self.envelope(
            correlation,
            ConversationState::Responding,
            MessageKind::Audio {
                audio: audio.into(),
                format: format.into(),
                duration,
                text,
                source_kind,
            },
        )?;
        self.engine.deliver(&envelope, channel).await
    }

    /// Прогресс длительной операции; значение ограничивается 0–100.
    pub async fn progress(
        &self,
        correlation: &Correlation,
        message: impl Into<String>,
        progress: u8,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let envelope = self.envelope(
            correlation,
            ConversationState::Active,
            MessageKind::ProgressUpdate {
                message: message.into(),
                progress: progress.min(100),
            },
        )?;
        self.engine.deliver(&envelope, channel).await
    }

    /// Предложение действия.
    pub async fn action(
        &self,
        correlation: &Correlation,
        action: impl Into<String>,
        payload: Value,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let envelope = self.envelope(
            correlation,
            ConversationState::Active,
            MessageKind::ActionSuggestion {
                action: action.into(),
                payload,
            },
        )?;
        self.engine.deliver(&envelope, channel).await
    }

    /// Системное уведомление.
    pub async fn notice(
        &self,
        correlation: &Correlation,
        message: impl Into<String>,
        level: NoticeLevel,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let envelope = self.envelope(
            correlation,
            ConversationState::Active,
            MessageKind::SystemNotice {
                message: message.into(),
                level,
            },
        )?;
        self.engine.deliver(&envelope, channel).await
    }

    /// Карточка UI; spec не валидируется сверх того, что это JSON.
    pub async fn card(
        &self,
        correlation: &Correlation,
        spec: Value,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let envelope = self.envelope(
            correlation,
            ConversationState::Active,
            MessageKind::Card { spec },
        )?;
        self.engine.deliver(&envelope, channel).await
    }

    /// Вопрос пользователю: диалог переходит в ожидание ответа.
    pub async fn question(
        &self,
        correlation: &Correlation,
        spec: Value,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let envelope = self.envelope(
            correlation,
            ConversationState::Waiting,
            MessageKind::Question { spec },
        )?;
        self.engine.deliver(&envelope, channel).await
    }

    /// Форма ввода: диалог переходит в ожидание ответа.
    pub async fn form(
        &self,
        correlation: &Correlation,
        spec: Value,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let envelope = self.envelope(
            correlation,
            ConversationState::Waiting,
            MessageKind::Form { spec },
        )?;
        self.engine.deliver(&envelope, channel).await
    }

    /// Трассировка выполнения узла workflow.
    pub async fn node_event(
        &self,
        correlation: &Correlation,
        event: NodeEvent,
        channel: Option<&str>,
    ) -> PublishResult<()> {
        let state = if event.status == NodeStatus::Error {
            ConversationState::Error
        } else {
            ConversationState::Active
        };
        let envelope = self.envelope(correlation, state, event.into_kind())?;
        self.engine.deliver(&envelope, channel).await
    }
}
