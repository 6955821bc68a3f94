use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{ConversationState, MessageKind, Timestamp};
use crate::{PublishError, PublishResult};

/// Обязательные корреляционные идентификаторы.
///
/// Привязывают сообщение к контексту диалога; никогда не подставляются
/// по умолчанию — их отсутствие всегда ошибка вызывающего.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub chat_id: String,
    pub conversation_id: String,
    pub user_id: String,
}

impl Correlation {
    pub fn new(
        chat_id: impl Into<String>,
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Общий конверт каждого сообщения, независимо от вида.
///
/// Неизменяем после конструирования: публикация никогда не мутирует
/// уже построенный конверт. На проводе — UTF-8 JSON, поля конверта
/// в camelCase, поля полезной нагрузки рядом, дискриминант — `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    /// Уникальный идентификатор сообщения (uuid v4, если не задан)
    pub id: String,
    /// Идентификатор чата
    pub chat_id: String,
    /// Идентификатор диалога
    pub conversation_id: String,
    /// Идентификатор пользователя
    pub user_id: String,
    /// Какой продюсер выпустил сообщение
    pub provider_id: String,
    /// Момент создания, epoch-миллисекунды
    pub timestamp: Timestamp,
    /// Метка жизненного цикла диалога
    pub state: ConversationState,
    /// Открытый мешок ключ/значение (опционально)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Полезная нагрузка, разложенная рядом с полями конверта
    #[serde(flatten)]
    pub kind: MessageKind,
}

/// Билдер конверта. Чистое конструирование, без I/O.
///
/// `build` падает с `MissingCorrelation`, если отсутствует любой из
/// `chatId`/`conversationId`/`userId` (пустая строка считается
/// отсутствием) либо не задан `kind` — у «голого» билдера нет
/// однозначного вида по умолчанию, его задают типизированные
/// публикаторы.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeBuilder {
    id: Option<String>,
    chat_id: Option<String>,
    conversation_id: Option<String>,
    user_id: Option<String>,
    provider_id: Option<String>,
    timestamp: Option<Timestamp>,
    state: Option<ConversationState>,
    metadata: Option<Map<String, Value>>,
    kind: Option<MessageKind>,
}

impl EnvelopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    pub fn conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Задаёт все три корреляционных идентификатора разом.
    pub fn correlation(self, correlation: &Correlation) -> Self {
        self.chat_id(correlation.chat_id.clone())
            .conversation_id(correlation.conversation_id.clone())
            .user_id(correlation.user_id.clone())
    }

    pub fn provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn state(mut self, state: ConversationState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn kind(mut self, kind: MessageKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Собирает конверт, проверяя обязательные поля до любого I/O.
    pub fn build(self) -> PublishResult<MessageEnvelope> {
        let chat_id = require(self.chat_id, "chatId")?;
        let conversation_id = require(self.conversation_id, "conversationId")?;
        let user_id = require(self.user_id, "userId")?;
        let kind = self
            .kind
            .ok_or(PublishError::MissingCorrelation { field: "kind" })?;

        Ok(MessageEnvelope {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            chat_id,
            conversation_id,
            user_id,
            provider_id: self
                .provider_id
                .unwrap_or_else(|| "unknown".to_string()),
            timestamp: self.timestamp.unwrap_or_else(Timestamp::now),
            state: self.state.unwrap_or_default(),
            metadata: self.metadata,
            kind,
        })
    }
}

fn require(value: Option<String>, field: &'static str) -> PublishResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PublishError::MissingCorrelation { field }),
    }
}
