use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Закрытое множество видов полезной нагрузки.
///
/// Дискриминант `kind` сериализуется внутренним тегом и на стороне
/// потребителя однозначно выбирает путь отрисовки. Поля варианта
/// ложатся на провод рядом с полями конверта.
///
/// Спецификации `Card` / `Question` / `Form` — намеренно непрозрачный
/// JSON: их структуру определяет потребитель, ядро её не валидирует.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MessageKind {
    /// Обычный текст.
    Text { text: String },

    /// Фрагмент потокового текста; `sequence` позволяет потребителю
    /// восстановить порядок.
    StreamChunk {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        sequence: Option<u64>,
    },

    /// Произвольный структурированный JSON.
    StructuredData { data: Value },

    /// Результат выполнения инструмента.
    ToolResult { tool: String, result: Value },

    /// Ссылка на изображение.
    Image {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        alt: Option<String>,
    },

    /// Аудио-фрагмент: base64-полезная нагрузка, формат, длительность
    /// и обратная ссылка на текст, который он озвучивает.
    #[serde(rename_all = "camelCase")]
    Audio {
        audio: String,
        format: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_kind: Option<String>,
    },

    /// Прогресс длительной операции, 0–100.
    ProgressUpdate { message: String, progress: u8 },

    /// Предложение действия для клиента.
    ActionSuggestion { action: String, payload: Value },

    /// Системное уведомление.
    SystemNotice { message: String, level: NoticeLevel },

    /// Карточка UI (структура определяется потребителем).
    Card { spec: Value },

    /// Вопрос пользователю (структура определяется потребителем).
    Question { spec: Value },

    /// Форма ввода (структура определяется потребителем).
    Form { spec: Value },

    /// Трассировка выполнения узла workflow.
    #[serde(rename_all = "camelCase")]
    NodeExecution {
        workflow_id: String,
        execution_id: String,
        node_id: String,
        node_type: String,
        status: NodeStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        outputs: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Уровень системного уведомления.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Стадия выполнения узла workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    Started,
    Completed,
    Error,
}

/// Событие выполнения узла в форме, удобной для продюсера:
/// все поля варианта `NodeExecution` одним значением.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEvent {
    pub workflow_id: String,
    pub execution_id: String,
    pub node_id: String,
    pub node_type: String,
    pub status: NodeStatus,
    pub duration_ms: Option<u64>,
    pub outputs: Option<Value>,
    pub error: Option<String>,
}

impl NodeEvent {
    pub fn into_kind(self) -> MessageKind {
        MessageKind::NodeExecution {
            workflow_id: self.workflow_id,
            execution_id: self.execution_id,
            node_id: self.node_id,
            node_type: self.node_type,
            status: self.status,
            duration_ms: self.duration_ms,
            outputs: self.outputs,
            error: self.error,
        }
    }
}

/// Безполевое зеркало дискриминантов `MessageKind`.
///
/// Используется как ключ в реестре публикаторов: один публикатор
/// на каждый вид сообщения.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindTag {
    Text,
    StreamChunk,
    StructuredData,
    ToolResult,
    Image,
    Audio,
    ProgressUpdate,
    ActionSuggestion,
    SystemNotice,
    Card,
    Question,
    Form,
    NodeExecution,
}

impl KindTag {
    /// Все известные виды, в порядке объявления.
    pub const ALL: [KindTag; 13] = [
        KindTag::Text,
        KindTag::StreamChunk,
        KindTag::StructuredData,
        KindTag::ToolResult,
        KindTag::Image,
        KindTag::Audio,
        KindTag::ProgressUpdate,
        KindTag::ActionSuggestion,
        KindTag::SystemNotice,
        KindTag::Card,
        KindTag::Question,
        KindTag::Form,
        KindTag::NodeExecution,
    ];

    /// Строка дискриминанта — ровно та, что уходит на провод в `kind`.
    pub fn as_str(&self) -> &'static str {
        match self {
            KindTag::Text => "Text",
            KindTag::StreamChunk => "StreamChunk",
            KindTag::StructuredData => "StructuredData",
            KindTag::ToolResult => "ToolResult",
            KindTag::Image => "Image",
            KindTag::Audio => "Audio",
            KindTag::ProgressUpdate => "ProgressUpdate",
            KindTag::ActionSuggestion => "ActionSuggestion",
            KindTag::SystemNotice => "SystemNotice",
            KindTag::Card => "Card",
            KindTag::Question => "Question",
            KindTag::Form => "Form",
            KindTag::NodeExecution => "NodeExecution",
        }
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MessageKind {
    /// Дискриминант полезной нагрузки.
    pub fn tag(&self) -> KindTag {
        match self {
            MessageKind::Text { .. } => KindTag::Text,
            MessageKind::StreamChunk { .. } => KindTag::StreamChunk,
            MessageKind::StructuredData { .. } => KindTag::StructuredData,
            MessageKind::ToolResult { .. } => KindTag::ToolResult,
            MessageKind::Image { .. } => KindTag::Image,
            MessageKind::Audio { .. } => KindTag::Audio,
            MessageKind::ProgressUpdate { .. } => KindTag::ProgressUpdate,
            MessageKind::ActionSuggestion { .. } => KindTag::ActionSuggestion,
            MessageKind::SystemNotice { .. } => KindTag::SystemNotice,
            MessageKind::Card { .. } => KindTag::Card,
            MessageKind::Question { .. } => KindTag::Question,
            MessageKind::Form { .. } => KindTag::Form,
            MessageKind::NodeExecution { .. } => KindTag::NodeExecution,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Тест проверяет, что дискриминант на проводе совпадает
    /// со строкой соответствующего тега.
    #[test]
    fn test_discriminant_matches_tag_string() {
        let samples = vec![
            MessageKind::Text {
                text: "hi".to_string(),
            },
            MessageKind::StreamChunk {
                text: "par".to_string(),
                sequence: Some(4),
            },
            MessageKind::ProgressUpdate {
                message: "indexing".to_string(),
                progress: 75,
            },
            MessageKind::Card { spec: json!({}) },
        ];

        for kind in samples {
            let value = serde_json::to_value(&kind).unwrap();
            assert_eq!(value["kind"], kind.tag().as_str());
        }
    }

    /// Тест проверяет camelCase-поля варианта NodeExecution на проводе.
    #[test]
    fn test_node_execution_wire_fields() {
        let kind = NodeEvent {
            workflow_id: "wf-1".to_string(),
            execution_id: "ex-9".to_string(),
            node_id: "n-3".to_string(),
            node_type: "httpRequest".to_string(),
            status: NodeStatus::Completed,
            duration_ms: Some(120),
            outputs: Some(json!({"status": 200})),
            error: None,
        }
        .into_kind();

        let value = serde_json::to_value(&kind).unwrap();
        assert_eq!(value["kind"], "NodeExecution");
        assert_eq!(value["workflowId"], "wf-1");
        assert_eq!(value["executionId"], "ex-9");
        assert_eq!(value["nodeId"], "n-3");
        assert_eq!(value["nodeType"], "httpRequest");
        assert_eq!(value["status"], "COMPLETED");
        assert_eq!(value["durationMs"], 120);
        // отсутствующие опциональные поля не сериализуются
        assert!(value.get("error").is_none());
    }

    /// Тест проверяет представление уровня уведомления и аудио-полей.
    #[test]
    fn test_notice_level_and_audio_fields() {
        let notice = MessageKind::SystemNotice {
            message: "disk almost full".to_string(),
            level: NoticeLevel::Warning,
        };
        let value = serde_json::to_value(&notice).unwrap();
        assert_eq!(value["level"], "warning");

        let audio = MessageKind::Audio {
            audio: "UklGRg==".to_string(),
            format: "wav".to_string(),
            duration: Some(1.5),
            text: Some("hello".to_string()),
            source_kind: Some("Text".to_string()),
        };
        let value = serde_json::to_value(&audio).unwrap();
        assert_eq!(value["sourceKind"], "Text");
        assert_eq!(value["format"], "wav");
    }

    /// Тест проверяет, что tag() покрывает все варианты из ALL.
    #[test]
    fn test_tag_covers_all_variants() {
        assert_eq!(KindTag::ALL.len(), 13);
        for tag in KindTag::ALL {
            assert!(!tag.as_str().is_empty());
        }
    }

    /// Тест проверяет round-trip произвольной карточки: её JSON
    /// не валидируется и возвращается байт-в-байт тем же значением.
    #[test]
    fn test_opaque_card_spec_roundtrip() {
        let spec = json!({"title": "Result", "rows": [{"k": "v"}], "深": true});
        let kind = MessageKind::Card { spec: spec.clone() };

        let encoded = serde_json::to_string(&kind).unwrap();
        let decoded: MessageKind = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, MessageKind::Card { spec });
    }
}
