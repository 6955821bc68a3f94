use serde::{Deserialize, Serialize};

/// Метка жизненного цикла диалога, а не состояния доставки сообщения.
///
/// На проводе сериализуется в ВЕРХНЕМ РЕГИСТРЕ (`"THINKING"` и т.д.).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversationState {
    Idle,
    #[default]
    Active,
    Thinking,
    Responding,
    Waiting,
    Complete,
    Error,
    Cancelled,
}
