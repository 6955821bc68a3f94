//! Модель сообщений.
//!
//! - `envelope`: общий конверт (`MessageEnvelope`) и его билдер.
//! - `kind`: закрытое множество видов полезной нагрузки (tagged union).
//! - `state`: метка жизненного цикла диалога.
//! - `timestamp`: каноническое время (epoch-миллисекунды) с конверсией
//!   ISO-8601 на границе.

pub mod envelope;
pub mod kind;
pub mod state;
pub mod timestamp;

pub use envelope::{Correlation, EnvelopeBuilder, MessageEnvelope};
pub use kind::{KindTag, MessageKind, NodeEvent, NodeStatus, NoticeLevel};
pub use state::ConversationState;
pub use timestamp::Timestamp;
