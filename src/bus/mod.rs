//! Шина событий: подписка обработчиков на каналы и диспетчеризация
//! входящих broadcast-сообщений.

pub mod event_bus;

pub use event_bus::{EventBus, InboundMessage, Subscription};
