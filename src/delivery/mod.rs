//! Доставка сообщений: разрешение канала, сериализация и двухпутевая
//! публикация (durable-журнал + broadcast) с асимметричным fallback-ом.

pub mod engine;

pub use engine::DeliveryEngine;
