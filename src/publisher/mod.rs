//! Слой продюсеров: типизированные конструкторы сообщений по видам
//! и реестр-контейнер с одним публикатором на вид.

pub mod publisher;
pub mod registry;

pub use publisher::Publisher;
pub use registry::PublisherRegistry;
