//! Параметры подключения к транспорту.
//!
//! Ядро не читает файлы конфигурации и переменные окружения —
//! значения всегда передаёт хост-приложение.

pub mod settings;

pub use settings::{ConnectionSettings, EndpointKey};
