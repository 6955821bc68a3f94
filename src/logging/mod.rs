use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Конфигурация логирования хост-приложения.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Уровень по умолчанию (перекрывается переменной RUST_LOG)
    pub level: String,
    /// Печатать в консоль
    pub console: bool,
    /// Файл для неблокирующей записи (опционально)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            file: None,
        }
    }
}

/// Handle для управления lifecycle логирования.
///
/// Держит `WorkerGuard` файлового писателя: пока handle жив,
/// буферизованные записи гарантированно доезжают до файла.
pub struct LoggingHandle {
    _file_guard: Option<WorkerGuard>,
}

/// Инициализация логирования с конфигурацией.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingHandle, Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let mut layers = Vec::new();
    if config.console {
        let console_layer = tracing_subscriber::fmt::layer().with_target(true).boxed();
        layers.push(console_layer);
    }

    let mut file_guard = None;
    if let Some(path) = &config.file {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = path
            .file_name()
            .unwrap_or_else(|| OsStr::new("vestnik.log"));
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .boxed();
        layers.push(file_layer);
        file_guard = Some(guard);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        file_enabled = config.file.is_some(),
        "logging initialized"
    );

    Ok(LoggingHandle {
        _file_guard: file_guard,
    })
}
