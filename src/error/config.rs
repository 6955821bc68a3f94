use thiserror::Error;

/// Ошибка конфигурации: параметры подключения отсутствуют или некорректны.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("publisher registry was never supplied with connection parameters")]
    NotConfigured,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::InvalidEndpoint("host is empty".to_string()).to_string(),
            "invalid endpoint: host is empty"
        );
        assert_eq!(
            ConfigError::NotConfigured.to_string(),
            "publisher registry was never supplied with connection parameters"
        );
    }
}
