use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Параметры подключения к транспорту, передаваемые хост-приложением.
///
/// `identity` — идентификатор продюсера: он становится `providerId`
/// по умолчанию для всех публикуемых сообщений.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Хост транспорта
    pub host: String,
    /// Порт транспорта
    pub port: u16,
    /// Номер логической базы
    pub db: u32,
    /// Имя пользователя (опционально)
    pub username: Option<String>,
    /// Пароль (опционально)
    pub password: Option<String>,
    /// Включить TLS
    pub tls: bool,
    /// Идентификатор продюсера (providerId по умолчанию)
    pub identity: String,
}

/// Ключ дедупликации соединений в пуле.
///
/// Одинаковые ключи переиспользуют одно соединение; пароль, TLS и
/// identity на идентичность соединения не влияют.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub host: String,
    pub port: u16,
    pub db: u32,
    pub username: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            username: None,
            password: None,
            tls: false,
            identity: "vestnik".to_string(),
        }
    }
}

impl ConnectionSettings {
    /// Возвращает ключ `(host, port, db, username)` для пула соединений.
    pub fn endpoint_key(&self) -> EndpointKey {
        EndpointKey {
            host: self.host.clone(),
            port: self.port,
            db: self.db,
            username: self.username.clone(),
        }
    }

    /// Адрес в форме `host:port` для диагностики и сообщений об ошибках.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Проверяет, что параметров достаточно для установления соединения.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::InvalidEndpoint("host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidEndpoint("port is zero".to_string()));
        }
        if self.identity.is_empty() {
            return Err(ConfigError::InvalidEndpoint(
                "producer identity is empty".to_string(),
            ));
        }
        Ok(())
    }
}
