use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{with_retry, ConnectionMode, Connector, RetryPolicy, Transport};
use crate::{ConnectionSettings, EndpointKey, TransportError};

/// Пул транспортных соединений.
///
/// Соединения дедуплицируются по `(host, port, db, username)`.
/// Соединения в режиме подписки живут в отдельной карте: переведя
/// соединение в режим подписки, транспорт лишает его возможности
/// выполнять обычные команды.
///
/// Проверка-и-вставка атомарна: карта заперта на всё время установления
/// соединения, поэтому по одному ключу никогда не создаются два
/// конкурирующих соединения.
pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    policy: RetryPolicy,
    standard: Mutex<HashMap<EndpointKey, Arc<dyn Transport>>>,
    subscribers: Mutex<HashMap<EndpointKey, Arc<dyn Transport>>>,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_policy(connector, RetryPolicy::default())
    }

    pub fn with_policy(connector: Arc<dyn Connector>, policy: RetryPolicy) -> Self {
        Self {
            connector,
            policy,
            standard: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Возвращает разделяемое соединение для данного эндпоинта и режима,
    /// устанавливая его при первом обращении (с backoff-повторами).
    pub async fn acquire(
        &self,
        settings: &ConnectionSettings,
        mode: ConnectionMode,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let map = match mode {
            ConnectionMode::Standard => &self.standard,
            ConnectionMode::Subscribe => &self.subscribers,
        };
        let key = settings.endpoint_key();

        let mut guard = map.lock().await;
        if let Some(connection) = guard.get(&key) {
            return Ok(connection.clone());
        }

        debug!(address = %settings.address(), db = settings.db, ?mode, "establishing transport connection");
        let connection = with_retry(&self.policy, || self.connector.connect(settings, mode)).await?;
        guard.insert(key, connection.clone());
        Ok(connection)
    }

    /// Закрывает и выбрасывает все соединения пула. Идемпотентна:
    /// повторный вызов ничего не делает, следующий `acquire`
    /// устанавливает соединение заново.
    pub async fn close_all(&self) {
        let mut drained: Vec<Arc<dyn Transport>> = Vec::new();
        for map in [&self.standard, &self.subscribers] {
            let mut guard = map.lock().await;
            drained.extend(guard.drain().map(|(_, connection)| connection));
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "closing pooled transport connections");
        }
        for connection in drained {
            connection.close().await;
        }
    }

    /// Количество соединений в пуле (для диагностики и тестов).
    pub async fn len(&self) -> usize {
        self.standard.lock().await.len() + self.subscribers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::transport::{MemoryConnector, MemoryHub};

    fn pool_with_connector() -> (Arc<MemoryConnector>, ConnectionPool) {
        let hub = MemoryHub::new(16);
        let connector = Arc::new(MemoryConnector::new(hub));
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        };
        let pool = ConnectionPool::with_policy(connector.clone(), policy);
        (connector, pool)
    }

    /// Тест проверяет, что одинаковые эндпоинты дают один и тот же
    /// хендл, а отличающийся `db` — другой.
    #[tokio::test]
    async fn test_identical_endpoints_share_connection() {
        let (connector, pool) = pool_with_connector();
        let settings = ConnectionSettings::default();

        let a = pool
            .acquire(&settings, ConnectionMode::Standard)
            .await
            .unwrap();
        let b = pool
            .acquire(&settings, ConnectionMode::Standard)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(connector.connects_for(&settings.endpoint_key()), 1);

        let mut other = settings.clone();
        other.db = 5;
        let c = pool
            .acquire(&other, ConnectionMode::Standard)
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(pool.len().await, 2);
    }

    /// Тест проверяет, что соединения подписки живут в отдельном пуле
    /// от стандартных при том же ключе.
    #[tokio::test]
    async fn test_subscribe_pool_is_separate() {
        let (connector, pool) = pool_with_connector();
        let settings = ConnectionSettings::default();

        let standard = pool
            .acquire(&settings, ConnectionMode::Standard)
            .await
            .unwrap();
        let subscriber = pool
            .acquire(&settings, ConnectionMode::Subscribe)
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&standard, &subscriber));
        assert_eq!(standard.mode(), ConnectionMode::Standard);
        assert_eq!(subscriber.mode(), ConnectionMode::Subscribe);
        assert_eq!(connector.connects_for(&settings.endpoint_key()), 2);
    }

    /// Тест проверяет гонку первой установки: конкурентные acquire
    /// по одному ключу создают ровно одно соединение.
    #[tokio::test]
    async fn test_concurrent_acquire_creates_single_connection() {
        let (connector, pool) = pool_with_connector();
        let pool = Arc::new(pool);
        let settings = ConnectionSettings::default();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let settings = settings.clone();
                tokio::spawn(async move {
                    pool.acquire(&settings, ConnectionMode::Standard)
                        .await
                        .unwrap()
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(connector.connects_for(&settings.endpoint_key()), 1);
    }

    /// Тест проверяет идемпотентность close_all и реконнект после неё.
    #[tokio::test]
    async fn test_close_all_is_idempotent() {
        let (connector, pool) = pool_with_connector();
        let settings = ConnectionSettings::default();

        pool.acquire(&settings, ConnectionMode::Standard)
            .await
            .unwrap();
        pool.acquire(&settings, ConnectionMode::Subscribe)
            .await
            .unwrap();
        assert_eq!(pool.len().await, 2);

        pool.close_all().await;
        assert!(pool.is_empty().await);
        pool.close_all().await;
        assert!(pool.is_empty().await);

        // следующий acquire устанавливает новое соединение
        pool.acquire(&settings, ConnectionMode::Standard)
            .await
            .unwrap();
        assert_eq!(connector.connects_for(&settings.endpoint_key()), 3);
    }

    /// Тест проверяет backoff при установке: два сбоя, затем успех;
    /// полное исчерпание — RetriesExhausted.
    #[tokio::test]
    async fn test_acquire_retries_with_backoff() {
        let (connector, pool) = pool_with_connector();
        let settings = ConnectionSettings::default();

        connector.fail_next_connects(2);
        let connection = pool.acquire(&settings, ConnectionMode::Standard).await;
        assert!(connection.is_ok());

        pool.close_all().await;
        connector.fail_next_connects(10);
        let err = pool
            .acquire(&settings, ConnectionMode::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::RetriesExhausted { .. }));
    }
}
