use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;
use tracing::info;

use crate::{
    bus::EventBus,
    delivery::DeliveryEngine,
    message::KindTag,
    transport::{ConnectionMode, ConnectionPool, Connector},
    ConfigError, ConnectionSettings, PublishResult,
};

use super::Publisher;

struct RegistryState {
    engine: Option<Arc<DeliveryEngine>>,
    identity: String,
    publishers: HashMap<KindTag, Arc<Publisher>>,
}

/// Реестр публикаторов: контейнер зависимостей процесса.
///
/// Создаётся один раз при старте приложения и передаётся по ссылке;
/// держит пул соединений, общий движок доставки и по одному кэшированному
/// публикатору на вид сообщения. Первый `obtain_with` поставляет
/// параметры подключения; все последующие вызовы игнорируют параметры
/// и возвращают кэшированный экземпляр. `obtain` до конфигурации —
/// ошибка `NotConfigured`.
pub struct PublisherRegistry {
    pool: Arc<ConnectionPool>,
    namespace: String,
    default_channel: String,
    state: Mutex<RegistryState>,
}

impl PublisherRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            pool: Arc::new(ConnectionPool::new(connector)),
            namespace: "vestnik".to_string(),
            default_channel: "ui:events".to_string(),
            state: Mutex::new(RegistryState {
                engine: None,
                identity: String::new(),
                publishers: HashMap::new(),
            }),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_default_channel(mut self, channel: impl Into<String>) -> Self {
        self.default_channel = channel.into();
        self
    }

    /// Пул соединений контейнера.
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Возвращает публикатор вида, при первом вызове конфигурируя
    /// контейнер переданными параметрами.
    pub async fn obtain_with(
        &self,
        tag: KindTag,
        settings: &ConnectionSettings,
    ) -> PublishResult<Arc<Publisher>> {
        let mut state = self.state.lock().await;

        let engine = match &state.engine {
            Some(engine) => engine.clone(),
            None => {
                settings.validate()?;
                let transport = self
                    .pool
                    .acquire(settings, ConnectionMode::Standard)
                    .await?;
                let engine = Arc::new(DeliveryEngine::new(
                    transport,
                    self.namespace.clone(),
                    self.default_channel.clone(),
                ));
                state.identity = settings.identity.clone();
                state.engine = Some(engine.clone());
                info!(identity = %state.identity, "publisher registry configured");
                engine
            }
        };

        Ok(Self::cached(&mut state, engine, tag))
    }

    /// Возвращает кэшированный публикатор вида; до первой конфигурации —
    /// `ConfigError::NotConfigured`.
    pub async fn obtain(&self, tag: KindTag) -> PublishResult<Arc<Publisher>> {
        let mut state = self.state.lock().await;
        let engine = match &state.engine {
            Some(engine) => engine.clone(),
            None => return Err(ConfigError::NotConfigured.into()),
        };
        Ok(Self::cached(&mut state, engine, tag))
    }

    /// Шина событий на соединении подписки из того же пула.
    pub async fn event_bus(&self, settings: &ConnectionSettings) -> PublishResult<EventBus> {
        settings.validate()?;
        let transport = self
            .pool
            .acquire(settings, ConnectionMode::Subscribe)
            .await?;
        Ok(EventBus::new(transport))
    }

    /// Тестовый хук: сбрасывает кэш публикаторов и закрывает пул,
    /// возвращая контейнер в несконфигурированное состояние.
    pub async fn reset(&self) {
        {
            let mut state = self.state.lock().await;
            state.publishers.clear();
            state.engine = None;
            state.identity.clear();
        }
        self.pool.close_all().await;
    }

    fn cached(
        state: &mut RegistryState,
        engine: Arc<DeliveryEngine>,
        tag: KindTag,
    ) -> Arc<Publisher> {
        let identity = state.identity.clone();
        state
            .publishers
            .entry(tag)
            .or_insert_with(|| Arc::new(Publisher::new(tag, identity, engine)))
            .clone()
    }
}
