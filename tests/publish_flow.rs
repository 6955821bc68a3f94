use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio::{sync::mpsc, time::timeout};

use vestnik::{
    ConnectionMode, ConnectionSettings, Correlation, KindTag, MemoryConnector, MemoryHub,
    MemoryTransport, MessageKind, PublisherRegistry, Transport,
};

fn correlation() -> Correlation {
    Correlation::new("c1", "v1", "u1")
}

async fn registry_over(hub: &Arc<MemoryHub>) -> PublisherRegistry {
    PublisherRegistry::new(Arc::new(MemoryConnector::new(hub.clone())))
}

/// Тест проверяет сквозной сценарий: публикация текста через реестр,
/// обработчик на разрешённом канале получает одно сообщение с теми же
/// kind и text.
#[tokio::test]
async fn test_text_publish_reaches_handler() {
    let hub = MemoryHub::new(64);
    let registry = registry_over(&hub).await;
    let settings = ConnectionSettings::default();

    let bus = registry.event_bus(&settings).await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = bus
        .subscribe("ui:events", move |msg| {
            tx.send(msg.envelope).ok();
            Ok(())
        })
        .await
        .unwrap();

    let publisher = registry
        .obtain_with(KindTag::Text, &settings)
        .await
        .unwrap();
    publisher.text(&correlation(), "hi", None).await.unwrap();

    let envelope = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("timed out")
        .expect("no message");
    assert_eq!(
        envelope.kind,
        MessageKind::Text {
            text: "hi".to_string()
        }
    );
    assert_eq!(envelope.chat_id, "c1");
    assert_eq!(envelope.conversation_id, "v1");
    assert_eq!(envelope.user_id, "u1");

    // ровно одно сообщение
    assert!(timeout(Duration::from_millis(20), rx.recv()).await.is_err());
}

/// Тест проверяет round-trip прогресса через serialize→deliver→deserialize:
/// все поля и дискриминант сохраняются.
#[tokio::test]
async fn test_progress_roundtrip_preserves_fields() {
    let hub = MemoryHub::new(64);
    let registry = registry_over(&hub).await;
    let settings = ConnectionSettings::default();

    let subscriber = MemoryTransport::new(hub.clone(), ConnectionMode::Subscribe);
    let mut rx = subscriber.subscribe("ui:events").await.unwrap();

    let publisher = registry
        .obtain_with(KindTag::ProgressUpdate, &settings)
        .await
        .unwrap();
    publisher
        .progress(&correlation(), "indexing", 75, None)
        .await
        .unwrap();

    let msg = timeout(Duration::from_millis(100), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let wire: Value = serde_json::from_slice(&msg.payload).unwrap();
    assert_eq!(wire["kind"], "ProgressUpdate");
    assert_eq!(wire["progress"], 75);
    assert_eq!(wire["message"], "indexing");
    assert_eq!(wire["chatId"], "c1");
    assert_eq!(wire["conversationId"], "v1");
    assert_eq!(wire["userId"], "u1");
    assert_eq!(wire["providerId"], "vestnik");
    assert!(wire["timestamp"].is_i64());
    assert_eq!(wire["state"], "ACTIVE");
}

/// Тест проверяет асимметричный fallback на уровне публикатора:
/// сбой durable-журнала не валит публикацию, broadcast доставляется.
#[tokio::test]
async fn test_durable_failure_degrades_to_broadcast_only() {
    let hub = MemoryHub::new(64);
    let registry = registry_over(&hub).await;
    let settings = ConnectionSettings::default();

    let bus = registry.event_bus(&settings).await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = bus
        .subscribe("ui:events", move |msg| {
            tx.send(msg.envelope).ok();
            Ok(())
        })
        .await
        .unwrap();

    hub.fail_appends(true);
    let publisher = registry
        .obtain_with(KindTag::Text, &settings)
        .await
        .unwrap();
    publisher
        .text(&correlation(), "survives log outage", None)
        .await
        .unwrap();

    let envelope = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("timed out")
        .expect("no message");
    assert_eq!(
        envelope.kind,
        MessageKind::Text {
            text: "survives log outage".to_string()
        }
    );
    assert_eq!(hub.stream_len("vestnik:log:ui:events"), 0);
}

/// Тест проверяет пакетную доставку: N конвертов — ровно N записей
/// журнала и N broadcast-ов в порядке добавления.
#[tokio::test]
async fn test_batch_delivery_order_and_count() {
    let hub = MemoryHub::new(64);
    let registry = registry_over(&hub).await;
    let settings = ConnectionSettings::default();

    let subscriber = MemoryTransport::new(hub.clone(), ConnectionMode::Subscribe);
    let mut rx = subscriber.subscribe("ui:events").await.unwrap();

    let publisher = registry
        .obtain_with(KindTag::StreamChunk, &settings)
        .await
        .unwrap();

    let envelopes: Vec<_> = (0..5)
        .map(|i| {
            vestnik::EnvelopeBuilder::new()
                .correlation(&correlation())
                .provider_id("assistant")
                .kind(MessageKind::StreamChunk {
                    text: format!("chunk-{i}"),
                    sequence: Some(i),
                })
                .build()
                .unwrap()
        })
        .collect();
    publisher.send_batch(envelopes, None).await.unwrap();

    assert_eq!(hub.stream_len("vestnik:log:ui:events"), 5);
    for i in 0..5u64 {
        let msg = timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let wire: Value = serde_json::from_slice(&msg.payload).unwrap();
        assert_eq!(wire["sequence"], i);
    }
}

/// Тест проверяет порядок на проводе при последовательных await-ах
/// одного публикатора в один канал.
#[tokio::test]
async fn test_sequential_publishes_preserve_order() {
    let hub = MemoryHub::new(64);
    let registry = registry_over(&hub).await;
    let settings = ConnectionSettings::default();

    let subscriber = MemoryTransport::new(hub.clone(), ConnectionMode::Subscribe);
    let mut rx = subscriber.subscribe("ui:events").await.unwrap();

    let publisher = registry
        .obtain_with(KindTag::Text, &settings)
        .await
        .unwrap();
    for i in 0..4 {
        publisher
            .text(&correlation(), format!("m{i}"), None)
            .await
            .unwrap();
    }

    for i in 0..4 {
        let msg = rx.recv().await.unwrap();
        let wire: Value = serde_json::from_slice(&msg.payload).unwrap();
        assert_eq!(wire["text"], format!("m{i}"));
    }
}

/// Тест проверяет доставку в явно указанный канал: обработчик канала
/// по умолчанию ничего не получает.
#[tokio::test]
async fn test_channel_override_routes_past_default() {
    let hub = MemoryHub::new(64);
    let registry = registry_over(&hub).await;
    let settings = ConnectionSettings::default();

    let bus = registry.event_bus(&settings).await.unwrap();
    let (default_tx, mut default_rx) = mpsc::unbounded_channel();
    let _default_sub = bus
        .subscribe("ui:events", move |msg| {
            default_tx.send(msg.envelope).ok();
            Ok(())
        })
        .await
        .unwrap();
    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel();
    let _chat_sub = bus
        .subscribe("chat:42", move |msg| {
            chat_tx.send(msg.envelope).ok();
            Ok(())
        })
        .await
        .unwrap();

    let publisher = registry
        .obtain_with(KindTag::Text, &settings)
        .await
        .unwrap();
    publisher
        .text(&correlation(), "routed", Some("chat:42"))
        .await
        .unwrap();

    let envelope = timeout(Duration::from_millis(100), chat_rx.recv())
        .await
        .expect("timed out")
        .expect("no message");
    assert_eq!(
        envelope.kind,
        MessageKind::Text {
            text: "routed".to_string()
        }
    );
    assert!(timeout(Duration::from_millis(20), default_rx.recv())
        .await
        .is_err());
}
