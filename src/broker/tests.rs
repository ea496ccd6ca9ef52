use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::{
    Channel, Connection, Delivery, DeliveryCallback, ExchangeKind, InMemoryBroker, QueueHandle,
};

fn recording_callback() -> (DeliveryCallback, mpsc::UnboundedReceiver<Delivery>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback: DeliveryCallback = Arc::new(move |delivery: Delivery| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(delivery);
        }
        .boxed()
    });
    (callback, rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<Delivery>) -> Delivery {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("delivery timed out")
        .expect("delivery channel closed")
}

#[tokio::test]
async fn test_anonymous_queues_get_unique_names() {
    let broker = InMemoryBroker::new();
    let a = broker.declare_queue("", false).await.unwrap();
    let b = broker.declare_queue("", false).await.unwrap();
    assert!(a.name.starts_with("amq.gen-"));
    assert_ne!(a.name, b.name);
    assert_eq!(broker.queue_count(), 2);
}

#[tokio::test]
async fn test_redeclare_with_other_durability_fails() {
    let broker = InMemoryBroker::new();
    broker.declare_queue("orders", true).await.unwrap();
    let err = broker.declare_queue("orders", false).await.unwrap_err();
    assert!(err.is_protocol());
}

#[tokio::test]
async fn test_exchange_type_is_checked_on_redeclare() {
    let broker = InMemoryBroker::new();
    broker
        .declare_exchange("events", ExchangeKind::Direct)
        .await
        .unwrap();
    broker
        .declare_exchange("events", ExchangeKind::Direct)
        .await
        .unwrap();
    assert_eq!(broker.exchange_kind("events"), Some(ExchangeKind::Direct));
    assert!(broker.exchange_exists("events").await.unwrap());
    assert!(!broker.exchange_exists("missing").await.unwrap());
}

#[tokio::test]
async fn test_bind_requires_exchange() {
    let broker = InMemoryBroker::new();
    let queue = broker.declare_queue("orders", false).await.unwrap();
    let err = broker
        .bind_queue(&queue, "nowhere", "nowhere")
        .await
        .unwrap_err();
    assert!(err.is_protocol());
}

#[tokio::test]
async fn test_direct_routing_matches_exact_key() {
    let broker = InMemoryBroker::new();
    let queue = broker.declare_queue("orders", false).await.unwrap();
    broker
        .declare_exchange("order.exchange", ExchangeKind::Direct)
        .await
        .unwrap();
    broker
        .bind_queue(&queue, "order.exchange", "order.exchange")
        .await
        .unwrap();

    let (callback, mut rx) = recording_callback();
    broker.consume(&queue, callback).await.unwrap();

    let routed = broker
        .publish("order.exchange", "order.exchange", b"hit")
        .await
        .unwrap();
    let missed = broker
        .publish("order.exchange", "other", b"miss")
        .await
        .unwrap();
    assert_eq!(routed, 1);
    assert_eq!(missed, 0);

    let hit = next(&mut rx).await;
    assert_eq!(hit.body, b"hit");
    assert_eq!(hit.info.exchange, "order.exchange");
    assert_eq!(hit.info.delivery_tag, 1);
    tokio::task::yield_now().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_backlog_is_flushed_in_order_on_consume() {
    let broker = InMemoryBroker::new();
    let queue = broker.declare_queue("jobs", false).await.unwrap();
    broker.send_to_queue("jobs", b"one").await.unwrap();
    broker.send_to_queue("jobs", b"two").await.unwrap();
    assert_eq!(broker.backlog_len("jobs"), 2);

    let (callback, mut rx) = recording_callback();
    broker.consume(&queue, callback).await.unwrap();
    assert_eq!(broker.backlog_len("jobs"), 0);
    broker.send_to_queue("jobs", b"three").await.unwrap();

    let mut bodies = Vec::new();
    for _ in 0..3 {
        bodies.push(next(&mut rx).await.body);
    }
    assert_eq!(bodies, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
}

#[tokio::test]
async fn test_backlog_keeps_exchange_and_routing_key() {
    let broker = InMemoryBroker::new();
    let queue = broker.declare_queue("orders", true).await.unwrap();
    broker
        .declare_exchange("order.exchange", ExchangeKind::Direct)
        .await
        .unwrap();
    broker
        .bind_queue(&queue, "order.exchange", "order.exchange")
        .await
        .unwrap();
    broker
        .publish("order.exchange", "order.exchange", b"early")
        .await
        .unwrap();

    let (callback, mut rx) = recording_callback();
    broker.consume(&queue, callback).await.unwrap();

    let early = next(&mut rx).await;
    assert_eq!(early.body, b"early");
    assert_eq!(early.info.exchange, "order.exchange");
    assert_eq!(early.info.routing_key, "order.exchange");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_publish_during_slow_drain_stays_behind_backlog() {
    let broker = Arc::new(InMemoryBroker::new());
    let queue = broker.declare_queue("jobs", false).await.unwrap();
    broker.send_to_queue("jobs", b"one").await.unwrap();
    broker.send_to_queue("jobs", b"two").await.unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let callback: DeliveryCallback = Arc::new(move |delivery: Delivery| {
        let tx = tx.clone();
        async move {
            if delivery.body == b"one" {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            let _ = tx.send(delivery.body);
        }
        .boxed()
    });

    let started = Instant::now();
    broker.consume(&queue, callback).await.unwrap();
    let consume_took = started.elapsed();

    let publisher = broker.clone();
    let late = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        publisher.send_to_queue("jobs", b"three").await.unwrap();
    });
    late.await.unwrap();

    let mut order = Vec::new();
    for _ in 0..3 {
        let body = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("delivery timed out")
            .expect("delivery channel closed");
        order.push(String::from_utf8(body).unwrap());
    }
    assert_eq!(order, ["one", "two", "three"]);
    assert!(
        consume_took < Duration::from_millis(100),
        "consume waited on the handler: {consume_took:?}"
    );
}

#[tokio::test]
async fn test_consume_unknown_queue_fails() {
    let broker = InMemoryBroker::new();
    let (callback, _) = recording_callback();
    let err = broker
        .consume(&QueueHandle::new("ghost", false), callback)
        .await
        .unwrap_err();
    assert!(err.is_protocol());
}
