//! End-to-End Relay Tests
//!
//! Runs the websocket server on a loopback port and a bus consumer fed from
//! a channel, then talks to the relay as a real websocket client would.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use price_feed_relay::{
    BusConsumer, BusMessage, BusStatus, Instrument, RegistryBroadcaster, RegistryConfig,
    ServerSettings, SharedRegistry, SubscriptionRegistry, WsServer,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use common::{ChannelSource, SUBSCRIBE_BTC, TICK_JSON, fixture_event, wait_until};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;
type BusSender = tokio::sync::mpsc::UnboundedSender<
    Result<BusMessage, price_feed_relay::BusReadError>,
>;

const WS_PATH: &str = "/ws/livepricesfeed";

struct Relay {
    url: String,
    registry: SharedRegistry,
    bus: BusSender,
    source_closed: Arc<std::sync::atomic::AtomicBool>,
    status: Arc<BusStatus>,
    consumer: JoinHandle<Result<(), price_feed_relay::ConsumerError>>,
    cancel: CancellationToken,
}

async fn start_relay() -> Relay {
    let cancel = CancellationToken::new();
    let registry = SubscriptionRegistry::shared(RegistryConfig {
        write_timeout: Duration::from_secs(1),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let settings = ServerSettings {
        port: addr.port(),
        ws_path: WS_PATH.to_string(),
        health_port: 0,
    };
    let server = WsServer::new(&settings, registry.clone(), cancel.clone());
    tokio::spawn(server.serve(listener));

    let (source, bus, source_closed) = ChannelSource::new();
    let status = BusStatus::shared();
    let mut consumer = BusConsumer::new(source, Arc::clone(&status))
        .with_read_error_backoff(Duration::from_millis(10));
    consumer.set_handler(RegistryBroadcaster::shared(Arc::clone(&registry)));
    let consumer = tokio::spawn(consumer.run(cancel.clone()));

    Relay {
        url: format!("ws://{addr}{WS_PATH}"),
        registry,
        bus,
        source_closed,
        status,
        consumer,
        cancel,
    }
}

async fn connect(relay: &Relay) -> Client {
    let before = relay.registry.connection_count();
    let (client, _) = connect_async(relay.url.as_str()).await.unwrap();
    assert!(wait_until(|| relay.registry.connection_count() > before).await);
    client
}

async fn subscribe(relay: &Relay, client: &mut Client) {
    let before = relay.registry.subscriber_count(Instrument::BtcUsd);
    client.send(Message::text(SUBSCRIBE_BTC)).await.unwrap();
    assert!(wait_until(|| relay.registry.subscriber_count(Instrument::BtcUsd) > before).await);
}

/// Next text frame, or `None` if nothing arrives within the window.
async fn next_text(client: &mut Client, window: Duration) -> Option<String> {
    loop {
        let msg = tokio::time::timeout(window, client.next()).await.ok()??.ok()?;
        match msg {
            Message::Text(text) => return Some(text.to_string()),
            Message::Close(_) => return None,
            _ => {}
        }
    }
}

fn ingest(relay: &Relay, payload: &str) {
    relay
        .bus
        .send(Ok(BusMessage::from_payload(payload.as_bytes().to_vec())))
        .unwrap();
}

#[tokio::test]
async fn subscriber_receives_translated_event() {
    let relay = start_relay().await;
    let mut subscriber = connect(&relay).await;
    let mut bystander = connect(&relay).await;
    subscribe(&relay, &mut subscriber).await;

    ingest(&relay, TICK_JSON);

    let frame = next_text(&mut subscriber, Duration::from_secs(2))
        .await
        .expect("subscriber should receive the event");
    let received: serde_json::Value = serde_json::from_str(&frame).unwrap();
    let expected = serde_json::to_value(fixture_event(100)).unwrap();
    assert_eq!(received, expected);
    assert_eq!(received["product_id"], "BTC-USD");
    assert_eq!(received["price"], 100.0);
    assert_eq!(received["time"], "2023-11-18T12:34:56Z");

    assert!(
        next_text(&mut bystander, Duration::from_millis(200))
            .await
            .is_none()
    );

    relay.cancel.cancel();
}

#[tokio::test]
async fn late_subscriber_gets_no_replay() {
    let relay = start_relay().await;
    let mut early = connect(&relay).await;
    subscribe(&relay, &mut early).await;

    ingest(&relay, TICK_JSON);
    assert!(next_text(&mut early, Duration::from_secs(2)).await.is_some());

    let mut late = connect(&relay).await;
    subscribe(&relay, &mut late).await;
    assert!(
        next_text(&mut late, Duration::from_millis(200))
            .await
            .is_none()
    );

    relay.cancel.cancel();
}

#[tokio::test]
async fn untranslatable_messages_are_dropped() {
    let relay = start_relay().await;
    let mut client = connect(&relay).await;
    subscribe(&relay, &mut client).await;

    ingest(&relay, "not json at all");
    ingest(&relay, &TICK_JSON.replace("BTC-USD", "DOGE-USD"));
    ingest(&relay, &TICK_JSON.replace("\"price\":\"100.0\"", "\"price\":\"NaN\""));
    ingest(&relay, &TICK_JSON.replace("\"sequence\":100", "\"sequence\":101"));

    let frame = next_text(&mut client, Duration::from_secs(2)).await.unwrap();
    let received: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(received["sequence"], 101);

    assert!(wait_until(|| relay.status.snapshot().dropped == 3).await);
    assert_eq!(relay.status.snapshot().events_handled, 1);

    relay.cancel.cancel();
}

#[tokio::test]
async fn invalid_control_frame_gets_error_reply() {
    let relay = start_relay().await;
    let mut client = connect(&relay).await;

    client.send(Message::text("garbage")).await.unwrap();

    let frame = next_text(&mut client, Duration::from_secs(2)).await.unwrap();
    let reply: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["message"], "Invalid message format.");

    // The connection stays usable.
    subscribe(&relay, &mut client).await;
    ingest(&relay, TICK_JSON);
    assert!(next_text(&mut client, Duration::from_secs(2)).await.is_some());

    relay.cancel.cancel();
}

#[tokio::test]
async fn client_disconnect_is_cleaned_up() {
    let relay = start_relay().await;
    let mut client = connect(&relay).await;
    subscribe(&relay, &mut client).await;

    client.close(None).await.unwrap();
    drop(client);

    assert!(wait_until(|| relay.registry.connection_count() == 0).await);
    assert_eq!(relay.registry.subscriber_count(Instrument::BtcUsd), 0);

    relay.cancel.cancel();
}

#[tokio::test]
async fn cancellation_stops_consumer_and_releases_source() {
    let relay = start_relay().await;
    assert!(wait_until(|| relay.status.is_running()).await);

    relay.cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(2), relay.consumer)
        .await
        .unwrap()
        .unwrap();

    assert!(result.is_ok());
    assert!(relay.source_closed.load(Ordering::SeqCst));
    assert!(!relay.status.is_running());
}
