//! End-to-end tests: a real server on an ephemeral port, driven by
//! WebSocket and HTTP clients.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use nomad_gateway::app_state::AppState;
use nomad_gateway::config::{GatewayConfig, OriginPolicy, SlowClientPolicy};
use nomad_gateway::domain::RegionClient;
use nomad_gateway::server::{build_app, build_state};
use nomad_gateway::ws::action::{Action, Payload};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn gateway_config(regions: &[&str]) -> GatewayConfig {
    GatewayConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        nomad_addr: "http://127.0.0.1:4646".to_string(),
        regions: regions.iter().map(ToString::to_string).collect(),
        region_channel_capacity: 64,
        connection_queue_capacity: 16,
        ping_interval_secs: 0,
        slow_client_policy: SlowClientPolicy::DropOldest,
        origin_policy: OriginPolicy::AllowAll,
    }
}

async fn spawn_gateway(regions: &[&str]) -> (SocketAddr, AppState) {
    spawn_gateway_with(gateway_config(regions)).await
}

async fn spawn_gateway_with(config: GatewayConfig) -> (SocketAddr, AppState) {
    let (hub, state) = build_state(&config).await;
    tokio::spawn(hub.run());

    let Ok(listener) = tokio::net::TcpListener::bind(config.listen_addr).await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    let app = build_app(state.clone());
    tokio::spawn(async move { axum::serve(listener, app).await });
    (addr, state)
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let url = format!("ws://{addr}{path}");
    let Ok((ws, _)) = connect_async(url.as_str()).await else {
        panic!("failed to connect to {url}");
    };
    ws
}

async fn next_frame(ws: &mut Client) -> Message {
    loop {
        let Ok(Some(Ok(frame))) = timeout(WAIT, ws.next()).await else {
            panic!("expected a frame");
        };
        if !matches!(frame, Message::Ping(_) | Message::Pong(_)) {
            return frame;
        }
    }
}

async fn next_action(ws: &mut Client) -> Action {
    match next_frame(ws).await {
        Message::Text(text) => {
            let Ok(action) = Action::decode(text.as_str()) else {
                panic!("undecodable action: {text}");
            };
            action
        }
        other => panic!("expected a text frame, got {other:?}"),
    }
}

async fn send_action(ws: &mut Client, action: &Action) {
    let Ok(text) = action.encode() else {
        panic!("encode failed");
    };
    let Ok(()) = ws.send(Message::text(text)).await else {
        panic!("send failed");
    };
}

async fn wait_for_connections(state: &AppState, expected: usize) {
    let mut count = state.hub.watch_count();
    let Ok(Ok(_)) = timeout(WAIT, count.wait_for(|n| *n == expected)).await else {
        panic!("connection count never reached {expected}");
    };
}

#[tokio::test]
async fn single_region_handshake_sets_region() {
    let (addr, _state) = spawn_gateway(&["us-east"]).await;

    for path in ["/ws/nomad/", "/ws/nomad"] {
        let mut ws = connect(addr, path).await;
        assert_eq!(next_action(&mut ws).await, Action::set_region("us-east"));
    }
}

#[tokio::test]
async fn multi_region_handshake_reprompts_unchanged() {
    let (addr, state) = spawn_gateway(&["us-east", "eu-west"]).await;
    let expected = Action::new(
        "FETCHED_NOMAD_REGIONS",
        Payload::List(vec!["us-east".to_string(), "eu-west".to_string()]),
    );

    let mut ws = connect(addr, "/ws/nomad/").await;
    assert_eq!(next_action(&mut ws).await, expected);

    send_action(&mut ws, &Action::set_region("eu-west")).await;
    assert_eq!(next_action(&mut ws).await, expected);

    send_action(&mut ws, &Action::new("WATCH_JOBS", Payload::default())).await;
    assert_eq!(next_action(&mut ws).await, expected);

    assert_eq!(state.hub.connection_count(), 0);
}

#[tokio::test]
async fn typeless_message_during_handshake_reprompts() {
    let (addr, state) = spawn_gateway(&["us-east", "eu-west"]).await;
    let expected = Action::fetched_regions(vec!["us-east".to_string(), "eu-west".to_string()]);

    let mut ws = connect(addr, "/ws/nomad/").await;
    assert_eq!(next_action(&mut ws).await, expected);

    for body in [r#"{"Payload":"eu-west"}"#, "{}"] {
        let Ok(()) = ws.send(Message::text(body)).await else {
            panic!("send failed");
        };
        assert_eq!(next_action(&mut ws).await, expected);
    }
    assert_eq!(state.hub.connection_count(), 0);
}

#[tokio::test]
async fn percent_encoded_region_is_decoded() {
    let (addr, state) = spawn_gateway(&["us east"]).await;

    let mut ws = connect(addr, "/ws/nomad/us%20east").await;
    wait_for_connections(&state, 1).await;

    let event = Action::new("FETCHED_JOBS", Payload::List(vec!["web".to_string()]));
    assert_eq!(state.registry.publish("us east", event.clone()).await, 1);
    assert_eq!(next_action(&mut ws).await, event);
}

#[tokio::test]
async fn unknown_region_gets_sentinel_then_close() {
    let (addr, state) = spawn_gateway(&["us-east"]).await;

    let mut ws = connect(addr, "/ws/nomad/mars").await;
    let Message::Text(text) = next_frame(&mut ws).await else {
        panic!("expected the unknown-region action first");
    };
    assert_eq!(text.as_str(), r#"{"Type":"UNKNOWN_NOMAD_REGION","Payload":""}"#);

    let Message::Close(Some(frame)) = next_frame(&mut ws).await else {
        panic!("expected a close frame");
    };
    assert_eq!(frame.code, CloseCode::Policy);
    assert_eq!(state.hub.connection_count(), 0);
}

#[tokio::test]
async fn regions_added_after_startup_stay_invisible() {
    let (addr, state) = spawn_gateway(&[]).await;
    state
        .registry
        .insert(RegionClient::new("us-east", "http://127.0.0.1:4646"))
        .await;

    let mut handshake = connect(addr, "/ws/nomad/").await;
    assert_eq!(
        next_action(&mut handshake).await,
        Action::fetched_regions(Vec::new())
    );

    let mut routed = connect(addr, "/ws/nomad/us-east").await;
    assert_eq!(next_action(&mut routed).await, Action::unknown_region());
    assert_eq!(state.hub.connection_count(), 0);
}

#[tokio::test]
async fn events_fan_out_only_within_region() {
    let (addr, state) = spawn_gateway(&["us-east", "eu-west"]).await;

    let mut east_a = connect(addr, "/ws/nomad/us-east").await;
    let mut east_b = connect(addr, "/ws/nomad/us-east").await;
    let mut west = connect(addr, "/ws/nomad/eu-west").await;
    wait_for_connections(&state, 3).await;

    let east_event = Action::new("FETCHED_JOBS", Payload::List(vec!["web".to_string()]));
    let west_event = Action::new("FETCHED_NODES", Payload::List(vec!["n1".to_string()]));
    assert_eq!(state.registry.publish("us-east", east_event.clone()).await, 2);
    assert_eq!(state.registry.publish("eu-west", west_event.clone()).await, 1);

    assert_eq!(next_action(&mut east_a).await, east_event);
    assert_eq!(next_action(&mut east_b).await, east_event);
    assert_eq!(next_action(&mut west).await, west_event);
}

#[tokio::test]
async fn client_close_unregisters_connection() {
    let (addr, state) = spawn_gateway(&["us-east"]).await;

    let mut ws = connect(addr, "/ws/nomad/us-east").await;
    wait_for_connections(&state, 1).await;

    let Ok(()) = ws.close(None).await else {
        panic!("close failed");
    };
    wait_for_connections(&state, 0).await;
    assert_eq!(state.hub.connection_count(), 0);
}

#[tokio::test]
async fn health_reports_live_connections() {
    let (addr, state) = spawn_gateway(&["us-east", "eu-west"]).await;
    let _ws = connect(addr, "/ws/nomad/eu-west").await;
    wait_for_connections(&state, 1).await;

    let Ok(response) = reqwest::get(format!("http://{addr}/health")).await else {
        panic!("health request failed");
    };
    assert!(response.status().is_success());
    let Ok(body) = response.json::<serde_json::Value>().await else {
        panic!("invalid health body");
    };
    assert_eq!(body.get("status"), Some(&serde_json::json!("healthy")));
    assert_eq!(body.get("connections"), Some(&serde_json::json!(1)));
    assert_eq!(body.get("regions"), Some(&serde_json::json!(2)));
}

fn burst(n: usize) -> Vec<Action> {
    (0..n)
        .map(|i| Action::new("FETCHED_JOBS", Payload::Text(format!("job-{i}"))))
        .collect()
}

#[tokio::test]
async fn lagging_client_is_disconnected_under_disconnect_policy() {
    let (addr, state) = spawn_gateway_with(GatewayConfig {
        region_channel_capacity: 1,
        connection_queue_capacity: 1,
        slow_client_policy: SlowClientPolicy::Disconnect,
        ..gateway_config(&["us-east"])
    })
    .await;

    let _ws = connect(addr, "/ws/nomad/us-east").await;
    wait_for_connections(&state, 1).await;

    // The publishes run without yielding, so the connection falls behind.
    for event in burst(32) {
        state.registry.publish("us-east", event).await;
    }
    wait_for_connections(&state, 0).await;
}

#[tokio::test]
async fn lagging_client_keeps_newest_events_under_drop_oldest() {
    let (addr, state) = spawn_gateway_with(GatewayConfig {
        region_channel_capacity: 1,
        connection_queue_capacity: 1,
        ..gateway_config(&["us-east"])
    })
    .await;

    let mut ws = connect(addr, "/ws/nomad/us-east").await;
    wait_for_connections(&state, 1).await;

    let events = burst(32);
    let Some(newest) = events.last().cloned() else {
        panic!("empty burst");
    };
    for event in events {
        state.registry.publish("us-east", event).await;
    }

    assert_eq!(next_action(&mut ws).await, newest);
    assert_eq!(state.hub.connection_count(), 1);

    let after = Action::new("FETCHED_NODES", Payload::default());
    assert_eq!(state.registry.publish("us-east", after.clone()).await, 1);
    assert_eq!(next_action(&mut ws).await, after);
}

#[tokio::test]
async fn dropped_client_is_unregistered() {
    let (addr, state) = spawn_gateway(&["us-east"]).await;

    let ws = connect(addr, "/ws/nomad/us-east").await;
    wait_for_connections(&state, 1).await;

    drop(ws);
    state
        .registry
        .publish("us-east", Action::new("FETCHED_JOBS", Payload::default()))
        .await;
    wait_for_connections(&state, 0).await;
}
