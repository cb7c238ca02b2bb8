//! In-process fake obs-websocket server and payload fixtures.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use obs_exporter::config::Config;
use obs_exporter::proto::authentication_string;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const SALT: &str = "lM1GncleQOaCu9lT1yeUZhFYnqhsLLP1G5lAGo3ixaI=";
const CHALLENGE: &str = "+IxH4CnCiqpX1rM9scsNynZzbOe4KhDeYcTNS3PDaeY=";

pub fn stats_payload() -> Value {
    json!({
        "activeFps": 60.0,
        "availableDiskSpace": 107374182400u64,
        "averageFrameRenderTime": 4.2,
        "cpuUsage": 12.5,
        "memoryUsage": 512.0,
        "outputSkippedFrames": 0,
        "outputTotalFrames": 1000,
        "renderSkippedFrames": 2,
        "renderTotalFrames": 1000,
        "webSocketSessionIncomingMessages": 5,
        "webSocketSessionOutgoingMessages": 5
    })
}

pub fn stream_status_payload() -> Value {
    json!({
        "outputActive": true,
        "outputReconnecting": false,
        "outputTimecode": "00:01:00.000",
        "outputDuration": 60000,
        "outputCongestion": 0.0,
        "outputBytes": 2048,
        "outputSkippedFrames": 1,
        "outputTotalFrames": 500
    })
}

pub const EXPECTED_STATS_BLOCK: &str = "obs_active_fps 60.0
obs_available_disk_space 107374182400
obs_average_frame_render_time 4.2
obs_cpu_usage 12.5
obs_memory_usage 512.0
obs_output_skipped_frames 0
obs_output_total_frames 1000
obs_render_skipped_frames 2
obs_render_total_frames 1000
obs_websocket_session_incoming_messages 5
obs_websocket_session_outgoing_messages 5
";

pub const EXPECTED_STREAM_BLOCK: &str = "obs_stream_status_output_active 1
obs_stream_status_output_bytes 2048
obs_stream_status_output_congestion 0.0
obs_stream_status_output_duration 60000
obs_stream_status_output_skipped_frames 1
obs_stream_status_output_total_frames 500
";

/// Behaviour of the fake server.
#[derive(Clone)]
pub struct FakeObs {
    /// `None` disables authentication.
    pub password: Option<String>,
    pub stats: Value,
    pub stream_status: Value,
    /// Request type answered with `result: false`.
    pub failing_request: Option<&'static str>,
    /// Send an event and a stray response before each real response.
    pub noisy: bool,
    /// Accept the upgrade but never send Hello.
    pub stall_handshake: bool,
    /// Request type that never gets a response.
    pub stall_on: Option<&'static str>,
    /// Request type answered with a text frame that is not JSON.
    pub garbage_on: Option<&'static str>,
    /// Request type that makes the server drop the socket.
    pub drop_on: Option<&'static str>,
}

impl Default for FakeObs {
    fn default() -> Self {
        Self {
            password: Some("hunter2".into()),
            stats: stats_payload(),
            stream_status: stream_status_payload(),
            failing_request: None,
            noisy: false,
            stall_handshake: false,
            stall_on: None,
            garbage_on: None,
            drop_on: None,
        }
    }
}

pub struct FakeServer {
    pub addr: SocketAddr,
    closed: Arc<AtomicUsize>,
    requests: Arc<std::sync::Mutex<Vec<String>>>,
}

impl FakeServer {
    /// Sessions that ended after the client closed or dropped the socket.
    pub async fn wait_closed(&self, n: usize) -> bool {
        for _ in 0..100 {
            if self.closed.load(Ordering::SeqCst) >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct FakeState {
    fake: Arc<FakeObs>,
    closed: Arc<AtomicUsize>,
    requests: Arc<std::sync::Mutex<Vec<String>>>,
}

pub async fn spawn_fake_obs(fake: FakeObs) -> FakeServer {
    let closed = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(std::sync::Mutex::new(Vec::new()));
    let state = FakeState {
        fake: Arc::new(fake),
        closed: closed.clone(),
        requests: requests.clone(),
    };
    let app = Router::new().route("/", get(upgrade)).with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake obs");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    FakeServer {
        addr,
        closed,
        requests,
    }
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<FakeState>) -> Response {
    ws.on_upgrade(move |socket| session(socket, state))
}

async fn send_json(socket: &mut WebSocket, v: Value) -> bool {
    socket.send(Message::Text(v.to_string())).await.is_ok()
}

async fn session(mut socket: WebSocket, state: FakeState) {
    let fake = state.fake.clone();
    if fake.stall_handshake {
        // Hold the socket until the client gives up.
        while let Some(Ok(_)) = socket.recv().await {}
        state.closed.fetch_add(1, Ordering::SeqCst);
        return;
    }
    let mut hello = json!({"obsWebSocketVersion": "5.5.0", "rpcVersion": 1});
    if fake.password.is_some() {
        hello["authentication"] = json!({"challenge": CHALLENGE, "salt": SALT});
    }
    if !send_json(&mut socket, json!({"op": 0, "d": hello})).await {
        return;
    }

    let identify: Value = match socket.recv().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str(&text).expect("identify json"),
        _ => return,
    };
    assert_eq!(identify["op"], 1);
    if let Some(password) = fake.password.as_deref() {
        let expected = authentication_string(password, SALT, CHALLENGE);
        if identify["d"]["authentication"] != expected.as_str() {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: 4009,
                    reason: "Authentication failed.".into(),
                })))
                .await;
            return;
        }
    }
    if !send_json(&mut socket, json!({"op": 2, "d": {"negotiatedRpcVersion": 1}})).await {
        return;
    }

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                let frame: Value = serde_json::from_str(&text).expect("request json");
                let request_type = frame["d"]["requestType"].as_str().unwrap_or_default().to_string();
                let request_id = frame["d"]["requestId"].clone();
                state.requests.lock().unwrap().push(request_type.clone());

                let is = |mode: Option<&'static str>| mode == Some(request_type.as_str());
                if is(fake.stall_on) {
                    continue;
                }
                if is(fake.garbage_on) {
                    let _ = socket.send(Message::Text("<html>not json</html>".into())).await;
                    continue;
                }
                if is(fake.drop_on) {
                    break;
                }

                if fake.noisy {
                    send_json(
                        &mut socket,
                        json!({"op": 5, "d": {"eventType": "StreamStateChanged", "eventIntent": 64}}),
                    )
                    .await;
                    send_json(
                        &mut socket,
                        json!({"op": 7, "d": {
                            "requestType": request_type,
                            "requestId": "someone-else",
                            "requestStatus": {"result": false, "code": 600}
                        }}),
                    )
                    .await;
                }

                let (status, data) = if fake.failing_request == Some(request_type.as_str()) {
                    (
                        json!({"result": false, "code": 501, "comment": "Output not running."}),
                        Value::Null,
                    )
                } else {
                    let data = match request_type.as_str() {
                        "GetStats" => fake.stats.clone(),
                        "GetStreamStatus" => fake.stream_status.clone(),
                        _ => Value::Null,
                    };
                    (json!({"result": true, "code": 100}), data)
                };
                let mut d = json!({
                    "requestType": request_type,
                    "requestId": request_id,
                    "requestStatus": status,
                });
                if !data.is_null() {
                    d["responseData"] = data;
                }
                if !send_json(&mut socket, json!({"op": 7, "d": d})).await {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    state.closed.fetch_add(1, Ordering::SeqCst);
}

pub fn config_for(addr: SocketAddr, password: &str) -> Config {
    config_with_timeout(addr, password, 2000)
}

pub fn config_with_timeout(addr: SocketAddr, password: &str, timeout_ms: u64) -> Config {
    let vars: HashMap<&str, String> = HashMap::from([
        ("OBS_HOST", addr.ip().to_string()),
        ("OBS_PORT", addr.port().to_string()),
        ("OBS_PASSWORD", password.to_string()),
        ("LISTEN_PORT", "0".to_string()),
        ("OBS_TIMEOUT_MS", timeout_ms.to_string()),
    ]);
    Config::from_lookup(|k| vars.get(k).cloned()).expect("test config")
}

/// A local port with nothing listening on it.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("local addr")
}
