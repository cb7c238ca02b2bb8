//! obs-websocket session client: one connection per scrape, two requests, then close.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::config::ObsEndpoint;
use crate::error::{ExporterError, Result};
use crate::proto::{
    authentication_string, Frame, Hello, Identify, Request, RequestResponse,
    CLOSE_AUTHENTICATION_FAILED, OP_HELLO, OP_IDENTIFIED, OP_IDENTIFY, OP_REQUEST,
    OP_REQUEST_RESPONSE, RPC_VERSION,
};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const GET_STATS: &str = "GetStats";
pub const GET_STREAM_STATUS: &str = "GetStreamStatus";

/// Raw `responseData` of both requests, still undecoded.
#[derive(Debug, Clone)]
pub struct Snapshots {
    pub stats: Value,
    pub stream_status: Value,
}

/// Open a session, fetch stats then stream status, and close the session
/// whether or not the requests succeeded.
pub async fn fetch_snapshots(endpoint: &ObsEndpoint) -> Result<Snapshots> {
    let mut session = ObsSession::open(endpoint).await?;
    let result = session.query_snapshots().await;
    session.close().await;
    result
}

/// An identified obs-websocket connection.
pub struct ObsSession {
    ws: WsStream,
    timeout: Duration,
    next_id: u64,
}

impl ObsSession {
    /// Connect and complete Hello / Identify / Identified.
    pub async fn open(endpoint: &ObsEndpoint) -> Result<Self> {
        let limit = endpoint.timeout;
        match timeout(limit, Self::handshake(endpoint)).await {
            Ok(res) => res,
            Err(_) => Err(ExporterError::connection(format!(
                "handshake with {} timed out after {limit:?}",
                endpoint.url
            ))),
        }
    }

    async fn handshake(endpoint: &ObsEndpoint) -> Result<Self> {
        let (mut ws, _) = connect_async(endpoint.url.as_str())
            .await
            .map_err(|e| ExporterError::connection(format!("{}: {e}", endpoint.url)))?;
        debug!(url = %endpoint.url, "connected to obs-websocket");

        if let Err(e) = identify(&mut ws, &endpoint.password).await {
            let _ = ws.close(None).await;
            return Err(ExporterError::connection(e));
        }
        debug!("identified with obs-websocket");

        Ok(Self {
            ws,
            timeout: endpoint.timeout,
            next_id: 0,
        })
    }

    pub async fn query_snapshots(&mut self) -> Result<Snapshots> {
        let stats = self.call(GET_STATS).await?;
        let stream_status = self.call(GET_STREAM_STATUS).await?;
        Ok(Snapshots {
            stats,
            stream_status,
        })
    }

    /// Send one request and wait for its response data.
    pub async fn call(&mut self, request_type: &str) -> Result<Value> {
        let limit = self.timeout;
        match timeout(limit, self.call_inner(request_type)).await {
            Ok(res) => res,
            Err(_) => Err(ExporterError::query(format!(
                "{request_type} timed out after {limit:?}"
            ))),
        }
    }

    async fn call_inner(&mut self, request_type: &str) -> Result<Value> {
        self.next_id += 1;
        let request_id = format!("obs-exporter-{}", self.next_id);
        let request = Request {
            request_type: request_type.to_string(),
            request_id: request_id.clone(),
        };
        let frame = Frame::new(OP_REQUEST, &request)
            .map_err(|e| ExporterError::query(format!("{request_type}: {e}")))?;
        send_frame(&mut self.ws, &frame)
            .await
            .map_err(|e| ExporterError::query(format!("{request_type}: {e}")))?;
        debug!(request_type, request_id = %request_id, "request sent");

        loop {
            let frame = next_frame(&mut self.ws)
                .await
                .map_err(|e| ExporterError::query(format!("{request_type}: {e}")))?;
            // Events and other traffic are not ours.
            if frame.op != OP_REQUEST_RESPONSE {
                continue;
            }
            let response: RequestResponse = frame.data().map_err(|e| {
                ExporterError::query(format!("{request_type}: malformed response: {e}"))
            })?;
            if response.request_id != request_id {
                continue;
            }
            let status = response.request_status;
            if !status.result {
                return Err(ExporterError::query(format!(
                    "{request_type} failed with code {}: {}",
                    status.code,
                    status.comment.as_deref().unwrap_or("no comment")
                )));
            }
            return Ok(response.response_data);
        }
    }

    /// Bounded by the session timeout; a peer that stops reading can't hold the scrape.
    pub async fn close(mut self) {
        match timeout(self.timeout, self.ws.close(None)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("closing obs-websocket session: {e}"),
            Err(_) => debug!("closing obs-websocket session timed out after {:?}", self.timeout),
        }
    }
}

async fn identify(ws: &mut WsStream, password: &str) -> std::result::Result<(), String> {
    let frame = next_frame(ws).await?;
    if frame.op != OP_HELLO {
        return Err(format!("expected Hello (op {OP_HELLO}), got op {}", frame.op));
    }
    let hello: Hello = frame.data().map_err(|e| format!("malformed Hello: {e}"))?;
    debug!(
        version = hello.obs_web_socket_version.as_deref().unwrap_or("unknown"),
        rpc_version = hello.rpc_version,
        auth = hello.authentication.is_some(),
        "received Hello"
    );

    let identify = Identify {
        rpc_version: RPC_VERSION,
        authentication: hello
            .authentication
            .as_ref()
            .map(|a| authentication_string(password, &a.salt, &a.challenge)),
        event_subscriptions: 0,
    };
    let frame = Frame::new(OP_IDENTIFY, &identify).map_err(|e| e.to_string())?;
    send_frame(ws, &frame).await?;

    loop {
        let frame = next_frame(ws).await?;
        if frame.op == OP_IDENTIFIED {
            return Ok(());
        }
    }
}

async fn send_frame(ws: &mut WsStream, frame: &Frame) -> std::result::Result<(), String> {
    let text = frame.to_text().map_err(|e| e.to_string())?;
    ws.send(Message::Text(text)).await.map_err(|e| e.to_string())
}

/// Next JSON text frame; pings and binary messages are skipped.
async fn next_frame(ws: &mut WsStream) -> std::result::Result<Frame, String> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return Frame::parse(&text).map_err(|e| format!("invalid frame: {e}"));
            }
            Some(Ok(Message::Close(frame))) => {
                return Err(match frame {
                    Some(f) if u16::from(f.code) == CLOSE_AUTHENTICATION_FAILED => {
                        format!("authentication failed ({CLOSE_AUTHENTICATION_FAILED})")
                    }
                    Some(f) => format!("connection closed by server ({}): {}", u16::from(f.code), f.reason),
                    None => "connection closed by server".to_string(),
                });
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.to_string()),
            None => return Err("connection closed by server".to_string()),
        }
    }
}
