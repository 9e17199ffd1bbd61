//! WebSocket transport server using Axum.
//!
//! Handles the HTTP upgrade, extracts the caller's authorization token from
//! the query string or cookie, and runs the two per-connection pumps: an
//! inbound pump reading frames off the socket into the hub, and an outbound
//! pump draining the connection's bounded queue back to the socket.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json},
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use portico_server::Dispatcher;
use portico_token::{AuthorizationToken, TokenCodec};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::hub::Hub;

/// Name of the query parameter and cookie carrying the authorization token.
const AUTHORIZATION_PARAM: &str = "authorization";

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned).
    pub port: u16,
    /// Hostname to bind to.
    pub hostname: String,
    /// Maximum concurrent connections.
    pub max_connections: Option<usize>,
    /// Per-connection outbound queue depth. A client that falls this many
    /// frames behind is shed.
    pub queue_depth: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 8090,
            hostname: "127.0.0.1".into(),
            max_connections: Some(256),
            queue_depth: 256,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid listen address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

struct AppState {
    hub: Hub,
    codec: Arc<TokenCodec>,
    queue_depth: usize,
    max_connections: Option<usize>,
    client_count: Arc<AtomicUsize>,
}

/// The transport server — accepts upgrades and feeds the hub.
pub struct TransportServer {
    hub: Hub,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
    port: u16,
}

impl TransportServer {
    /// Start the hub coordination loop and the HTTP listener. Bind failure
    /// is the one fatal startup error.
    pub async fn start(
        config: TransportConfig,
        codec: Arc<TokenCodec>,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self, TransportError> {
        let hub = Hub::start(dispatcher);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let state = Arc::new(AppState {
            hub: hub.clone(),
            codec,
            queue_depth: config.queue_depth,
            max_connections: config.max_connections,
            client_count: Arc::new(AtomicUsize::new(0)),
        });

        let app = Router::new()
            .route("/ws", get(ws_upgrade_handler))
            .route("/health", get(health_handler))
            .with_state(state);

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!("portico transport listening on ws://{}:{}/ws", config.hostname, actual_port);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            hub,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Handle for point-to-point sends and broadcasts from server-side
    /// events.
    pub fn hub(&self) -> Hub {
        self.hub.clone()
    }

    /// The actually bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Gracefully stop the listener.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("portico transport server stopped");
    }
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    if let Some(max) = state.max_connections {
        let current = state.client_count.load(Ordering::Relaxed);
        if current >= max {
            warn!("connection rejected: max connections reached ({max})");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }

    let authorization = presented_authorization(&state.codec, &params, &headers);

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, authorization))
        .into_response()
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "clients": state.client_count.load(Ordering::Relaxed),
    }))
}

/// Decode the authorization token from the `authorization` query parameter
/// or cookie. An invalid or expired token downgrades the connection to
/// anonymous rather than rejecting the upgrade — endpoint contracts decide
/// what an anonymous caller may do.
fn presented_authorization(
    codec: &TokenCodec,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Option<AuthorizationToken> {
    let presented = params
        .get(AUTHORIZATION_PARAM)
        .cloned()
        .or_else(|| cookie_value(headers, AUTHORIZATION_PARAM))?;

    match AuthorizationToken::decode_string(codec, &presented, true) {
        Ok(token) => Some(token),
        Err(err) => {
            debug!(%err, "rejected presented authorization token");
            None
        }
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        pair.trim()
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_owned)
    })
}

async fn handle_ws_connection(
    socket: WebSocket,
    state: Arc<AppState>,
    authorization: Option<AuthorizationToken>,
) {
    let id = Uuid::new_v4();
    state.client_count.fetch_add(1, Ordering::Relaxed);
    info!(connection = %id, authorized = authorization.is_some(), "client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Register before pumping so nothing inbound can race the membership.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Vec<u8>>(state.queue_depth);
    state.hub.register(id, outbound_tx, authorization).await;

    // Outbound pump: drain the bounded queue until the hub closes it.
    // Frames that are not valid UTF-8 go out as binary, mirroring what the
    // inbound side accepts.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let message = match String::from_utf8(frame) {
                Ok(text) => Message::Text(text.into()),
                Err(err) => Message::Binary(err.into_bytes().into()),
            };
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    // Inbound pump: read frames off the transport into the hub, tagged with
    // this connection's identity. Ping/pong is handled by the WebSocket
    // stack underneath.
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                state.hub.inbound(id, text.as_bytes().to_vec()).await;
            }
            Ok(Message::Binary(data)) => {
                state.hub.inbound(id, data.to_vec()).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(connection = %id, %err, "websocket read error");
                break;
            }
        }
    }

    state.hub.disconnect(id).await;
    let _ = writer.await;

    state.client_count.fetch_sub(1, Ordering::Relaxed);
    info!(connection = %id, "client disconnected");
}
