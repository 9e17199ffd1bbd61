//! The connection hub — a single coordination loop owning the connection
//! set.
//!
//! Registration, unregistration, inbound routing, and broadcast requests
//! are all serialized through one event channel, so the connection set
//! itself never needs a lock; only the per-connection outbound queues are
//! independently synchronized. Each inbound message is dispatched on its
//! own task, keeping a slow or hung service call from stalling membership
//! changes, broadcasts, or other connections.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use portico_protocol::{Response, ServiceStatus};
use portico_server::{CallContext, Dispatcher};
use portico_token::AuthorizationToken;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Identity of one live client connection.
pub type ConnectionId = Uuid;

/// Depth of the hub's own event channel. Events are cheap to process, so
/// this only needs to absorb short bursts.
const EVENT_QUEUE_DEPTH: usize = 1024;

enum HubEvent {
    Register {
        id: ConnectionId,
        outbound: mpsc::Sender<Vec<u8>>,
        authorization: Option<AuthorizationToken>,
    },
    Unregister {
        id: ConnectionId,
    },
    Inbound {
        id: ConnectionId,
        frame: Vec<u8>,
    },
    Send {
        id: ConnectionId,
        frame: Vec<u8>,
    },
    Broadcast {
        frame: Vec<u8>,
    },
}

/// One registered connection as the coordination loop sees it: the sending
/// half of its bounded outbound queue plus the identity presented at
/// upgrade time.
struct Connection {
    outbound: mpsc::Sender<Vec<u8>>,
    authorization: Option<AuthorizationToken>,
}

/// Handle to the coordination loop. Cheap to clone; every method resolves
/// as soon as the event is enqueued, never waiting on any client's socket.
#[derive(Clone)]
pub struct Hub {
    events: mpsc::Sender<HubEvent>,
}

impl Hub {
    /// Spawn the coordination loop. Called once, before any connection is
    /// accepted.
    pub fn start(dispatcher: Arc<Dispatcher>) -> Self {
        let (events, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let hub = Self { events };
        tokio::spawn(run(rx, hub.clone(), dispatcher));
        hub
    }

    /// Register a connection's outbound queue and presented identity.
    pub async fn register(
        &self,
        id: ConnectionId,
        outbound: mpsc::Sender<Vec<u8>>,
        authorization: Option<AuthorizationToken>,
    ) {
        self.emit(HubEvent::Register {
            id,
            outbound,
            authorization,
        })
        .await;
    }

    /// Unregister a connection and close its outbound queue. Later `send`s
    /// for the same id are no-ops.
    pub async fn disconnect(&self, id: ConnectionId) {
        self.emit(HubEvent::Unregister { id }).await;
    }

    /// Route one inbound frame, tagged with the connection it arrived on.
    pub async fn inbound(&self, id: ConnectionId, frame: Vec<u8>) {
        self.emit(HubEvent::Inbound { id, frame }).await;
    }

    /// Enqueue a frame on one connection's outbound queue.
    pub async fn send(&self, id: ConnectionId, frame: Vec<u8>) {
        self.emit(HubEvent::Send { id, frame }).await;
    }

    /// Enqueue a frame on every registered connection's outbound queue.
    pub async fn broadcast(&self, frame: Vec<u8>) {
        self.emit(HubEvent::Broadcast { frame }).await;
    }

    async fn emit(&self, event: HubEvent) {
        // Only fails when the loop itself is gone, which means shutdown.
        let _ = self.events.send(event).await;
    }
}

async fn run(mut events: mpsc::Receiver<HubEvent>, hub: Hub, dispatcher: Arc<Dispatcher>) {
    let mut connections: HashMap<ConnectionId, Connection> = HashMap::new();

    while let Some(event) = events.recv().await {
        match event {
            HubEvent::Register {
                id,
                outbound,
                authorization,
            } => {
                connections.insert(
                    id,
                    Connection {
                        outbound,
                        authorization,
                    },
                );
                info!(connection = %id, total = connections.len(), "connection registered");
            }

            HubEvent::Unregister { id } => {
                if connections.remove(&id).is_some() {
                    info!(connection = %id, total = connections.len(), "connection unregistered");
                }
            }

            HubEvent::Inbound { id, frame } => {
                // Connection may have raced with its own disconnect.
                let Some(connection) = connections.get(&id) else {
                    continue;
                };
                let ctx = CallContext {
                    authorization: connection.authorization.clone(),
                };
                dispatch_detached(hub.clone(), dispatcher.clone(), id, frame, ctx);
            }

            HubEvent::Send { id, frame } => {
                deliver(&mut connections, id, frame);
            }

            HubEvent::Broadcast { frame } => {
                let shed: Vec<ConnectionId> = connections
                    .iter()
                    .filter_map(|(id, connection)| {
                        connection.outbound.try_send(frame.clone()).err().map(|_| *id)
                    })
                    .collect();
                for id in shed {
                    connections.remove(&id);
                    warn!(connection = %id, "outbound queue overflow during broadcast, shedding client");
                }
            }
        }
    }

    debug!("hub coordination loop stopped");
}

/// Enqueue a frame for one connection, shedding the client when its queue
/// is full. Unknown ids are a no-op — the connection already disconnected.
fn deliver(connections: &mut HashMap<ConnectionId, Connection>, id: ConnectionId, frame: Vec<u8>) {
    let Some(connection) = connections.get(&id) else {
        return;
    };
    if connection.outbound.try_send(frame).is_err() {
        connections.remove(&id);
        warn!(connection = %id, "outbound queue overflow, shedding client");
    }
}

/// Run one dispatch on its own task. A panic inside a service operation is
/// contained here: it is logged and answered with the minimal failure
/// envelope, and never reaches the coordination loop or other connections.
fn dispatch_detached(
    hub: Hub,
    dispatcher: Arc<Dispatcher>,
    id: ConnectionId,
    frame: Vec<u8>,
    ctx: CallContext,
) {
    tokio::spawn(async move {
        let reply = match AssertUnwindSafe(dispatcher.dispatch(&frame, &ctx))
            .catch_unwind()
            .await
        {
            Ok(bytes) => bytes,
            Err(_) => {
                error!(connection = %id, "service call panicked");
                failure_reply(&frame)
            }
        };
        hub.send(id, reply).await;
    });
}

/// Minimal envelope for a dispatch that produced no response at all. The
/// request id is recovered best-effort so the client can still correlate.
fn failure_reply(raw: &[u8]) -> Vec<u8> {
    let request_id = serde_json::from_slice::<serde_json::Value>(raw)
        .ok()
        .and_then(|v| v.get("id").and_then(|i| i.as_str()).map(str::to_owned))
        .unwrap_or_default();

    let mut response = Response::error(ServiceStatus::UnableToMarshalResponse);
    response.request_id = request_id;
    response.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_protocol::Response;
    use portico_server::{Endpoint, ServiceMap};
    use std::time::Duration;
    use tokio::time::timeout;

    const ECHO: i32 = 1;
    const STALL: i32 = 2;
    const PANIC: i32 = 3;

    fn test_hub() -> Hub {
        let mut map = ServiceMap::new();
        map.register(
            ECHO,
            Endpoint::with_payload(|n: i64| async move { Response::success(n) })
                .allow_anonymous(),
        )
        .unwrap();
        map.register(
            STALL,
            Endpoint::new(|| async {
                std::future::pending::<()>().await;
                Response::success(true)
            })
            .allow_anonymous(),
        )
        .unwrap();
        map.register(
            PANIC,
            Endpoint::new(|| async {
                let crash = true;
                assert!(!crash, "service blew up");
                Response::success(true)
            })
            .allow_anonymous(),
        )
        .unwrap();
        Hub::start(Arc::new(Dispatcher::new(map)))
    }

    async fn recv(rx: &mut mpsc::Receiver<Vec<u8>>) -> serde_json::Value {
        let frame = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for frame")
            .expect("queue closed");
        serde_json::from_slice(&frame).unwrap()
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection_once() {
        let hub = test_hub();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = mpsc::channel(8);
            hub.register(Uuid::new_v4(), tx, None).await;
            receivers.push(rx);
        }

        hub.broadcast(b"{\"event\":\"tick\"}".to_vec()).await;

        for rx in &mut receivers {
            let msg = recv(rx).await;
            assert_eq!(msg["event"], "tick");
            // Exactly one copy.
            assert!(
                timeout(Duration::from_millis(100), rx.recv()).await.is_err(),
                "received a duplicate broadcast"
            );
        }
    }

    #[tokio::test]
    async fn sends_stay_fifo_relative_to_broadcast() {
        let hub = test_hub();
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        hub.register(id, tx, None).await;

        hub.send(id, b"{\"n\":1}".to_vec()).await;
        hub.broadcast(b"{\"n\":2}".to_vec()).await;
        hub.send(id, b"{\"n\":3}".to_vec()).await;

        assert_eq!(recv(&mut rx).await["n"], 1);
        assert_eq!(recv(&mut rx).await["n"], 2);
        assert_eq!(recv(&mut rx).await["n"], 3);
    }

    #[tokio::test]
    async fn overflowing_client_is_shed() {
        let hub = test_hub();
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(1);
        hub.register(id, tx, None).await;

        hub.send(id, b"first".to_vec()).await;
        hub.send(id, b"second".to_vec()).await; // overflows, sheds

        assert_eq!(rx.recv().await.unwrap(), b"first".to_vec());
        // Hub dropped its sender; the queue drains then closes.
        assert!(rx.recv().await.is_none());

        // Further sends are no-ops, not errors.
        hub.send(id, b"third".to_vec()).await;
    }

    #[tokio::test]
    async fn slow_service_call_does_not_block_other_connections() {
        let hub = test_hub();

        let a = Uuid::new_v4();
        let (tx_a, _rx_a) = mpsc::channel(8);
        hub.register(a, tx_a, None).await;

        let b = Uuid::new_v4();
        let (tx_b, mut rx_b) = mpsc::channel(8);
        hub.register(b, tx_b, None).await;

        // A's request hangs forever inside the service.
        hub.inbound(a, br#"{"type":2,"id":"stuck"}"#.to_vec()).await;

        // B still gets deliveries within bounded time.
        hub.broadcast(b"{\"still\":\"alive\"}".to_vec()).await;
        assert_eq!(recv(&mut rx_b).await["still"], "alive");

        hub.send(b, br#"{"direct":true}"#.to_vec()).await;
        assert_eq!(recv(&mut rx_b).await["direct"], true);
    }

    #[tokio::test]
    async fn panicking_service_answers_only_its_own_connection() {
        let hub = test_hub();

        let a = Uuid::new_v4();
        let (tx_a, mut rx_a) = mpsc::channel(8);
        hub.register(a, tx_a, None).await;

        let b = Uuid::new_v4();
        let (tx_b, mut rx_b) = mpsc::channel(8);
        hub.register(b, tx_b, None).await;

        hub.inbound(a, br#"{"type":3,"id":"boom"}"#.to_vec()).await;

        let reply = recv(&mut rx_a).await;
        assert_eq!(reply["status"], ServiceStatus::UnableToMarshalResponse.code());
        assert_eq!(reply["id"], "boom");

        // The hub survived; B is untouched and still reachable.
        hub.inbound(b, br#"{"type":1,"id":"ok","data":7}"#.to_vec()).await;
        let reply = recv(&mut rx_b).await;
        assert_eq!(reply["status"], ServiceStatus::Okay.code());
        assert_eq!(reply["data"], 7);
    }

    #[tokio::test]
    async fn inbound_after_disconnect_is_dropped() {
        let hub = test_hub();
        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::channel(8);
        hub.register(id, tx, None).await;
        hub.disconnect(id).await;

        hub.inbound(id, br#"{"type":1,"id":"late","data":1}"#.to_vec()).await;
        assert!(rx.recv().await.is_none());
    }
}
