//! Session gateway
//!
//! This module is the realtime edge of the server: it accepts WebSocket
//! connections, turns inbound frames into room operations, and pushes
//! resulting broadcasts back out. Every inbound event runs to completion
//! under a single registry lock, so room transitions are serialized and the
//! per-connection outbound channel preserves completion order.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use garde::Validate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    catalog::Catalog,
    constants::{
        room::{DEFAULT_TOTAL_QUESTIONS, MAX_TOTAL_QUESTIONS, MIN_TOTAL_QUESTIONS},
        room_id::{MAX_LENGTH, MIN_LENGTH},
    },
    names,
    registry::{self, Registry},
    room::AlarmMessage,
    room_id::RoomId,
    session::{ConnectionId, Tunnel},
};

/// Events received from clients
///
/// Each event names the room it addresses; the gateway routes it through
/// the registry to that room's state machine. Disconnects arrive at the
/// transport level, not as an event.
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingMessage {
    /// Allocate a room under a client-chosen identifier
    CreateGame {
        /// The identifier to create the room under
        room_id: RoomId,
        /// Number of questions; defaults when omitted
        #[serde(default)]
        total_questions: Option<usize>,
    },
    /// Enter a room as a player
    JoinGame {
        /// The room to join
        room_id: RoomId,
        /// Display name; generated when omitted
        #[serde(default)]
        display_name: Option<String>,
    },
    /// Answer the current round
    SubmitAnswer {
        /// The room being played
        room_id: RoomId,
        /// The chosen label; absent when the clock ran out
        #[serde(default)]
        answer: Option<String>,
        /// Seconds left on the client's countdown
        time_remaining: u32,
    },
    /// Ask for the next round (redundant with the server's own timer)
    NextRound {
        /// The room being played
        room_id: RoomId,
    },
    /// Offer the opponent a rematch
    RequestRematch {
        /// The finished room
        room_id: RoomId,
    },
    /// Accept a previously offered rematch
    AcceptRematch {
        /// The finished room
        room_id: RoomId,
    },
}

/// Update messages originating from the gateway itself
///
/// These are unicast responses about the connection or a failed request,
/// never room broadcasts.
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// Assigns the connection its identifier, sent once on connect
    Welcome {
        /// The identifier broadcasts will refer to this connection by
        connection_id: ConnectionId,
    },
    /// The addressed room does not exist (stale, expired, or mistyped)
    RoomNotFound {
        /// Human-readable explanation for the lobby screen
        message: String,
    },
    /// The addressed room already holds two players
    RoomFull,
    /// Room creation failed because the identifier is taken
    RoomTaken {
        /// Human-readable explanation
        message: String,
    },
    /// The requested display name was rejected
    NameError(names::Error),
    /// The request failed validation
    InvalidRequest {
        /// Human-readable explanation
        message: String,
    },
}

/// Validated payload for room creation
#[derive(Debug, Validate)]
struct CreateGameParams<'a> {
    /// The client-chosen room identifier
    #[garde(length(min = MIN_LENGTH, max = MAX_LENGTH))]
    room_id: &'a str,
    /// Number of questions in the match
    #[garde(range(min = MIN_TOTAL_QUESTIONS, max = MAX_TOTAL_QUESTIONS))]
    total_questions: usize,
}

/// A tunnel backed by a connection's outbound channel
///
/// Messages are serialized to JSON and handed to the connection's pusher
/// task; a closed channel silently drops them, matching best-effort
/// delivery.
#[derive(Debug, Clone)]
pub struct WsTunnel {
    /// Outbound channel consumed by the connection's pusher task
    sender: mpsc::UnboundedSender<String>,
}

impl Tunnel for WsTunnel {
    fn send_message(&self, message: &crate::UpdateMessage) {
        let _ = self.sender.send(message.to_message());
    }

    fn close(self) {
        // Dropping the sender ends the pusher task once queued messages
        // have flushed.
    }
}

/// Shared state behind the gateway's routes
///
/// The registry sits behind one async mutex: each event-handler body runs
/// to completion before the next acquires it, which is the serialization
/// the room state machine relies on. The tunnel table uses a short-lived
/// sync lock since sends never block.
pub struct AppState {
    /// All live rooms
    registry: tokio::sync::Mutex<Registry>,
    /// Outbound tunnels by connection
    tunnels: RwLock<HashMap<ConnectionId, WsTunnel>>,
}

impl AppState {
    /// Creates the shared state over the given catalog
    pub fn new(catalog: &'static Catalog) -> Arc<Self> {
        Arc::new(Self {
            registry: tokio::sync::Mutex::new(Registry::new(catalog)),
            tunnels: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the closure rooms use to reach their members' tunnels
    fn tunnel_finder(&self) -> impl Fn(ConnectionId) -> Option<WsTunnel> + '_ {
        |connection_id| {
            self.tunnels
                .read()
                .expect("tunnel table lock poisoned")
                .get(&connection_id)
                .cloned()
        }
    }

    /// Sends a message to a single connection
    fn unicast(&self, connection_id: ConnectionId, message: &crate::UpdateMessage) {
        if let Some(tunnel) = self.tunnel_finder()(connection_id) {
            tunnel.send_message(message);
        }
    }
}

/// Builds the gateway router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

/// Liveness probe
async fn health() -> &'static str {
    "ok"
}

/// Upgrades an incoming request into a game connection
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Runs one client connection from accept to teardown
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = ConnectionId::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let tunnel = WsTunnel { sender: tx };

    state
        .tunnels
        .write()
        .expect("tunnel table lock poisoned")
        .insert(connection_id, tunnel.clone());
    tracing::info!(%connection_id, "connection accepted");

    tunnel.send_message(&UpdateMessage::Welcome { connection_id }.into());

    let (sender, receiver) = socket.split();
    let mut send_task = pusher_loop(rx, sender);
    let mut recv_task = tokio::spawn(receive_loop(receiver, Arc::clone(&state), connection_id));

    // Whichever side finishes first tears down the other.
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    }

    if let Some(tunnel) = state
        .tunnels
        .write()
        .expect("tunnel table lock poisoned")
        .remove(&connection_id)
    {
        tunnel.close();
    }

    let reclaimed = {
        let mut registry = state.registry.lock().await;
        registry.disconnect(connection_id, state.tunnel_finder())
    };
    tracing::info!(%connection_id, reclaimed = reclaimed.len(), "connection closed");
}

/// Forwards queued outbound messages to the socket until either side closes
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(Message::Text(message.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Reads frames from the socket and dispatches game events
async fn receive_loop(
    mut receiver: SplitStream<WebSocket>,
    state: Arc<AppState>,
    connection_id: ConnectionId,
) {
    while let Some(message) = receiver.next().await {
        let message = match message {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(%connection_id, %error, "websocket error");
                break;
            }
        };

        match message {
            Message::Text(text) => match serde_json::from_str::<IncomingMessage>(&text) {
                Ok(incoming) => handle_incoming(&state, connection_id, incoming).await,
                Err(error) => {
                    tracing::warn!(%connection_id, %error, "unparseable message dropped");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
}

/// Dispatches one inbound event against the registry
///
/// The registry lock is held for the whole event, so a room sees at most
/// one mutation at a time and broadcast order matches completion order.
async fn handle_incoming(state: &Arc<AppState>, connection_id: ConnectionId, message: IncomingMessage) {
    let tunnel_finder = state.tunnel_finder();
    let mut registry = state.registry.lock().await;

    match message {
        IncomingMessage::CreateGame {
            room_id,
            total_questions,
        } => {
            let total_questions = total_questions.unwrap_or(DEFAULT_TOTAL_QUESTIONS);
            let params = CreateGameParams {
                room_id: room_id.as_str(),
                total_questions,
            };
            if let Err(report) = params.validate() {
                state.unicast(
                    connection_id,
                    &UpdateMessage::InvalidRequest {
                        message: report.to_string(),
                    }
                    .into(),
                );
                return;
            }

            match registry.create(room_id.clone(), total_questions) {
                Ok(()) => state.unicast(
                    connection_id,
                    &registry::UpdateMessage::GameCreated { room_id }.into(),
                ),
                Err(error) => state.unicast(
                    connection_id,
                    &UpdateMessage::RoomTaken {
                        message: format!("cannot create room \"{room_id}\": {error}"),
                    }
                    .into(),
                ),
            }
        }
        IncomingMessage::JoinGame {
            room_id,
            display_name,
        } => {
            let display_name = match names::resolve(display_name.as_deref()) {
                Ok(name) => name,
                Err(error) => {
                    state.unicast(connection_id, &UpdateMessage::NameError(error).into());
                    return;
                }
            };

            match registry.get_mut(&room_id) {
                Ok(room) => {
                    if room
                        .join(connection_id, display_name, &tunnel_finder)
                        .is_err()
                    {
                        state.unicast(connection_id, &UpdateMessage::RoomFull.into());
                    }
                }
                Err(_) => state.unicast(connection_id, &room_not_found(&room_id)),
            }
        }
        IncomingMessage::SubmitAnswer {
            room_id,
            answer,
            time_remaining,
        } => match registry.get_mut(&room_id) {
            Ok(room) => room.submit_answer(
                connection_id,
                answer.as_deref(),
                time_remaining,
                alarm_scheduler(state),
                &tunnel_finder,
            ),
            Err(_) => state.unicast(connection_id, &room_not_found(&room_id)),
        },
        IncomingMessage::NextRound { room_id } => match registry.get_mut(&room_id) {
            Ok(room) => {
                room.request_advance(connection_id, &tunnel_finder);
            }
            Err(_) => state.unicast(connection_id, &room_not_found(&room_id)),
        },
        IncomingMessage::RequestRematch { room_id } => match registry.get_mut(&room_id) {
            Ok(room) => room.request_rematch(connection_id, &tunnel_finder),
            Err(_) => state.unicast(connection_id, &room_not_found(&room_id)),
        },
        IncomingMessage::AcceptRematch { room_id } => {
            if registry
                .accept_rematch(&room_id, connection_id, &tunnel_finder)
                .is_err()
            {
                state.unicast(connection_id, &room_not_found(&room_id));
            }
        }
    }
}

/// Builds the unicast for a stale or unknown room reference
fn room_not_found(room_id: &RoomId) -> crate::UpdateMessage {
    UpdateMessage::RoomNotFound {
        message: format!("room \"{room_id}\" does not exist or has expired"),
    }
    .into()
}

/// Returns a scheduler that delivers alarms back through the registry
///
/// Each scheduled alarm sleeps on its own task and then re-enters the
/// registry lock, never the lock currently held by the scheduling event.
/// The room drops the alarm if it is stale by then, and the guard it set
/// when scheduling clears on every exit path.
fn alarm_scheduler(state: &Arc<AppState>) -> impl FnMut(AlarmMessage, Duration) + use<> {
    let state = Arc::clone(state);
    move |alarm, delay| {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let tunnel_finder = state.tunnel_finder();
            let mut registry = state.registry.lock().await;
            registry.receive_alarm(&alarm, tunnel_finder);
        });
    }
}

/// Spawns the periodic idle-room sweep
pub fn spawn_expiry_sweep(
    state: Arc<AppState>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let tunnel_finder = state.tunnel_finder();
            let mut registry = state.registry.lock().await;
            let swept = registry.sweep_expired(tunnel_finder);
            if !swept.is_empty() {
                tracing::debug!(count = swept.len(), "expired rooms reclaimed");
            }
        }
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn register_connection(state: &Arc<AppState>) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let connection_id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        state
            .tunnels
            .write()
            .unwrap()
            .insert(connection_id, WsTunnel { sender: tx });
        (connection_id, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn test_incoming_message_shapes() {
        let create: IncomingMessage =
            serde_json::from_str(r#"{"CreateGame":{"room_id":"abc123"}}"#).unwrap();
        assert!(matches!(
            create,
            IncomingMessage::CreateGame {
                total_questions: None,
                ..
            }
        ));

        let join: IncomingMessage =
            serde_json::from_str(r#"{"JoinGame":{"room_id":"abc123","display_name":"Red"}}"#)
                .unwrap();
        assert!(matches!(join, IncomingMessage::JoinGame { .. }));

        let timeout: IncomingMessage = serde_json::from_str(
            r#"{"SubmitAnswer":{"room_id":"abc123","time_remaining":0}}"#,
        )
        .unwrap();
        assert!(matches!(
            timeout,
            IncomingMessage::SubmitAnswer { answer: None, .. }
        ));
    }

    #[test]
    fn test_create_params_validation() {
        assert!(
            CreateGameParams {
                room_id: "abc123",
                total_questions: 10
            }
            .validate()
            .is_ok()
        );
        assert!(
            CreateGameParams {
                room_id: "",
                total_questions: 10
            }
            .validate()
            .is_err()
        );
        assert!(
            CreateGameParams {
                room_id: "abc123",
                total_questions: 0
            }
            .validate()
            .is_err()
        );
    }

    #[tokio::test]
    async fn test_create_game_responds_to_creator() {
        let state = AppState::new(Catalog::builtin());
        let (creator, mut rx) = register_connection(&state);

        handle_incoming(
            &state,
            creator,
            IncomingMessage::CreateGame {
                room_id: RoomId::new("abc123"),
                total_questions: None,
            },
        )
        .await;

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("GameCreated"));
        assert!(messages[0].contains("abc123"));
    }

    #[tokio::test]
    async fn test_create_collision_is_rejected() {
        let state = AppState::new(Catalog::builtin());
        let (creator, mut rx) = register_connection(&state);

        for _ in 0..2 {
            handle_incoming(
                &state,
                creator,
                IncomingMessage::CreateGame {
                    room_id: RoomId::new("abc123"),
                    total_questions: None,
                },
            )
            .await;
        }

        let messages = drain(&mut rx);
        assert!(messages[1].contains("RoomTaken"));
    }

    #[tokio::test]
    async fn test_join_unknown_room_is_unicast_error() {
        let state = AppState::new(Catalog::builtin());
        let (player, mut rx) = register_connection(&state);

        handle_incoming(
            &state,
            player,
            IncomingMessage::JoinGame {
                room_id: RoomId::new("missing"),
                display_name: None,
            },
        )
        .await;

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("RoomNotFound"));
    }

    #[tokio::test]
    async fn test_full_join_flow_broadcasts_start() {
        let state = AppState::new(Catalog::builtin());
        let (creator, mut creator_rx) = register_connection(&state);
        let (opponent, mut opponent_rx) = register_connection(&state);

        handle_incoming(
            &state,
            creator,
            IncomingMessage::CreateGame {
                room_id: RoomId::new("abc123"),
                total_questions: None,
            },
        )
        .await;
        handle_incoming(
            &state,
            creator,
            IncomingMessage::JoinGame {
                room_id: RoomId::new("abc123"),
                display_name: Some("Red".to_owned()),
            },
        )
        .await;
        handle_incoming(
            &state,
            opponent,
            IncomingMessage::JoinGame {
                room_id: RoomId::new("abc123"),
                display_name: Some("Blue".to_owned()),
            },
        )
        .await;

        let creator_messages = drain(&mut creator_rx);
        assert!(creator_messages.iter().any(|m| m.contains("GameStarted")));

        let opponent_messages = drain(&mut opponent_rx);
        assert!(opponent_messages.iter().any(|m| m.contains("GameJoined")));
        assert!(opponent_messages.iter().any(|m| m.contains("GameStarted")));
    }

    #[tokio::test]
    async fn test_third_join_gets_room_full() {
        let state = AppState::new(Catalog::builtin());
        let (creator, _creator_rx) = register_connection(&state);
        let (opponent, _opponent_rx) = register_connection(&state);
        let (stranger, mut stranger_rx) = register_connection(&state);

        handle_incoming(
            &state,
            creator,
            IncomingMessage::CreateGame {
                room_id: RoomId::new("abc123"),
                total_questions: None,
            },
        )
        .await;
        for (connection, name) in [(creator, "Red"), (opponent, "Blue"), (stranger, "Green")] {
            handle_incoming(
                &state,
                connection,
                IncomingMessage::JoinGame {
                    room_id: RoomId::new("abc123"),
                    display_name: Some(name.to_owned()),
                },
            )
            .await;
        }

        let messages = drain(&mut stranger_rx);
        assert!(messages.iter().any(|m| m.contains("RoomFull")));
    }

    #[tokio::test]
    async fn test_inappropriate_name_is_rejected() {
        let state = AppState::new(Catalog::builtin());
        let (creator, mut rx) = register_connection(&state);

        handle_incoming(
            &state,
            creator,
            IncomingMessage::CreateGame {
                room_id: RoomId::new("abc123"),
                total_questions: None,
            },
        )
        .await;
        handle_incoming(
            &state,
            creator,
            IncomingMessage::JoinGame {
                room_id: RoomId::new("abc123"),
                display_name: Some("fuck".to_owned()),
            },
        )
        .await;

        let messages = drain(&mut rx);
        assert!(messages.iter().any(|m| m.contains("NameError")));
    }
}
