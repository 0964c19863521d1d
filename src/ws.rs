//! Transport (C12): a WebSocket actor pair in the source's actix /
//! actix-web-actors idiom, carrying exactly the §6 inbound/outbound event
//! set. `WsSession` is the concrete "live session handle" the SessionHub
//! abstractly registers; broadcasts reach it through [`ActorSink`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::{GameState, MoveRequest};
use crate::errors::CoreError;
use crate::game_manager::GameManager;
use crate::matchmaking::MatchmakingManager;
use crate::rooms::RoomManager;
use crate::session::{SessionHub, SessionSink};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state handed to every connection.
pub struct AppState {
    pub game_manager: Arc<GameManager>,
    pub room_manager: Arc<RoomManager>,
    pub matchmaking: Arc<MatchmakingManager>,
    pub sessions: Arc<SessionHub>,
}

/// Internal message: deliver a text frame to this session's socket.
#[derive(Message)]
#[rtype(result = "()")]
pub struct WsText(pub String);

/// Adapts an actor address to the transport-agnostic [`SessionSink`] the
/// SessionHub broadcasts through.
struct ActorSink(Addr<WsSession>);

impl SessionSink for ActorSink {
    fn send_event(&self, payload: serde_json::Value) {
        self.0.do_send(WsText(payload.to_string()));
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum ClientMessage {
    CreateRoom,
    JoinRoom { room_code: String },
    StartGame { game_id: String },
    MakeMove { game_id: String, from_row: i32, from_col: i32, to_row: i32, to_col: i32 },
    RequestMatchmaking,
    CancelMatchmaking,
    GetMatchmakingStatus,
    SpectateGame { game_id: String },
    LeaveGame { game_id: String },
    RequestGameState { game_id: String },
}

fn error_for(err: &CoreError) -> String {
    err.to_string()
}

fn serialize_state(state: &GameState) -> serde_json::Value {
    serde_json::to_value(state).unwrap_or(serde_json::Value::Null)
}

pub struct WsSession {
    id: String,
    user_id: String,
    last_heartbeat: Instant,
    state: web::Data<AppState>,
}

impl WsSession {
    pub fn new(user_id: String, state: web::Data<AppState>) -> Self {
        WsSession { id: Uuid::new_v4().to_string(), user_id, last_heartbeat: Instant::now(), state }
    }

    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                log::warn!("WS session {} heartbeat timeout, disconnecting", act.id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_message(&self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                ctx.text(serde_json::json!({"event": "gameError", "error": format!("invalid message: {e}")}).to_string());
                return;
            }
        };

        let addr = ctx.address();
        let user_id = self.user_id.clone();
        let session_id = self.id.clone();
        let game_manager = self.state.game_manager.clone();
        let room_manager = self.state.room_manager.clone();
        let matchmaking = self.state.matchmaking.clone();
        let sessions = self.state.sessions.clone();

        match msg {
            ClientMessage::CreateRoom => {
                tokio::spawn(async move {
                    match room_manager.create_room(&user_id).await {
                        Ok(room) => {
                            sessions.subscribe(&session_id, &room.game_id).await;
                            addr.do_send(WsText(serde_json::json!({"event": "roomCreated", "roomCode": room.code}).to_string()));
                            addr.do_send(WsText(serde_json::json!({"event": "gameWaiting", "gameId": room.game_id}).to_string()));
                        }
                        Err(e) => addr.do_send(WsText(serde_json::json!({"event": "roomError", "error": error_for(&e)}).to_string())),
                    }
                });
            }
            ClientMessage::JoinRoom { room_code } => {
                tokio::spawn(async move {
                    match room_manager.join_room(&room_code, &user_id).await {
                        Ok(room) => {
                            sessions.subscribe(&session_id, &room.game_id).await;
                            addr.do_send(WsText(
                                serde_json::json!({"event": "roomJoined", "gameId": room.game_id, "roomCode": room.code}).to_string(),
                            ));
                            sessions
                                .send_to_user(&room.host_id, serde_json::json!({"event": "playerJoined", "gameId": room.game_id, "userId": user_id}))
                                .await;
                        }
                        Err(e) => addr.do_send(WsText(serde_json::json!({"event": "roomError", "error": error_for(&e)}).to_string())),
                    }
                });
            }
            ClientMessage::StartGame { game_id } => {
                tokio::spawn(async move {
                    match game_manager.start_game(&game_id).await {
                        Ok(()) => {
                            sessions.subscribe(&session_id, &game_id).await;
                            if let Some(state) = game_manager.fetch_state(&game_id).await {
                                let payload = serde_json::json!({"event": "gameStarted", "gameId": game_id, "state": serialize_state(&state)});
                                sessions.send_to_user(&state.white_id, payload.clone()).await;
                                sessions.send_to_user(&state.black_id, payload).await;
                            }
                        }
                        Err(e) => addr.do_send(WsText(serde_json::json!({"event": "gameError", "error": error_for(&e)}).to_string())),
                    }
                });
            }
            ClientMessage::MakeMove { game_id, from_row, from_col, to_row, to_col } => {
                tokio::spawn(async move {
                    let request = MoveRequest { player_id: user_id.clone(), from_row, from_col, to_row, to_col };
                    match game_manager.attempt_move(&game_id, request).await {
                        Ok(success) => {
                            addr.do_send(WsText(
                                serde_json::json!({"event": "moveAccepted", "move": {
                                    "fromRow": from_row, "fromCol": from_col, "toRow": to_row, "toCol": to_col,
                                    "capturedKing": success.captured_king,
                                }})
                                .to_string(),
                            ));
                            if let Some(state) = game_manager.fetch_state(&game_id).await {
                                if success.game_finished {
                                    let payload = serde_json::json!({
                                        "event": "gameEnded", "gameId": game_id,
                                        "winner": success.winner, "state": serialize_state(&state),
                                    });
                                    sessions.send_to_user(&state.white_id, payload.clone()).await;
                                    sessions.send_to_user(&state.black_id, payload).await;
                                    sessions.flush(&game_id).await;
                                } else {
                                    sessions.queue_update(game_id, serde_json::json!({"event": "gameStateUpdate", "state": serialize_state(&state)})).await;
                                }
                            }
                        }
                        Err(e) => addr.do_send(WsText(serde_json::json!({"event": "moveRejected", "reason": error_for(&e)}).to_string())),
                    }
                });
            }
            ClientMessage::RequestMatchmaking => {
                tokio::spawn(async move {
                    let rating = game_manager.rating_for(&user_id).await;
                    match matchmaking.enqueue(&user_id, rating).await {
                        Ok(_) => {
                            let (_, queue_size) = matchmaking.status(&user_id).await;
                            addr.do_send(WsText(serde_json::json!({"event": "matchmakingStarted", "queueSize": queue_size}).to_string()));
                        }
                        Err(e) => addr.do_send(WsText(serde_json::json!({"event": "matchmakingError", "error": error_for(&e)}).to_string())),
                    }
                });
            }
            ClientMessage::CancelMatchmaking => {
                tokio::spawn(async move {
                    matchmaking.dequeue(&user_id).await;
                    addr.do_send(WsText(serde_json::json!({"event": "matchmakingCancelled"}).to_string()));
                });
            }
            ClientMessage::GetMatchmakingStatus => {
                tokio::spawn(async move {
                    let (in_queue, queue_size) = matchmaking.status(&user_id).await;
                    addr.do_send(WsText(serde_json::json!({"event": "matchmakingStatus", "inQueue": in_queue, "queueSize": queue_size}).to_string()));
                });
            }
            ClientMessage::SpectateGame { game_id } => {
                tokio::spawn(async move {
                    if game_manager.fetch_state(&game_id).await.is_some() {
                        sessions.subscribe(&session_id, &game_id).await;
                        addr.do_send(WsText(serde_json::json!({"event": "spectatingStarted", "gameId": game_id}).to_string()));
                    } else {
                        addr.do_send(WsText(serde_json::json!({"event": "spectateError", "error": format!("game {game_id} not found")}).to_string()));
                    }
                });
            }
            ClientMessage::LeaveGame { game_id } => {
                tokio::spawn(async move {
                    sessions.unsubscribe(&session_id, &game_id).await;
                });
            }
            ClientMessage::RequestGameState { game_id } => {
                tokio::spawn(async move {
                    match game_manager.fetch_state(&game_id).await {
                        Some(state) => addr.do_send(WsText(serde_json::json!({"event": "gameStateUpdate", "state": serialize_state(&state)}).to_string())),
                        None => addr.do_send(WsText(serde_json::json!({"event": "gameError", "error": format!("game {game_id} not found")}).to_string())),
                    }
                });
            }
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        log::info!("WS session {} started for user {}", self.id, self.user_id);
        self.start_heartbeat(ctx);

        let hub = self.state.sessions.clone();
        let sink: Arc<dyn SessionSink> = Arc::new(ActorSink(ctx.address()));
        let session_id = self.id.clone();
        let user_id = self.user_id.clone();
        tokio::spawn(async move {
            hub.register(session_id, user_id, sink).await;
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        log::info!("WS session {} stopped", self.id);
        let hub = self.state.sessions.clone();
        let session_id = self.id.clone();
        tokio::spawn(async move {
            hub.unregister(&session_id).await;
        });
    }
}

impl actix::StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => self.handle_message(&text, ctx),
            Ok(ws::Message::Binary(_)) => {
                ctx.text(serde_json::json!({"event": "gameError", "error": "binary messages are not supported"}).to_string());
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => self.last_heartbeat = Instant::now(),
            Ok(ws::Message::Close(reason)) => {
                log::info!("WS session {} closed: {:?}", self.id, reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {}
            Ok(ws::Message::Nop) => {}
            Err(e) => {
                log::error!("WS session {} protocol error: {e}", self.id);
                ctx.stop();
            }
        }
    }
}

impl Handler<WsText> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: WsText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

#[derive(Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Upgrades an HTTP request to a WebSocket connection. The caller's
/// identity is out of scope (§1): a `userId` query parameter stands in for
/// whatever an authentication layer would otherwise establish.
pub async fn ws_connect(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<WsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let user_id = query.user_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
    let session = WsSession::new(user_id, state);
    log::info!("new WebSocket connection from {:?}", req.peer_addr());
    ws::start(session, &req, stream)
}
