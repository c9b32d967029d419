use axum::extract::rejection::QueryRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use merge_arcade_shared::protocol::{ClientMsg, ServerMsg};

use crate::api::query_params;
use crate::config::ServerConfig;
use crate::db::StoreHandle;
use crate::error::ApiError;
use crate::game_loop::GameCommand;

/// Consecutive unparseable messages tolerated before disconnecting
pub const MAX_PARSE_ERRORS: u32 = 5;

const OUTBOX_CAPACITY: usize = 64;

/// Shared app state passed to every handler
#[derive(Clone)]
pub struct AppState {
    pub game_tx: mpsc::Sender<GameCommand>,
    pub store: StoreHandle,
    pub config: Arc<ServerConfig>,
    pub connection_semaphore: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        game_tx: mpsc::Sender<GameCommand>,
        store: StoreHandle,
        config: ServerConfig,
    ) -> Self {
        let connection_semaphore = Arc::new(Semaphore::new(config.max_sessions));
        Self {
            game_tx,
            store,
            config: Arc::new(config),
            connection_semaphore,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsQuery {
    pub user_id: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    query: Result<Query<WsQuery>, QueryRejection>,
    State(app_state): State<AppState>,
) -> Result<Response, ApiError> {
    let query = query_params(query)?;
    let user_id = match query.user_id.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => {
            let id = Uuid::parse_str(raw)
                .map_err(|_| ApiError::BadRequest("userId is not a valid id".to_string()))?;
            if app_state.store.find_user(id).await?.is_none() {
                return Err(ApiError::NotFound("user not found".to_string()));
            }
            Some(id)
        }
        None => None,
    };
    let viewport = match (query.width, query.height) {
        (Some(w), Some(h)) => Some((w, h)),
        _ => None,
    };

    let permit = app_state
        .connection_semaphore
        .clone()
        .try_acquire_owned()
        .map_err(|_| ApiError::Unavailable("server is full".to_string()))?;

    let max_message_bytes = app_state.config.max_message_bytes;
    Ok(ws
        .max_message_size(max_message_bytes * 4)
        .on_upgrade(move |socket| handle_socket(socket, app_state, user_id, viewport, permit))
        .into_response())
}

/// Counts drops per one-second window
struct DropLimiter {
    window_start: Instant,
    count: u32,
    max_per_sec: u32,
}

impl DropLimiter {
    fn new(max_per_sec: u32) -> Self {
        Self {
            window_start: Instant::now(),
            count: 0,
            max_per_sec,
        }
    }

    /// False once the client exceeds the limit in the current window.
    fn allow(&mut self, now: Instant) -> bool {
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.window_start = now;
            self.count = 0;
        }
        self.count += 1;
        self.count <= self.max_per_sec
    }
}

async fn handle_socket(
    socket: WebSocket,
    app_state: AppState,
    user_id: Option<Uuid>,
    viewport: Option<(f64, f64)>,
    _permit: OwnedSemaphorePermit,
) {
    let (mut sink, mut stream) = socket.split();
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<ServerMsg>(OUTBOX_CAPACITY);

    // Join the game
    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .game_tx
        .send(GameCommand::Join {
            user_id,
            viewport,
            outbox: outbox_tx,
            response: resp_tx,
        })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Join command");
        return;
    }

    let (my_id, welcome) = match resp_rx.await {
        Ok(Some(joined)) => joined,
        Ok(None) => {
            tracing::warn!("Game is full, closing connection");
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
        Err(_) => {
            tracing::error!("Failed to receive welcome");
            return;
        }
    };

    tracing::info!("Session {} connected (user {:?})", my_id, user_id);

    if send_msg(&mut sink, &ServerMsg::Welcome(welcome)).await.is_err() {
        let _ = app_state.game_tx.send(GameCommand::Leave { id: my_id }).await;
        return;
    }

    let config = &app_state.config;
    let mut limiter = DropLimiter::new(config.max_drops_per_sec);
    let mut parse_errors: u32 = 0;

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > config.max_message_bytes {
                            tracing::warn!("Session {} sent {} bytes, disconnecting", my_id, text.len());
                            break;
                        }
                        let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                            Ok(m) => {
                                parse_errors = 0;
                                m
                            }
                            Err(e) => {
                                parse_errors += 1;
                                tracing::debug!("Session {} sent bad message: {}", my_id, e);
                                if parse_errors >= MAX_PARSE_ERRORS {
                                    tracing::warn!("Session {} exceeded parse error limit", my_id);
                                    break;
                                }
                                continue;
                            }
                        };
                        let cmd = match client_msg {
                            ClientMsg::Drop { x } => {
                                if !limiter.allow(Instant::now()) {
                                    tracing::warn!("Session {} exceeded drop rate limit", my_id);
                                    break;
                                }
                                GameCommand::Drop { id: my_id, x }
                            }
                            ClientMsg::AnswerQuiz { choice } => {
                                GameCommand::AnswerQuiz { id: my_id, choice }
                            }
                            ClientMsg::Restart => GameCommand::Restart { id: my_id },
                        };
                        if app_state.game_tx.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) if bytes.len() > config.max_message_bytes => {
                        tracing::warn!("Session {} sent {} bytes, disconnecting", my_id, bytes.len());
                        break;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {} // Ignore ping/pong/binary
                }
            }

            // Game loop -> Client
            Some(msg) = outbox_rx.recv() => {
                if send_msg(&mut sink, &msg).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sink.send(Message::Close(None)).await;

    // Cleanup on disconnect
    let _ = app_state
        .game_tx
        .send(GameCommand::Leave { id: my_id })
        .await;
    tracing::info!("Session {} disconnected", my_id);
}

async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            return Ok(());
        }
    };
    sink.send(Message::Text(json.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_allows_up_to_max_per_window() {
        let start = Instant::now();
        let mut limiter = DropLimiter::new(3);
        limiter.window_start = start;
        assert!(limiter.allow(start));
        assert!(limiter.allow(start));
        assert!(limiter.allow(start + Duration::from_millis(500)));
        assert!(!limiter.allow(start + Duration::from_millis(900)));
    }

    #[test]
    fn limiter_resets_after_a_second() {
        let start = Instant::now();
        let mut limiter = DropLimiter::new(1);
        limiter.window_start = start;
        assert!(limiter.allow(start));
        assert!(!limiter.allow(start));
        assert!(limiter.allow(start + Duration::from_secs(1)));
    }

    #[test]
    fn query_reads_camel_case() {
        let q: WsQuery =
            serde_json::from_str(r#"{"userId":"abc","width":390,"height":844}"#).unwrap();
        assert_eq!(q.user_id.as_deref(), Some("abc"));
        assert_eq!(q.width, Some(390.0));
    }
}
