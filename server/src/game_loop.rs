use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use merge_arcade_shared::board::BoardEvent;
use merge_arcade_shared::protocol::{
    DropRejectedMsg, GameOverMsg, MergedMsg, QuizPrompt, ServerMsg, WelcomeMsg,
};

use crate::config::ServerConfig;
use crate::db::StoreHandle;
use crate::state::GameState;

/// Commands from client connections to the game loop
pub enum GameCommand {
    Join {
        user_id: Option<Uuid>,
        viewport: Option<(f64, f64)>,
        outbox: mpsc::Sender<ServerMsg>,
        /// `None` when the server is full
        response: oneshot::Sender<Option<(u32, WelcomeMsg)>>,
    },
    Leave {
        id: u32,
    },
    Drop {
        id: u32,
        x: f64,
    },
    AnswerQuiz {
        id: u32,
        choice: Option<u32>,
    },
    Restart {
        id: u32,
    },
}

/// Run the main game loop. Owns every session.
pub async fn run_game_loop(
    mut cmd_rx: mpsc::Receiver<GameCommand>,
    server_config: ServerConfig,
    store: StoreHandle,
) {
    let mut state = GameState::new(&server_config);
    let mut outboxes: HashMap<u32, mpsc::Sender<ServerMsg>> = HashMap::new();

    let tick_duration = Duration::from_secs_f64(1.0 / server_config.tick_rate_hz as f64);
    let broadcast_every_n = server_config.broadcast_every_n() as u64;
    let mut tick_count: u64 = 0;

    let mut tick_interval = tokio::time::interval(tick_duration);
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                for (id, event) in state.tick() {
                    let Some(outbox) = outboxes.get(&id) else { continue };
                    match event {
                        BoardEvent::Merged(merge) => {
                            push(outbox, ServerMsg::Merged(MergedMsg {
                                level: merge.level,
                                x: merge.pos.x,
                                y: merge.pos.y,
                                score: merge.score,
                            }));
                        }
                        BoardEvent::QuizOpened(quiz) => {
                            push(outbox, ServerMsg::QuizOpened(QuizPrompt::from_pending(&quiz)));
                        }
                        BoardEvent::GameOver { final_score } => {
                            let user_id = state.session(id).and_then(|s| s.user_id);
                            tracing::info!("Session {} game over with {} points", id, final_score);
                            tokio::spawn(finish_game(
                                store.clone(),
                                outbox.clone(),
                                user_id,
                                final_score,
                            ));
                        }
                    }
                }

                // Push board_state at lower rate
                tick_count += 1;
                if tick_count % broadcast_every_n == 0 {
                    for (id, outbox) in &outboxes {
                        if let Some(snapshot) = state.snapshot(*id) {
                            push(outbox, ServerMsg::BoardState(snapshot));
                        }
                    }
                }
            }

            Some(cmd) = cmd_rx.recv() => {
                match cmd {
                    GameCommand::Join { user_id, viewport, outbox, response } => {
                        let joined = state.add_session(user_id, viewport);
                        if let Some((id, _)) = &joined {
                            outboxes.insert(*id, outbox);
                            tracing::info!(
                                "Session {} started ({} active)",
                                id,
                                state.session_count()
                            );
                        } else {
                            tracing::warn!("Session cap reached, join refused");
                        }
                        // Connection went away before the welcome arrived
                        if let Err(Some((id, _))) = response.send(joined) {
                            state.remove_session(id);
                            outboxes.remove(&id);
                        }
                    }
                    GameCommand::Leave { id } => {
                        state.remove_session(id);
                        outboxes.remove(&id);
                        tracing::info!("Session {} left", id);
                    }
                    GameCommand::Drop { id, x } => {
                        if let Some(Err(e)) = state.drop_body(id, x) {
                            if let Some(outbox) = outboxes.get(&id) {
                                push(outbox, ServerMsg::DropRejected(DropRejectedMsg {
                                    reason: e.to_string(),
                                }));
                            }
                        }
                    }
                    GameCommand::AnswerQuiz { id, choice } => {
                        if let Some(resolved) = state.answer_quiz(id, choice) {
                            if let Some(outbox) = outboxes.get(&id) {
                                push(outbox, ServerMsg::QuizResolved(resolved));
                            }
                        }
                    }
                    GameCommand::Restart { id } => {
                        if state.restart(id) {
                            tracing::debug!("Session {} restarted", id);
                            if let (Some(outbox), Some(snapshot)) = (outboxes.get(&id), state.snapshot(id)) {
                                push(outbox, ServerMsg::BoardState(snapshot));
                            }
                        }
                    }
                }
            }

            else => break,
        }
    }

    tracing::info!("Game loop ended");
}

/// Non-blocking send. A client that cannot keep up misses messages.
fn push(outbox: &mpsc::Sender<ServerMsg>, msg: ServerMsg) {
    if let Err(mpsc::error::TrySendError::Full(_)) = outbox.try_send(msg) {
        tracing::warn!("Client outbox full, message dropped");
    }
}

/// File the final score for a registered player, then tell the client.
async fn finish_game(
    store: StoreHandle,
    outbox: mpsc::Sender<ServerMsg>,
    user_id: Option<Uuid>,
    final_score: u32,
) {
    let mut msg = GameOverMsg {
        final_score,
        score_id: None,
        rank: None,
    };
    if let Some(user_id) = user_id {
        match store.submit_score(user_id, final_score).await {
            Ok(submitted) => {
                msg.score_id = Some(submitted.score.id);
                msg.rank = Some(submitted.rank);
            }
            Err(e) => tracing::error!("Failed to save score for {}: {}", user_id, e),
        }
    }
    let _ = outbox.send(ServerMsg::GameOver(msg)).await;
}
