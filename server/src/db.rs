//! Store actor.
//!
//! One task owns the [`Store`] and serves commands over a channel, the same
//! way the game loop owns all sessions. Every mutation is followed by a
//! snapshot write when a data path is configured.

use std::path::PathBuf;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use merge_arcade_shared::api::{AdminStats, AdminUserWire, LeaderboardEntry, ScoreWire};

use crate::store::{NewUser, Store, StoreError, SubmittedScore, UserRecord};

type Reply<T> = oneshot::Sender<T>;

pub enum StoreCommand {
    CreateUser {
        new_user: NewUser,
        response: Reply<Result<UserRecord, StoreError>>,
    },
    FindUserByEmail {
        email: String,
        response: Reply<Option<UserRecord>>,
    },
    FindUser {
        id: Uuid,
        response: Reply<Option<UserRecord>>,
    },
    ListUsers {
        response: Reply<Vec<UserRecord>>,
    },
    SubmitScore {
        user_id: Uuid,
        score: u32,
        response: Reply<Result<SubmittedScore, StoreError>>,
    },
    ListScores {
        response: Reply<Vec<ScoreWire>>,
    },
    Leaderboard {
        limit: usize,
        response: Reply<Vec<LeaderboardEntry>>,
    },
    AdminOverview {
        recent: usize,
        response: Reply<(Vec<AdminUserWire>, AdminStats)>,
    },
    Reset {
        response: Reply<(usize, usize)>,
    },
    Ping {
        response: Reply<()>,
    },
}

/// Run the store actor until every handle is dropped.
pub async fn run_store(
    mut cmd_rx: mpsc::Receiver<StoreCommand>,
    mut store: Store,
    data_path: Option<PathBuf>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        let mutated = match cmd {
            StoreCommand::CreateUser { new_user, response } => {
                let result = store.create_user(new_user, OffsetDateTime::now_utc());
                let ok = result.is_ok();
                if let Ok(user) = &result {
                    tracing::info!("Registered user {} ({})", user.username, user.id);
                }
                let _ = response.send(result);
                ok
            }
            StoreCommand::FindUserByEmail { email, response } => {
                let _ = response.send(store.user_by_email(&email).cloned());
                false
            }
            StoreCommand::FindUser { id, response } => {
                let _ = response.send(store.user(id).cloned());
                false
            }
            StoreCommand::ListUsers { response } => {
                let users = store.users_newest_first().into_iter().cloned().collect();
                let _ = response.send(users);
                false
            }
            StoreCommand::SubmitScore {
                user_id,
                score,
                response,
            } => {
                let result = store
                    .add_score(user_id, score, OffsetDateTime::now_utc())
                    .and_then(|record| {
                        let wire = store.score_wire(&record).ok_or(StoreError::UserNotFound)?;
                        let rank = store.rank_of(record.id).unwrap_or(0);
                        Ok(SubmittedScore { score: wire, rank })
                    });
                let ok = result.is_ok();
                let _ = response.send(result);
                ok
            }
            StoreCommand::ListScores { response } => {
                let _ = response.send(store.score_wires());
                false
            }
            StoreCommand::Leaderboard { limit, response } => {
                let _ = response.send(store.leaderboard(limit));
                false
            }
            StoreCommand::AdminOverview { recent, response } => {
                let _ = response.send(store.admin_users(recent));
                false
            }
            StoreCommand::Reset { response } => {
                let removed = store.reset();
                tracing::warn!(
                    "Store reset: {} users and {} scores deleted",
                    removed.0,
                    removed.1
                );
                let _ = response.send(removed);
                true
            }
            StoreCommand::Ping { response } => {
                let _ = response.send(());
                false
            }
        };

        if mutated {
            if let Some(path) = &data_path {
                if let Err(e) = store.save(path) {
                    tracing::error!("Failed to write snapshot {}: {}", path.display(), e);
                }
            }
        }
    }

    tracing::info!("Store actor ended");
}

/// Cloneable client for the store actor
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    pub fn new(tx: mpsc::Sender<StoreCommand>) -> Self {
        Self { tx }
    }

    /// Spawn an actor over `store` and return its handle.
    pub fn spawn(store: Store, data_path: Option<PathBuf>) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(run_store(rx, store, data_path));
        Self::new(tx)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> StoreCommand,
    ) -> Result<T, StoreError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(make(resp_tx))
            .await
            .map_err(|_| StoreError::Unavailable)?;
        resp_rx.await.map_err(|_| StoreError::Unavailable)
    }

    pub async fn create_user(&self, new_user: NewUser) -> Result<UserRecord, StoreError> {
        self.request(|response| StoreCommand::CreateUser { new_user, response })
            .await?
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let email = email.to_string();
        self.request(|response| StoreCommand::FindUserByEmail { email, response })
            .await
    }

    pub async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        self.request(|response| StoreCommand::FindUser { id, response })
            .await
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.request(|response| StoreCommand::ListUsers { response })
            .await
    }

    pub async fn submit_score(
        &self,
        user_id: Uuid,
        score: u32,
    ) -> Result<SubmittedScore, StoreError> {
        self.request(|response| StoreCommand::SubmitScore {
            user_id,
            score,
            response,
        })
        .await?
    }

    pub async fn list_scores(&self) -> Result<Vec<ScoreWire>, StoreError> {
        self.request(|response| StoreCommand::ListScores { response })
            .await
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        self.request(|response| StoreCommand::Leaderboard { limit, response })
            .await
    }

    pub async fn admin_overview(
        &self,
        recent: usize,
    ) -> Result<(Vec<AdminUserWire>, AdminStats), StoreError> {
        self.request(|response| StoreCommand::AdminOverview { recent, response })
            .await
    }

    /// Delete all scores, then all users. Returns (users, scores) removed.
    pub async fn reset(&self) -> Result<(usize, usize), StoreError> {
        self.request(|response| StoreCommand::Reset { response })
            .await
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.request(|response| StoreCommand::Ping { response })
            .await
    }
}
