//! Users and score records.
//!
//! The whole store is one serde value. Persisting means writing it out as a
//! JSON snapshot; loading a missing file yields an empty store.

use serde::{Deserialize, Serialize};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use merge_arcade_shared::api::{
    AdminScoreWire, AdminStats, AdminUserWire, LeaderboardEntry, ScoreWire, UserWire,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("this email address is already registered")]
    EmailTaken,
    #[error("this username is already taken")]
    UsernameTaken,
    #[error("user not found")]
    UserNotFound,
    #[error("data store is unavailable")]
    Unavailable,
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub wants_newsletter: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub score: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A validated registration, password already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub wants_newsletter: bool,
}

/// A stored score together with its leaderboard position
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedScore {
    pub score: ScoreWire,
    pub rank: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Store {
    users: Vec<UserRecord>,
    scores: Vec<ScoreRecord>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a snapshot: temp file first, then rename over the old one.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn score_count(&self) -> usize {
        self.scores.len()
    }

    /// Email and username must both be unused. Emails compare lower-cased.
    pub fn create_user(
        &mut self,
        new_user: NewUser,
        now: OffsetDateTime,
    ) -> Result<UserRecord, StoreError> {
        let email = new_user.email.to_lowercase();
        if self.users.iter().any(|u| u.email == email) {
            return Err(StoreError::EmailTaken);
        }
        if self.users.iter().any(|u| u.username == new_user.username) {
            return Err(StoreError::UsernameTaken);
        }

        let user = UserRecord {
            id: Uuid::new_v4(),
            email,
            username: new_user.username,
            password_hash: new_user.password_hash,
            wants_newsletter: new_user.wants_newsletter,
            created_at: now,
        };
        self.users.push(user.clone());
        Ok(user)
    }

    pub fn user(&self, id: Uuid) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn user_by_email(&self, email: &str) -> Option<&UserRecord> {
        let email = email.to_lowercase();
        self.users.iter().find(|u| u.email == email)
    }

    /// Newest registrations first
    pub fn users_newest_first(&self) -> Vec<&UserRecord> {
        // Reverse insertion order so equal timestamps keep newest first
        let mut users: Vec<&UserRecord> = self.users.iter().rev().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        users
    }

    pub fn add_score(
        &mut self,
        user_id: Uuid,
        score: u32,
        now: OffsetDateTime,
    ) -> Result<ScoreRecord, StoreError> {
        if self.user(user_id).is_none() {
            return Err(StoreError::UserNotFound);
        }
        let record = ScoreRecord {
            id: Uuid::new_v4(),
            user_id,
            score,
            created_at: now,
        };
        self.scores.push(record.clone());
        Ok(record)
    }

    /// All scores, highest first. Ties keep the earlier score ahead.
    pub fn ranked_scores(&self) -> Vec<&ScoreRecord> {
        let mut scores: Vec<&ScoreRecord> = self.scores.iter().collect();
        scores.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        scores
    }

    /// 1-based rank of a stored score
    pub fn rank_of(&self, score_id: Uuid) -> Option<u32> {
        self.ranked_scores()
            .iter()
            .position(|s| s.id == score_id)
            .map(|i| i as u32 + 1)
    }

    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        self.ranked_scores()
            .into_iter()
            .filter_map(|s| self.user(s.user_id).map(|u| (s, u)))
            .take(limit)
            .enumerate()
            .map(|(i, (s, u))| LeaderboardEntry {
                rank: i as u32 + 1,
                id: s.id.to_string(),
                username: u.username.clone(),
                score: s.score,
                created_at: rfc3339(s.created_at),
            })
            .collect()
    }

    pub fn score_wires(&self) -> Vec<ScoreWire> {
        self.ranked_scores()
            .into_iter()
            .filter_map(|s| self.score_wire(s))
            .collect()
    }

    pub fn score_wire(&self, score: &ScoreRecord) -> Option<ScoreWire> {
        let user = self.user(score.user_id)?;
        Some(ScoreWire {
            id: score.id.to_string(),
            user_id: user.id.to_string(),
            username: user.username.clone(),
            score: score.score,
            created_at: rfc3339(score.created_at),
        })
    }

    /// A user's scores, newest first
    pub fn recent_scores(&self, user_id: Uuid, limit: usize) -> Vec<&ScoreRecord> {
        let mut scores: Vec<&ScoreRecord> = self
            .scores
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .collect();
        scores.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        scores.truncate(limit);
        scores
    }

    pub fn admin_users(&self, recent: usize) -> (Vec<AdminUserWire>, AdminStats) {
        let users = self
            .users_newest_first()
            .into_iter()
            .map(|u| {
                let all: Vec<&ScoreRecord> =
                    self.scores.iter().filter(|s| s.user_id == u.id).collect();
                AdminUserWire {
                    id: u.id.to_string(),
                    email: u.email.clone(),
                    username: u.username.clone(),
                    wants_newsletter: u.wants_newsletter,
                    created_at: rfc3339(u.created_at),
                    scores: self
                        .recent_scores(u.id, recent)
                        .into_iter()
                        .map(|s| AdminScoreWire {
                            id: s.id.to_string(),
                            score: s.score,
                            created_at: rfc3339(s.created_at),
                        })
                        .collect(),
                    games_played: all.len() as u32,
                    total_score: all.iter().map(|s| s.score as u64).sum(),
                    highest_score: all.iter().map(|s| s.score).max().unwrap_or(0),
                }
            })
            .collect();

        let stats = AdminStats {
            total_users: self.users.len() as u32,
            total_scores: self.scores.len() as u32,
            newsletter_subscribers: self.users.iter().filter(|u| u.wants_newsletter).count()
                as u32,
        };
        (users, stats)
    }

    /// Delete every score, then every user. Returns (users, scores) removed.
    pub fn reset(&mut self) -> (usize, usize) {
        let scores = self.scores.len();
        self.scores.clear();
        let users = self.users.len();
        self.users.clear();
        (users, scores)
    }
}

impl UserRecord {
    pub fn to_wire(&self) -> UserWire {
        UserWire {
            id: self.id.to_string(),
            email: self.email.clone(),
            username: self.username.clone(),
            wants_newsletter: self.wants_newsletter,
            created_at: rfc3339(self.created_at),
        }
    }
}

/// RFC 3339 timestamp; falls back to unix seconds for unrepresentable dates
pub fn rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339)
        .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: "salt$hash".to_string(),
            wants_newsletter: false,
        }
    }

    fn t0() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    #[test]
    fn duplicate_email_is_rejected_case_insensitively() {
        let mut store = Store::new();
        store.create_user(new_user("Ayse@Example.com", "ayse"), t0()).unwrap();
        let err = store
            .create_user(new_user("ayse@example.com", "other"), t0())
            .unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken));
        assert!(store.user_by_email("AYSE@example.COM").is_some());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let mut store = Store::new();
        store.create_user(new_user("a@example.com", "ayse"), t0()).unwrap();
        let err = store
            .create_user(new_user("b@example.com", "ayse"), t0())
            .unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken));
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn score_for_unknown_user_is_rejected() {
        let mut store = Store::new();
        let err = store.add_score(Uuid::new_v4(), 10, t0()).unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound));
    }

    #[test]
    fn leaderboard_is_sorted_and_limited() {
        let mut store = Store::new();
        let a = store.create_user(new_user("a@example.com", "alpha"), t0()).unwrap();
        let b = store.create_user(new_user("b@example.com", "bravo"), t0()).unwrap();
        for (i, (user, score)) in [(&a, 5), (&b, 50), (&a, 20), (&b, 20), (&a, 1)]
            .into_iter()
            .enumerate()
        {
            store
                .add_score(user.id, score, t0() + Duration::seconds(i as i64))
                .unwrap();
        }

        let board = store.leaderboard(3);
        assert_eq!(board.len(), 3);
        assert_eq!(
            board.iter().map(|e| e.score).collect::<Vec<_>>(),
            vec![50, 20, 20]
        );
        assert_eq!(board.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        // Equal scores: the earlier one ranks first
        assert_eq!(board[1].username, "alpha");
        assert_eq!(board[2].username, "bravo");
    }

    #[test]
    fn rank_of_reflects_position() {
        let mut store = Store::new();
        let a = store.create_user(new_user("a@example.com", "alpha"), t0()).unwrap();
        store.add_score(a.id, 100, t0()).unwrap();
        let low = store.add_score(a.id, 10, t0()).unwrap();
        let high = store.add_score(a.id, 500, t0()).unwrap();
        assert_eq!(store.rank_of(high.id), Some(1));
        assert_eq!(store.rank_of(low.id), Some(3));
        assert_eq!(store.rank_of(Uuid::new_v4()), None);
    }

    #[test]
    fn users_are_listed_newest_first() {
        let mut store = Store::new();
        store.create_user(new_user("a@example.com", "first"), t0()).unwrap();
        store
            .create_user(new_user("b@example.com", "second"), t0() + Duration::minutes(1))
            .unwrap();
        store.create_user(new_user("c@example.com", "third"), t0()).unwrap();
        let names: Vec<&str> = store
            .users_newest_first()
            .iter()
            .map(|u| u.username.as_str())
            .collect();
        assert_eq!(names, vec!["second", "third", "first"]);
    }

    #[test]
    fn admin_overview_totals_and_recent_scores() {
        let mut store = Store::new();
        let mut nl = new_user("a@example.com", "alpha");
        nl.wants_newsletter = true;
        let a = store.create_user(nl, t0()).unwrap();
        store.create_user(new_user("b@example.com", "bravo"), t0()).unwrap();
        for i in 0..7 {
            store
                .add_score(a.id, i * 10, t0() + Duration::seconds(i as i64))
                .unwrap();
        }

        let (users, stats) = store.admin_users(5);
        assert_eq!(
            stats,
            AdminStats {
                total_users: 2,
                total_scores: 7,
                newsletter_subscribers: 1,
            }
        );
        let alpha = users.iter().find(|u| u.username == "alpha").unwrap();
        assert_eq!(alpha.scores.len(), 5);
        assert_eq!(alpha.scores[0].score, 60);
        assert_eq!(alpha.games_played, 7);
        assert_eq!(alpha.total_score, 210);
        assert_eq!(alpha.highest_score, 60);
        let bravo = users.iter().find(|u| u.username == "bravo").unwrap();
        assert_eq!(bravo.highest_score, 0);
        assert!(bravo.scores.is_empty());
    }

    #[test]
    fn reset_removes_everything() {
        let mut store = Store::new();
        let a = store.create_user(new_user("a@example.com", "alpha"), t0()).unwrap();
        store.add_score(a.id, 1, t0()).unwrap();
        store.add_score(a.id, 2, t0()).unwrap();
        assert_eq!(store.reset(), (1, 2));
        assert_eq!(store.user_count(), 0);
        assert_eq!(store.score_count(), 0);
        assert!(store.leaderboard(10).is_empty());
    }

    #[test]
    fn snapshot_survives_save_and_load() {
        let dir = std::env::temp_dir().join(format!("arcade-store-{}", Uuid::new_v4()));
        let path = dir.join("arcade.json");

        let mut store = Store::new();
        let a = store.create_user(new_user("a@example.com", "alpha"), t0()).unwrap();
        store.add_score(a.id, 42, t0()).unwrap();
        store.save(&path).unwrap();

        let loaded = Store::load(&path).unwrap();
        assert_eq!(loaded.user(a.id), store.user(a.id));
        assert_eq!(loaded.leaderboard(10), store.leaderboard(10));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_snapshot_loads_empty() {
        let path = std::env::temp_dir().join(format!("missing-{}.json", Uuid::new_v4()));
        let store = Store::load(&path).unwrap();
        assert_eq!(store.user_count(), 0);
    }

    #[test]
    fn timestamps_format_as_rfc3339() {
        assert_eq!(rfc3339(t0()), "2023-11-14T22:13:20Z");
    }
}
