use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use uuid::Uuid;

use merge_arcade_shared::board::{Board, BoardEvent, DropError};
use merge_arcade_shared::config::BoardConfig;
use merge_arcade_shared::icons::ICONS;
use merge_arcade_shared::protocol::{
    BoardStateMsg, IconWire, QuizResolvedMsg, WelcomeMsg, PROTOCOL_VERSION,
};

use crate::config::ServerConfig;

/// One connected player's game
pub struct Session {
    pub board: Board,
    /// Registered user the final score is filed under
    pub user_id: Option<Uuid>,
}

/// All sessions, owned by the game loop task.
pub struct GameState {
    sessions: HashMap<u32, Session>,
    board_config: BoardConfig,
    rng: ChaCha8Rng,
    next_session_id: u32,
    max_sessions: usize,
}

impl GameState {
    pub fn new(server_config: &ServerConfig) -> Self {
        let rng = match server_config.rng_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            sessions: HashMap::new(),
            board_config: server_config.board,
            rng,
            next_session_id: 1,
            max_sessions: server_config.max_sessions,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session(&self, id: u32) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn session_ids(&self) -> Vec<u32> {
        self.sessions.keys().copied().collect()
    }

    /// Start a session. `None` when the session cap is reached.
    pub fn add_session(
        &mut self,
        user_id: Option<Uuid>,
        viewport: Option<(f64, f64)>,
    ) -> Option<(u32, WelcomeMsg)> {
        if self.sessions.len() >= self.max_sessions {
            return None;
        }

        let config = match viewport {
            Some((w, h)) => self.board_config.for_viewport(w, h),
            None => self.board_config,
        };
        let id = self.next_session_id;
        self.next_session_id = self.next_session_id.wrapping_add(1).max(1);

        let board = Board::new(config, self.rng.gen());
        self.sessions.insert(id, Session { board, user_id });

        let welcome = WelcomeMsg {
            protocol_version: PROTOCOL_VERSION,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            session_id: id,
            config,
            icons: ICONS.iter().map(IconWire::from_icon).collect(),
        };
        Some((id, welcome))
    }

    pub fn remove_session(&mut self, id: u32) -> Option<Session> {
        self.sessions.remove(&id)
    }

    /// `None` when the session does not exist.
    pub fn drop_body(&mut self, id: u32, x: f64) -> Option<Result<u32, DropError>> {
        self.sessions.get_mut(&id).map(|s| s.board.drop_body(x))
    }

    /// `None` when the session does not exist or has no open quiz.
    pub fn answer_quiz(&mut self, id: u32, choice: Option<u32>) -> Option<QuizResolvedMsg> {
        let board = &mut self.sessions.get_mut(&id)?.board;
        let outcome = board.answer_quiz(choice.map(|c| c as usize))?;
        Some(QuizResolvedMsg {
            correct: outcome.correct,
            correct_index: outcome.correct_index as u32,
            awarded: outcome.awarded,
            score: board.score(),
        })
    }

    /// Replace the session's board with a fresh one of the same layout.
    pub fn restart(&mut self, id: u32) -> bool {
        let seed = self.rng.gen();
        match self.sessions.get_mut(&id) {
            Some(session) => {
                session.board = Board::new(*session.board.config(), seed);
                true
            }
            None => false,
        }
    }

    /// Advance every board one tick
    pub fn tick(&mut self) -> Vec<(u32, BoardEvent)> {
        let mut events = Vec::new();
        for (&id, session) in self.sessions.iter_mut() {
            events.extend(session.board.step().into_iter().map(|e| (id, e)));
        }
        events
    }

    pub fn snapshot(&self, id: u32) -> Option<BoardStateMsg> {
        self.sessions.get(&id).map(|s| s.board.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merge_arcade_shared::protocol::GamePhase;

    fn test_state() -> GameState {
        let server_config = ServerConfig {
            rng_seed: Some(12345),
            max_sessions: 3,
            ..Default::default()
        };
        GameState::new(&server_config)
    }

    #[test]
    fn sessions_get_unique_ids_and_welcome() {
        let mut state = test_state();
        let (a, welcome) = state.add_session(None, None).unwrap();
        let (b, _) = state.add_session(None, None).unwrap();
        assert_ne!(a, b);
        assert_eq!(welcome.session_id, a);
        assert_eq!(welcome.protocol_version, PROTOCOL_VERSION);
        assert_eq!(welcome.icons.len(), 10);
        assert_eq!(state.session_count(), 2);
    }

    #[test]
    fn session_cap_is_enforced() {
        let mut state = test_state();
        for _ in 0..3 {
            assert!(state.add_session(None, None).is_some());
        }
        assert!(state.add_session(None, None).is_none());

        let id = state.session_ids()[0];
        state.remove_session(id);
        assert!(state.add_session(None, None).is_some());
    }

    #[test]
    fn phone_viewport_gets_mobile_layout() {
        let mut state = test_state();
        let (_, welcome) = state.add_session(None, Some((390.0, 844.0))).unwrap();
        assert_eq!(welcome.config.width, 358.0);
        assert_eq!(welcome.config.height, 500.0);
        let (_, desktop) = state.add_session(None, Some((1280.0, 800.0))).unwrap();
        assert_eq!(desktop.config.width, 400.0);
    }

    #[test]
    fn same_seed_gives_same_boards() {
        let mut a = test_state();
        let mut b = test_state();
        let (ia, _) = a.add_session(None, None).unwrap();
        let (ib, _) = b.add_session(None, None).unwrap();
        for _ in 0..5 {
            a.drop_body(ia, 200.0);
            b.drop_body(ib, 200.0);
            for _ in 0..20 {
                a.tick();
                b.tick();
            }
        }
        assert_eq!(a.snapshot(ia).unwrap().bodies, b.snapshot(ib).unwrap().bodies);
    }

    #[test]
    fn drop_on_unknown_session_is_none() {
        let mut state = test_state();
        assert!(state.drop_body(99, 10.0).is_none());
        assert!(state.answer_quiz(99, Some(0)).is_none());
        assert!(!state.restart(99));
    }

    #[test]
    fn restart_clears_board() {
        let mut state = test_state();
        let (id, _) = state.add_session(None, None).unwrap();
        state.drop_body(id, 100.0).unwrap().unwrap();
        assert_eq!(state.snapshot(id).unwrap().bodies.len(), 1);
        assert!(state.restart(id));
        let snap = state.snapshot(id).unwrap();
        assert!(snap.bodies.is_empty());
        assert_eq!(snap.phase, GamePhase::Playing);
    }

    #[test]
    fn answer_without_quiz_is_none() {
        let mut state = test_state();
        let (id, _) = state.add_session(None, None).unwrap();
        assert!(state.answer_quiz(id, Some(1)).is_none());
    }

    #[test]
    fn game_over_event_is_tagged_with_session() {
        let server_config = ServerConfig {
            rng_seed: Some(1),
            board: BoardConfig {
                gravity: 0.0,
                danger_grace_ticks: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut state = GameState::new(&server_config);
        let (id, _) = state.add_session(None, None).unwrap();
        state.drop_body(id, 200.0).unwrap().unwrap();

        let events: Vec<_> = (0..3).flat_map(|_| state.tick()).collect();
        assert_eq!(events, vec![(id, BoardEvent::GameOver { final_score: 0 })]);
    }

    #[test]
    fn correct_quiz_answer_adds_reward_to_score() {
        let server_config = ServerConfig {
            rng_seed: Some(7),
            board: BoardConfig {
                gravity: 0.0,
                danger_line_y: 0.0,
                drop_cooldown_ticks: 0,
                quiz_interval_min: 1,
                quiz_interval_max: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut state = GameState::new(&server_config);
        let (id, _) = state.add_session(None, None).unwrap();

        // Keep dropping on the same spot until two equal levels meet
        let mut opened = None;
        for _ in 0..200 {
            state.drop_body(id, 200.0).unwrap().unwrap();
            opened = state.tick().into_iter().find_map(|(sid, e)| match e {
                BoardEvent::QuizOpened(q) if sid == id => Some(q),
                _ => None,
            });
            if opened.is_some() {
                break;
            }
        }
        let quiz = opened.expect("a merge should open a quiz");
        assert!(quiz.reward > 0);

        let board = &state.session(id).unwrap().board;
        assert_eq!(board.pending_quiz(), Some(&quiz));
        let score_before = board.score();
        let correct = quiz.question().correct as u32;

        let resolved = state.answer_quiz(id, Some(correct)).unwrap();
        assert!(resolved.correct);
        assert_eq!(resolved.correct_index, correct);
        assert_eq!(resolved.awarded, quiz.reward);
        assert_eq!(resolved.score, score_before + quiz.reward);
        assert_eq!(state.session(id).unwrap().board.score(), resolved.score);
        assert!(state.answer_quiz(id, Some(correct)).is_none());
    }
}
