//! One player's board: bodies, score, drop pacing, quiz and game over.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::BoardConfig;
use crate::icons::{radius_for_level, MAX_SPAWN_LEVEL};
use crate::physics::{step_bodies, Body, MergeEvent};
use crate::protocol::{BoardStateMsg, BodyWire, GamePhase, QuizPrompt};
use crate::quiz::{pick_question, PendingQuiz, QuizOutcome};
use crate::vec2::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum DropError {
    #[error("the game is over")]
    GameOver,
    #[error("previous drop is still falling ({ticks_left} ticks left)")]
    CoolingDown { ticks_left: u32 },
    #[error("drop position must be a finite number")]
    InvalidPosition,
}

/// Something a client should hear about right away
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    Merged(MergeEvent),
    QuizOpened(PendingQuiz),
    GameOver { final_score: u32 },
}

pub struct Board {
    config: BoardConfig,
    bodies: Vec<Body>,
    score: u32,
    phase: GamePhase,
    tick: u32,
    next_level: u32,
    next_body_id: u32,
    drop_cooldown: u32,
    merge_count: u32,
    next_quiz_at: u32,
    pending_quiz: Option<PendingQuiz>,
    rng: ChaCha8Rng,
}

impl Board {
    pub fn new(config: BoardConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let next_quiz_at = draw_quiz_interval(&config, &mut rng);
        Self {
            config,
            bodies: Vec::new(),
            score: 0,
            phase: GamePhase::Playing,
            tick: 0,
            next_level: 1,
            next_body_id: 1,
            drop_cooldown: 0,
            merge_count: 0,
            next_quiz_at,
            pending_quiz: None,
            rng,
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    /// Level of the body the next drop will spawn
    pub fn next_level(&self) -> u32 {
        self.next_level
    }

    pub fn merge_count(&self) -> u32 {
        self.merge_count
    }

    pub fn pending_quiz(&self) -> Option<&PendingQuiz> {
        self.pending_quiz.as_ref()
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    /// Drop the next body at horizontal position `x`. Returns the new body id.
    pub fn drop_body(&mut self, x: f64) -> Result<u32, DropError> {
        if self.is_game_over() {
            return Err(DropError::GameOver);
        }
        if self.drop_cooldown > 0 {
            return Err(DropError::CoolingDown {
                ticks_left: self.drop_cooldown,
            });
        }
        if !x.is_finite() {
            return Err(DropError::InvalidPosition);
        }

        let level = self.next_level;
        let radius = radius_for_level(level);
        let x = x.clamp(radius, self.config.width - radius);

        let id = self.next_body_id;
        self.next_body_id = self.next_body_id.wrapping_add(1);
        self.bodies
            .push(Body::new(id, level, Vec2::new(x, self.config.drop_y)));

        self.next_level = self.rng.gen_range(1..=MAX_SPAWN_LEVEL);
        self.drop_cooldown = self.config.drop_cooldown_ticks;
        Ok(id)
    }

    /// Advance one fixed tick. A finished board does not move.
    pub fn step(&mut self) -> Vec<BoardEvent> {
        let mut events = Vec::new();
        if self.is_game_over() {
            return events;
        }

        self.tick = self.tick.wrapping_add(1);
        self.drop_cooldown = self.drop_cooldown.saturating_sub(1);

        let report = step_bodies(&mut self.bodies, &self.config, &mut self.next_body_id);
        self.score = self.score.saturating_add(report.score_delta);

        for merge in report.merges {
            self.merge_count += 1;
            let reward = merge.score * self.config.quiz_reward_multiplier;
            events.push(BoardEvent::Merged(merge));

            if self.merge_count >= self.next_quiz_at {
                self.next_quiz_at =
                    self.merge_count + draw_quiz_interval(&self.config, &mut self.rng);
                if self.pending_quiz.is_none() {
                    let quiz = PendingQuiz {
                        question_index: pick_question(&mut self.rng),
                        reward,
                    };
                    self.pending_quiz = Some(quiz);
                    events.push(BoardEvent::QuizOpened(quiz));
                }
            }
        }

        if report.overflow {
            self.phase = GamePhase::GameOver;
            self.pending_quiz = None;
            events.push(BoardEvent::GameOver {
                final_score: self.score,
            });
        }

        events
    }

    /// Resolve the pending quiz. `None` when there is nothing to answer.
    pub fn answer_quiz(&mut self, choice: Option<usize>) -> Option<QuizOutcome> {
        let quiz = self.pending_quiz.take()?;
        let outcome = quiz.resolve(choice);
        self.score = self.score.saturating_add(outcome.awarded);
        Some(outcome)
    }

    pub fn snapshot(&self) -> BoardStateMsg {
        BoardStateMsg {
            tick: self.tick,
            score: self.score,
            next_level: self.next_level,
            phase: self.phase,
            bodies: self.bodies.iter().map(BodyWire::from_body).collect(),
            quiz: self.pending_quiz.as_ref().map(QuizPrompt::from_pending),
        }
    }
}

fn draw_quiz_interval(config: &BoardConfig, rng: &mut impl Rng) -> u32 {
    rng.gen_range(config.quiz_interval_min..=config.quiz_interval_max.max(config.quiz_interval_min))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec2::vec2;

    fn place(board: &mut Board, level: u32, x: f64, y: f64) -> u32 {
        let id = board.next_body_id;
        board.next_body_id += 1;
        board.bodies.push(Body::new(id, level, vec2(x, y)));
        id
    }

    fn calm_config() -> BoardConfig {
        BoardConfig {
            gravity: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn new_board_starts_empty_with_level_one() {
        let board = Board::new(BoardConfig::default(), 1);
        assert_eq!(board.score(), 0);
        assert_eq!(board.next_level(), 1);
        assert_eq!(board.phase(), GamePhase::Playing);
        assert!(board.bodies().is_empty());
        assert!(board.pending_quiz().is_none());
    }

    #[test]
    fn drop_clamps_to_board_walls() {
        let config = BoardConfig {
            drop_cooldown_ticks: 0,
            ..Default::default()
        };
        let mut board = Board::new(config, 1);
        board.drop_body(-50.0).unwrap();
        let first = &board.bodies()[0];
        assert_eq!(first.pos.x, first.radius);
        assert_eq!(first.pos.y, config.drop_y);
        assert_eq!(first.level, 1);

        board.drop_body(10_000.0).unwrap();
        let second = &board.bodies()[1];
        assert_eq!(second.pos.x, config.width - second.radius);
    }

    #[test]
    fn drop_respects_cooldown() {
        let mut board = Board::new(BoardConfig::default(), 1);
        board.drop_body(200.0).unwrap();
        assert_eq!(
            board.drop_body(200.0),
            Err(DropError::CoolingDown { ticks_left: 18 })
        );
        for _ in 0..18 {
            board.step();
        }
        assert!(board.drop_body(100.0).is_ok());
    }

    #[test]
    fn drop_rejects_non_finite_position() {
        let mut board = Board::new(BoardConfig::default(), 1);
        assert_eq!(board.drop_body(f64::NAN), Err(DropError::InvalidPosition));
        assert_eq!(
            board.drop_body(f64::INFINITY),
            Err(DropError::InvalidPosition)
        );
    }

    #[test]
    fn spawned_levels_stay_small() {
        let config = BoardConfig {
            drop_cooldown_ticks: 0,
            ..Default::default()
        };
        let mut board = Board::new(config, 99);
        for _ in 0..100 {
            board.drop_body(200.0).unwrap();
            assert!((1..=MAX_SPAWN_LEVEL).contains(&board.next_level()));
        }
        assert!(board.bodies().iter().all(|b| b.level <= MAX_SPAWN_LEVEL));
    }

    #[test]
    fn same_seed_gives_same_spawn_sequence() {
        let config = BoardConfig {
            drop_cooldown_ticks: 0,
            ..Default::default()
        };
        let mut a = Board::new(config, 5);
        let mut b = Board::new(config, 5);
        for _ in 0..20 {
            a.drop_body(200.0).unwrap();
            b.drop_body(200.0).unwrap();
            assert_eq!(a.next_level(), b.next_level());
        }
    }

    #[test]
    fn merge_adds_score_and_reports_event() {
        let mut board = Board::new(calm_config(), 1);
        place(&mut board, 1, 100.0, 400.0);
        place(&mut board, 1, 120.0, 400.0);

        let events = board.step();

        assert_eq!(board.score(), 3);
        assert_eq!(board.merge_count(), 1);
        assert_eq!(board.bodies().len(), 1);
        assert_eq!(board.bodies()[0].level, 2);
        assert!(matches!(events[0], BoardEvent::Merged(ref m) if m.level == 2 && m.score == 3));
    }

    #[test]
    fn quiz_opens_after_merge_threshold_and_rewards_correct_answer() {
        let config = BoardConfig {
            quiz_interval_min: 1,
            quiz_interval_max: 1,
            ..calm_config()
        };
        let mut board = Board::new(config, 1);
        place(&mut board, 1, 100.0, 400.0);
        place(&mut board, 1, 120.0, 400.0);

        let events = board.step();
        let quiz = *board.pending_quiz().expect("quiz should be open");
        assert_eq!(quiz.reward, 12);
        assert!(events.contains(&BoardEvent::QuizOpened(quiz)));
        assert!(board.snapshot().quiz.is_some());

        let outcome = board.answer_quiz(Some(quiz.question().correct)).unwrap();
        assert!(outcome.correct);
        assert_eq!(outcome.awarded, 12);
        assert_eq!(board.score(), 15);
        assert!(board.answer_quiz(Some(0)).is_none());
    }

    #[test]
    fn dismissed_quiz_awards_nothing() {
        let config = BoardConfig {
            quiz_interval_min: 1,
            quiz_interval_max: 1,
            ..calm_config()
        };
        let mut board = Board::new(config, 1);
        place(&mut board, 2, 100.0, 400.0);
        place(&mut board, 2, 120.0, 400.0);
        board.step();

        let outcome = board.answer_quiz(None).unwrap();
        assert!(!outcome.correct);
        assert_eq!(board.score(), 6);
        assert!(board.pending_quiz().is_none());
    }

    #[test]
    fn only_one_quiz_pending_at_a_time() {
        let config = BoardConfig {
            quiz_interval_min: 1,
            quiz_interval_max: 1,
            ..calm_config()
        };
        let mut board = Board::new(config, 1);
        place(&mut board, 1, 50.0, 400.0);
        place(&mut board, 1, 70.0, 400.0);
        place(&mut board, 3, 300.0, 300.0);
        place(&mut board, 3, 320.0, 300.0);

        let events = board.step();
        let opened = events
            .iter()
            .filter(|e| matches!(e, BoardEvent::QuizOpened(_)))
            .count();
        assert_eq!(board.merge_count(), 2);
        assert_eq!(opened, 1);
    }

    #[test]
    fn settled_body_above_danger_line_ends_game() {
        let config = BoardConfig {
            danger_grace_ticks: 1,
            ..calm_config()
        };
        let mut board = Board::new(config, 1);
        board.drop_body(200.0).unwrap();

        assert!(board.step().is_empty());
        let events = board.step();
        assert_eq!(events, vec![BoardEvent::GameOver { final_score: 0 }]);
        assert!(board.is_game_over());

        assert_eq!(board.drop_body(200.0), Err(DropError::GameOver));
        let tick = board.tick_count();
        assert!(board.step().is_empty());
        assert_eq!(board.tick_count(), tick);
        assert_eq!(board.snapshot().phase, GamePhase::GameOver);
    }

    #[test]
    fn dropped_body_falls_under_gravity() {
        let mut board = Board::new(BoardConfig::default(), 1);
        board.drop_body(200.0).unwrap();
        for _ in 0..40 {
            board.step();
        }
        assert!(!board.is_game_over());
        assert!(board.bodies()[0].pos.y > 150.0);
    }
}
