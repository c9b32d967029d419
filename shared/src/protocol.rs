use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::BoardConfig;
use crate::icons::IconKind;
use crate::physics::Body;
use crate::quiz::PendingQuiz;

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "welcome")]
    Welcome(WelcomeMsg),
    #[serde(rename = "board_state")]
    BoardState(BoardStateMsg),
    #[serde(rename = "merged")]
    Merged(MergedMsg),
    #[serde(rename = "quiz_opened")]
    QuizOpened(QuizPrompt),
    #[serde(rename = "quiz_resolved")]
    QuizResolved(QuizResolvedMsg),
    #[serde(rename = "drop_rejected")]
    DropRejected(DropRejectedMsg),
    #[serde(rename = "game_over")]
    GameOver(GameOverMsg),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub protocol_version: u32,
    pub server_version: String,
    pub session_id: u32,
    pub config: BoardConfig,
    pub icons: Vec<IconWire>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct IconWire {
    pub level: u32,
    pub name: String,
    pub asset: String,
    pub score: u32,
    pub color: String,
}

impl IconWire {
    pub fn from_icon(icon: &IconKind) -> Self {
        Self {
            level: icon.level,
            name: icon.name.to_string(),
            asset: icon.asset.to_string(),
            score: icon.score,
            color: icon.color.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Playing,
    GameOver,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct BoardStateMsg {
    pub tick: u32,
    pub score: u32,
    pub next_level: u32,
    pub phase: GamePhase,
    pub bodies: Vec<BodyWire>,
    #[serde(default)]
    pub quiz: Option<QuizPrompt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct BodyWire {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub level: u32,
    pub radius: f64,
}

impl BodyWire {
    pub fn from_body(body: &Body) -> Self {
        Self {
            id: body.id,
            x: round2(body.pos.x),
            y: round2(body.pos.y),
            level: body.level,
            radius: body.radius,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct MergedMsg {
    pub level: u32,
    pub x: f64,
    pub y: f64,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct QuizPrompt {
    pub question: String,
    pub options: Vec<String>,
    pub reward: u32,
}

impl QuizPrompt {
    pub fn from_pending(quiz: &PendingQuiz) -> Self {
        let question = quiz.question();
        Self {
            question: question.prompt.to_string(),
            options: question.options.iter().map(|o| o.to_string()).collect(),
            reward: quiz.reward,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct QuizResolvedMsg {
    pub correct: bool,
    pub correct_index: u32,
    pub awarded: u32,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
pub struct DropRejectedMsg {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct GameOverMsg {
    pub final_score: u32,
    /// Id of the stored score record, when the session belongs to a user
    #[serde(default)]
    pub score_id: Option<String>,
    /// 1-based leaderboard rank of the stored score
    #[serde(default)]
    pub rank: Option<u32>,
}

// === Client -> Server ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "drop")]
    Drop { x: f64 },
    /// `choice: null` closes the quiz without answering
    #[serde(rename = "answer_quiz")]
    AnswerQuiz { choice: Option<u32> },
    #[serde(rename = "restart")]
    Restart,
}

// === Conversion helpers ===

/// Round to 2 decimal places (sub-pixel precision is plenty for drawing)
#[inline]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_msg_welcome_roundtrip() {
        let msg = ServerMsg::Welcome(WelcomeMsg {
            protocol_version: PROTOCOL_VERSION,
            server_version: "0.1.0".to_string(),
            session_id: 7,
            config: BoardConfig::default(),
            icons: crate::icons::ICONS.iter().map(IconWire::from_icon).collect(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"welcome\""));
        assert!(json.contains("\"protocolVersion\":1"));
        assert!(json.contains("\"dangerLineY\":150"));
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMsg::Welcome(w) => {
                assert_eq!(w.session_id, 7);
                assert_eq!(w.icons.len(), 10);
                assert_eq!(w.icons[0].name, "Microphone");
            }
            _ => panic!("Expected Welcome"),
        }
    }

    #[test]
    fn board_state_uses_snake_case_phase() {
        let msg = ServerMsg::BoardState(BoardStateMsg {
            tick: 3,
            score: 12,
            next_level: 2,
            phase: GamePhase::GameOver,
            bodies: vec![BodyWire {
                id: 1,
                x: 10.5,
                y: 20.25,
                level: 1,
                radius: 28.0,
            }],
            quiz: None,
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"board_state\""));
        assert!(json.contains("\"phase\":\"game_over\""));
        assert!(json.contains("\"nextLevel\":2"));
    }

    #[test]
    fn client_msg_drop_parses() {
        let parsed: ClientMsg = serde_json::from_str(r#"{"type":"drop","x":123.5}"#).unwrap();
        match parsed {
            ClientMsg::Drop { x } => assert!((x - 123.5).abs() < 1e-9),
            _ => panic!("Expected Drop"),
        }
    }

    #[test]
    fn client_msg_answer_quiz_accepts_null_choice() {
        let parsed: ClientMsg =
            serde_json::from_str(r#"{"type":"answer_quiz","choice":null}"#).unwrap();
        match parsed {
            ClientMsg::AnswerQuiz { choice } => assert!(choice.is_none()),
            _ => panic!("Expected AnswerQuiz"),
        }
    }

    #[test]
    fn client_msg_restart_parses() {
        let parsed: ClientMsg = serde_json::from_str(r#"{"type":"restart"}"#).unwrap();
        assert!(matches!(parsed, ClientMsg::Restart));
    }

    #[test]
    fn round2_trims_precision() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(-3.14159), -3.14);
    }
}
