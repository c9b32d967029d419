//! Trivia questions that pop up between merges.

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizQuestion {
    pub prompt: &'static str,
    pub options: [&'static str; 4],
    /// Index into `options`
    pub correct: usize,
}

impl QuizQuestion {
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct
    }
}

pub const QUESTIONS: [QuizQuestion; 5] = [
    QuizQuestion {
        prompt: "What is the main purpose of the Meta Community?",
        options: [
            "Only social media management",
            "Media and promotion work",
            "Software development",
            "Sports events",
        ],
        correct: 1,
    },
    QuizQuestion {
        prompt: "Which of these is not one of the fields Meta represents?",
        options: ["Podcast", "Visual media", "Content writing", "Financial consulting"],
        correct: 3,
    },
    QuizQuestion {
        prompt: "Which icon is worth the most points?",
        options: ["Microphone", "Social Media", "Meta Symbol", "Project Folder"],
        correct: 2,
    },
    QuizQuestion {
        prompt: "Merging icons worth how many points triggers a quiz?",
        options: ["5 points", "10 points", "15 points", "20 points"],
        correct: 1,
    },
    QuizQuestion {
        prompt: "What is the goal of the Meta Digital Campus Adventure?",
        options: [
            "Reaching the highest score",
            "Building the biggest project",
            "Collecting every icon",
            "Running out the clock",
        ],
        correct: 1,
    },
];

pub fn question(index: usize) -> Option<&'static QuizQuestion> {
    QUESTIONS.get(index)
}

/// Uniformly pick a question index
pub fn pick_question(rng: &mut impl Rng) -> usize {
    rng.gen_range(0..QUESTIONS.len())
}

/// A quiz waiting for an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingQuiz {
    pub question_index: usize,
    pub reward: u32,
}

/// Result of answering (or dismissing) a quiz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizOutcome {
    pub correct: bool,
    pub correct_index: usize,
    pub awarded: u32,
}

impl PendingQuiz {
    pub fn question(&self) -> &'static QuizQuestion {
        // Indices only ever come from pick_question
        &QUESTIONS[self.question_index % QUESTIONS.len()]
    }

    /// `None` means the player closed the quiz without answering.
    pub fn resolve(&self, choice: Option<usize>) -> QuizOutcome {
        let question = self.question();
        let correct = choice.is_some_and(|c| question.is_correct(c));
        QuizOutcome {
            correct,
            correct_index: question.correct,
            awarded: if correct { self.reward } else { 0 },
        }
    }
}
