use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Discord allows five action rows; one is reserved for the submit button.
pub const MAX_QUESTIONS: usize = 4;
/// Discord caps a string select at 25 options.
pub const MAX_OPTIONS: usize = 25;
/// Select option labels and values; Discord echoes the value back verbatim.
pub const MAX_OPTION_CHARS: usize = 100;
/// The prompt doubles as the select placeholder.
pub const MAX_PROMPT_CHARS: usize = 150;
/// `gate:<uuid>:answer:<id>` must fit Discord's 100-character custom_id.
pub const MAX_QUESTION_ID_CHARS: usize = 100 - "gate:".len() - 36 - ":answer:".len();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub correct_answer: String,
    pub distractors: Vec<String>,
}

impl Question {
    pub fn new(
        id: impl Into<String>,
        prompt: impl Into<String>,
        correct_answer: impl Into<String>,
        distractors: &[&str],
    ) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            correct_answer: correct_answer.into(),
            distractors: distractors.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Correct answer followed by the distractors.
    pub fn options(&self) -> Vec<String> {
        std::iter::once(self.correct_answer.clone())
            .chain(self.distractors.iter().cloned())
            .collect()
    }

    pub fn is_option(&self, value: &str) -> bool {
        self.correct_answer == value || self.distractors.iter().any(|d| d == value)
    }
}

/// The quiz guarding one capability (a guild role).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub capability: String,
    pub role_id: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizValidationError {
    NoQuestions,
    TooManyQuestions(usize),
    DuplicateQuestionId(String),
    NoDistractors(String),
    CorrectAnswerIsDistractor(String),
    DuplicateOption(String),
    TooManyOptions(String),
    QuestionIdTooLong(String),
    PromptTooLong(String),
    OptionTooLong(String),
}

impl std::fmt::Display for QuizValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoQuestions => write!(f, "quiz has no questions"),
            Self::TooManyQuestions(n) => {
                write!(f, "quiz has {} questions, at most {} fit", n, MAX_QUESTIONS)
            }
            Self::DuplicateQuestionId(id) => write!(f, "question id {} is used twice", id),
            Self::NoDistractors(id) => write!(f, "question {} has no distractors", id),
            Self::CorrectAnswerIsDistractor(id) => {
                write!(f, "question {} lists its correct answer as a distractor", id)
            }
            Self::DuplicateOption(id) => write!(f, "question {} repeats an option", id),
            Self::TooManyOptions(id) => {
                write!(f, "question {} has more than {} options", id, MAX_OPTIONS)
            }
            Self::QuestionIdTooLong(id) => write!(
                f,
                "question id {} is longer than {} characters",
                id, MAX_QUESTION_ID_CHARS
            ),
            Self::PromptTooLong(id) => write!(
                f,
                "question {} has a prompt longer than {} characters",
                id, MAX_PROMPT_CHARS
            ),
            Self::OptionTooLong(id) => write!(
                f,
                "question {} has an option longer than {} characters",
                id, MAX_OPTION_CHARS
            ),
        }
    }
}

impl std::error::Error for QuizValidationError {}

impl Quiz {
    /// Rules quiz used when the configuration does not supply one.
    pub fn default_for(capability: impl Into<String>, role_id: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            role_id: role_id.into(),
            questions: vec![
                Question::new(
                    "ask-for-solutions",
                    "Is it okay to ask for or share solutions to an ongoing contest?",
                    "No",
                    &["Yes", "Only in DMs", "Only after I have tried myself"],
                ),
                Question::new(
                    "rules-in-dms",
                    "Are the moderators more lenient about rule breaks that happen in DMs?",
                    "No, they will be harsher than in public channels",
                    &[
                        "Yes, DMs are private",
                        "No, they are exactly as strict",
                        "Rules do not apply to DMs",
                    ],
                ),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), QuizValidationError> {
        if self.questions.is_empty() {
            return Err(QuizValidationError::NoQuestions);
        }
        if self.questions.len() > MAX_QUESTIONS {
            return Err(QuizValidationError::TooManyQuestions(self.questions.len()));
        }

        let mut ids = HashSet::new();
        for question in &self.questions {
            if !ids.insert(question.id.as_str()) {
                return Err(QuizValidationError::DuplicateQuestionId(question.id.clone()));
            }
            if question.id.chars().count() > MAX_QUESTION_ID_CHARS {
                return Err(QuizValidationError::QuestionIdTooLong(question.id.clone()));
            }
            if question.prompt.chars().count() > MAX_PROMPT_CHARS {
                return Err(QuizValidationError::PromptTooLong(question.id.clone()));
            }
            if question.distractors.is_empty() {
                return Err(QuizValidationError::NoDistractors(question.id.clone()));
            }
            if question.distractors.contains(&question.correct_answer) {
                return Err(QuizValidationError::CorrectAnswerIsDistractor(
                    question.id.clone(),
                ));
            }
            let options = question.options();
            let unique: HashSet<&String> = options.iter().collect();
            if unique.len() != options.len() {
                return Err(QuizValidationError::DuplicateOption(question.id.clone()));
            }
            if options.len() > MAX_OPTIONS {
                return Err(QuizValidationError::TooManyOptions(question.id.clone()));
            }
            if options.iter().any(|o| o.chars().count() > MAX_OPTION_CHARS) {
                return Err(QuizValidationError::OptionTooLong(question.id.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::interaction::ComponentAction;
    use uuid::Uuid;

    #[test]
    fn default_quiz_is_valid() {
        let quiz = Quiz::default_for("member", "1");
        assert_eq!(quiz.validate(), Ok(()));
        assert_eq!(quiz.questions[0].correct_answer, "No");
    }

    #[test]
    fn rejects_correct_answer_among_distractors() {
        let mut quiz = Quiz::default_for("member", "1");
        quiz.questions[0].distractors.push("No".to_string());
        assert_eq!(
            quiz.validate(),
            Err(QuizValidationError::CorrectAnswerIsDistractor(
                "ask-for-solutions".to_string()
            ))
        );
    }

    #[test]
    fn rejects_empty_distractors_and_too_many_questions() {
        let mut quiz = Quiz::default_for("member", "1");
        quiz.questions[1].distractors.clear();
        assert!(matches!(
            quiz.validate(),
            Err(QuizValidationError::NoDistractors(_))
        ));

        let mut quiz = Quiz::default_for("member", "1");
        for i in 0..3 {
            quiz.questions
                .push(Question::new(format!("extra-{}", i), "?", "a", &["b"]));
        }
        assert_eq!(quiz.validate(), Err(QuizValidationError::TooManyQuestions(5)));
    }

    #[test]
    fn rejects_options_longer_than_a_select_value() {
        let mut quiz = Quiz::default_for("member", "1");
        quiz.questions[0].correct_answer = "n".repeat(MAX_OPTION_CHARS);
        assert_eq!(quiz.validate(), Ok(()));

        quiz.questions[0].distractors[0] = "y".repeat(MAX_OPTION_CHARS + 1);
        assert_eq!(
            quiz.validate(),
            Err(QuizValidationError::OptionTooLong(
                "ask-for-solutions".to_string()
            ))
        );
    }

    #[test]
    fn rejects_prompts_longer_than_a_placeholder() {
        let mut quiz = Quiz::default_for("member", "1");
        quiz.questions[1].prompt = "?".repeat(MAX_PROMPT_CHARS);
        assert_eq!(quiz.validate(), Ok(()));

        quiz.questions[1].prompt.push('?');
        assert_eq!(
            quiz.validate(),
            Err(QuizValidationError::PromptTooLong("rules-in-dms".to_string()))
        );
    }

    #[test]
    fn question_ids_keep_custom_ids_within_limit() {
        let longest = "q".repeat(MAX_QUESTION_ID_CHARS);
        let custom_id = ComponentAction::Answer {
            flow_id: Uuid::new_v4(),
            question_id: longest.clone(),
        }
        .custom_id();
        assert_eq!(custom_id.chars().count(), 100);

        let mut quiz = Quiz::default_for("member", "1");
        quiz.questions[0].id = longest;
        assert_eq!(quiz.validate(), Ok(()));

        quiz.questions[0].id.push('q');
        assert!(matches!(
            quiz.validate(),
            Err(QuizValidationError::QuestionIdTooLong(_))
        ));
    }

    #[test]
    fn options_lead_with_correct_answer() {
        let q = Question::new("q", "?", "right", &["wrong", "also wrong"]);
        assert_eq!(q.options(), vec!["right", "wrong", "also wrong"]);
        assert!(q.is_option("also wrong"));
        assert!(!q.is_option("made up"));
    }
}
