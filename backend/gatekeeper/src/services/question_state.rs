use rand::seq::SliceRandom;
use tokio::sync::watch;

use crate::models::Question;

#[derive(Debug, Clone, Default)]
struct Answer {
    selection: Option<String>,
    frozen: bool,
}

/// One question of a running attempt.
///
/// The selection can be changed any number of times until [`freeze`] is
/// called. "Answered" latches on the first selection and never resets, while
/// grading always reads the latest selection.
///
/// [`freeze`]: QuestionState::freeze
pub struct QuestionState {
    question: Question,
    options: Vec<String>,
    answer: watch::Sender<Answer>,
}

impl QuestionState {
    /// Options are shuffled once so their position does not give the answer away.
    pub fn new(question: Question) -> Self {
        let mut options = question.options();
        options.shuffle(&mut rand::rng());
        Self::with_options(question, options)
    }

    pub fn with_options(question: Question, options: Vec<String>) -> Self {
        let (answer, _) = watch::channel(Answer::default());
        Self {
            question,
            options,
            answer,
        }
    }

    pub fn question(&self) -> &Question {
        &self.question
    }

    /// Options in display order.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Records `value` as the current selection. Returns false when the value
    /// is not one of this question's options or the state is frozen.
    pub fn select(&self, value: &str) -> bool {
        if !self.question.is_option(value) {
            return false;
        }
        self.answer.send_if_modified(|answer| {
            if answer.frozen {
                return false;
            }
            answer.selection = Some(value.to_string());
            true
        })
    }

    pub fn selection(&self) -> Option<String> {
        self.answer.borrow().selection.clone()
    }

    pub fn is_answered(&self) -> bool {
        self.answer.borrow().selection.is_some()
    }

    /// Resolves once the first selection has been made; immediately if it
    /// already has.
    pub async fn await_answered(&self) {
        let mut rx = self.answer.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|answer| answer.selection.is_some()).await;
    }

    /// `None` until answered, then whether the latest selection is correct.
    pub fn is_correct(&self) -> Option<bool> {
        self.answer
            .borrow()
            .selection
            .as_ref()
            .map(|selection| *selection == self.question.correct_answer)
    }

    /// Stops accepting selections. Called at the grading instant.
    pub fn freeze(&self) {
        self.answer.send_modify(|answer| answer.frozen = true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn state() -> QuestionState {
        QuestionState::with_options(
            Question::new("q1", "Allowed?", "No", &["Yes", "Maybe"]),
            vec!["Yes".into(), "No".into(), "Maybe".into()],
        )
    }

    #[test]
    fn is_correct_tracks_latest_selection() {
        let state = state();
        assert_eq!(state.is_correct(), None);

        assert!(state.select("Yes"));
        assert_eq!(state.is_correct(), Some(false));

        assert!(state.select("No"));
        assert_eq!(state.is_correct(), Some(true));
        assert_eq!(state.selection().as_deref(), Some("No"));
    }

    #[test]
    fn rejects_unknown_values() {
        let state = state();
        assert!(!state.select("Definitely"));
        assert!(!state.is_answered());
    }

    #[test]
    fn frozen_state_ignores_selections() {
        let state = state();
        state.select("Yes");
        state.freeze();
        assert!(!state.select("No"));
        assert_eq!(state.is_correct(), Some(false));
    }

    #[tokio::test]
    async fn await_answered_resolves_on_first_selection() {
        let state = state();

        let pending = tokio::time::timeout(Duration::from_millis(20), state.await_answered()).await;
        assert!(pending.is_err(), "must stay pending before any selection");

        tokio::join!(
            async {
                tokio::task::yield_now().await;
                state.select("Maybe");
            },
            state.await_answered()
        );

        // Already answered: resolves immediately, also after a change of mind.
        state.select("No");
        tokio::time::timeout(Duration::from_millis(20), state.await_answered())
            .await
            .expect("answered state resolves immediately");
    }

    #[test]
    fn new_shuffles_but_keeps_every_option() {
        let question = Question::new("q", "?", "a", &["b", "c", "d"]);
        let state = QuestionState::new(question.clone());
        let mut shown = state.options().to_vec();
        shown.sort();
        assert_eq!(shown, vec!["a", "b", "c", "d"]);
    }
}
