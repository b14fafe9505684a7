//! One user's verification attempt, run as a single task.
//!
//! The task renders the quiz, waits until every question has an answer, arms
//! submission, waits for the confirmation, grades the latest selections,
//! re-checks the store and commits. Answer changes keep flowing in while it
//! waits, in arrival order, through the flow's event channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::FlowError;
use crate::metrics::VERIFICATION_FLOWS_TOTAL;
use crate::models::interaction::ComponentAction;
use crate::models::{AttemptRecord, Control, FlowOutcome, Quiz, SelectChoice, Surface, View};
use crate::services::platform::Platform;
use crate::services::question_state::QuestionState;
use crate::services::response_store::ResponseStore;
use crate::services::submission_gate::SubmissionGate;

/// User input routed to a running flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    Select { question_id: String, value: String },
    Submit,
}

/// Dependencies shared by every flow.
pub struct FlowContext {
    pub store: Arc<ResponseStore>,
    pub platform: Arc<dyn Platform>,
    pub quiz: Arc<Quiz>,
    pub support_channel: String,
    pub timeout: Duration,
}

pub struct VerificationFlow {
    id: Uuid,
    user_id: String,
    surface: Surface,
    ctx: Arc<FlowContext>,
    events: mpsc::Receiver<FlowEvent>,
}

impl VerificationFlow {
    pub fn new(
        id: Uuid,
        user_id: impl Into<String>,
        surface: Surface,
        ctx: Arc<FlowContext>,
        events: mpsc::Receiver<FlowEvent>,
    ) -> Self {
        Self {
            id,
            user_id: user_id.into(),
            surface,
            ctx,
            events,
        }
    }

    /// Runs the attempt to its end. Every error is turned into a message on
    /// the surface; nothing propagates out of here.
    pub async fn run(mut self) -> FlowOutcome {
        let outcome = match self.drive().await {
            Ok(outcome) => outcome,
            Err(err) => self.fail(err).await,
        };

        VERIFICATION_FLOWS_TOTAL
            .with_label_values(&[outcome.as_label()])
            .inc();
        tracing::info!(
            "Verification flow finished: user={}, outcome={}",
            self.user_id,
            outcome.as_label()
        );
        outcome
    }

    async fn drive(&mut self) -> Result<FlowOutcome, FlowError> {
        if self.ctx.store.has_attempt(&self.user_id).await {
            return Err(FlowError::AlreadyAttempted);
        }

        let quiz = self.ctx.quiz.clone();
        let questions: Vec<QuestionState> = quiz
            .questions
            .iter()
            .cloned()
            .map(QuestionState::new)
            .collect();
        let gate = SubmissionGate::new();
        // One deadline for the whole attempt; activity does not extend it.
        let deadline = Instant::now() + self.ctx.timeout;

        self.render_quiz(&questions, &gate).await?;

        let all_answered = join_all(questions.iter().map(QuestionState::await_answered));
        if !self.pump(all_answered, &questions, &gate, deadline).await? {
            return Ok(self.abandon().await);
        }

        gate.arm();
        tracing::debug!("All questions answered, submission armed");
        self.render_quiz(&questions, &gate).await?;

        if !self
            .pump(gate.await_confirmed(), &questions, &gate, deadline)
            .await?
        {
            return Ok(self.abandon().await);
        }

        // Grading instant: later selections no longer count.
        for question in &questions {
            question.freeze();
        }
        let record: AttemptRecord = questions
            .iter()
            .map(|q| (q.question().id.clone(), q.is_correct().unwrap_or(false)))
            .collect();

        // Another flow for this user may have committed while we waited.
        if self.ctx.store.has_attempt(&self.user_id).await {
            return Err(FlowError::AlreadyAttemptedRace);
        }
        self.ctx
            .store
            .record_attempt(&self.user_id, record.clone())
            .await?;

        // The record is durable from here on; later failures never undo it.
        if !record.passed() {
            self.render_final(&View::terminal(format!(
                "Unfortunately, at least one of your answers was wrong, so you were not verified. \
                 Please reach out in {} if you need help.",
                self.ctx.support_channel
            )))
            .await;
            return Ok(FlowOutcome::Failed);
        }

        self.ctx
            .platform
            .grant_capability(&self.user_id, &quiz.role_id)
            .await
            .map_err(FlowError::CapabilityGrantFailed)?;
        self.render_final(&View::terminal(
            "All answers correct, you are now verified. Welcome!",
        ))
        .await;
        Ok(FlowOutcome::Passed)
    }

    /// Applies incoming events until `until` resolves (true) or the attempt is
    /// abandoned by timeout or a closed channel (false).
    async fn pump<F>(
        &mut self,
        until: F,
        questions: &[QuestionState],
        gate: &SubmissionGate,
        deadline: Instant,
    ) -> Result<bool, FlowError>
    where
        F: Future,
    {
        tokio::pin!(until);
        loop {
            tokio::select! {
                biased;
                _ = &mut until => return Ok(true),
                _ = tokio::time::sleep_until(deadline) => return Ok(false),
                event = self.events.recv() => {
                    let Some(event) = event else {
                        return Ok(false);
                    };
                    if self.apply(event, questions, gate) {
                        self.render_quiz(questions, gate).await?;
                    }
                }
            }
        }
    }

    /// Returns whether the surface needs a re-render.
    fn apply(&self, event: FlowEvent, questions: &[QuestionState], gate: &SubmissionGate) -> bool {
        match event {
            FlowEvent::Select { question_id, value } => {
                let Some(state) = questions.iter().find(|q| q.question().id == question_id)
                else {
                    tracing::warn!("Selection for unknown question {}", question_id);
                    return false;
                };
                let accepted = state.select(&value);
                if !accepted {
                    tracing::warn!(
                        "Ignored selection for question {}: {:?}",
                        question_id,
                        value
                    );
                }
                accepted
            }
            FlowEvent::Submit => {
                if gate.confirm() {
                    tracing::debug!("Submission confirmed");
                } else {
                    tracing::debug!("Ignored submit in gate state {:?}", gate.state());
                }
                false
            }
        }
    }

    async fn abandon(&self) -> FlowOutcome {
        tracing::info!("Verification flow abandoned without a record");
        self.render_final(&View::terminal(
            "This verification timed out. Press the verify button again to start over.",
        ))
        .await;
        FlowOutcome::Abandoned
    }

    async fn fail(&self, err: FlowError) -> FlowOutcome {
        let support = &self.ctx.support_channel;
        let (outcome, message) = match &err {
            FlowError::AlreadyAttempted => (
                FlowOutcome::AlreadyAttempted,
                format!(
                    "You only get one chance at verification and you have already used it. \
                     Please reach out in {} if you think this is a mistake.",
                    support
                ),
            ),
            FlowError::AlreadyAttemptedRace | FlowError::DuplicateAttempt(_) => {
                if let FlowError::DuplicateAttempt(user) = &err {
                    tracing::error!(
                        "Duplicate attempt reached the store for user {} despite the re-check",
                        user
                    );
                }
                (
                    FlowOutcome::AlreadyAttemptedRace,
                    "Too late: your verification was already completed in another window."
                        .to_string(),
                )
            }
            FlowError::CapabilityGrantFailed(e) => {
                tracing::error!(
                    "Verified user {} but granting the role failed: {}",
                    self.user_id,
                    e
                );
                let notice = format!(
                    "User <@{}> passed verification but the role could not be granted: {}",
                    self.user_id, e
                );
                if let Err(e) = self.ctx.platform.notify_operators(&notice).await {
                    tracing::error!("Failed to notify operators: {}", e);
                }
                (
                    FlowOutcome::GrantFailed,
                    format!(
                        "Your answers were correct, but the role could not be granted. \
                         The moderators have been notified; please reach out in {}.",
                        support
                    ),
                )
            }
            FlowError::TransientPlatform(e) => {
                tracing::warn!("Verification flow aborted by platform error: {}", e);
                (FlowOutcome::Errored, generic_failure(support))
            }
            FlowError::Store(e) => {
                tracing::error!("Verification flow aborted by store error: {}", e);
                (FlowOutcome::Errored, generic_failure(support))
            }
        };

        self.render_final(&View::terminal(message)).await;
        outcome
    }

    async fn render_quiz(
        &self,
        questions: &[QuestionState],
        gate: &SubmissionGate,
    ) -> Result<(), FlowError> {
        self.render(&quiz_view(self.id, questions, gate)).await
    }

    /// Terminal renders only report failures: by then the outcome is decided.
    async fn render_final(&self, view: &View) {
        if let Err(e) = self.render(view).await {
            tracing::warn!("Could not render terminal message: {}", e);
        }
    }

    async fn render(&self, view: &View) -> Result<(), FlowError> {
        self.ctx.platform.render(&self.surface, view).await?;
        Ok(())
    }
}

fn generic_failure(support: &str) -> String {
    format!(
        "Something went wrong while verifying you. Please try again later or reach out in {}.",
        support
    )
}

/// The interactive quiz: one select per question and the submit button,
/// enabled only once the gate is armed.
pub fn quiz_view(flow_id: Uuid, questions: &[QuestionState], gate: &SubmissionGate) -> View {
    let mut content = String::from(if gate.is_armed() {
        "All questions answered. You can still change your answers before pressing Submit."
    } else {
        "Answer every question below, then press Submit. You only get one attempt."
    });
    for (index, state) in questions.iter().enumerate() {
        content.push_str(&format!("\n**{}.** {}", index + 1, state.question().prompt));
    }

    let mut controls: Vec<Control> = questions
        .iter()
        .map(|state| {
            let selection = state.selection();
            Control::Select {
                custom_id: ComponentAction::Answer {
                    flow_id,
                    question_id: state.question().id.clone(),
                }
                .custom_id(),
                placeholder: state.question().prompt.clone(),
                choices: state
                    .options()
                    .iter()
                    .map(|option| SelectChoice {
                        label: option.clone(),
                        value: option.clone(),
                        selected: selection.as_deref() == Some(option.as_str()),
                    })
                    .collect(),
            }
        })
        .collect();

    controls.push(Control::Button {
        custom_id: ComponentAction::Submit { flow_id }.custom_id(),
        label: "Submit".to_string(),
        disabled: !gate.is_armed(),
    });

    View { content, controls }
}
