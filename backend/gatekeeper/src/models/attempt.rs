use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Per-question correctness of one committed attempt, in quiz order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptRecord(IndexMap<String, bool>);

impl AttemptRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, question_id: impl Into<String>, correct: bool) {
        self.0.insert(question_id.into(), correct);
    }

    pub fn get(&self, question_id: &str) -> Option<bool> {
        self.0.get(question_id).copied()
    }

    /// True when every graded question was answered correctly.
    pub fn passed(&self) -> bool {
        !self.0.is_empty() && self.0.values().all(|correct| *correct)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &bool)> {
        self.0.iter()
    }
}

impl FromIterator<(String, bool)> for AttemptRecord {
    fn from_iter<T: IntoIterator<Item = (String, bool)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How a verification attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowOutcome {
    Passed,
    Failed,
    AlreadyAttempted,
    AlreadyAttemptedRace,
    GrantFailed,
    Abandoned,
    Errored,
}

impl FlowOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            FlowOutcome::Passed => "passed",
            FlowOutcome::Failed => "failed",
            FlowOutcome::AlreadyAttempted => "already_attempted",
            FlowOutcome::AlreadyAttemptedRace => "already_attempted_race",
            FlowOutcome::GrantFailed => "grant_failed",
            FlowOutcome::Abandoned => "abandoned",
            FlowOutcome::Errored => "errored",
        }
    }
}
