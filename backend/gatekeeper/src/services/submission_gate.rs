use tokio::sync::watch;

/// Unarmed → Armed → Confirmed. Confirmed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Unarmed,
    Armed,
    Confirmed,
}

/// The submit control of one attempt.
pub struct SubmissionGate {
    state: watch::Sender<GateState>,
}

impl Default for SubmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::Unarmed);
        Self { state }
    }

    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    pub fn is_armed(&self) -> bool {
        self.state() == GateState::Armed
    }

    /// Enables submission. Only the flow calls this, after every question is
    /// answered. Idempotent.
    pub fn arm(&self) {
        self.state.send_if_modified(|state| {
            if *state == GateState::Unarmed {
                *state = GateState::Armed;
                true
            } else {
                false
            }
        });
    }

    /// Latches the confirmation. Returns true only for the call that moved the
    /// gate from Armed to Confirmed; presses on a disabled or already
    /// confirmed control change nothing.
    pub fn confirm(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == GateState::Armed {
                *state = GateState::Confirmed;
                true
            } else {
                false
            }
        })
    }

    pub async fn await_confirmed(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state == GateState::Confirmed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn confirm_before_arm_is_ignored() {
        let gate = SubmissionGate::new();
        assert!(!gate.confirm());
        assert_eq!(gate.state(), GateState::Unarmed);

        gate.arm();
        assert!(gate.is_armed());
        assert!(gate.confirm());
        assert_eq!(gate.state(), GateState::Confirmed);
    }

    #[test]
    fn confirmed_is_terminal() {
        let gate = SubmissionGate::new();
        gate.arm();
        assert!(gate.confirm());
        assert!(!gate.confirm());
        gate.arm();
        assert_eq!(gate.state(), GateState::Confirmed);
    }

    #[tokio::test]
    async fn await_confirmed_waits_for_confirmation() {
        let gate = SubmissionGate::new();
        gate.arm();

        let pending = tokio::time::timeout(Duration::from_millis(20), gate.await_confirmed()).await;
        assert!(pending.is_err());

        gate.confirm();
        tokio::time::timeout(Duration::from_millis(20), gate.await_confirmed())
            .await
            .expect("confirmed gate resolves");
    }
}
