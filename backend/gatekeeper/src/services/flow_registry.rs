use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::metrics::VERIFICATION_FLOWS_ACTIVE;
use crate::models::{FlowOutcome, Surface};
use crate::services::verification_flow::{FlowContext, FlowEvent, VerificationFlow};

const EVENT_BUFFER: usize = 32;

struct FlowHandle {
    user_id: String,
    events: mpsc::Sender<FlowEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    Delivered,
    /// Finished, timed out, or from before a restart.
    UnknownFlow,
    NotOwner,
}

pub struct StartedFlow {
    pub id: Uuid,
    pub task: JoinHandle<FlowOutcome>,
}

/// Live flows by id. Several flows may run for the same user; the store
/// decides which of them commits.
pub struct FlowRegistry {
    ctx: Arc<FlowContext>,
    flows: RwLock<HashMap<Uuid, FlowHandle>>,
}

impl FlowRegistry {
    pub fn new(ctx: FlowContext) -> Arc<Self> {
        Arc::new(Self {
            ctx: Arc::new(ctx),
            flows: RwLock::new(HashMap::new()),
        })
    }

    /// Starts a verification flow for `user_id` drawing on `surface`.
    pub async fn request_access(self: &Arc<Self>, user_id: &str, surface: Surface) -> StartedFlow {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        self.flows.write().await.insert(
            id,
            FlowHandle {
                user_id: user_id.to_string(),
                events: tx,
            },
        );
        VERIFICATION_FLOWS_ACTIVE.inc();

        let flow = VerificationFlow::new(id, user_id, surface, self.ctx.clone(), rx);
        let span = tracing::info_span!("verification_flow", flow_id = %id, user_id = %user_id);
        let registry = Arc::clone(self);

        let task = tokio::spawn(
            async move {
                tracing::info!("Verification flow started");
                let outcome = flow.run().await;
                registry.flows.write().await.remove(&id);
                VERIFICATION_FLOWS_ACTIVE.dec();
                outcome
            }
            .instrument(span),
        );

        StartedFlow { id, task }
    }

    /// Hands `event` to the flow, in arrival order.
    pub async fn dispatch(&self, flow_id: Uuid, user_id: &str, event: FlowEvent) -> DispatchResult {
        let events = {
            let flows = self.flows.read().await;
            let Some(handle) = flows.get(&flow_id) else {
                return DispatchResult::UnknownFlow;
            };
            if handle.user_id != user_id {
                tracing::warn!(
                    "User {} tried to act on flow {} owned by {}",
                    user_id,
                    flow_id,
                    handle.user_id
                );
                return DispatchResult::NotOwner;
            }
            handle.events.clone()
        };

        match events.send(event).await {
            Ok(()) => DispatchResult::Delivered,
            Err(_) => DispatchResult::UnknownFlow,
        }
    }

    pub async fn active_flows(&self) -> usize {
        self.flows.read().await.len()
    }
}
