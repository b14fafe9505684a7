use std::sync::Arc;

use crate::config::Config;
use crate::middlewares::signature::SignatureVerifier;

pub mod flow_registry;
pub mod platform;
pub mod question_state;
pub mod response_store;
pub mod submission_gate;
pub mod verification_flow;

use flow_registry::FlowRegistry;
use platform::{DiscordPlatform, Platform};
use response_store::ResponseStore;
use verification_flow::FlowContext;

pub struct AppState {
    pub config: Config,
    pub verifier: SignatureVerifier,
    pub store: Arc<ResponseStore>,
    pub flows: Arc<FlowRegistry>,
}

impl AppState {
    /// Production wiring: Discord REST platform and the on-disk store.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let platform = Arc::new(DiscordPlatform::new(
            config.discord.clone(),
            config.verification.operator_channel_id.clone(),
        ));
        Self::with_platform(config, platform).await
    }

    pub async fn with_platform(config: Config, platform: Arc<dyn Platform>) -> anyhow::Result<Self> {
        let verifier = SignatureVerifier::from_hex(&config.discord.public_key)?;
        let store = Arc::new(ResponseStore::load(&config.verification.responses_path).await?);

        let flows = FlowRegistry::new(FlowContext {
            store: store.clone(),
            platform,
            quiz: Arc::new(config.quiz.clone()),
            support_channel: config.verification.support_channel.clone(),
            timeout: config.verification.flow_timeout,
        });

        tracing::info!(
            "Verification ready: capability={}, {} questions, {} recorded attempts",
            config.quiz.capability,
            config.quiz.questions.len(),
            store.len().await
        );

        Ok(Self {
            config,
            verifier,
            store,
            flows,
        })
    }
}
