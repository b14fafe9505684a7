use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::json;

use crate::config::DiscordConfig;
use crate::error::PlatformError;
use crate::metrics::track_platform_operation;
use crate::models::{Surface, View};
use crate::utils::retry::{retry_async_if, RetryConfig};

/// Outbound half of the chat platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Replaces the content and controls of the ephemeral surface.
    async fn render(&self, surface: &Surface, view: &View) -> Result<(), PlatformError>;

    /// Grants the capability (a guild role) to the user.
    async fn grant_capability(&self, user_id: &str, role_id: &str) -> Result<(), PlatformError>;

    /// Posts a message for operators.
    async fn notify_operators(&self, message: &str) -> Result<(), PlatformError>;
}

/// Discord REST implementation.
pub struct DiscordPlatform {
    http_client: Client,
    config: DiscordConfig,
    operator_channel_id: Option<String>,
    retry: RetryConfig,
}

impl DiscordPlatform {
    pub fn new(config: DiscordConfig, operator_channel_id: Option<String>) -> Self {
        Self {
            http_client: Client::new(),
            config,
            operator_channel_id,
            retry: RetryConfig::default(),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bot {}", self.config.bot_token))
            .timeout(std::time::Duration::from_secs(5))
    }

    async fn send(request: RequestBuilder) -> Result<(), PlatformError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(PlatformError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Platform for DiscordPlatform {
    async fn render(&self, surface: &Surface, view: &View) -> Result<(), PlatformError> {
        let url = format!(
            "{}/webhooks/{}/{}/messages/@original",
            self.config.api_base, self.config.application_id, surface.interaction_token
        );
        let payload = view.to_message_payload();

        // Interaction webhooks authenticate through the token in the URL.
        track_platform_operation(
            "render",
            retry_async_if(self.retry.clone(), PlatformError::is_retryable, || {
                Self::send(
                    self.http_client
                        .patch(&url)
                        .json(&payload)
                        .timeout(std::time::Duration::from_secs(5)),
                )
            }),
        )
        .await
    }

    async fn grant_capability(&self, user_id: &str, role_id: &str) -> Result<(), PlatformError> {
        let url = format!(
            "{}/guilds/{}/members/{}/roles/{}",
            self.config.api_base, self.config.guild_id, user_id, role_id
        );
        tracing::info!("Granting role {} to user {}", role_id, user_id);

        track_platform_operation(
            "grant_capability",
            Self::send(
                self.authorized(self.http_client.put(&url))
                    .header("X-Audit-Log-Reason", "Passed verification quiz"),
            ),
        )
        .await
    }

    async fn notify_operators(&self, message: &str) -> Result<(), PlatformError> {
        let Some(channel_id) = &self.operator_channel_id else {
            tracing::debug!("No operator channel configured, dropping notice: {}", message);
            return Ok(());
        };
        let url = format!("{}/channels/{}/messages", self.config.api_base, channel_id);

        track_platform_operation(
            "notify_operators",
            Self::send(
                self.authorized(self.http_client.post(&url))
                    .json(&json!({ "content": message })),
            ),
        )
        .await
    }
}
