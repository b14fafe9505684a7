use config::ConfigError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::{Question, Quiz};

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
/// Interaction tokens expire after 15 minutes; stay inside that.
const DEFAULT_FLOW_TIMEOUT_SECS: u64 = 840;

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub application_id: String,
    /// Hex-encoded Ed25519 key used to verify interaction signatures.
    pub public_key: String,
    pub bot_token: String,
    pub guild_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub support_channel: String,
    pub operator_channel_id: Option<String>,
    pub responses_path: PathBuf,
    /// Attempt deadline, counted from the flow's start.
    pub flow_timeout: Duration,
    pub admin_user_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub discord: DiscordConfig,
    pub verification: VerificationConfig,
    pub quiz: Quiz,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let discord = DiscordConfig {
            application_id: required(&settings, "discord.application_id", "DISCORD_APPLICATION_ID")?,
            public_key: required(&settings, "discord.public_key", "DISCORD_PUBLIC_KEY")?,
            bot_token: required(&settings, "discord.bot_token", "DISCORD_TOKEN")?,
            guild_id: required(&settings, "discord.guild_id", "DISCORD_GUILD_ID")?,
            api_base: optional(&settings, "discord.api_base", "DISCORD_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        };

        let flow_timeout_secs = match optional(
            &settings,
            "verification.flow_timeout_secs",
            "VERIFICATION_FLOW_TIMEOUT_SECS",
        ) {
            Some(raw) => raw.parse::<u64>().ok().filter(|v| *v > 0).ok_or_else(|| {
                ConfigError::Message(format!("invalid verification.flow_timeout_secs: {}", raw))
            })?,
            None => DEFAULT_FLOW_TIMEOUT_SECS,
        };

        let verification = VerificationConfig {
            support_channel: optional(
                &settings,
                "verification.support_channel",
                "VERIFICATION_SUPPORT_CHANNEL",
            )
            .unwrap_or_else(|| "#support".to_string()),
            operator_channel_id: optional(
                &settings,
                "verification.operator_channel_id",
                "VERIFICATION_OPERATOR_CHANNEL_ID",
            ),
            responses_path: optional(
                &settings,
                "verification.responses_path",
                "VERIFICATION_RESPONSES_PATH",
            )
            .unwrap_or_else(|| "responses.json".to_string())
            .into(),
            flow_timeout: Duration::from_secs(flow_timeout_secs),
            admin_user_ids: optional(
                &settings,
                "verification.admin_user_ids",
                "VERIFICATION_ADMIN_USER_IDS",
            )
            .map(|raw| split_ids(&raw))
            .unwrap_or_default(),
        };

        // A [quiz] table may name its own capability and role.
        let capability = setting(&settings, "quiz.capability")
            .or_else(|| {
                optional(&settings, "verification.capability", "VERIFICATION_CAPABILITY")
            })
            .unwrap_or_else(|| "member".to_string());
        let role_id = match setting(&settings, "quiz.role_id") {
            Some(role_id) => role_id,
            None => required(&settings, "verification.role_id", "VERIFICATION_ROLE_ID")?,
        };

        let mut quiz = Quiz::default_for(capability, role_id);
        match settings.get::<Vec<Question>>("quiz.questions") {
            Ok(questions) => quiz.questions = questions,
            Err(ConfigError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        quiz.validate()
            .map_err(|e| ConfigError::Message(format!("invalid quiz: {}", e)))?;

        let bind_addr = optional(&settings, "server.bind_addr", "BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        Ok(Config {
            bind_addr,
            discord,
            verification,
            quiz,
        })
    }
}

fn setting(settings: &config::Config, key: &str) -> Option<String> {
    settings
        .get_string(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn optional(settings: &config::Config, key: &str, env_key: &str) -> Option<String> {
    setting(settings, key).or_else(|| env::var(env_key).ok().filter(|v| !v.trim().is_empty()))
}

fn required(settings: &config::Config, key: &str, env_key: &str) -> Result<String, ConfigError> {
    optional(settings, key, env_key)
        .ok_or_else(|| ConfigError::Message(format!("{} (or {}) must be set", key, env_key)))
}

fn split_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}
