use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

pub const INTERACTION_PING: u8 = 1;
pub const INTERACTION_APPLICATION_COMMAND: u8 = 2;
pub const INTERACTION_MESSAGE_COMPONENT: u8 = 3;

pub const RESPONSE_PONG: u8 = 1;
pub const RESPONSE_CHANNEL_MESSAGE: u8 = 4;
pub const RESPONSE_DEFERRED_CHANNEL_MESSAGE: u8 = 5;
pub const RESPONSE_DEFERRED_UPDATE_MESSAGE: u8 = 6;

pub const EPHEMERAL_FLAG: u64 = 1 << 6;
pub const ADMINISTRATOR_PERMISSION: u64 = 1 << 3;

const CUSTOM_ID_PREFIX: &str = "gate";

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub user: User,
    /// Decimal bitset of the member's permissions in the channel.
    #[serde(default)]
    pub permissions: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionData {
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

/// Inbound interaction as delivered to the interactions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub token: String,
    #[serde(default)]
    pub data: Option<InteractionData>,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub user: Option<User>,
}

impl Interaction {
    /// Guild interactions carry the user inside `member`, DMs carry it directly.
    pub fn user_id(&self) -> Option<&str> {
        self.member
            .as_ref()
            .map(|m| m.user.id.as_str())
            .or_else(|| self.user.as_ref().map(|u| u.id.as_str()))
    }

    pub fn is_administrator(&self) -> bool {
        self.member
            .as_ref()
            .and_then(|m| m.permissions.as_deref())
            .and_then(|p| p.parse::<u64>().ok())
            .map(|bits| bits & ADMINISTRATOR_PERMISSION != 0)
            .unwrap_or(false)
    }
}

/// What a component's `custom_id` asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentAction {
    RequestAccess { capability: String },
    Answer { flow_id: Uuid, question_id: String },
    Submit { flow_id: Uuid },
}

impl ComponentAction {
    pub fn parse(custom_id: &str) -> Option<Self> {
        let rest = custom_id.strip_prefix(CUSTOM_ID_PREFIX)?.strip_prefix(':')?;
        if let Some(capability) = rest.strip_prefix("request:") {
            if capability.is_empty() {
                return None;
            }
            return Some(ComponentAction::RequestAccess {
                capability: capability.to_string(),
            });
        }

        let (flow, action) = rest.split_once(':')?;
        let flow_id = Uuid::parse_str(flow).ok()?;
        if action == "submit" {
            return Some(ComponentAction::Submit { flow_id });
        }
        let question_id = action.strip_prefix("answer:")?;
        if question_id.is_empty() {
            return None;
        }
        Some(ComponentAction::Answer {
            flow_id,
            question_id: question_id.to_string(),
        })
    }

    pub fn custom_id(&self) -> String {
        match self {
            ComponentAction::RequestAccess { capability } => {
                format!("{}:request:{}", CUSTOM_ID_PREFIX, capability)
            }
            ComponentAction::Answer {
                flow_id,
                question_id,
            } => format!("{}:{}:answer:{}", CUSTOM_ID_PREFIX, flow_id, question_id),
            ComponentAction::Submit { flow_id } => {
                format!("{}:{}:submit", CUSTOM_ID_PREFIX, flow_id)
            }
        }
    }
}

/// Synchronous reply to an interaction.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: RESPONSE_PONG,
            data: None,
        }
    }

    pub fn ephemeral_message(content: impl Into<String>) -> Self {
        Self {
            kind: RESPONSE_CHANNEL_MESSAGE,
            data: Some(json!({
                "content": content.into(),
                "flags": EPHEMERAL_FLAG,
            })),
        }
    }

    pub fn deferred_ephemeral() -> Self {
        Self {
            kind: RESPONSE_DEFERRED_CHANNEL_MESSAGE,
            data: Some(json!({ "flags": EPHEMERAL_FLAG })),
        }
    }

    pub fn deferred_update() -> Self {
        Self {
            kind: RESPONSE_DEFERRED_UPDATE_MESSAGE,
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_ids_parse_back() {
        let flow_id = Uuid::new_v4();
        for action in [
            ComponentAction::RequestAccess {
                capability: "member".into(),
            },
            ComponentAction::Answer {
                flow_id,
                question_id: "rules-in-dms".into(),
            },
            ComponentAction::Submit { flow_id },
        ] {
            assert_eq!(ComponentAction::parse(&action.custom_id()), Some(action));
        }
    }

    #[test]
    fn foreign_or_malformed_custom_ids_are_ignored() {
        assert_eq!(ComponentAction::parse("other:request:member"), None);
        assert_eq!(ComponentAction::parse("gate:request:"), None);
        assert_eq!(ComponentAction::parse("gate:not-a-uuid:submit"), None);
        assert_eq!(
            ComponentAction::parse(&format!("gate:{}:answer:", Uuid::new_v4())),
            None
        );
    }

    #[test]
    fn administrator_bit_is_read_from_member_permissions() {
        let raw = json!({
            "id": "1",
            "type": 2,
            "token": "t",
            "member": { "user": { "id": "7", "username": "mod" }, "permissions": "8" }
        });
        let interaction: Interaction = serde_json::from_value(raw).unwrap();
        assert_eq!(interaction.user_id(), Some("7"));
        assert!(interaction.is_administrator());
    }
}
