use serde::Serialize;
use serde_json::{json, Value};

/// Where a flow draws: the interaction token of the "request access" press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    pub interaction_token: String,
}

impl Surface {
    pub fn new(interaction_token: impl Into<String>) -> Self {
        Self {
            interaction_token: interaction_token.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectChoice {
    pub label: String,
    pub value: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Control {
    Select {
        custom_id: String,
        placeholder: String,
        choices: Vec<SelectChoice>,
    },
    Button {
        custom_id: String,
        label: String,
        disabled: bool,
    },
}

/// One full rendering of the ephemeral surface. Rendering replaces
/// everything, so repeated renders of the same view are harmless.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct View {
    pub content: String,
    pub controls: Vec<Control>,
}

impl View {
    /// Final message with every control removed.
    pub fn terminal(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            controls: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn button(&self, custom_id_suffix: &str) -> Option<(&str, bool)> {
        self.controls.iter().find_map(|c| match c {
            Control::Button {
                custom_id,
                disabled,
                ..
            } if custom_id.ends_with(custom_id_suffix) => Some((custom_id.as_str(), *disabled)),
            _ => None,
        })
    }

    /// Currently selected value of the select whose id ends with `suffix`.
    pub fn selected(&self, custom_id_suffix: &str) -> Option<&str> {
        self.controls.iter().find_map(|c| match c {
            Control::Select {
                custom_id, choices, ..
            } if custom_id.ends_with(custom_id_suffix) => choices
                .iter()
                .find(|choice| choice.selected)
                .map(|choice| choice.value.as_str()),
            _ => None,
        })
    }

    /// Discord message payload: content plus action rows. Each select gets
    /// its own row and buttons share the last one.
    pub fn to_message_payload(&self) -> Value {
        let mut rows = Vec::new();
        let mut buttons = Vec::new();

        for control in &self.controls {
            match control {
                Control::Select {
                    custom_id,
                    placeholder,
                    choices,
                } => {
                    let options: Vec<Value> = choices
                        .iter()
                        .map(|choice| {
                            json!({
                                "label": truncate(&choice.label, 100),
                                "value": choice.value,
                                "default": choice.selected,
                            })
                        })
                        .collect();
                    rows.push(json!({
                        "type": 1,
                        "components": [{
                            "type": 3,
                            "custom_id": custom_id,
                            "placeholder": truncate(placeholder, 150),
                            "min_values": 1,
                            "max_values": 1,
                            "options": options,
                        }],
                    }));
                }
                Control::Button {
                    custom_id,
                    label,
                    disabled,
                } => buttons.push(json!({
                    "type": 2,
                    "style": 1,
                    "custom_id": custom_id,
                    "label": label,
                    "disabled": disabled,
                })),
            }
        }

        if !buttons.is_empty() {
            rows.push(json!({ "type": 1, "components": buttons }));
        }

        json!({
            "content": self.content,
            "components": rows,
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_view_clears_components() {
        let payload = View::terminal("done").to_message_payload();
        assert_eq!(payload["content"], "done");
        assert_eq!(payload["components"], json!([]));
    }

    #[test]
    fn selects_get_rows_and_buttons_share_one() {
        let view = View {
            content: "quiz".into(),
            controls: vec![
                Control::Select {
                    custom_id: "gate:x:answer:q1".into(),
                    placeholder: "Q1".into(),
                    choices: vec![SelectChoice {
                        label: "No".into(),
                        value: "No".into(),
                        selected: true,
                    }],
                },
                Control::Button {
                    custom_id: "gate:x:submit".into(),
                    label: "Submit".into(),
                    disabled: true,
                },
            ],
        };

        let payload = view.to_message_payload();
        let rows = payload["components"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["components"][0]["type"], 3);
        assert_eq!(rows[0]["components"][0]["options"][0]["default"], true);
        assert_eq!(rows[1]["components"][0]["disabled"], true);

        assert_eq!(view.selected(":answer:q1"), Some("No"));
        assert_eq!(view.button(":submit"), Some(("gate:x:submit", true)));
    }

    #[test]
    fn option_values_are_sent_verbatim() {
        let value = "x".repeat(100);
        let view = View {
            content: "quiz".into(),
            controls: vec![Control::Select {
                custom_id: "gate:x:answer:q1".into(),
                placeholder: "Q1".into(),
                choices: vec![SelectChoice {
                    label: value.clone(),
                    value: value.clone(),
                    selected: false,
                }],
            }],
        };

        let payload = view.to_message_payload();
        assert_eq!(payload["components"][0]["components"][0]["options"][0]["value"], value);
    }
}
