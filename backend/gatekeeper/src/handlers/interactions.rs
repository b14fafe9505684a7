use axum::{body::Bytes, extract::State, Json};
use std::sync::Arc;

use super::{admin, ApiError};
use crate::metrics::record_interaction;
use crate::models::interaction::{
    ComponentAction, Interaction, InteractionResponse, INTERACTION_APPLICATION_COMMAND,
    INTERACTION_MESSAGE_COMPONENT, INTERACTION_PING,
};
use crate::models::Surface;
use crate::services::flow_registry::DispatchResult;
use crate::services::verification_flow::FlowEvent;
use crate::services::AppState;

/// POST /interactions
///
/// Signature checks happen in the middleware; by the time we get here the
/// body is known to come from Discord.
pub async fn handle_interaction(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<InteractionResponse>, ApiError> {
    let interaction: Interaction = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid interaction payload: {}", e)))?;

    let response = match interaction.kind {
        INTERACTION_PING => {
            record_interaction("ping");
            InteractionResponse::pong()
        }
        INTERACTION_APPLICATION_COMMAND => {
            record_interaction("command");
            admin::handle_command(&state, &interaction).await
        }
        INTERACTION_MESSAGE_COMPONENT => handle_component(&state, &interaction).await,
        other => {
            record_interaction("unsupported");
            return Err(ApiError::bad_request(format!(
                "Unsupported interaction type {}",
                other
            )));
        }
    };

    Ok(Json(response))
}

async fn handle_component(state: &AppState, interaction: &Interaction) -> InteractionResponse {
    let Some(user_id) = interaction.user_id() else {
        return InteractionResponse::ephemeral_message("Could not tell who pressed this.");
    };
    let data = interaction.data.clone().unwrap_or_default();
    let custom_id = data.custom_id.as_deref().unwrap_or_default();

    match ComponentAction::parse(custom_id) {
        None => {
            record_interaction("unknown_component");
            tracing::warn!("Unhandled component custom_id={:?}", custom_id);
            InteractionResponse::ephemeral_message("This control is not handled here.")
        }
        Some(ComponentAction::RequestAccess { capability }) => {
            record_interaction("request_access");
            if capability != state.config.quiz.capability {
                tracing::warn!("Access requested for unknown capability {}", capability);
                return InteractionResponse::ephemeral_message(format!(
                    "There is no verification called \"{}\".",
                    capability
                ));
            }

            let started = state
                .flows
                .request_access(user_id, Surface::new(interaction.token.clone()))
                .await;
            tracing::debug!("Access request {} started flow {}", interaction.id, started.id);
            InteractionResponse::deferred_ephemeral()
        }
        Some(ComponentAction::Answer {
            flow_id,
            question_id,
        }) => {
            record_interaction("answer");
            let Some(value) = data.values.into_iter().next() else {
                return InteractionResponse::deferred_update();
            };
            let result = state
                .flows
                .dispatch(flow_id, user_id, FlowEvent::Select { question_id, value })
                .await;
            dispatch_reply(result)
        }
        Some(ComponentAction::Submit { flow_id }) => {
            record_interaction("submit");
            let result = state
                .flows
                .dispatch(flow_id, user_id, FlowEvent::Submit)
                .await;
            dispatch_reply(result)
        }
    }
}

/// Delivered events are acknowledged silently; the flow edits the surface.
/// Stale controls get a fresh ephemeral message so the surface is not overwritten.
fn dispatch_reply(result: DispatchResult) -> InteractionResponse {
    match result {
        DispatchResult::Delivered => InteractionResponse::deferred_update(),
        DispatchResult::UnknownFlow => InteractionResponse::ephemeral_message(
            "This verification is no longer active. Press the verify button again to start over.",
        ),
        DispatchResult::NotOwner => {
            InteractionResponse::ephemeral_message("This verification belongs to someone else.")
        }
    }
}
