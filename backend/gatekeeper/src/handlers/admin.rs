use crate::models::interaction::{CommandOption, Interaction, InteractionResponse};
use crate::services::AppState;

pub const COMMAND_NAME: &str = "verification";

/// `/verification reload` and `/verification lookup user:<id>`.
pub async fn handle_command(state: &AppState, interaction: &Interaction) -> InteractionResponse {
    let Some(data) = interaction.data.as_ref() else {
        return InteractionResponse::ephemeral_message("Empty command.");
    };
    if data.name.as_deref() != Some(COMMAND_NAME) {
        return InteractionResponse::ephemeral_message("Unknown command.");
    }

    let Some(user_id) = interaction.user_id() else {
        return InteractionResponse::ephemeral_message("Could not tell who ran this.");
    };
    if !is_admin(state, interaction, user_id) {
        tracing::warn!("Non-admin user {} tried /{}", user_id, COMMAND_NAME);
        return InteractionResponse::ephemeral_message(
            "You need administrator permissions to use this command.",
        );
    }

    let Some(subcommand) = data.options.first() else {
        return InteractionResponse::ephemeral_message("Missing subcommand.");
    };

    match subcommand.name.as_str() {
        "reload" => reload(state, user_id).await,
        "lookup" => match option_str(subcommand, "user") {
            Some(target) => lookup(state, target).await,
            None => InteractionResponse::ephemeral_message("Missing user option."),
        },
        other => InteractionResponse::ephemeral_message(format!("Unknown subcommand {}.", other)),
    }
}

fn is_admin(state: &AppState, interaction: &Interaction, user_id: &str) -> bool {
    interaction.is_administrator()
        || state
            .config
            .verification
            .admin_user_ids
            .iter()
            .any(|id| id == user_id)
}

fn option_str<'a>(option: &'a CommandOption, name: &str) -> Option<&'a str> {
    option
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_ref())
        .and_then(|v| v.as_str())
}

async fn reload(state: &AppState, admin_id: &str) -> InteractionResponse {
    match state.store.reload().await {
        Ok(count) => {
            tracing::info!("Admin {} reloaded the response store ({} records)", admin_id, count);
            InteractionResponse::ephemeral_message(format!(
                "Reloaded {} verification records.",
                count
            ))
        }
        Err(e) => {
            tracing::error!("Response store reload failed: {}", e);
            InteractionResponse::ephemeral_message(format!(
                "Reload failed, the previous records stay in effect: {}",
                e
            ))
        }
    }
}

async fn lookup(state: &AppState, target: &str) -> InteractionResponse {
    let Some(record) = state.store.lookup(target).await else {
        return InteractionResponse::ephemeral_message(format!(
            "<@{}> has no recorded attempt.",
            target
        ));
    };

    let mut message = format!(
        "<@{}> {} verification:",
        target,
        if record.passed() { "passed" } else { "failed" }
    );
    for (question_id, correct) in record.iter() {
        message.push_str(&format!(
            "\n- {}: {}",
            question_id,
            if *correct { "correct" } else { "wrong" }
        ));
    }
    InteractionResponse::ephemeral_message(message)
}
