use serenity::all::{
    ActionRowComponent, ComponentInteraction, ComponentInteractionDataKind, Context,
    CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage, ModalInteraction,
};

use crate::handlers::{config_from_ctx, engine_error_text, engine_from_ctx};
use crate::ui::{embeds, menus};
use crate::utils::{dm_embed, ephemeral, from_user_id, is_admin, parse_component_id, to_user_id, ComponentAction};

pub async fn handle_component(ctx: &Context, it: &ComponentInteraction) -> anyhow::Result<()> {
    let Some(action) = parse_component_id(&it.data.custom_id) else {
        return Ok(());
    };
    match action {
        ComponentAction::PickQuest => pick_quest(ctx, it).await,
        ComponentAction::Approve(id) => approve(ctx, it, id).await,
        ComponentAction::Reject(id) => open_reject_modal(ctx, it, id).await,
        ComponentAction::Proof(_) | ComponentAction::RejectReason(_) => Ok(()),
    }
}

pub async fn handle_modal(ctx: &Context, modal: &ModalInteraction) -> anyhow::Result<()> {
    match parse_component_id(&modal.data.custom_id) {
        Some(ComponentAction::Proof(code)) => submit_proof(ctx, modal, &code).await,
        Some(ComponentAction::RejectReason(id)) => submit_rejection(ctx, modal, id).await,
        _ => Ok(()),
    }
}

/// Raw text of one modal input. Blank input counts as missing.
fn input_value(modal: &ModalInteraction, custom_id: &str) -> Option<String> {
    non_blank(
        modal
            .data
            .components
            .iter()
            .flat_map(|row| row.components.iter())
            .find_map(|c| match c {
                ActionRowComponent::InputText(input) if input.custom_id == custom_id => input.value.clone(),
                _ => None,
            }),
    )
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn pick_quest(ctx: &Context, it: &ComponentInteraction) -> anyhow::Result<()> {
    let code = match &it.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => values.first().cloned(),
        _ => None,
    };
    let Some(code) = code else {
        return Ok(());
    };

    let engine = engine_from_ctx(ctx).await?;
    let Some(quest) = engine.catalog().quest(&code).cloned() else {
        it.create_response(&ctx.http, ephemeral(format!("❌ Unknown quest `{code}`."))).await?;
        return Ok(());
    };
    if !quest.kind.is_submittable() {
        it.create_response(&ctx.http, ephemeral("❌ Milestones are granted automatically.")).await?;
        return Ok(());
    }
    match engine.one_time_done(from_user_id(it.user.id), &quest.code).await {
        Ok(true) => {
            it.create_response(&ctx.http, ephemeral("❌ You already completed this quest.")).await?;
            return Ok(());
        }
        Ok(false) => {}
        Err(e) => {
            it.create_response(&ctx.http, ephemeral(engine_error_text(&e))).await?;
            return Ok(());
        }
    }

    it.create_response(&ctx.http, CreateInteractionResponse::Modal(menus::proof_modal(&quest)))
        .await?;
    Ok(())
}

async fn submit_proof(ctx: &Context, modal: &ModalInteraction, code: &str) -> anyhow::Result<()> {
    let Some(proof) = input_value(modal, menus::PROOF_INPUT_ID) else {
        modal.create_response(&ctx.http, ephemeral("❌ Proof cannot be empty.")).await?;
        return Ok(());
    };
    let proof = proof.trim();
    let engine = engine_from_ctx(ctx).await?;
    let config = config_from_ctx(ctx).await?;
    let user_id = from_user_id(modal.user.id);

    match engine.one_time_done(user_id, code).await {
        Ok(true) => {
            modal.create_response(&ctx.http, ephemeral("❌ You already completed this quest.")).await?;
            return Ok(());
        }
        Ok(false) => {}
        Err(e) => {
            modal.create_response(&ctx.http, ephemeral(engine_error_text(&e))).await?;
            return Ok(());
        }
    }

    let submission_id = match engine.create_submission(user_id, code, proof).await {
        Ok(id) => id,
        Err(e) => {
            modal.create_response(&ctx.http, ephemeral(engine_error_text(&e))).await?;
            return Ok(());
        }
    };

    if let Some(channel) = config.admin_channel_id {
        let message = CreateMessage::new()
            .embed(embeds::review_embed(submission_id, user_id, engine.catalog(), code, proof))
            .components(vec![menus::review_buttons_row(submission_id)]);
        if let Err(e) = channel.send_message(&ctx.http, message).await {
            tracing::warn!(submission_id, channel_id = channel.get(), "posting review message failed: {e}");
        }
    }

    modal
        .create_response(
            &ctx.http,
            ephemeral(format!(
                "✅ Submission #{submission_id} received! An admin will review it soon."
            )),
        )
        .await?;
    Ok(())
}

async fn approve(ctx: &Context, it: &ComponentInteraction, submission_id: i64) -> anyhow::Result<()> {
    if !is_admin(it.member.as_ref()) {
        it.create_response(&ctx.http, ephemeral("❌ Only administrators can approve submissions.")).await?;
        return Ok(());
    }
    let engine = engine_from_ctx(ctx).await?;
    let outcome = match engine.approve_submission(submission_id).await {
        Ok(o) => o,
        Err(e) => {
            it.create_response(&ctx.http, ephemeral(engine_error_text(&e))).await?;
            return Ok(());
        }
    };

    let embed = embeds::approved_review(
        it.message.embeds.first().cloned(),
        from_user_id(it.user.id),
        &outcome,
        engine.catalog(),
    );
    it.create_response(
        &ctx.http,
        CreateInteractionResponse::UpdateMessage(
            CreateInteractionResponseMessage::new()
                .embed(embed)
                .components(vec![]),
        ),
    )
    .await?;

    let user_id = outcome.submission.user_id;
    dm_embed(&ctx.http, user_id, embeds::approval_dm(&outcome, engine.catalog())).await;
    if let Some(guild_id) = it.guild_id {
        crate::roles::sync_member(
            &ctx.http,
            guild_id,
            to_user_id(user_id),
            outcome.user.total_xp,
            engine.catalog(),
        )
        .await;
    }
    Ok(())
}

async fn open_reject_modal(ctx: &Context, it: &ComponentInteraction, submission_id: i64) -> anyhow::Result<()> {
    if !is_admin(it.member.as_ref()) {
        it.create_response(&ctx.http, ephemeral("❌ Only administrators can reject submissions.")).await?;
        return Ok(());
    }
    it.create_response(
        &ctx.http,
        CreateInteractionResponse::Modal(menus::reject_reason_modal(submission_id)),
    )
    .await?;
    Ok(())
}

async fn submit_rejection(ctx: &Context, modal: &ModalInteraction, submission_id: i64) -> anyhow::Result<()> {
    if !is_admin(modal.member.as_ref()) {
        modal.create_response(&ctx.http, ephemeral("❌ Only administrators can reject submissions.")).await?;
        return Ok(());
    }
    let Some(reason) = input_value(modal, menus::REASON_INPUT_ID) else {
        modal.create_response(&ctx.http, ephemeral("❌ A rejection reason is required.")).await?;
        return Ok(());
    };
    let engine = engine_from_ctx(ctx).await?;
    let sub = match engine.reject_submission(submission_id, &reason).await {
        Ok(s) => s,
        Err(e) => {
            modal.create_response(&ctx.http, ephemeral(engine_error_text(&e))).await?;
            return Ok(());
        }
    };

    let rejecter = from_user_id(modal.user.id);
    match modal.message.as_deref() {
        Some(message) => {
            let embed = embeds::rejected_review(message.embeds.first().cloned(), rejecter, &sub, engine.catalog());
            modal
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::UpdateMessage(
                        CreateInteractionResponseMessage::new()
                            .embed(embed)
                            .components(vec![]),
                    ),
                )
                .await?;
        }
        None => {
            modal
                .create_response(&ctx.http, ephemeral(format!("Submission #{submission_id} rejected.")))
                .await?;
        }
    }

    dm_embed(&ctx.http, sub.user_id, embeds::rejection_dm(&sub, engine.catalog())).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_is_missing() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(String::new())), None);
        assert_eq!(non_blank(Some(" \n\t ".into())), None);
    }

    #[test]
    fn input_is_kept_verbatim() {
        let reason = "  Stream was under 30 minutes.\nPlease resubmit.  ";
        assert_eq!(non_blank(Some(reason.to_string())).as_deref(), Some(reason));
    }
}
