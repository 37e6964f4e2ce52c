use serenity::all::{
    Command, CommandInteraction, Context, CreateCommand, CreateInteractionResponse,
    CreateInteractionResponseMessage, Permissions,
};

use crate::handlers::{engine_error_text, engine_from_ctx};
use crate::ui::embeds;
use crate::utils::{ephemeral, is_admin};

const PENDING_LEN: i64 = 10;

pub async fn register(ctx: &Context) -> anyhow::Result<()> {
    Command::create_global_command(
        &ctx.http,
        CreateCommand::new("pending")
            .description("List the oldest submissions waiting for review (admins)")
            .default_member_permissions(Permissions::ADMINISTRATOR),
    )
    .await?;
    Ok(())
}

pub async fn handle(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    if !is_admin(cmd.member.as_deref()) {
        cmd.create_response(&ctx.http, ephemeral("❌ Only administrators can list pending submissions.")).await?;
        return Ok(());
    }
    let engine = engine_from_ctx(ctx).await?;
    let subs = match engine.pending_submissions(PENDING_LEN).await {
        Ok(s) => s,
        Err(e) => {
            cmd.create_response(&ctx.http, ephemeral(engine_error_text(&e))).await?;
            return Ok(());
        }
    };

    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .embed(embeds::pending_embed(&subs, engine.catalog()))
                .ephemeral(true),
        ),
    )
    .await?;
    Ok(())
}
