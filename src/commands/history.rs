use serenity::all::{
    Command, CommandInteraction, Context, CreateCommand, CreateInteractionResponse,
    CreateInteractionResponseMessage,
};

use crate::engine::EngineError;
use crate::handlers::{engine_error_text, engine_from_ctx};
use crate::ui::embeds;
use crate::utils::{ephemeral, from_user_id};

const HISTORY_LEN: i64 = 10;

pub async fn register(ctx: &Context) -> anyhow::Result<()> {
    Command::create_global_command(
        &ctx.http,
        CreateCommand::new("history").description("Show your most recent XP gains"),
    )
    .await?;
    Ok(())
}

pub async fn handle(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    let engine = engine_from_ctx(ctx).await?;
    let user_id = from_user_id(cmd.user.id);

    let loaded = async {
        let user = engine.get_user(user_id).await?;
        let logs = engine.xp_logs(user_id, HISTORY_LEN).await?;
        Ok::<_, EngineError>((user.map_or(0, |u| u.total_xp), logs))
    }
    .await;
    let (total_xp, logs) = match loaded {
        Ok(v) => v,
        Err(e) => {
            cmd.create_response(&ctx.http, ephemeral(engine_error_text(&e))).await?;
            return Ok(());
        }
    };

    cmd.create_response(
        &ctx.http,
        CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .embed(embeds::history_embed(&logs, total_xp))
                .ephemeral(true),
        ),
    )
    .await?;
    Ok(())
}
