use serenity::all::{
    Command, CommandInteraction, Context, CreateCommand, EditInteractionResponse,
};

use crate::engine::EngineError;
use crate::handlers::{engine_error_text, engine_from_ctx};
use crate::ui::embeds;
use crate::utils::{from_user_id, user_name_best};

const TOP_N: i64 = 20;

pub async fn register(ctx: &Context) -> anyhow::Result<()> {
    Command::create_global_command(
        &ctx.http,
        CreateCommand::new("ranking").description("Show the XP leaderboard"),
    )
    .await?;
    Ok(())
}

pub async fn handle(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    // Name lookups can exceed the 3s response window.
    cmd.defer(&ctx.http).await?;

    let engine = engine_from_ctx(ctx).await?;
    let caller = from_user_id(cmd.user.id);

    let loaded = async {
        let top = engine.leaderboard(TOP_N).await?;
        let own = if top.iter().any(|u| u.user_id == caller) {
            None
        } else {
            match (engine.user_rank(caller).await?, engine.get_user(caller).await?) {
                (Some(rank), Some(user)) => Some((rank, user)),
                _ => None,
            }
        };
        Ok::<_, EngineError>((top, own))
    }
    .await;
    let (top, own) = match loaded {
        Ok(v) => v,
        Err(e) => {
            cmd.edit_response(&ctx.http, EditInteractionResponse::new().content(engine_error_text(&e)))
                .await?;
            return Ok(());
        }
    };

    if top.is_empty() {
        cmd.edit_response(
            &ctx.http,
            EditInteractionResponse::new().content("No one is on the leaderboard yet."),
        )
        .await?;
        return Ok(());
    }

    let mut rows = Vec::with_capacity(top.len());
    for user in top {
        let name = user_name_best(ctx, cmd.guild_id, user.user_id).await;
        rows.push((name, user));
    }
    let own = match own {
        Some((rank, user)) => Some((rank, user_name_best(ctx, cmd.guild_id, caller).await, user)),
        None => None,
    };

    cmd.edit_response(
        &ctx.http,
        EditInteractionResponse::new().embed(embeds::ranking_embed(&rows, own, engine.catalog())),
    )
    .await?;
    Ok(())
}
