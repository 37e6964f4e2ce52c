use serenity::all::{
    Command, CommandInteraction, Context, CreateCommand, CreateInteractionResponse,
    CreateInteractionResponseMessage,
};

use crate::handlers::{engine_error_text, engine_from_ctx};
use crate::ui::{embeds, menus};
use crate::utils::{ephemeral, from_user_id};

pub async fn register(ctx: &Context) -> anyhow::Result<()> {
    Command::create_global_command(
        &ctx.http,
        CreateCommand::new("sz").description("Show the quest board and submit a quest"),
    )
    .await?;
    Ok(())
}

pub async fn handle(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    let engine = engine_from_ctx(ctx).await?;
    let board = match engine.quest_board(from_user_id(cmd.user.id)).await {
        Ok(b) => b,
        Err(e) => {
            cmd.create_response(&ctx.http, ephemeral(engine_error_text(&e))).await?;
            return Ok(());
        }
    };

    let mut msg = CreateInteractionResponseMessage::new()
        .embed(embeds::quest_board_embed(&board, engine.catalog()))
        .ephemeral(true);
    if let Some(row) = menus::quest_select_row(board.submittable()) {
        msg = msg.components(vec![row]);
    }
    cmd.create_response(&ctx.http, CreateInteractionResponse::Message(msg)).await?;
    Ok(())
}
