pub mod history;
pub mod pending;
pub mod quests;
pub mod ranking;

use serenity::all::CommandInteraction;
use serenity::prelude::Context;

pub async fn register_commands(ctx: &Context) -> anyhow::Result<()> {
    quests::register(ctx).await?;
    ranking::register(ctx).await?;
    history::register(ctx).await?;
    pending::register(ctx).await?;
    Ok(())
}

pub async fn handle(ctx: &Context, cmd: &CommandInteraction) -> anyhow::Result<()> {
    match cmd.data.name.as_str() {
        "sz" => quests::handle(ctx, cmd).await,
        "ranking" => ranking::handle(ctx, cmd).await,
        "history" => history::handle(ctx, cmd).await,
        "pending" => pending::handle(ctx, cmd).await,
        _ => Ok(()),
    }
}
