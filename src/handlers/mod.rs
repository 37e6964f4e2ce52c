pub mod components;

use anyhow::Context as _;
use serenity::all::{
    Context, EventHandler, GuildId, Interaction, Member, Ready, Role, RoleId,
};
use serenity::async_trait;
use serenity::prelude::TypeMapKey;
use std::sync::Arc;

use crate::config::Config;
use crate::engine::{Engine, EngineError};
use crate::utils::from_user_id;

pub struct Handler {
    engine: Arc<Engine>,
}

impl Handler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(guilds = ready.guilds.len(), "{} is connected", ready.user.name);

        if let Err(e) = crate::commands::register_commands(&ctx).await {
            tracing::error!("failed to register commands: {e:#}");
        }

        let http = ctx.http.clone();
        let engine = self.engine.clone();
        let guilds: Vec<GuildId> = ready.guilds.iter().map(|g| g.id).collect();
        tokio::spawn(crate::tasks::sync_all_roles(http, engine, guilds));
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        use serenity::all::Interaction::*;
        match interaction {
            Command(cmd) => {
                if let Err(e) = crate::commands::handle(&ctx, &cmd).await {
                    tracing::error!(command = %cmd.data.name, user_id = cmd.user.id.get(), "command error: {e:#}");
                }
            }
            Component(comp) => {
                if let Err(e) = components::handle_component(&ctx, &comp).await {
                    tracing::error!(custom_id = %comp.data.custom_id, user_id = comp.user.id.get(), "component error: {e:#}");
                }
            }
            Modal(modal) => {
                if let Err(e) = components::handle_modal(&ctx, &modal).await {
                    tracing::error!(custom_id = %modal.data.custom_id, user_id = modal.user.id.get(), "modal error: {e:#}");
                }
            }
            _ => {}
        }
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        if new_member.user.bot {
            return;
        }
        let user_id = from_user_id(new_member.user.id);
        let user = match self.engine.get_or_create_user(user_id).await {
            Ok(u) => u,
            Err(e) => {
                tracing::error!(user_id, "registering new member failed: {e}");
                return;
            }
        };
        crate::roles::sync_member(
            &ctx.http,
            new_member.guild_id,
            new_member.user.id,
            user.total_xp,
            self.engine.catalog(),
        )
        .await;
    }

    async fn guild_role_create(&self, _ctx: Context, new: Role) {
        crate::roles::evict_guild(new.guild_id);
    }

    async fn guild_role_update(&self, _ctx: Context, _old: Option<Role>, new: Role) {
        crate::roles::evict_guild(new.guild_id);
    }

    async fn guild_role_delete(&self, _ctx: Context, guild_id: GuildId, _removed: RoleId, _data: Option<Role>) {
        crate::roles::evict_guild(guild_id);
    }
}

/* Context data access */
pub struct EngineKey;
impl TypeMapKey for EngineKey {
    type Value = Arc<Engine>;
}

pub struct ConfigKey;
impl TypeMapKey for ConfigKey {
    type Value = Arc<Config>;
}

pub async fn engine_from_ctx(ctx: &Context) -> anyhow::Result<Arc<Engine>> {
    let data = ctx.data.read().await;
    data.get::<EngineKey>().cloned().context("Engine missing from client data")
}

pub async fn config_from_ctx(ctx: &Context) -> anyhow::Result<Arc<Config>> {
    let data = ctx.data.read().await;
    data.get::<ConfigKey>().cloned().context("Config missing from client data")
}

/// Text shown to the user for an engine error. Storage failures are logged
/// here with full detail and answered generically.
pub fn engine_error_text(err: &EngineError) -> String {
    if !err.is_business() {
        tracing::error!("storage failure: {err:?}");
    }
    format!("❌ {}", err.user_message())
}
