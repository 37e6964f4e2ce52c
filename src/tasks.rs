use anyhow::Context as _;
use serenity::all::{GuildId, UserId};
use serenity::http::Http;
use std::future::Future;
use std::sync::Arc;

use crate::engine::Engine;
use crate::roles::{self, compute_delta};
use crate::utils::from_user_id;

const MEMBER_PAGE: u64 = 1000;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub checked: usize,
    pub changed: usize,
    pub failed: usize,
}

/// Start-up sweep: brings every registered member's tier roles in line with
/// their XP. Unregistered members are left alone.
pub async fn sync_all_roles(http: Arc<Http>, engine: Arc<Engine>, guilds: Vec<GuildId>) {
    let total = guilds.len();
    let swept = sweep_each(guilds, |guild_id| sweep_guild(&http, &engine, guild_id)).await;
    tracing::info!(guilds = total, swept, "startup role sweep finished");
}

/// Runs `sweep` for every guild. A failing guild is logged and skipped.
/// Returns how many guilds finished.
async fn sweep_each<F, Fut>(guilds: Vec<GuildId>, mut sweep: F) -> usize
where
    F: FnMut(GuildId) -> Fut,
    Fut: Future<Output = anyhow::Result<SweepStats>>,
{
    let mut swept = 0;
    for guild_id in guilds {
        match sweep(guild_id).await {
            Ok(stats) => {
                swept += 1;
                tracing::info!(
                    guild_id = guild_id.get(),
                    checked = stats.checked,
                    changed = stats.changed,
                    failed = stats.failed,
                    "guild role sweep finished"
                );
            }
            Err(e) => tracing::warn!(guild_id = guild_id.get(), "guild role sweep skipped: {e:#}"),
        }
    }
    swept
}

async fn sweep_guild(http: &Http, engine: &Engine, guild_id: GuildId) -> anyhow::Result<SweepStats> {
    let mapping = roles::tier_roles(http, guild_id, engine.catalog())
        .await
        .context("fetching guild roles")?;
    let mut stats = SweepStats::default();
    if mapping.is_empty() {
        tracing::warn!(guild_id = guild_id.get(), "no tier roles in guild, nothing to sweep");
        return Ok(stats);
    }

    let mut after: Option<UserId> = None;
    loop {
        let page = guild_id
            .members(http, Some(MEMBER_PAGE), after)
            .await
            .with_context(|| format!("listing members after {} checked", stats.checked))?;
        let Some(last) = page.last() else { break };
        after = Some(last.user.id);

        for member in page.iter().filter(|m| !m.user.bot) {
            let user = match engine.get_user(from_user_id(member.user.id)).await {
                Ok(Some(u)) => u,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(user_id = member.user.id.get(), "loading user for role sweep failed: {e}");
                    continue;
                }
            };
            stats.checked += 1;
            let tier = engine.user_tier(user.total_xp);
            let delta = compute_delta(tier, &member.roles, &mapping);
            if delta.is_empty() {
                continue;
            }
            stats.changed += 1;
            if !roles::apply_delta(http, guild_id, member.user.id, tier, delta).await.is_clean() {
                stats.failed += 1;
            }
        }

        if (page.len() as u64) < MEMBER_PAGE {
            break;
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_guild_does_not_stop_the_sweep() {
        let guilds = vec![GuildId::new(1), GuildId::new(2), GuildId::new(3)];
        let mut visited = Vec::new();
        let swept = sweep_each(guilds, |guild_id| {
            visited.push(guild_id.get());
            async move {
                if guild_id.get() == 2 {
                    anyhow::bail!("listing members: gateway timeout");
                }
                Ok(SweepStats { checked: 4, ..SweepStats::default() })
            }
        })
        .await;

        assert_eq!(visited, [1, 2, 3]);
        assert_eq!(swept, 2);
    }

    #[tokio::test]
    async fn empty_guild_list_sweeps_nothing() {
        let swept = sweep_each(Vec::new(), |_| async { Ok::<_, anyhow::Error>(SweepStats::default()) }).await;
        assert_eq!(swept, 0);
    }
}
