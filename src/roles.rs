//! Tier role reconciliation.
//!
//! A member at tier T should hold the mapped roles of levels 1..=T and none
//! above. Discord failures are logged and reported, never returned as errors.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serenity::all::{GuildId, Http, RoleId, UserId};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::{Catalog, TierLevel};

static TIER_ROLES: Lazy<DashMap<u64, Arc<TierRoles>>> = Lazy::new(DashMap::new);

const AUDIT_REASON: &str = "Tier sync";

/// Level to guild role mapping for one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierRoles {
    by_level: BTreeMap<TierLevel, RoleId>,
}

impl TierRoles {
    /// Matches guild roles against the catalog's role names, ignoring case.
    /// The lowest role id wins when a name is duplicated.
    pub fn resolve<'a>(
        catalog: &Catalog,
        guild_roles: impl IntoIterator<Item = (RoleId, &'a str)>,
    ) -> Self {
        let guild_roles: Vec<(RoleId, &str)> = guild_roles.into_iter().collect();
        let mut by_level = BTreeMap::new();
        for tier in catalog.tiers() {
            let found = guild_roles
                .iter()
                .filter(|(_, name)| name.eq_ignore_ascii_case(&tier.role_name))
                .map(|(id, _)| *id)
                .min();
            if let Some(id) = found {
                by_level.insert(tier.level, id);
            }
        }
        Self { by_level }
    }

    #[cfg(test)]
    pub fn role(&self, level: TierLevel) -> Option<RoleId> {
        self.by_level.get(&level).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_level.is_empty()
    }

    /// Role names from the catalog with no role in this guild.
    pub fn missing<'c>(&self, catalog: &'c Catalog) -> Vec<&'c str> {
        catalog
            .tiers()
            .iter()
            .filter(|t| !self.by_level.contains_key(&t.level))
            .map(|t| t.role_name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleDelta {
    pub add: Vec<RoleId>,
    pub remove: Vec<RoleId>,
}

impl RoleDelta {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

pub fn compute_delta(tier: TierLevel, held: &[RoleId], mapping: &TierRoles) -> RoleDelta {
    let mut delta = RoleDelta::default();
    for (&level, &role) in &mapping.by_level {
        let holds = held.contains(&role);
        if level <= tier && !holds {
            delta.add.push(role);
        } else if level > tier && holds {
            delta.remove.push(role);
        }
    }
    delta
}

/// Outcome of one member sync. Failed role ids were logged already.
#[derive(Debug, Clone, Default)]
pub struct RoleSyncReport {
    pub added: Vec<RoleId>,
    pub removed: Vec<RoleId>,
    pub failed: Vec<RoleId>,
    /// Set when the member or guild roles could not be fetched at all.
    pub skipped: Option<String>,
}

impl RoleSyncReport {
    fn skipped(reason: String) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_none()
    }
}

/// Cached mapping for `guild_id`, fetched from Discord on first use.
pub async fn tier_roles(
    http: &Http,
    guild_id: GuildId,
    catalog: &Catalog,
) -> serenity::Result<Arc<TierRoles>> {
    if let Some(entry) = TIER_ROLES.get(&guild_id.get()) {
        return Ok(entry.value().clone());
    }
    let roles = guild_id.roles(http).await?;
    let mapping = Arc::new(TierRoles::resolve(
        catalog,
        roles.values().map(|r| (r.id, r.name.as_str())),
    ));
    let missing = mapping.missing(catalog);
    if !missing.is_empty() {
        tracing::warn!(guild_id = guild_id.get(), ?missing, "tier roles not found in guild");
    }
    TIER_ROLES.insert(guild_id.get(), mapping.clone());
    Ok(mapping)
}

/// Drops the cached mapping so the next sync re-reads the guild's roles.
pub fn evict_guild(guild_id: GuildId) {
    if TIER_ROLES.remove(&guild_id.get()).is_some() {
        tracing::debug!(guild_id = guild_id.get(), "tier role mapping evicted");
    }
}

/// Brings one member's tier roles in line with `total_xp`.
pub async fn sync_member(
    http: &Http,
    guild_id: GuildId,
    user_id: UserId,
    total_xp: i64,
    catalog: &Catalog,
) -> RoleSyncReport {
    let tier = catalog.tier_for(total_xp);

    let mapping = match tier_roles(http, guild_id, catalog).await {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(guild_id = guild_id.get(), "fetching guild roles failed: {e}");
            return RoleSyncReport::skipped(e.to_string());
        }
    };
    let member = match guild_id.member(http, user_id).await {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(user_id = user_id.get(), "fetching member failed: {e}");
            return RoleSyncReport::skipped(e.to_string());
        }
    };

    apply_delta(http, guild_id, user_id, tier, compute_delta(tier, &member.roles, &mapping)).await
}

/// Same as [`sync_member`] when the held roles are already known.
pub async fn apply_delta(
    http: &Http,
    guild_id: GuildId,
    user_id: UserId,
    tier: TierLevel,
    delta: RoleDelta,
) -> RoleSyncReport {
    let mut report = RoleSyncReport::default();
    for role in delta.add {
        match http.add_member_role(guild_id, user_id, role, Some(AUDIT_REASON)).await {
            Ok(()) => report.added.push(role),
            Err(e) => {
                tracing::warn!(user_id = user_id.get(), role_id = role.get(), "adding tier role failed: {e}");
                report.failed.push(role);
            }
        }
    }
    for role in delta.remove {
        match http.remove_member_role(guild_id, user_id, role, Some(AUDIT_REASON)).await {
            Ok(()) => report.removed.push(role),
            Err(e) => {
                tracing::warn!(user_id = user_id.get(), role_id = role.get(), "removing tier role failed: {e}");
                report.failed.push(role);
            }
        }
    }
    if !report.added.is_empty() || !report.removed.is_empty() {
        tracing::info!(
            user_id = user_id.get(),
            tier,
            added = report.added.len(),
            removed = report.removed.len(),
            "tier roles synced"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: u64) -> RoleId {
        RoleId::new(id)
    }

    fn mapping() -> TierRoles {
        let catalog = Catalog::builtin().unwrap();
        TierRoles::resolve(
            &catalog,
            [
                (role(11), "code sz"),
                (role(12), "SZ Streamer"),
                (role(13), "SZ ELITE"),
                (role(14), "SZ Ambassador"),
                (role(15), "SZ Partner"),
                (role(99), "Moderator"),
            ],
        )
    }

    #[test]
    fn resolves_roles_case_insensitively() {
        let m = mapping();
        assert_eq!(m.role(1), Some(role(11)));
        assert_eq!(m.role(3), Some(role(13)));
        assert_eq!(m.role(5), Some(role(15)));
        assert_eq!(m.role(6), None);
    }

    #[test]
    fn reports_missing_role_names() {
        let catalog = Catalog::builtin().unwrap();
        let m = TierRoles::resolve(&catalog, [(role(12), "SZ Streamer")]);
        assert_eq!(m.missing(&catalog), ["Code SZ", "SZ Elite", "SZ Ambassador", "SZ Partner"]);
        assert!(TierRoles::resolve(&catalog, std::iter::empty()).is_empty());
    }

    #[test]
    fn delta_adds_lower_tiers_and_removes_higher() {
        let m = mapping();
        let held = [role(99), role(12), role(15)];
        let delta = compute_delta(3, &held, &m);
        assert_eq!(delta.add, [role(11), role(13)]);
        assert_eq!(delta.remove, [role(15)]);
    }

    #[test]
    fn delta_leaves_unrelated_roles_alone() {
        let m = mapping();
        let delta = compute_delta(1, &[role(99), role(11)], &m);
        assert!(delta.is_empty());
    }

    #[test]
    fn applying_delta_twice_is_a_no_op() {
        let m = mapping();
        for tier in 1..=5 {
            let mut held = vec![role(99), role(14)];
            let first = compute_delta(tier, &held, &m);
            held.retain(|r| !first.remove.contains(r));
            held.extend(first.add.iter().copied());
            assert!(compute_delta(tier, &held, &m).is_empty(), "tier {tier}");
        }
    }

    #[test]
    fn unmapped_levels_are_skipped() {
        let catalog = Catalog::builtin().unwrap();
        let m = TierRoles::resolve(&catalog, [(role(13), "SZ Elite")]);
        let delta = compute_delta(5, &[], &m);
        assert_eq!(delta.add, [role(13)]);
        assert_eq!(compute_delta(2, &[role(13)], &m).remove, [role(13)]);
    }
}
