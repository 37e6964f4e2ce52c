use anyhow::{anyhow, bail, Context as _};
use serenity::all::ChannelId;

use crate::engine::MilestonePolicy;

const ADMIN_CHANNEL_PLACEHOLDER: &str = "your_channel_id_here";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    /// Where review embeds are posted. Submissions still work without it.
    pub admin_channel_id: Option<ChannelId>,
    pub milestone_policy: MilestonePolicy,
    pub db_max_connections: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let discord_token = var("DISCORD_BOT_TOKEN")
            .or_else(|| var("DISCORD_TOKEN"))
            .ok_or_else(|| anyhow!("DISCORD_BOT_TOKEN not set"))?;
        let database_url = var("DATABASE_URL")
            .or_else(|| var("DATABASE_PUBLIC_URL"))
            .ok_or_else(|| anyhow!("DATABASE_URL not set"))?;

        let admin_channel_id = match var("ADMIN_CHANNEL_ID") {
            None => {
                tracing::warn!("ADMIN_CHANNEL_ID not set, submissions will not be posted for review");
                None
            }
            Some(v) if v == ADMIN_CHANNEL_PLACEHOLDER => {
                tracing::warn!("ADMIN_CHANNEL_ID still holds the placeholder value, ignoring it");
                None
            }
            Some(v) => {
                let id: u64 = v
                    .parse()
                    .with_context(|| format!("ADMIN_CHANNEL_ID is not a channel id: {v:?}"))?;
                if id == 0 {
                    bail!("ADMIN_CHANNEL_ID must not be 0");
                }
                Some(ChannelId::new(id))
            }
        };

        let milestone_policy = match var("MILESTONE_POLICY") {
            Some(v) => v.parse()?,
            None => MilestonePolicy::default(),
        };

        let db_max_connections = match var("DB_MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS is not a number: {v:?}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            discord_token,
            database_url,
            admin_channel_id,
            milestone_policy,
            db_max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = load(&[("DISCORD_BOT_TOKEN", "tok"), ("DATABASE_URL", "postgres://db")]).unwrap();
        assert_eq!(cfg.discord_token, "tok");
        assert_eq!(cfg.database_url, "postgres://db");
        assert_eq!(cfg.admin_channel_id, None);
        assert_eq!(cfg.milestone_policy, MilestonePolicy::ExactCount);
        assert_eq!(cfg.db_max_connections, 10);
    }

    #[test]
    fn falls_back_to_alternate_names() {
        let cfg = load(&[
            ("DISCORD_BOT_TOKEN", "  "),
            ("DISCORD_TOKEN", "legacy"),
            ("DATABASE_PUBLIC_URL", "postgres://public"),
        ])
        .unwrap();
        assert_eq!(cfg.discord_token, "legacy");
        assert_eq!(cfg.database_url, "postgres://public");
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = load(&[("DATABASE_URL", "postgres://db")]).unwrap_err();
        assert!(err.to_string().contains("DISCORD_BOT_TOKEN"));
    }

    #[test]
    fn admin_channel_placeholder_is_ignored() {
        let cfg = load(&[
            ("DISCORD_BOT_TOKEN", "tok"),
            ("DATABASE_URL", "postgres://db"),
            ("ADMIN_CHANNEL_ID", "your_channel_id_here"),
        ])
        .unwrap();
        assert_eq!(cfg.admin_channel_id, None);
    }

    #[test]
    fn parses_optional_settings() {
        let cfg = load(&[
            ("DISCORD_BOT_TOKEN", "tok"),
            ("DATABASE_URL", "postgres://db"),
            ("ADMIN_CHANNEL_ID", "123456789012345678"),
            ("MILESTONE_POLICY", "at_least"),
            ("DB_MAX_CONNECTIONS", "4"),
        ])
        .unwrap();
        assert_eq!(cfg.admin_channel_id, Some(ChannelId::new(123456789012345678)));
        assert_eq!(cfg.milestone_policy, MilestonePolicy::AtLeast);
        assert_eq!(cfg.db_max_connections, 4);
    }

    #[test]
    fn rejects_garbage_values() {
        let base = [("DISCORD_BOT_TOKEN", "tok"), ("DATABASE_URL", "postgres://db")];
        for extra in [
            ("ADMIN_CHANNEL_ID", "general"),
            ("ADMIN_CHANNEL_ID", "0"),
            ("MILESTONE_POLICY", "sometimes"),
            ("DB_MAX_CONNECTIONS", "many"),
        ] {
            let mut pairs = base.to_vec();
            pairs.push(extra);
            assert!(load(&pairs).is_err(), "{extra:?} accepted");
        }
    }
}
