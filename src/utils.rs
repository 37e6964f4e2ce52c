use dashmap::DashMap;
use once_cell::sync::Lazy;
use serenity::all::{
    Context, CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage,
    GuildId, Http, Member, UserId,
};
use serenity::prelude::Mentionable;
use std::time::Duration as StdDuration;
use tokio::time::Instant;

static NAME_CACHE: Lazy<DashMap<u64, (String, Instant)>> = Lazy::new(DashMap::new);
const NAME_TTL: StdDuration = StdDuration::from_secs(60 * 30); // 30 min

pub fn from_user_id(id: UserId) -> i64 {
    id.get() as i64
}

pub fn to_user_id(id: i64) -> UserId {
    UserId::new(id as u64)
}

pub fn mention_user(id: i64) -> String {
    to_user_id(id).mention().to_string()
}

fn cache_get(user_id: u64) -> Option<String> {
    let entry = NAME_CACHE.get(&user_id)?;
    let (name, when) = entry.value();
    (when.elapsed() < NAME_TTL).then(|| name.clone())
}

fn cache_put(user_id: u64, name: String) {
    NAME_CACHE.insert(user_id, (name, Instant::now()));
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

/// Best-effort display name: guild nickname, then global name, then username.
/// Results are cached for a short TTL.
pub async fn user_name_best(ctx: &Context, guild_id: Option<GuildId>, user_id: i64) -> String {
    let uid = to_user_id(user_id);
    if let Some(n) = cache_get(uid.get()) {
        return n;
    }

    if let Some(gid) = guild_id {
        let cached = ctx.cache.guild(gid).and_then(|g| {
            g.members.get(&uid).map(|m| {
                non_empty(m.nick.clone())
                    .or_else(|| non_empty(m.user.global_name.clone()))
                    .unwrap_or_else(|| m.user.name.clone())
            })
        });
        if let Some(name) = cached {
            cache_put(uid.get(), name.clone());
            return name;
        }
        if let Ok(m) = gid.member(&ctx.http, uid).await {
            let name = non_empty(m.nick)
                .or_else(|| non_empty(m.user.global_name.clone()))
                .unwrap_or(m.user.name);
            cache_put(uid.get(), name.clone());
            return name;
        }
    }

    match uid.to_user(&ctx.http).await {
        Ok(u) => {
            let name = non_empty(u.global_name).unwrap_or(u.name);
            cache_put(uid.get(), name.clone());
            name
        }
        Err(_) => format!("user {}", uid.get()),
    }
}

/// Sends an embed by DM, ignoring members who closed their DMs.
pub async fn dm_embed(http: &Http, user_id: i64, embed: CreateEmbed) -> bool {
    let message = CreateMessage::new().embed(embed);
    let uid = to_user_id(user_id);
    let result = match uid.create_dm_channel(http).await {
        Ok(dm) => dm.send_message(http, message).await.map(|_| ()),
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(user_id, "DM not delivered: {e}");
            false
        }
    }
}

/// Administrator check on the member attached to an interaction.
pub fn is_admin(member: Option<&Member>) -> bool {
    member
        .and_then(|m| m.permissions)
        .map_or(false, |p| p.administrator())
}

pub fn ephemeral(content: impl Into<String>) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}

/// Cuts `text` to at most `max` characters, marking the cut with an ellipsis.
pub fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/* custom_id formats used */
pub const QUEST_SELECT_ID: &str = "q:pick";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentAction {
    PickQuest,
    Proof(String),
    Approve(i64),
    Reject(i64),
    RejectReason(i64),
}

impl ComponentAction {
    pub fn custom_id(&self) -> String {
        match self {
            ComponentAction::PickQuest => QUEST_SELECT_ID.to_string(),
            ComponentAction::Proof(code) => format!("q:proof:{code}"),
            ComponentAction::Approve(id) => format!("q:ap:{id}"),
            ComponentAction::Reject(id) => format!("q:rj:{id}"),
            ComponentAction::RejectReason(id) => format!("q:rjr:{id}"),
        }
    }
}

pub fn parse_component_id(s: &str) -> Option<ComponentAction> {
    let s = s.strip_prefix("q:")?;
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        ["pick"] => Some(ComponentAction::PickQuest),
        ["proof", code] if !code.is_empty() => Some(ComponentAction::Proof(code.to_string())),
        ["ap", id] => id.parse().ok().map(ComponentAction::Approve),
        ["rj", id] => id.parse().ok().map(ComponentAction::Reject),
        ["rjr", id] => id.parse().ok().map(ComponentAction::RejectReason),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_ids() {
        assert_eq!(parse_component_id("q:pick"), Some(ComponentAction::PickQuest));
        assert_eq!(parse_component_id("q:proof:B"), Some(ComponentAction::Proof("B".into())));
        assert_eq!(parse_component_id("q:ap:42"), Some(ComponentAction::Approve(42)));
        assert_eq!(parse_component_id("q:rj:7"), Some(ComponentAction::Reject(7)));
        assert_eq!(parse_component_id("q:rjr:7"), Some(ComponentAction::RejectReason(7)));
    }

    #[test]
    fn rejects_foreign_and_malformed_ids() {
        for id in ["r:j:m:abc", "q:ap:x", "q:ap", "q:proof:", "pick", "q:zz:1", "q:ap:1:2"] {
            assert_eq!(parse_component_id(id), None, "{id}");
        }
    }

    #[test]
    fn custom_ids_parse_back() {
        let action = ComponentAction::RejectReason(9001);
        assert_eq!(parse_component_id(&action.custom_id()), Some(action));
    }

    #[test]
    fn clip_keeps_short_text() {
        assert_eq!(clip("abc", 3), "abc");
        assert_eq!(clip("abcdef", 4), "abc…");
        assert_eq!(clip("ąęśćż", 3).chars().count(), 3);
    }
}
