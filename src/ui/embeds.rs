use serenity::all::{Colour, CreateEmbed, CreateEmbedFooter, Embed};

use crate::catalog::{Catalog, QuestKind, TierLevel};
use crate::db::models::{Submission, User, XpLogEntry};
use crate::engine::{ApprovalOutcome, QuestBoard};
use crate::utils::{clip, mention_user};

const FIELD_MAX: usize = 1024;
const DESCRIPTION_MAX: usize = 4096;
const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];

/// Groups digits by thousands: 12500 -> "12,500".
pub fn fmt_xp(xp: i64) -> String {
    let digits = xp.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if xp < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn quest_label(catalog: &Catalog, code: &str) -> String {
    catalog
        .quest(code)
        .map(|q| q.name.clone())
        .unwrap_or_else(|| code.to_string())
}

pub fn tier_line(catalog: &Catalog, level: TierLevel, total_xp: i64) -> String {
    let name = catalog.tier(level).map_or("Unranked", |t| t.name.as_str());
    let mut line = format!("**{name}** (Lv.{level})");
    if let Some(next) = catalog.next_tier(total_xp) {
        line.push_str(&format!(
            "\nNext tier: {} (Lv.{}) - {} XP to go",
            next.name,
            next.level,
            fmt_xp(next.xp_required - total_xp)
        ));
    }
    line
}

fn board_lines(board: &QuestBoard, milestones: bool) -> String {
    let lines: Vec<String> = board
        .entries
        .iter()
        .filter(|e| (e.quest.kind == QuestKind::Milestone) == milestones)
        .map(|e| {
            let q = &e.quest;
            let status = match q.kind {
                QuestKind::OneTime if e.completed => "✅ Completed".to_string(),
                QuestKind::OneTime => "⏳ Not completed".to_string(),
                QuestKind::Repeatable => format!("✅ Approved {} times (repeatable)", e.approved_count),
                QuestKind::Milestone if e.completed => "✅ Completed".to_string(),
                QuestKind::Milestone => "⏳ In progress".to_string(),
            };
            let progress = e
                .threshold
                .map(|t| format!(" ({}/{})", e.approved_count.min(t), t))
                .unwrap_or_default();
            format!("**{}: {}** - {} XP{}\nStatus: {}", q.code, q.name, q.xp, progress, status)
        })
        .collect();
    if lines.is_empty() {
        "None".to_string()
    } else {
        clip(&lines.join("\n\n"), FIELD_MAX)
    }
}

pub fn quest_board_embed(board: &QuestBoard, catalog: &Catalog) -> CreateEmbed {
    let mut e = CreateEmbed::new()
        .title("🎮 Spot Zero Quest Board")
        .description("Complete the quests below to earn XP and climb the tiers!")
        .colour(Colour::GOLD)
        .field("📝 Direct quests", board_lines(board, false), false)
        .field("🎯 Milestones (granted automatically)", board_lines(board, true), false)
        .field("🏆 Current tier", tier_line(catalog, board.tier, board.user.total_xp), false);

    if !board.rejected.is_empty() {
        let text = board
            .rejected
            .iter()
            .take(5)
            .map(|s| {
                format!(
                    "**{}** ({}): {}",
                    quest_label(catalog, &s.mission_code),
                    s.mission_code,
                    s.rejection_reason.as_deref().unwrap_or("No reason given")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        e = e.field("❌ Rejected submissions", clip(&text, FIELD_MAX), false);
    }

    e.footer(CreateEmbedFooter::new(format!("Total XP: {}", fmt_xp(board.user.total_xp))))
}

/* Posted to the admin channel with Approve/Reject buttons */
pub fn review_embed(submission_id: i64, user_id: i64, catalog: &Catalog, mission_code: &str, proof: &str) -> CreateEmbed {
    let reward = catalog.quest(mission_code).map_or(0, |q| q.xp);
    CreateEmbed::new()
        .title("New quest submission")
        .colour(Colour::BLUE)
        .field("User", mention_user(user_id), true)
        .field("Mission", format!("{}: {}", mission_code, quest_label(catalog, mission_code)), true)
        .field("Reward", format!("{reward} XP"), true)
        .field("Proof", clip(proof, FIELD_MAX), false)
        .field("Submission ID", format!("#{submission_id}"), false)
        .footer(CreateEmbedFooter::new(format!("User ID: {user_id}")))
}

pub fn milestone_lines(outcome: &ApprovalOutcome) -> Option<String> {
    if outcome.milestones.is_empty() {
        return None;
    }
    Some(
        outcome
            .milestones
            .iter()
            .map(|m| format!("🎯 {}: +{} XP", m.name, m.xp))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// Review embed after approval. Starts from the posted embed when there is one.
pub fn approved_review(posted: Option<Embed>, approver_id: i64, outcome: &ApprovalOutcome, catalog: &Catalog) -> CreateEmbed {
    let sub = &outcome.submission;
    let base = match posted {
        Some(embed) => CreateEmbed::from(embed),
        None => review_embed(sub.submission_id, sub.user_id, catalog, &sub.mission_code, &sub.proof),
    };
    let mut e = base
        .colour(Colour::DARK_GREEN)
        .field("Status", format!("✅ Approved by {}", mention_user(approver_id)), false);
    if let Some(text) = milestone_lines(outcome) {
        e = e.field("Milestones reached", text, false);
    }
    e
}

pub fn rejected_review(posted: Option<Embed>, rejecter_id: i64, sub: &Submission, catalog: &Catalog) -> CreateEmbed {
    let base = match posted {
        Some(embed) => CreateEmbed::from(embed),
        None => review_embed(sub.submission_id, sub.user_id, catalog, &sub.mission_code, &sub.proof),
    };
    base.colour(Colour::RED)
        .field("Status", format!("❌ Rejected by {}", mention_user(rejecter_id)), false)
        .field(
            "Reason",
            clip(sub.rejection_reason.as_deref().unwrap_or("No reason given"), FIELD_MAX),
            false,
        )
}

pub fn approval_dm(outcome: &ApprovalOutcome, catalog: &Catalog) -> CreateEmbed {
    let mut e = CreateEmbed::new()
        .title("✅ Quest approved!")
        .description(format!("**{}** was approved!", outcome.quest.name))
        .colour(Colour::DARK_GREEN)
        .field("XP earned", format!("{} XP", outcome.quest.xp), true)
        .field("Total XP", fmt_xp(outcome.user.total_xp), true);
    if let Some(text) = milestone_lines(outcome) {
        e = e.field("Milestones reached!", text, false);
    }
    e.field("Tier", tier_line(catalog, outcome.tier, outcome.user.total_xp), false)
}

pub fn rejection_dm(sub: &Submission, catalog: &Catalog) -> CreateEmbed {
    CreateEmbed::new()
        .title("❌ Quest rejected")
        .description(format!(
            "Your submission for **{}** was rejected.",
            quest_label(catalog, &sub.mission_code)
        ))
        .colour(Colour::RED)
        .field(
            "Reason",
            clip(sub.rejection_reason.as_deref().unwrap_or("No reason given"), FIELD_MAX),
            false,
        )
        .field("Resubmit", "Use `/sz` to submit again.", false)
}

pub fn ranking_line(rank: i64, name: &str, user: &User, catalog: &Catalog) -> String {
    let level = catalog.tier_for(user.total_xp);
    let tier = catalog.tier(level).map_or("Unranked", |t| t.name.as_str());
    let place = usize::try_from(rank - 1)
        .ok()
        .and_then(|i| MEDALS.get(i))
        .map_or_else(|| format!("**{rank}.**"), |m| m.to_string());
    format!("{place} {name} - **{tier}** (Lv.{level}) - {} XP", fmt_xp(user.total_xp))
}

/// `rows` are (display name, user) in leaderboard order; `own` is the
/// caller's rank when they are outside the shown rows.
pub fn ranking_embed(rows: &[(String, User)], own: Option<(i64, String, User)>, catalog: &Catalog) -> CreateEmbed {
    let text = rows
        .iter()
        .enumerate()
        .map(|(i, (name, user))| ranking_line(i as i64 + 1, name, user, catalog))
        .collect::<Vec<_>>()
        .join("\n");
    let mut e = CreateEmbed::new()
        .title("🏆 Spot Zero Leaderboard")
        .description(clip(&text, DESCRIPTION_MAX))
        .colour(Colour::GOLD);
    if let Some((rank, name, user)) = own {
        let line = ranking_line(rank, &name, &user, catalog);
        e = e.field("━━━━━━━━━━━━━━━━━━━━", line, false);
    }
    e.footer(CreateEmbedFooter::new("Earn more XP to climb the ranks!"))
}

pub fn history_embed(logs: &[XpLogEntry], total_xp: i64) -> CreateEmbed {
    let text = if logs.is_empty() {
        "No XP earned yet. Use `/sz` to submit a quest.".to_string()
    } else {
        logs.iter()
            .map(|l| {
                format!(
                    "`{}` **+{} XP** {}",
                    l.created_at.format("%Y-%m-%d %H:%M"),
                    fmt_xp(l.xp_amount),
                    l.mission_name
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    CreateEmbed::new()
        .title("📜 XP history")
        .description(clip(&text, DESCRIPTION_MAX))
        .colour(Colour::BLUE)
        .footer(CreateEmbedFooter::new(format!("Total XP: {}", fmt_xp(total_xp))))
}

pub fn pending_embed(subs: &[Submission], catalog: &Catalog) -> CreateEmbed {
    let text = if subs.is_empty() {
        "Nothing waiting for review.".to_string()
    } else {
        subs.iter()
            .map(|s| {
                format!(
                    "**#{}** {} - {} ({}) <t:{}:R>\n{}",
                    s.submission_id,
                    mention_user(s.user_id),
                    quest_label(catalog, &s.mission_code),
                    s.mission_code,
                    s.submitted_at.timestamp(),
                    clip(&s.proof, 200)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    CreateEmbed::new()
        .title("🕒 Pending submissions")
        .description(clip(&text, DESCRIPTION_MAX))
        .colour(Colour::BLUE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn formats_xp_with_separators() {
        assert_eq!(fmt_xp(0), "0");
        assert_eq!(fmt_xp(999), "999");
        assert_eq!(fmt_xp(1000), "1,000");
        assert_eq!(fmt_xp(1234567), "1,234,567");
        assert_eq!(fmt_xp(-2500), "-2,500");
    }

    #[test]
    fn tier_line_mentions_next_tier() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(
            tier_line(&catalog, 2, 150),
            "**SZ Streamer** (Lv.2)\nNext tier: SZ Elite (Lv.3) - 350 XP to go"
        );
        assert_eq!(tier_line(&catalog, 5, 3000), "**SZ Partner** (Lv.5)");
    }

    #[test]
    fn ranking_line_uses_medals_then_numbers() {
        let catalog = Catalog::builtin().unwrap();
        let user = User {
            user_id: 1,
            total_submissions: 3,
            approved_count: 3,
            total_xp: 1200,
            registered_at: Utc::now(),
        };
        assert_eq!(
            ranking_line(1, "alice", &user, &catalog),
            "🥇 alice - **SZ Ambassador** (Lv.4) - 1,200 XP"
        );
        assert!(ranking_line(4, "bob", &user, &catalog).starts_with("**4.** bob"));
    }
}
