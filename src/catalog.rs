//! Static quest and tier tables.
//!
//! The catalog is built once at start-up and shared read-only with the engine
//! and the presentation layer. Nothing mutates it at runtime.

use std::collections::BTreeMap;

pub type TierLevel = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestKind {
    OneTime,
    Repeatable,
    Milestone,
}

impl QuestKind {
    pub fn label(self) -> &'static str {
        match self {
            QuestKind::OneTime => "one-time",
            QuestKind::Repeatable => "repeatable",
            QuestKind::Milestone => "milestone",
        }
    }

    /// Users can send proof for these directly; milestones are granted.
    pub fn is_submittable(self) -> bool {
        !matches!(self, QuestKind::Milestone)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestDef {
    pub code: String,
    pub name: String,
    pub xp: i64,
    pub kind: QuestKind,
    pub requires_snapshot: bool,
}

impl QuestDef {
    fn new(code: &str, name: &str, xp: i64, kind: QuestKind) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            xp,
            kind,
            requires_snapshot: false,
        }
    }

    fn with_snapshot(mut self) -> Self {
        self.requires_snapshot = true;
        self
    }

    /// Label written to the XP log for a direct approval.
    pub fn log_label(&self) -> String {
        format!("Mission {}: {}", self.code, self.name)
    }

    /// Label written to the XP log for an automatic milestone grant.
    pub fn milestone_log_label(&self) -> String {
        format!("Mission {}: {} (Milestone)", self.code, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierDef {
    pub level: TierLevel,
    pub name: String,
    pub xp_required: i64,
    pub role_name: String,
}

impl TierDef {
    fn new(level: TierLevel, name: &str, xp_required: i64) -> Self {
        Self {
            level,
            name: name.to_string(),
            xp_required,
            role_name: name.to_string(),
        }
    }
}

/// Grants `milestone` once the user's approved count of `base` reaches `threshold`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneRule {
    pub base: String,
    pub milestone: String,
    pub threshold: i64,
}

impl MilestoneRule {
    fn new(base: &str, milestone: &str, threshold: i64) -> Self {
        Self {
            base: base.to_string(),
            milestone: milestone.to_string(),
            threshold,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("tier table is empty")]
    NoTiers,
    #[error("tier levels must run 1..=n without gaps, found level {found} at position {position}")]
    TierLevelGap { position: usize, found: TierLevel },
    #[error("tier {level} requires {xp_required} XP, less than the tier below it ({previous})")]
    TierThresholdDecreases {
        level: TierLevel,
        xp_required: i64,
        previous: i64,
    },
    #[error("quest {0} has a negative XP reward")]
    NegativeReward(String),
    #[error("milestone rule references unknown quest {0}")]
    UnknownQuest(String),
    #[error("milestone rule base {0} is not a repeatable quest")]
    BaseNotRepeatable(String),
    #[error("milestone rule target {0} is not a milestone quest")]
    TargetNotMilestone(String),
    #[error("milestone rule for {0} has a threshold below 1")]
    BadThreshold(String),
}

#[derive(Debug, Clone)]
pub struct Catalog {
    quests: BTreeMap<String, QuestDef>,
    tiers: Vec<TierDef>,
    milestones: Vec<MilestoneRule>,
}

impl Catalog {
    /// Builds a catalog after checking tier ordering and milestone references.
    pub fn new(
        quests: Vec<QuestDef>,
        mut tiers: Vec<TierDef>,
        milestones: Vec<MilestoneRule>,
    ) -> Result<Self, CatalogError> {
        if tiers.is_empty() {
            return Err(CatalogError::NoTiers);
        }
        tiers.sort_by_key(|t| t.level);
        for (position, tier) in tiers.iter().enumerate() {
            if usize::from(tier.level) != position + 1 {
                return Err(CatalogError::TierLevelGap { position, found: tier.level });
            }
        }
        for pair in tiers.windows(2) {
            if pair[1].xp_required < pair[0].xp_required {
                return Err(CatalogError::TierThresholdDecreases {
                    level: pair[1].level,
                    xp_required: pair[1].xp_required,
                    previous: pair[0].xp_required,
                });
            }
        }

        let quests: BTreeMap<String, QuestDef> =
            quests.into_iter().map(|q| (q.code.clone(), q)).collect();
        if let Some(q) = quests.values().find(|q| q.xp < 0) {
            return Err(CatalogError::NegativeReward(q.code.clone()));
        }

        for rule in &milestones {
            let base = quests
                .get(&rule.base)
                .ok_or_else(|| CatalogError::UnknownQuest(rule.base.clone()))?;
            if base.kind != QuestKind::Repeatable {
                return Err(CatalogError::BaseNotRepeatable(rule.base.clone()));
            }
            let target = quests
                .get(&rule.milestone)
                .ok_or_else(|| CatalogError::UnknownQuest(rule.milestone.clone()))?;
            if target.kind != QuestKind::Milestone {
                return Err(CatalogError::TargetNotMilestone(rule.milestone.clone()));
            }
            if rule.threshold < 1 {
                return Err(CatalogError::BadThreshold(rule.milestone.clone()));
            }
        }

        Ok(Self { quests, tiers, milestones })
    }

    /// The quest board and tier ladder this bot ships with.
    pub fn builtin() -> Result<Self, CatalogError> {
        use QuestKind::*;
        let quests = vec![
            QuestDef::new("A", "SNF Promo Video", 150, OneTime),
            QuestDef::new("B", "Upload 1 Video", 80, Repeatable),
            QuestDef::new("C", "Live Stream 1 Time", 100, Repeatable),
            QuestDef::new("D", "Accumulate 5 approved Videos", 200, Milestone),
            QuestDef::new("E", "Accumulate 10 approved Videos", 500, Milestone),
            QuestDef::new("F", "Accumulate 3 approved Live Streams", 150, Milestone),
            QuestDef::new("G", "Accumulate 6 approved Live Streams", 300, Milestone),
            QuestDef::new("H", "High Engagement", 1500, OneTime).with_snapshot(),
        ];
        let tiers = vec![
            TierDef::new(1, "Code SZ", 0),
            TierDef::new(2, "SZ Streamer", 0),
            TierDef::new(3, "SZ Elite", 500),
            TierDef::new(4, "SZ Ambassador", 1000),
            TierDef::new(5, "SZ Partner", 2500),
        ];
        let milestones = vec![
            MilestoneRule::new("B", "D", 5),
            MilestoneRule::new("B", "E", 10),
            MilestoneRule::new("C", "F", 3),
            MilestoneRule::new("C", "G", 6),
        ];
        Self::new(quests, tiers, milestones)
    }

    pub fn quest(&self, code: &str) -> Option<&QuestDef> {
        self.quests.get(code)
    }

    /// Quests ordered by code.
    pub fn quests(&self) -> impl Iterator<Item = &QuestDef> {
        self.quests.values()
    }

    pub fn tiers(&self) -> &[TierDef] {
        &self.tiers
    }

    pub fn tier(&self, level: TierLevel) -> Option<&TierDef> {
        self.tiers.iter().find(|t| t.level == level)
    }

    /// Rules triggered by approvals of `base`, in threshold order.
    pub fn milestones_for<'a>(
        &'a self,
        base: &'a str,
    ) -> impl Iterator<Item = &'a MilestoneRule> + 'a {
        self.milestones.iter().filter(move |r| r.base == base)
    }

    /// The rule that grants `milestone`, used for progress display.
    pub fn rule_for_milestone(&self, milestone: &str) -> Option<&MilestoneRule> {
        self.milestones.iter().find(|r| r.milestone == milestone)
    }

    /// Highest level whose threshold is met. Equal thresholds resolve to the
    /// higher level; nothing qualifying falls back to level 1.
    pub fn tier_for(&self, total_xp: i64) -> TierLevel {
        self.tiers
            .iter()
            .rev()
            .find(|t| t.xp_required <= total_xp)
            .map_or(1, |t| t.level)
    }

    /// Lowest tier still out of reach.
    pub fn next_tier(&self, total_xp: i64) -> Option<&TierDef> {
        self.tiers.iter().find(|t| t.xp_required > total_xp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.quests().count(), 8);
        assert_eq!(catalog.tiers().len(), 5);
        assert!(catalog.quest("H").unwrap().requires_snapshot);
        let rules: Vec<_> = catalog.milestones_for("B").map(|r| r.milestone.as_str()).collect();
        assert_eq!(rules, ["D", "E"]);
    }

    #[test]
    fn milestone_rules_for_borrowed_base() {
        let catalog = Catalog::builtin().unwrap();
        let base = String::from("C");
        let rules: Vec<(&str, i64)> = catalog
            .milestones_for(&base)
            .map(|r| (r.milestone.as_str(), r.threshold))
            .collect();
        assert_eq!(rules, [("F", 3), ("G", 6)]);
        assert_eq!(catalog.milestones_for("A").count(), 0);
    }

    #[test]
    fn tier_thresholds() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.tier_for(0), 2);
        assert_eq!(catalog.tier_for(150), 2);
        assert_eq!(catalog.tier_for(499), 2);
        assert_eq!(catalog.tier_for(500), 3);
        assert_eq!(catalog.tier_for(600), 3);
        assert_eq!(catalog.tier_for(1000), 4);
        assert_eq!(catalog.tier_for(2499), 4);
        assert_eq!(catalog.tier_for(2500), 5);
        assert_eq!(catalog.tier_for(1_000_000), 5);
    }

    #[test]
    fn negative_xp_falls_back_to_level_one() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.tier_for(-10), 1);
    }

    #[test]
    fn tier_is_monotonic_in_xp() {
        let catalog = Catalog::builtin().unwrap();
        let mut previous = catalog.tier_for(0);
        for xp in (0..4000).step_by(7) {
            let tier = catalog.tier_for(xp);
            assert!(tier >= previous, "tier dropped at {xp} XP");
            previous = tier;
        }
    }

    #[test]
    fn next_tier_skips_reached_thresholds() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.next_tier(0).map(|t| t.level), Some(3));
        assert_eq!(catalog.next_tier(500).map(|t| t.level), Some(4));
        assert_eq!(catalog.next_tier(2500), None);
    }

    #[test]
    fn rejects_decreasing_thresholds() {
        let tiers = vec![TierDef::new(1, "a", 0), TierDef::new(2, "b", 100), TierDef::new(3, "c", 50)];
        let err = Catalog::new(vec![], tiers, vec![]).unwrap_err();
        assert_eq!(
            err,
            CatalogError::TierThresholdDecreases { level: 3, xp_required: 50, previous: 100 }
        );
    }

    #[test]
    fn rejects_level_gaps() {
        let tiers = vec![TierDef::new(1, "a", 0), TierDef::new(3, "c", 50)];
        assert!(matches!(
            Catalog::new(vec![], tiers, vec![]),
            Err(CatalogError::TierLevelGap { found: 3, .. })
        ));
    }

    #[test]
    fn rejects_bad_milestone_rules() {
        let tiers = vec![TierDef::new(1, "a", 0)];
        let quests = vec![
            QuestDef::new("A", "once", 10, QuestKind::OneTime),
            QuestDef::new("B", "again", 10, QuestKind::Repeatable),
            QuestDef::new("M", "mile", 10, QuestKind::Milestone),
        ];

        let err = Catalog::new(quests.clone(), tiers.clone(), vec![MilestoneRule::new("A", "M", 2)])
            .unwrap_err();
        assert_eq!(err, CatalogError::BaseNotRepeatable("A".into()));

        let err = Catalog::new(quests.clone(), tiers.clone(), vec![MilestoneRule::new("B", "A", 2)])
            .unwrap_err();
        assert_eq!(err, CatalogError::TargetNotMilestone("A".into()));

        let err = Catalog::new(quests.clone(), tiers.clone(), vec![MilestoneRule::new("B", "Z", 2)])
            .unwrap_err();
        assert_eq!(err, CatalogError::UnknownQuest("Z".into()));

        let err = Catalog::new(quests, tiers, vec![MilestoneRule::new("B", "M", 0)]).unwrap_err();
        assert_eq!(err, CatalogError::BadThreshold("M".into()));
    }
}
