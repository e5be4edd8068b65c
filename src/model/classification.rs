//! The classification vector embedded in `Player::profile_data`. This is a
//! tagged union of typed fields rather than an opaque JSON blob: one field
//! per classification dimension, (de)serialized as JSON for the storage
//! column, with unknown fields on load simply ignored by serde's default
//! behavior.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Guest,
    Player,
    Investor,
    Farmer,
    Collector,
    Extractor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentArchetype {
    CasualExplorer,
    ActiveGardener,
    YieldOptimizer,
    CollectorHoarder,
    InvestorExtractor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Curious,
    Engaged,
    AtRisk,
    Dormant,
    Churned,
}

/// Message-pattern / asset-composition tags. A player can carry any subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorTag {
    Newcomer,
    Whale,
    Extractor,
    HighPotential,
    PriceSensitive,
    HelpSeeker,
    Optimizer,
    Socializer,
    Lurker,
    FeatureExplorer,
    ChurnRisk,
    Returning,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Kpis {
    pub engagement_score: f64,
    pub financial_score: f64,
    pub retention_score: f64,
    pub extractor_score: f64,
    pub message_count_7d: u32,
    pub session_count_30d: u32,
    pub advice_followed_count: u32,
    pub recommendation_clicks: u32,
}

impl Default for Kpis {
    fn default() -> Self {
        Kpis {
            engagement_score: 0.0,
            financial_score: 0.0,
            retention_score: 0.0,
            extractor_score: 0.0,
            message_count_7d: 0,
            session_count_30d: 0,
            advice_followed_count: 0,
            recommendation_clicks: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IntentScores {
    pub casual_explorer: f64,
    pub active_gardener: f64,
    pub yield_optimizer: f64,
    pub collector_hoarder: f64,
    pub investor_extractor: f64,
}

impl Default for IntentScores {
    fn default() -> Self {
        IntentScores {
            casual_explorer: 0.0,
            active_gardener: 0.0,
            yield_optimizer: 0.0,
            collector_hoarder: 0.0,
            investor_extractor: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ClassificationFlags {
    pub is_whale: bool,
    pub is_extractor: bool,
    pub is_high_potential: bool,
}

/// A single message retained for pattern analysis. Buffer is capped at the
/// last `RECENT_MESSAGES_CAP` entries, oldest dropped first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecentMessage {
    pub content: String,
    pub at: DateTime<Utc>,
}

pub const RECENT_MESSAGES_CAP: usize = 50;

/// Optional operator-set floor on `tier`, independent of the computed
/// engagement/financial scores (e.g. a support override).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TierOverride {
    pub floor: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassificationVector {
    pub archetype: Archetype,
    pub intent_archetype: IntentArchetype,
    pub tier: u8,
    pub state: PlayerState,
    pub behavior_tags: BTreeSet<BehaviorTag>,
    pub kpis: Kpis,
    pub intent_scores: IntentScores,
    pub flags: ClassificationFlags,
    pub recent_messages: Vec<RecentMessage>,
    pub tier_override: Option<TierOverride>,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClassificationVector {
    pub fn new(now: DateTime<Utc>) -> Self {
        ClassificationVector {
            archetype: Archetype::Guest,
            intent_archetype: IntentArchetype::CasualExplorer,
            tier: 0,
            state: PlayerState::Curious,
            behavior_tags: BTreeSet::from([BehaviorTag::Newcomer]),
            kpis: Kpis::default(),
            intent_scores: IntentScores::default(),
            flags: ClassificationFlags::default(),
            recent_messages: Vec::new(),
            tier_override: None,
            first_seen_at: now,
            updated_at: now,
        }
    }

    pub fn push_message(&mut self, content: String, at: DateTime<Utc>) {
        self.recent_messages.push(RecentMessage { content, at });
        if self.recent_messages.len() > RECENT_MESSAGES_CAP {
            let overflow = self.recent_messages.len() - RECENT_MESSAGES_CAP;
            self.recent_messages.drain(0..overflow);
        }
    }
}
