//! L12 — a pure classification engine: `classify(profile, facts, now) ->
//! profile'` plus `process_event(profile, event, now) -> profile'` where
//! `process_event = classify . update_kpis(event)`. No I/O, no panics; the
//! caller supplies wallet facts and the current time.

pub mod thresholds;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::classification::{
    Archetype, BehaviorTag, ClassificationFlags, ClassificationVector, IntentArchetype, IntentScores, PlayerState,
};

use self::thresholds::ClassificationThresholds;

const CHURN_KEYWORDS: &[&str] = &["unsubscribe", "quit", "done with this", "stop", "not worth it"];
const PRICE_KEYWORDS: &[&str] = &["expensive", "too much", "price", "cost"];
const HELP_KEYWORDS: &[&str] = &["help", "how do i", "confused", "stuck"];
const OPTIMIZER_KEYWORDS: &[&str] = &["optimize", "best apr", "best pool", "maximize"];

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WalletFacts {
    pub hero_count: u32,
    pub lp_position_count: u32,
    pub total_tvl_usd: f64,
    pub total_token_balance_usd: f64,
    pub bridge_out_usd_7d: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationEvent {
    WalletScan,
    DiscordMessage { content: String },
    SessionStart,
    AdviceFollowed,
    RecommendationClicked,
    CommandUsed,
    SubscriptionUpgrade,
    RetentionUpdate { delta: f64 },
}

fn keyword_hits(messages: &[crate::model::classification::RecentMessage], keywords: &[&str]) -> u32 {
    messages
        .iter()
        .filter(|m| {
            let lower = m.content.to_lowercase();
            keywords.iter().any(|k| lower.contains(k))
        })
        .count() as u32
}

/// `updateKPIs`: folds one event into the profile's running KPI counters.
/// Never touches archetype/tier/state/tags -- that is `classify`'s job.
pub fn update_kpis(mut profile: ClassificationVector, event: &ClassificationEvent, now: DateTime<Utc>) -> ClassificationVector {
    match event {
        ClassificationEvent::WalletScan => {
            profile.kpis.engagement_score = (profile.kpis.engagement_score + 0.02).min(1.0);
        }
        ClassificationEvent::DiscordMessage { content } => {
            profile.push_message(content.clone(), now);
            profile.kpis.message_count_7d += 1;
            profile.kpis.engagement_score = (profile.kpis.engagement_score + 0.05).min(1.0);
        }
        ClassificationEvent::SessionStart => {
            profile.kpis.session_count_30d += 1;
            profile.kpis.engagement_score = (profile.kpis.engagement_score + 0.03).min(1.0);
        }
        ClassificationEvent::AdviceFollowed => {
            profile.kpis.advice_followed_count += 1;
            profile.kpis.retention_score = (profile.kpis.retention_score + 0.1).min(1.0);
        }
        ClassificationEvent::RecommendationClicked => {
            profile.kpis.recommendation_clicks += 1;
        }
        ClassificationEvent::CommandUsed => {
            profile.kpis.engagement_score = (profile.kpis.engagement_score + 0.01).min(1.0);
        }
        ClassificationEvent::SubscriptionUpgrade => {
            profile.kpis.financial_score = (profile.kpis.financial_score + 0.3).min(1.0);
        }
        ClassificationEvent::RetentionUpdate { delta } => {
            profile.kpis.retention_score = (profile.kpis.retention_score + delta).clamp(0.0, 1.0);
        }
    }
    profile.updated_at = now;
    profile
}

/// `classify`: the six-step derivation described by the source material,
/// applied in order since later steps read earlier ones' output.
pub fn classify(mut profile: ClassificationVector, facts: &WalletFacts, now: DateTime<Utc>) -> ClassificationVector {
    let t = ClassificationThresholds::default();

    // 1. archetype
    profile.archetype = classify_archetype(facts, &profile, &t);

    // 2. flags
    let total_usd = facts.total_tvl_usd + facts.total_token_balance_usd;
    profile.flags = ClassificationFlags {
        is_whale: total_usd >= t.whale_usd,
        is_extractor: profile.kpis.extractor_score >= t.extractor_score,
        is_high_potential: profile.kpis.engagement_score >= t.high_potential_engagement
            && profile.kpis.financial_score < t.high_potential_financial_ceiling,
    };

    // 3. tier
    profile.tier = classify_tier(&profile, &t);

    // 4. state
    profile.state = classify_state(&profile, now, &t);

    // 5. behaviorTags
    profile.behavior_tags = classify_behavior_tags(&profile, now, &t);

    // 6. intentScores / intentArchetype
    profile.intent_scores = classify_intent_scores(&profile, facts, &t);
    profile.intent_archetype = classify_intent_archetype(&profile, facts, &t);

    profile.updated_at = now;
    profile
}

pub fn process_event(profile: ClassificationVector, facts: &WalletFacts, event: &ClassificationEvent, now: DateTime<Utc>) -> ClassificationVector {
    classify(update_kpis(profile, event, now), facts, now)
}

fn classify_archetype(facts: &WalletFacts, profile: &ClassificationVector, t: &ClassificationThresholds) -> Archetype {
    if facts.hero_count == 0 && facts.lp_position_count == 0 && facts.total_token_balance_usd == 0.0 {
        return Archetype::Guest;
    }
    if profile.kpis.extractor_score >= t.extractor_score {
        return Archetype::Extractor;
    }
    if facts.lp_position_count > 0 && facts.hero_count > 0 {
        return Archetype::Farmer;
    }
    if facts.lp_position_count > 0 {
        return Archetype::Investor;
    }
    if facts.hero_count >= t.collector_hero_count {
        return Archetype::Collector;
    }
    Archetype::Player
}

fn classify_tier(profile: &ClassificationVector, t: &ClassificationThresholds) -> u8 {
    let score = profile.kpis.engagement_score + profile.kpis.financial_score;
    let mut tier = if score >= t.tier4_score {
        4
    } else if score >= t.tier3_score {
        3
    } else if score >= t.tier2_score {
        2
    } else if score >= t.tier1_score {
        1
    } else {
        0
    };
    if t.whale_auto_tier3 && profile.flags.is_whale {
        tier = tier.max(3);
    }
    if let Some(floor) = profile.tier_override {
        tier = tier.max(floor.floor);
    }
    tier
}

fn classify_state(profile: &ClassificationVector, now: DateTime<Utc>, t: &ClassificationThresholds) -> PlayerState {
    let churn_hits = keyword_hits(&profile.recent_messages, CHURN_KEYWORDS);
    let days_since_last_message = profile
        .recent_messages
        .last()
        .map(|m| (now - m.at).num_days())
        .unwrap_or(i64::MAX);

    if profile.flags.is_extractor && profile.kpis.retention_score < t.state_churned_retention {
        return PlayerState::Churned;
    }
    if days_since_last_message > t.dormant_days {
        return PlayerState::Dormant;
    }
    if profile.kpis.retention_score < t.state_at_risk_retention || churn_hits >= t.churn_keyword_min_hits {
        return PlayerState::AtRisk;
    }
    if profile.kpis.engagement_score >= t.state_engaged_engagement {
        return PlayerState::Engaged;
    }
    PlayerState::Curious
}

fn classify_behavior_tags(
    profile: &ClassificationVector,
    now: DateTime<Utc>,
    t: &ClassificationThresholds,
) -> std::collections::BTreeSet<BehaviorTag> {
    let mut tags = std::collections::BTreeSet::new();
    let days_since_first_seen = (now - profile.first_seen_at).num_days();
    let is_newcomer = days_since_first_seen < t.newcomer_days;

    if is_newcomer {
        tags.insert(BehaviorTag::Newcomer);
    }
    if profile.flags.is_whale {
        tags.insert(BehaviorTag::Whale);
    }
    if profile.flags.is_extractor {
        tags.insert(BehaviorTag::Extractor);
    }
    if profile.flags.is_high_potential {
        tags.insert(BehaviorTag::HighPotential);
    }
    if keyword_hits(&profile.recent_messages, PRICE_KEYWORDS) >= t.price_sensitive_keyword_hits {
        tags.insert(BehaviorTag::PriceSensitive);
    }
    if keyword_hits(&profile.recent_messages, HELP_KEYWORDS) >= t.help_seeker_keyword_hits {
        tags.insert(BehaviorTag::HelpSeeker);
    }
    if keyword_hits(&profile.recent_messages, OPTIMIZER_KEYWORDS) >= t.optimizer_keyword_hits {
        tags.insert(BehaviorTag::Optimizer);
    }
    if profile.kpis.message_count_7d >= t.socializer_messages_7d {
        tags.insert(BehaviorTag::Socializer);
    }
    if profile.kpis.message_count_7d == 0 && profile.kpis.session_count_30d > 0 {
        tags.insert(BehaviorTag::Lurker);
    }
    if profile.kpis.recommendation_clicks >= t.feature_explorer_clicks {
        tags.insert(BehaviorTag::FeatureExplorer);
    }
    if matches!(profile.state, PlayerState::AtRisk | PlayerState::Dormant) {
        tags.insert(BehaviorTag::ChurnRisk);
    }
    if !is_newcomer && profile.kpis.session_count_30d > 0 {
        tags.insert(BehaviorTag::Returning);
    }
    tags
}

fn classify_intent_scores(profile: &ClassificationVector, facts: &WalletFacts, t: &ClassificationThresholds) -> IntentScores {
    let cap = t.intent_score_cap;
    IntentScores {
        casual_explorer: (profile.kpis.engagement_score * 0.4).min(cap),
        active_gardener: (facts.lp_position_count as f64 * 0.1 + profile.kpis.session_count_30d as f64 * 0.02).min(cap),
        yield_optimizer: (profile.kpis.recommendation_clicks as f64 * 0.15 + profile.kpis.advice_followed_count as f64 * 0.2).min(cap),
        collector_hoarder: (facts.hero_count as f64 * 0.05).min(cap),
        investor_extractor: (facts.total_token_balance_usd / 10_000.0 * 0.5 + profile.kpis.extractor_score * 0.5).min(cap),
    }
}

fn classify_intent_archetype(profile: &ClassificationVector, facts: &WalletFacts, t: &ClassificationThresholds) -> IntentArchetype {
    if facts.bridge_out_usd_7d >= t.bridge_out_usd_7d || profile.kpis.extractor_score >= t.extractor_score {
        return IntentArchetype::InvestorExtractor;
    }

    let scores = [
        (IntentArchetype::CasualExplorer, profile.intent_scores.casual_explorer),
        (IntentArchetype::ActiveGardener, profile.intent_scores.active_gardener),
        (IntentArchetype::YieldOptimizer, profile.intent_scores.yield_optimizer),
        (IntentArchetype::CollectorHoarder, profile.intent_scores.collector_hoarder),
        (IntentArchetype::InvestorExtractor, profile.intent_scores.investor_extractor),
    ];

    let mut sorted = scores;
    sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let (best, best_score) = sorted[0];
    let second_score = sorted[1].1;

    // Minimum-difference rule: an ambiguous lead keeps the previous
    // classification instead of flapping between near-tied archetypes.
    if best_score - second_score < t.intent_min_diff {
        return profile.intent_archetype;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::classification::ClassificationVector;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn guest_archetype_for_wallet_with_no_activity() {
        let profile = ClassificationVector::new(now());
        let facts = WalletFacts::default();
        let classified = classify(profile, &facts, now());
        assert_eq!(classified.archetype, Archetype::Guest);
    }

    #[test]
    fn farmer_archetype_requires_both_heroes_and_lp() {
        let profile = ClassificationVector::new(now());
        let facts = WalletFacts { hero_count: 3, lp_position_count: 2, total_tvl_usd: 500.0, ..Default::default() };
        let classified = classify(profile, &facts, now());
        assert_eq!(classified.archetype, Archetype::Farmer);
    }

    #[test]
    fn whale_flag_floors_tier_at_3_when_enabled() {
        let profile = ClassificationVector::new(now());
        let facts = WalletFacts { total_token_balance_usd: 100_000.0, ..Default::default() };
        let classified = classify(profile, &facts, now());
        assert!(classified.flags.is_whale);
        assert!(classified.tier >= 3);
    }

    #[test]
    fn tier_override_floor_is_never_decreased_by_computed_tier() {
        let mut profile = ClassificationVector::new(now());
        profile.tier_override = Some(crate::model::classification::TierOverride { floor: 4 });
        let facts = WalletFacts::default();
        let classified = classify(profile, &facts, now());
        assert_eq!(classified.tier, 4);
    }

    #[test]
    fn classify_is_idempotent_given_the_same_inputs() {
        let profile = ClassificationVector::new(now());
        let facts = WalletFacts { hero_count: 2, lp_position_count: 1, total_tvl_usd: 100.0, ..Default::default() };
        let once = classify(profile.clone(), &facts, now());
        let twice = classify(once.clone(), &facts, now());
        assert_eq!(once.archetype, twice.archetype);
        assert_eq!(once.tier, twice.tier);
        assert_eq!(once.behavior_tags, twice.behavior_tags);
    }

    #[test]
    fn process_event_appends_message_and_may_shift_state() {
        let profile = ClassificationVector::new(now());
        let facts = WalletFacts::default();
        let event = ClassificationEvent::DiscordMessage { content: "hello".into() };
        let updated = process_event(profile, &facts, &event, now());
        assert_eq!(updated.recent_messages.len(), 1);
        assert_eq!(updated.kpis.message_count_7d, 1);
    }

    #[test]
    fn bridge_out_hard_override_forces_investor_extractor() {
        let profile = ClassificationVector::new(now());
        let facts = WalletFacts { bridge_out_usd_7d: 10_000.0, ..Default::default() };
        let classified = classify(profile, &facts, now());
        assert_eq!(classified.intent_archetype, IntentArchetype::InvestorExtractor);
    }
}
