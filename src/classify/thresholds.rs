//! Every tunable boundary the classification engine uses, in one typed
//! constant. Changing a cutoff means editing a field here, never the
//! logic in `mod.rs`.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationThresholds {
    pub whale_usd: f64,
    pub extractor_score: f64,
    pub high_potential_engagement: f64,
    pub high_potential_financial_ceiling: f64,
    pub collector_hero_count: u32,

    pub tier1_score: f64,
    pub tier2_score: f64,
    pub tier3_score: f64,
    pub tier4_score: f64,
    pub whale_auto_tier3: bool,

    pub dormant_days: i64,
    pub state_at_risk_retention: f64,
    pub state_churned_retention: f64,
    pub state_engaged_engagement: f64,
    pub churn_keyword_min_hits: u32,

    pub newcomer_days: i64,
    pub socializer_messages_7d: u32,
    pub feature_explorer_clicks: u32,
    pub price_sensitive_keyword_hits: u32,
    pub help_seeker_keyword_hits: u32,
    pub optimizer_keyword_hits: u32,

    pub intent_score_cap: f64,
    pub intent_min_diff: f64,
    pub bridge_out_usd_7d: f64,
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        ClassificationThresholds {
            whale_usd: 50_000.0,
            extractor_score: 0.7,
            high_potential_engagement: 0.6,
            high_potential_financial_ceiling: 0.2,
            collector_hero_count: 15,

            tier1_score: 1.0,
            tier2_score: 2.0,
            tier3_score: 3.0,
            tier4_score: 4.0,
            whale_auto_tier3: true,

            dormant_days: 30,
            state_at_risk_retention: 0.3,
            state_churned_retention: 0.1,
            state_engaged_engagement: 0.5,
            churn_keyword_min_hits: 2,

            newcomer_days: 7,
            socializer_messages_7d: 10,
            feature_explorer_clicks: 5,
            price_sensitive_keyword_hits: 2,
            help_seeker_keyword_hits: 2,
            optimizer_keyword_hits: 2,

            intent_score_cap: 1.0,
            intent_min_diff: 0.05,
            bridge_out_usd_7d: 5_000.0,
        }
    }
}
