use serde::{Deserialize, Serialize};

use crate::genes::HeroGenes;

/// Raw hero fields as returned by the chain client's GraphQL hero API,
/// before gene decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroInfo {
    pub id: u64,
    pub owner: String,
    pub generation: u32,
    pub stat_genes: String,
    pub visual_genes: String,
    pub summons_remaining: u32,
    pub max_summons: u32,
}

impl HeroInfo {
    pub fn is_gen0(&self) -> bool {
        self.generation == 0
    }
}

/// Derived, not stored durably -- a pure function of the two gene strings
/// plus the hero's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroGeneticRecord {
    pub hero_id: u64,
    pub genes: HeroGenes,
}

impl HeroGeneticRecord {
    pub fn decode(hero: &HeroInfo) -> anyhow::Result<Self> {
        Ok(HeroGeneticRecord {
            hero_id: hero.id,
            genes: crate::genes::decode(&hero.stat_genes, &hero.visual_genes)?,
        })
    }
}
