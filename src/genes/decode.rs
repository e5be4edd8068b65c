//! Pure, total, deterministic transform from the two opaque 256-bit gene
//! strings into a structured trait matrix. No I/O, no panics on
//! well-formed input.

use num_bigint::BigUint;
use num_traits::Zero;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::tables::*;

const ALPHABET: &[u8] = b"123456789abcdefghijkmnopqrstuvwx";
const PADDED_LEN: usize = 48;
const SLOT_COUNT: usize = 12;

/// One slot's four resolved positions. Wire order within a 4-character
/// group is `R3, R2, R1, D`; this struct exposes them by name instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Slot<T> {
    pub d: T,
    pub r1: T,
    pub r2: T,
    pub r3: T,
}

impl<T: Copy> Slot<T> {
    pub fn contains<F: Fn(T) -> bool>(&self, pred: F) -> bool {
        pred(self.d) || pred(self.r1) || pred(self.r2) || pred(self.r3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StatGenes {
    pub class: Slot<ClassTrait>,
    pub sub_class: Slot<SubClassTrait>,
    pub profession: Slot<ProfessionTrait>,
    pub passive1: Slot<PassiveTrait>,
    pub passive2: Slot<PassiveTrait>,
    pub active1: Slot<ActiveTrait>,
    pub active2: Slot<ActiveTrait>,
    pub stat_boost1: Slot<StatBoostTrait>,
    pub stat_boost2: Slot<StatBoostTrait>,
    pub stats_growth1: Slot<StatsGrowthTrait>,
    pub stats_growth2: Slot<StatsGrowthTrait>,
    pub spare: Slot<SpareTrait>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VisualGenes {
    pub gender: Slot<GenderTrait>,
    pub background: Slot<BackgroundTrait>,
    pub shape: Slot<ShapeTrait>,
    pub eye_color: Slot<ColorTrait>,
    pub skin_color: Slot<ColorTrait>,
    pub hair_style: Slot<ShapeTrait>,
    pub hair_color: Slot<ColorTrait>,
    pub visual1: Slot<VisualTrait>,
    pub visual2: Slot<VisualTrait>,
    pub visual3: Slot<VisualTrait>,
    pub visual4: Slot<VisualTrait>,
    pub spare: Slot<SpareTrait>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HeroGenes {
    pub stats: StatGenes,
    pub visual: VisualGenes,
}

/// Decodes an arbitrary-precision decimal gene string into 12 base-32
/// digit groups of 4, padded left to 48 digits. Never panics: a malformed
/// (non-numeric) string simply yields an error, everything numeric decodes
/// total.
fn digits(raw: &str) -> anyhow::Result<[u8; PADDED_LEN]> {
    let value = raw
        .parse::<BigUint>()
        .map_err(|e| anyhow::anyhow!("gene string '{raw}' is not a valid non-negative integer: {e}"))?;

    let mut out = [0u8; PADDED_LEN];
    let mut remaining = value;
    let base = BigUint::from(32u32);
    let mut idx = PADDED_LEN;
    while !remaining.is_zero() && idx > 0 {
        idx -= 1;
        let (q, r) = (&remaining / &base, &remaining % &base);
        out[idx] = r
            .to_bytes_le()
            .first()
            .copied()
            .unwrap_or(0);
        remaining = q;
    }
    Ok(out)
}

fn slot_of<T, F: Fn(u8) -> T>(group: &[u8], from_id: F) -> Slot<T> {
    // wire order within the group is R3, R2, R1, D
    Slot {
        r3: from_id(group[0]),
        r2: from_id(group[1]),
        r1: from_id(group[2]),
        d: from_id(group[3]),
    }
}

/// Decodes the stat-gene string into the 12 stat slots.
pub fn decode_stat_genes(stat_genes: &str) -> anyhow::Result<StatGenes> {
    let d = digits(stat_genes)?;
    let g: Vec<&[u8]> = d.chunks(4).collect();
    debug_assert_eq!(g.len(), SLOT_COUNT);
    Ok(StatGenes {
        class: slot_of(g[0], ClassTrait::from_id),
        sub_class: slot_of(g[1], SubClassTrait::from_id),
        profession: slot_of(g[2], ProfessionTrait::from_id),
        passive1: slot_of(g[3], PassiveTrait::from_id),
        passive2: slot_of(g[4], PassiveTrait::from_id),
        active1: slot_of(g[5], ActiveTrait::from_id),
        active2: slot_of(g[6], ActiveTrait::from_id),
        stat_boost1: slot_of(g[7], StatBoostTrait::from_id),
        stat_boost2: slot_of(g[8], StatBoostTrait::from_id),
        stats_growth1: slot_of(g[9], StatsGrowthTrait::from_id),
        stats_growth2: slot_of(g[10], StatsGrowthTrait::from_id),
        spare: slot_of(g[11], SpareTrait::from_id),
    })
}

/// Decodes the visual-gene string into the 12 visual slots.
pub fn decode_visual_genes(visual_genes: &str) -> anyhow::Result<VisualGenes> {
    let d = digits(visual_genes)?;
    let g: Vec<&[u8]> = d.chunks(4).collect();
    debug_assert_eq!(g.len(), SLOT_COUNT);
    Ok(VisualGenes {
        gender: slot_of(g[0], GenderTrait::from_id),
        background: slot_of(g[1], BackgroundTrait::from_id),
        shape: slot_of(g[2], ShapeTrait::from_id),
        eye_color: slot_of(g[3], ColorTrait::from_id),
        skin_color: slot_of(g[4], ColorTrait::from_id),
        hair_style: slot_of(g[5], ShapeTrait::from_id),
        hair_color: slot_of(g[6], ColorTrait::from_id),
        visual1: slot_of(g[7], VisualTrait::from_id),
        visual2: slot_of(g[8], VisualTrait::from_id),
        visual3: slot_of(g[9], VisualTrait::from_id),
        visual4: slot_of(g[10], VisualTrait::from_id),
        spare: slot_of(g[11], SpareTrait::from_id),
    })
}

pub fn decode(stat_genes: &str, visual_genes: &str) -> anyhow::Result<HeroGenes> {
    Ok(HeroGenes {
        stats: decode_stat_genes(stat_genes)?,
        visual: decode_visual_genes(visual_genes)?,
    })
}

/// True iff `profession` matches any of D/R1/R2/R3 in the profession slot.
pub fn has_profession_gene(decoded: &StatGenes, profession: ProfessionTrait) -> bool {
    decoded.profession.contains(|t| t == profession)
}

/// `alphabet()` is exposed for anything (e.g. the CLI's `decode-gene`
/// pretty-printer) that wants to render the intermediate base-32 digits.
pub fn alphabet_char(id: u8) -> char {
    ALPHABET[id as usize % ALPHABET.len()] as char
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_STAT_GENES: &str =
        "443792905345577883435573444901078008651685812390002810708884933276869006";

    #[test]
    fn decoder_is_deterministic() {
        let a = decode_stat_genes(KNOWN_STAT_GENES).unwrap();
        let b = decode_stat_genes(KNOWN_STAT_GENES).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn known_vector_decodes_to_expected_class_and_profession() {
        let stats = decode_stat_genes(KNOWN_STAT_GENES).unwrap();
        assert_eq!(stats.class.d, ClassTrait::Ninja);
        assert_eq!(stats.class.r1, ClassTrait::Monk);
        assert_eq!(stats.class.r2, ClassTrait::Knight);
        assert_eq!(stats.class.r3, ClassTrait::Berserker);
        assert_eq!(stats.sub_class.d, SubClassTrait::Seer);
        assert_eq!(stats.profession.d, ProfessionTrait::Fishing);
    }

    #[test]
    fn has_profession_gene_checks_all_four_positions() {
        let stats = decode_stat_genes(KNOWN_STAT_GENES).unwrap();
        assert!(has_profession_gene(&stats, ProfessionTrait::Fishing));
        assert!(!has_profession_gene(&stats, ProfessionTrait::Mining));
    }

    #[test]
    fn rejects_non_numeric_input_without_panicking() {
        assert!(decode_stat_genes("not-a-number").is_err());
    }

    #[test]
    fn zero_gene_string_decodes_to_all_zero_ids() {
        let stats = decode_stat_genes("0").unwrap();
        assert_eq!(stats.class.d, ClassTrait::Warrior);
        assert_eq!(stats.spare.d, SpareTrait::None_);
    }
}
