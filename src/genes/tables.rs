//! Slot-to-enum tables for the gene decoder. These are versioned constants:
//! each table maps a raw gene id (0..31) to a named trait; ids with no
//! entry resolve to the `Unknown(id)` sentinel rather than failing decode.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

macro_rules! gene_table {
    ($name:ident { $($id:literal => $variant:ident),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
        #[serde(tag = "trait", content = "id")]
        pub enum $name {
            $($variant,)+
            /// A gene id with no entry in this version of the table.
            Unknown(u8),
        }

        impl $name {
            pub fn from_id(id: u8) -> Self {
                match id {
                    $($id => $name::$variant,)+
                    other => $name::Unknown(other),
                }
            }
        }
    };
}

gene_table!(ClassTrait {
    0 => Warrior,
    1 => Knight,
    2 => Thief,
    3 => Archer,
    4 => Priest,
    5 => Wizard,
    6 => Monk,
    7 => Pirate,
    8 => Berserker,
    9 => Seer,
    10 => Legionnaire,
    11 => Scholar,
    12 => Paladin,
    13 => DarkKnight,
    14 => Summoner,
    15 => Bard,
    16 => Dragoon,
    17 => Sage,
    18 => DreadKnight,
    19 => Ninja,
    20 => Spellbow,
    21 => Shapeshifter,
});

gene_table!(SubClassTrait {
    0 => Novice,
    1 => Apprentice,
    2 => Adept,
    3 => Journeyman,
    4 => Expert,
    5 => Veteran,
    6 => Elite,
    7 => Master,
    8 => Grandmaster,
    9 => Seer,
    10 => Oracle,
    11 => Mystic,
});

gene_table!(ProfessionTrait {
    0 => Mining,
    1 => Gardening,
    2 => Foraging,
    3 => Forestry,
    4 => Fishing,
});

gene_table!(PassiveTrait {
    0 => Basic1,
    1 => Basic2,
    2 => Advanced1,
    3 => Advanced2,
    4 => Elite1,
    5 => Elite2,
    6 => Exalted1,
    7 => Exalted2,
});

gene_table!(ActiveTrait {
    0 => Basic1,
    1 => Basic2,
    2 => Advanced1,
    3 => Advanced2,
    4 => Elite1,
    5 => Elite2,
    6 => Exalted1,
    7 => Exalted2,
});

gene_table!(StatBoostTrait {
    0 => Strength,
    1 => Endurance,
    2 => Agility,
    3 => Wisdom,
    4 => Luck,
    5 => Vitality,
    6 => Dexterity,
    7 => Intelligence,
});

gene_table!(StatsGrowthTrait {
    0 => Fast,
    1 => Average,
    2 => Slow,
    3 => Stunted,
});

gene_table!(SpareTrait {
    0 => None_,
});

gene_table!(GenderTrait {
    0 => Male,
    1 => Female,
});

gene_table!(BackgroundTrait {
    0 => Plains,
    1 => Forest,
    2 => Desert,
    3 => Mountain,
    4 => Swamp,
    5 => Snow,
});

gene_table!(ShapeTrait {
    0 => Slim,
    1 => Average,
    2 => Stout,
});

gene_table!(ColorTrait {
    0 => Black,
    1 => Brown,
    2 => Blonde,
    3 => Red,
    4 => White,
    5 => Blue,
    6 => Green,
    7 => Purple,
    8 => Pink,
    9 => Grey,
});

gene_table!(VisualTrait {
    0 => None_,
    1 => Pattern1,
    2 => Pattern2,
    3 => Pattern3,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ids_resolve_to_named_variants() {
        assert_eq!(ClassTrait::from_id(19), ClassTrait::Ninja);
        assert_eq!(ClassTrait::from_id(6), ClassTrait::Monk);
        assert_eq!(ClassTrait::from_id(1), ClassTrait::Knight);
        assert_eq!(ClassTrait::from_id(8), ClassTrait::Berserker);
        assert_eq!(SubClassTrait::from_id(9), SubClassTrait::Seer);
        assert_eq!(ProfessionTrait::from_id(4), ProfessionTrait::Fishing);
    }

    #[test]
    fn unmapped_id_resolves_to_unknown_sentinel() {
        assert_eq!(ProfessionTrait::from_id(31), ProfessionTrait::Unknown(31));
    }
}
