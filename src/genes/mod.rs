//! L2 — the hero gene decoder. A pure, deterministic transform from the
//! two opaque 256-bit gene strings into a structured trait matrix; no I/O,
//! no panics on well-formed input.

pub mod decode;
pub mod tables;

pub use decode::{decode, decode_stat_genes, decode_visual_genes, has_profession_gene, HeroGenes, Slot, StatGenes, VisualGenes};
pub use tables::*;
