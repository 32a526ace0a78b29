//! Deterministic grid reconstruction from chain randomness.
//!
//! ## Derivation
//!
//! For each reel `i`, the stop position is derived from the block seed and
//! bet key:
//! ```text
//! top[i] = u64_be(sha256(block_seed || bet_key || i || "reel_top")[..8]) % strip_len(i)
//! ```
//!
//! Both functions here are pure: identical inputs always produce identical
//! outputs, and nothing but the arguments is consulted. This is what allows
//! any third party to reproduce a grid from chain-public data alone.

use commonware_cryptography::sha256::Sha256;
use commonware_cryptography::Hasher;
use reelgate_types::{BetKey, BlockSeed, Grid, ReelLayout, ReelStrip};

/// Domain separator for reel-top derivation.
const REEL_TOP_TAG: &[u8] = b"reel_top";

/// Derive the stop position of every reel from the block seed and bet key.
///
/// One position per strip, each reduced modulo that strip's length.
pub fn generate_reel_tops(
    block_seed: &BlockSeed,
    bet_key: &BetKey,
    strips: &[ReelStrip],
) -> Vec<u32> {
    strips
        .iter()
        .enumerate()
        .map(|(reel, strip)| {
            let mut hasher = Sha256::new();
            hasher.update(block_seed.as_bytes());
            hasher.update(bet_key.as_bytes());
            hasher.update(&(reel as u32).to_be_bytes());
            hasher.update(REEL_TOP_TAG);
            let digest = hasher.finalize().0;

            let mut prefix = [0u8; 8];
            prefix.copy_from_slice(&digest[..8]);
            let raw = u64::from_be_bytes(prefix);
            (raw % strip.len() as u64) as u32
        })
        .collect()
}

/// Cut the visible window from each strip at the given stop positions.
///
/// Reads `layout.rows` symbols per reel starting at the reel's top, wrapping
/// around the strip. Returns `None` when `tops`/`strips` do not match the
/// layout (a configuration fault, not a runtime condition).
pub fn generate_grid(tops: &[u32], strips: &[ReelStrip], layout: ReelLayout) -> Option<Grid> {
    if tops.len() != layout.reels as usize || strips.len() != layout.reels as usize {
        return None;
    }
    if strips.iter().any(|strip| strip.is_empty()) {
        return None;
    }

    let mut symbols = Vec::with_capacity(layout.cells());
    for (reel, strip) in strips.iter().enumerate() {
        let top = tops[reel] as usize;
        for row in 0..layout.rows as usize {
            symbols.push(strip.symbol_at(top + row));
        }
    }
    Grid::new(layout, symbols)
}
