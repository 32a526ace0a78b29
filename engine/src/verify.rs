//! Provably-fair outcome verification.
//!
//! Recomputes a claimed spin outcome from chain-public inputs alone (bet
//! key, block seed, game configuration) and compares grid and payout. No
//! wallet or session access is required, so any historical spin can be
//! audited offline.
//!
//! A mismatch is a reportable fact about the bet, not an application error:
//! the result is always a [`ProvablyFairData`] with `verified = false`,
//! never a panic or an `Err`.

use crate::paylines::{evaluate_paylines, total_payout};
use crate::reels::{generate_grid, generate_reel_tops};
use reelgate_types::{BetKey, BlockSeed, GameConfig, Grid, SpinOutcome};

/// Audit artifact produced by [`verify_spin_outcome`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvablyFairData {
    pub bet_key: BetKey,
    pub block_seed: BlockSeed,
    pub block_number: u64,
    pub reconstructed_reel_tops: Vec<u32>,
    pub reconstructed_grid: Option<Grid>,
    pub verified: bool,
    /// Human-readable recomputation log; auditable without re-running the
    /// algorithm.
    pub verification_steps: Vec<String>,
}

/// Independently recompute a claimed outcome and compare grid and payout.
///
/// `verified` is true only when both the reconstructed grid and the
/// recomputed total payout match the claim.
pub fn verify_spin_outcome(claimed: &SpinOutcome, config: &GameConfig) -> ProvablyFairData {
    let mut steps = Vec::new();

    let tops = generate_reel_tops(&claimed.block_seed, &claimed.bet_key, &config.strips);
    steps.push(format!(
        "derived reel tops {:?} from block seed {} and bet key {}",
        tops, claimed.block_seed, claimed.bet_key
    ));

    let grid = generate_grid(&tops, &config.strips, config.layout);
    let Some(grid) = grid else {
        steps.push(format!(
            "grid reconstruction failed: configuration does not fit layout {}x{}",
            config.layout.reels, config.layout.rows
        ));
        return ProvablyFairData {
            bet_key: claimed.bet_key,
            block_seed: claimed.block_seed,
            block_number: claimed.block_number,
            reconstructed_reel_tops: tops,
            reconstructed_grid: None,
            verified: false,
            verification_steps: steps,
        };
    };
    steps.push(format!(
        "reconstructed {}x{} grid from reel tops",
        config.layout.reels, config.layout.rows
    ));

    let grids_match = grid == claimed.grid;
    steps.push(format!(
        "grid comparison against claimed outcome: {}",
        if grids_match { "match" } else { "MISMATCH" }
    ));

    let active = (claimed.paylines as usize).min(config.paylines.len());
    let lines = evaluate_paylines(
        &grid,
        &config.paylines[..active],
        &config.paytable,
        claimed.bet_per_line,
    );
    let payout = total_payout(&lines);
    let payouts_match = payout == claimed.total_payout;
    steps.push(format!(
        "recomputed payout {} over {} active paylines (claimed {}): {}",
        payout,
        active,
        claimed.total_payout,
        if payouts_match { "match" } else { "MISMATCH" }
    ));

    let verified = grids_match && payouts_match;
    steps.push(format!(
        "verdict: {}",
        if verified { "verified" } else { "not verified" }
    ));

    ProvablyFairData {
        bet_key: claimed.bet_key,
        block_seed: claimed.block_seed,
        block_number: claimed.block_number,
        reconstructed_reel_tops: tops,
        reconstructed_grid: Some(grid),
        verified,
        verification_steps: steps,
    }
}
