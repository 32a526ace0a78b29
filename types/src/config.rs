//! Immutable game configuration.
//!
//! A [`GameConfig`] fully describes one slot variant: grid shape, reel
//! strips, payline patterns, paytable, bet bounds, and the bridge/engine
//! timing knobs. Configurations are loaded from YAML at deployment and never
//! mutated at runtime; [`GameConfig::standard`] is the built-in 5×3 variant.

use crate::slots::{Paytable, PaytableEntry, PaylinePattern, ReelLayout, SymbolId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default cooldown between accepted spins.
pub const DEFAULT_SPIN_COOLDOWN_MS: u64 = 1_000;

/// Default window for claiming an outcome before the spin expires.
pub const DEFAULT_CLAIM_WINDOW_MS: u64 = 30_000;

/// Maximum contract identifier length accepted on the wire.
pub const MAX_CONTRACT_ID_LENGTH: usize = 64;

/// One reel strip: the full symbol cycle a reel stop is drawn from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReelStrip(pub Vec<SymbolId>);

impl ReelStrip {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Symbol at a wrapped position.
    pub fn symbol_at(&self, position: usize) -> SymbolId {
        self.0[position % self.0.len()]
    }
}

/// Errors raised when validating a loaded configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid layout: {reels}x{rows}")]
    InvalidLayout { reels: u8, rows: u8 },
    #[error("expected {expected} reel strips, found {found}")]
    StripCountMismatch { expected: u8, found: usize },
    #[error("reel strip {index} is empty")]
    EmptyStrip { index: usize },
    #[error("payline {index} does not fit the layout")]
    PaylineMismatch { index: usize },
    #[error("max_paylines {max_paylines} exceeds configured patterns ({patterns})")]
    MaxPaylinesOutOfRange { max_paylines: u8, patterns: usize },
    #[error("bet bounds are inverted: min {min_bet} > max {max_bet}")]
    InvertedBetBounds { min_bet: u64, max_bet: u64 },
    #[error("min_bet must be positive")]
    ZeroMinBet,
}

/// Full static configuration for one game variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// On-chain contract this configuration targets.
    pub contract_id: String,
    pub layout: ReelLayout,
    /// One strip per reel, in reel order.
    pub strips: Vec<ReelStrip>,
    pub paylines: Vec<PaylinePattern>,
    pub paytable: Paytable,
    /// Smallest-unit bet bounds per line.
    pub min_bet: u64,
    pub max_bet: u64,
    pub max_paylines: u8,
    /// Long-run return-to-player target, basis points.
    pub rtp_target_bps: u16,
    /// House edge, basis points.
    pub house_edge_bps: u16,
    #[serde(default = "default_spin_cooldown_ms")]
    pub spin_cooldown_ms: u64,
    #[serde(default = "default_claim_window_ms")]
    pub claim_window_ms: u64,
}

fn default_spin_cooldown_ms() -> u64 {
    DEFAULT_SPIN_COOLDOWN_MS
}

fn default_claim_window_ms() -> u64 {
    DEFAULT_CLAIM_WINDOW_MS
}

impl GameConfig {
    /// The built-in 5×3, 9-line fruit variant.
    pub fn standard() -> Self {
        use SymbolId::*;

        // Weighted toward low-pay symbols; one cycle per reel, offset so the
        // reels are not phase-aligned.
        let base_cycle = [
            Cherry, Blank, Lemon, Bar, Orange, Blank, Plum, Bell, Cherry, Blank, Seven, Lemon,
            Orange, Blank, Bell, Plum, Bar, Blank, Cherry, Diamond, Lemon, Blank, Orange, Plum,
            Bell, Blank, Bar, Cherry, Lemon, Blank, Seven, Orange,
        ];
        let strips = (0u8..5)
            .map(|reel| {
                let offset = reel as usize * 7;
                ReelStrip(
                    (0..base_cycle.len())
                        .map(|i| base_cycle[(i + offset) % base_cycle.len()])
                        .collect(),
                )
            })
            .collect();

        Self {
            contract_id: "reelgate.standard.v1".to_string(),
            layout: ReelLayout::new(5, 3),
            strips,
            paylines: vec![
                // Rows, then the classic diagonal and zigzag shapes.
                PaylinePattern(vec![1, 1, 1, 1, 1]),
                PaylinePattern(vec![0, 0, 0, 0, 0]),
                PaylinePattern(vec![2, 2, 2, 2, 2]),
                PaylinePattern(vec![0, 1, 2, 1, 0]),
                PaylinePattern(vec![2, 1, 0, 1, 2]),
                PaylinePattern(vec![0, 0, 1, 2, 2]),
                PaylinePattern(vec![2, 2, 1, 0, 0]),
                PaylinePattern(vec![1, 0, 1, 2, 1]),
                PaylinePattern(vec![1, 2, 1, 0, 1]),
            ],
            paytable: Paytable {
                entries: vec![
                    PaytableEntry { symbol: Cherry, three: 2, four: 5, five: 10 },
                    PaytableEntry { symbol: Lemon, three: 3, four: 8, five: 15 },
                    PaytableEntry { symbol: Orange, three: 4, four: 10, five: 20 },
                    PaytableEntry { symbol: Plum, three: 5, four: 15, five: 30 },
                    PaytableEntry { symbol: Bell, three: 10, four: 25, five: 60 },
                    PaytableEntry { symbol: Bar, three: 20, four: 50, five: 150 },
                    PaytableEntry { symbol: Seven, three: 50, four: 200, five: 500 },
                    PaytableEntry { symbol: Diamond, three: 100, four: 500, five: 2_000 },
                ],
                wild: None,
            },
            min_bet: 1,
            max_bet: 1_000,
            max_paylines: 9,
            rtp_target_bps: 9_500,
            house_edge_bps: 500,
            spin_cooldown_ms: DEFAULT_SPIN_COOLDOWN_MS,
            claim_window_ms: DEFAULT_CLAIM_WINDOW_MS,
        }
    }

    /// Check internal consistency. Run once at load time; the engine and
    /// bridge assume a validated configuration thereafter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.layout.is_valid() {
            return Err(ConfigError::InvalidLayout {
                reels: self.layout.reels,
                rows: self.layout.rows,
            });
        }
        if self.strips.len() != self.layout.reels as usize {
            return Err(ConfigError::StripCountMismatch {
                expected: self.layout.reels,
                found: self.strips.len(),
            });
        }
        for (index, strip) in self.strips.iter().enumerate() {
            if strip.is_empty() {
                return Err(ConfigError::EmptyStrip { index });
            }
        }
        for (index, pattern) in self.paylines.iter().enumerate() {
            if !pattern.fits(&self.layout) {
                return Err(ConfigError::PaylineMismatch { index });
            }
        }
        if self.max_paylines as usize > self.paylines.len() || self.max_paylines == 0 {
            return Err(ConfigError::MaxPaylinesOutOfRange {
                max_paylines: self.max_paylines,
                patterns: self.paylines.len(),
            });
        }
        if self.min_bet == 0 {
            return Err(ConfigError::ZeroMinBet);
        }
        if self.min_bet > self.max_bet {
            return Err(ConfigError::InvertedBetBounds {
                min_bet: self.min_bet,
                max_bet: self.max_bet,
            });
        }
        Ok(())
    }

    pub fn spin_cooldown(&self) -> Duration {
        Duration::from_millis(self.spin_cooldown_ms)
    }

    pub fn claim_window(&self) -> Duration {
        Duration::from_millis(self.claim_window_ms)
    }
}
