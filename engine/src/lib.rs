//! Reelgate spin lifecycle engine.
//!
//! This crate contains the deterministic evaluation pipeline (grid
//! reconstruction, payline evaluation, provably-fair verification) and the
//! spin/balance state machine ([`Engine`]) that drives bets through an
//! injected chain adapter and signer.
//!
//! ## Determinism requirements
//! - Grid reconstruction and payline evaluation consult nothing but their
//!   arguments; identical inputs always produce identical outputs.
//! - Monetary quantities are integral smallest units; no floating point.
//! - Balance is only ever set from an authoritative chain figure, never by
//!   local arithmetic alone.
//!
//! ## Suspension points
//! Bet submission, outcome claiming, and balance reads are the only awaits.
//! The evaluation pipeline is synchronous and pure, so it introduces no
//! ordering hazards.

pub mod chain;
pub mod engine;
pub mod paylines;
pub mod reels;
pub mod verify;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

pub use chain::{ChainAdapter, ChainError, SignError, Signer, UnsignedBet};
pub use engine::{Engine, EngineError, EngineEvent, GameState, QueuedSpin, SpinStatus};
pub use paylines::{evaluate_paylines, total_payout};
pub use reels::{generate_grid, generate_reel_tops};
pub use verify::{verify_spin_outcome, ProvablyFairData};

#[cfg(any(test, feature = "mocks"))]
pub use mocks::{SimChain, SimSigner};
