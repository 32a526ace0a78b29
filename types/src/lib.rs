//! Common types used throughout reelgate.
//!
//! Everything that crosses a process or trust boundary lives here: the slot
//! grid/payline/paytable model, chain-facing bet types, game configuration,
//! and the game-surface message protocol. Wire types implement the codec
//! traits so boundaries can decode-and-validate before trusting any field.

pub mod chain;
pub mod codec;
pub mod config;
pub mod protocol;
pub mod slots;

pub use chain::{
    bet_namespace, BetKey, BetOrder, BetTransaction, BlockSeed, RawOutcome, SubmittedBet, TxId,
    CHAIN_TOKEN_LEN,
};
pub use config::{ConfigError, GameConfig, ReelStrip};
pub use protocol::{ConfigSummary, ErrorCode, Event, Outcome, Request};
pub use slots::{
    Grid, Paytable, PaytableEntry, PaylinePattern, ReelLayout, SpinOutcome, SymbolId, WinLevel,
    WinningLine,
};

/// Namespace under which all reelgate signatures are domain-separated.
pub const NAMESPACE: &[u8] = b"_REELGATE";
