//! Collaborator seams: the chain adapter and the signer.
//!
//! The engine never talks to a chain client or a wallet directly; both are
//! injected at construction behind these traits and exclusively owned by one
//! engine instance. How transactions are broadcast, confirmed, or signed is
//! the collaborator's business; the engine only sees the values defined in
//! `reelgate_types::chain`.

use reelgate_types::{BetKey, BetOrder, BetTransaction, RawOutcome, SubmittedBet};
use std::future::Future;
use thiserror::Error;

/// Errors surfaced by a chain adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("bet rejected by chain: {0}")]
    Rejected(String),
    #[error("unknown bet key: {0}")]
    UnknownBet(String),
    #[error("chain unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by a signer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    #[error("signing rejected: {0}")]
    Rejected(String),
    #[error("signer unavailable: {0}")]
    Unavailable(String),
}

/// A bet awaiting signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnsignedBet {
    pub nonce: u64,
    pub order: BetOrder,
}

/// Gateway to the on-chain slot contract.
///
/// All methods suspend without blocking; their latency is unpredictable
/// (wallet prompts, block confirmation, outcome availability).
pub trait ChainAdapter: Send + Sync + 'static {
    /// Submit a signed bet; resolves once the chain acknowledges it.
    fn submit_bet(
        &self,
        bet: BetTransaction,
    ) -> impl Future<Output = Result<SubmittedBet, ChainError>> + Send;

    /// Await the settled outcome of a previously-submitted bet.
    fn await_outcome(
        &self,
        bet_key: BetKey,
    ) -> impl Future<Output = Result<RawOutcome, ChainError>> + Send;

    /// Authoritative wallet balance.
    fn balance(&self) -> impl Future<Output = Result<u64, ChainError>> + Send;
}

/// Holder of the wallet keys. The game surface never reaches this.
pub trait Signer: Send + Sync + 'static {
    fn sign_transactions(
        &self,
        unsigned: Vec<UnsignedBet>,
    ) -> impl Future<Output = Result<Vec<BetTransaction>, SignError>> + Send;
}
