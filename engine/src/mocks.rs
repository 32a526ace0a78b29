//! Simulated chain and signer for tests and local development.
//!
//! `SimChain` honors the same seed-derivation scheme as the engine's grid
//! reconstructor, so spins settled against it verify end-to-end: the
//! post-spin balance it reports is derived from the exact grid any verifier
//! would reconstruct from the bet key and block seed it hands out.
//! Everything is deterministic from the construction seed.

use crate::chain::{ChainAdapter, ChainError, SignError, Signer, UnsignedBet};
use crate::paylines::{evaluate_paylines, total_payout};
use crate::reels::{generate_grid, generate_reel_tops};
use commonware_cryptography::ed25519::PrivateKey;
use commonware_cryptography::sha256::Sha256;
use commonware_cryptography::Hasher;
use commonware_math::algebra::Random;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reelgate_types::{
    BetKey, BetOrder, BetTransaction, BlockSeed, GameConfig, RawOutcome, SubmittedBet, TxId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

/// How often a stalled claim re-checks its release flag.
const STALL_POLL: Duration = Duration::from_millis(50);

fn derive_token(secret: &[u8; 32], tag: &[u8], index: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(&index.to_be_bytes());
    hasher.update(tag);
    hasher.finalize().0
}

struct SimChainState {
    balance: u64,
    height: u64,
    pending: HashMap<BetKey, BetOrder>,
}

struct SimChainInner {
    config: GameConfig,
    secret: [u8; 32],
    state: Mutex<SimChainState>,
    submissions: AtomicU64,
    fail_submissions: AtomicBool,
    fail_claims: AtomicBool,
    fail_balance_reads: AtomicBool,
    stall_claims: AtomicBool,
}

/// Deterministic in-process chain double.
#[derive(Clone)]
pub struct SimChain {
    inner: Arc<SimChainInner>,
}

impl SimChain {
    pub fn new(config: GameConfig, starting_balance: u64, seed: u64) -> Self {
        let secret = derive_token(&[0u8; 32], b"sim_chain_secret", seed);
        Self {
            inner: Arc::new(SimChainInner {
                config,
                secret,
                state: Mutex::new(SimChainState {
                    balance: starting_balance,
                    height: 0,
                    pending: HashMap::new(),
                }),
                submissions: AtomicU64::new(0),
                fail_submissions: AtomicBool::new(false),
                fail_claims: AtomicBool::new(false),
                fail_balance_reads: AtomicBool::new(false),
                stall_claims: AtomicBool::new(false),
            }),
        }
    }

    /// Make every subsequent submission fail.
    pub fn fail_submissions(&self, fail: bool) {
        self.inner.fail_submissions.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent claim fail.
    pub fn fail_claims(&self, fail: bool) {
        self.inner.fail_claims.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent balance read fail.
    pub fn fail_balance_reads(&self, fail: bool) {
        self.inner.fail_balance_reads.store(fail, Ordering::SeqCst);
    }

    /// Park claims until released (or the caller's claim window elapses).
    pub fn stall_claims(&self, stall: bool) {
        self.inner.stall_claims.store(stall, Ordering::SeqCst);
    }

    /// Bets the chain has accepted so far.
    pub fn submission_count(&self) -> u64 {
        self.inner.submissions.load(Ordering::SeqCst)
    }

    /// Current on-chain balance.
    pub fn balance_snapshot(&self) -> u64 {
        self.lock_state().balance
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SimChainState> {
        // Lock poisoning cannot occur: no holder panics.
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ChainAdapter for SimChain {
    async fn submit_bet(&self, bet: BetTransaction) -> Result<SubmittedBet, ChainError> {
        if self.inner.fail_submissions.load(Ordering::SeqCst) {
            return Err(ChainError::Unavailable("simulated submit failure".into()));
        }
        if !bet.verify() {
            return Err(ChainError::Rejected("bad signature".into()));
        }

        let mut state = self.lock_state();
        if bet.order.total_bet() > state.balance {
            return Err(ChainError::Rejected("insufficient on-chain funds".into()));
        }
        let index = self.inner.submissions.fetch_add(1, Ordering::SeqCst);
        let bet_key = BetKey::from(derive_token(&self.inner.secret, b"bet_key", index));
        let tx_id = TxId::from(derive_token(&self.inner.secret, b"tx_id", index));
        state.pending.insert(bet_key, bet.order);
        Ok(SubmittedBet {
            bet_key,
            tx_id: Some(tx_id),
        })
    }

    async fn await_outcome(&self, bet_key: BetKey) -> Result<RawOutcome, ChainError> {
        while self.inner.stall_claims.load(Ordering::SeqCst) {
            sleep(STALL_POLL).await;
        }
        if self.inner.fail_claims.load(Ordering::SeqCst) {
            return Err(ChainError::Unavailable("simulated claim failure".into()));
        }

        let mut state = self.lock_state();
        let order = state
            .pending
            .remove(&bet_key)
            .ok_or_else(|| ChainError::UnknownBet(bet_key.to_string()))?;

        state.height += 1;
        let block_number = state.height;
        let block_seed = BlockSeed::from(derive_token(&self.inner.secret, b"block_seed", block_number));

        // Settle exactly as the contract would: the payout follows from the
        // same reconstruction the engine and any verifier perform.
        let config = &self.inner.config;
        let tops = generate_reel_tops(&block_seed, &bet_key, &config.strips);
        let grid = generate_grid(&tops, &config.strips, config.layout)
            .ok_or_else(|| ChainError::Unavailable("misconfigured simulation".into()))?;
        let active = (order.paylines as usize).min(config.paylines.len());
        let lines = evaluate_paylines(
            &grid,
            &config.paylines[..active],
            &config.paytable,
            order.bet_per_line,
        );
        let payout = total_payout(&lines);

        state.balance = state
            .balance
            .saturating_sub(order.total_bet())
            .saturating_add(payout);

        Ok(RawOutcome {
            bet_key,
            block_seed,
            block_number,
            post_balance: state.balance,
        })
    }

    async fn balance(&self) -> Result<u64, ChainError> {
        if self.inner.fail_balance_reads.load(Ordering::SeqCst) {
            return Err(ChainError::Unavailable("simulated read failure".into()));
        }
        Ok(self.lock_state().balance)
    }
}

/// Signer over a deterministic ed25519 key.
#[derive(Clone)]
pub struct SimSigner {
    private: PrivateKey,
    fail: Arc<AtomicBool>,
}

impl SimSigner {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            private: PrivateKey::random(&mut rng),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_signing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Signer for SimSigner {
    async fn sign_transactions(
        &self,
        unsigned: Vec<UnsignedBet>,
    ) -> Result<Vec<BetTransaction>, SignError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SignError::Unavailable("simulated signer failure".into()));
        }
        Ok(unsigned
            .into_iter()
            .map(|bet| BetTransaction::sign(&self.private, bet.nonce, bet.order))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_bet(signer: &SimSigner, nonce: u64, bet_per_line: u64, paylines: u8) -> BetTransaction {
        BetTransaction::sign(
            &signer.private,
            nonce,
            BetOrder {
                bet_per_line,
                paylines,
            },
        )
    }

    #[tokio::test]
    async fn test_sim_chain_settles_deterministically() {
        let config = GameConfig::standard();
        let run = || async {
            let chain = SimChain::new(config.clone(), 1_000, 9);
            let signer = SimSigner::new(1);
            let submitted = chain.submit_bet(signed_bet(&signer, 0, 10, 9)).await.unwrap();
            chain.await_outcome(submitted.bet_key).await.unwrap()
        };
        assert_eq!(run().await, run().await);
    }

    #[tokio::test]
    async fn test_sim_chain_rejects_unknown_bet_key() {
        let chain = SimChain::new(GameConfig::standard(), 1_000, 9);
        let result = chain.await_outcome(BetKey::from([7u8; 32])).await;
        assert!(matches!(result, Err(ChainError::UnknownBet(_))));
    }

    #[tokio::test]
    async fn test_sim_chain_rejects_overdraft() {
        let chain = SimChain::new(GameConfig::standard(), 10, 9);
        let signer = SimSigner::new(1);
        let result = chain.submit_bet(signed_bet(&signer, 0, 10, 9)).await;
        assert!(matches!(result, Err(ChainError::Rejected(_))));
        assert_eq!(chain.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_sim_chain_rejects_bad_signature() {
        let chain = SimChain::new(GameConfig::standard(), 1_000, 9);
        let signer = SimSigner::new(1);
        let mut bet = signed_bet(&signer, 0, 10, 9);
        bet.order.bet_per_line = 999;
        let result = chain.submit_bet(bet).await;
        assert!(matches!(result, Err(ChainError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_sim_signer_produces_valid_transactions() {
        let signer = SimSigner::new(3);
        let signed = signer
            .sign_transactions(vec![
                UnsignedBet {
                    nonce: 0,
                    order: BetOrder {
                        bet_per_line: 5,
                        paylines: 3,
                    },
                },
                UnsignedBet {
                    nonce: 1,
                    order: BetOrder {
                        bet_per_line: 7,
                        paylines: 1,
                    },
                },
            ])
            .await
            .unwrap();
        assert_eq!(signed.len(), 2);
        assert!(signed.iter().all(BetTransaction::verify));
    }
}
