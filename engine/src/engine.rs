//! Spin/balance state machine.
//!
//! One engine instance owns the game state for one surface session: the
//! wallet balance mirror, and the queue of in-flight spins whose total bets
//! are reserved against it. Spins advance through
//! `QUEUED → SUBMITTED → WAITING_FOR_OUTCOME → {COMPLETED | FAILED |
//! EXPIRED}`; terminal spins are pruned from the queue immediately, which is
//! what releases their reservation.
//!
//! ## Balance discipline
//!
//! - `reserved_balance` is recomputed from live queue contents at every
//!   read; it is never cached or incrementally adjusted.
//! - `balance` is only ever set from an authoritative chain figure (a
//!   balance read or an outcome's post-balance), never by local arithmetic.
//!   Last authoritative read wins.

use crate::chain::{ChainAdapter, ChainError, Signer, UnsignedBet};
use crate::paylines::{evaluate_paylines, total_payout};
use crate::reels::{generate_grid, generate_reel_tops};
use reelgate_types::{BetOrder, ConfigError, GameConfig, SpinOutcome, TxId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

/// Lifecycle state of one queued spin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpinStatus {
    Queued,
    Submitted,
    WaitingForOutcome,
    Completed,
    Failed,
    Expired,
}

impl SpinStatus {
    /// Terminal spins may be pruned from the queue.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }
}

/// One spin owned by the engine, from acceptance to a terminal state.
#[derive(Clone, Debug)]
pub struct QueuedSpin {
    pub id: u64,
    pub order: BetOrder,
    pub status: SpinStatus,
    pub submitted_at: Instant,
}

/// Engine-owned state: balance mirror plus the spin queue.
#[derive(Clone, Debug, Default)]
pub struct GameState {
    pub balance: u64,
    pub spin_queue: Vec<QueuedSpin>,
}

impl GameState {
    /// Sum of outstanding bets; always derived from the live queue.
    pub fn reserved_balance(&self) -> u64 {
        self.spin_queue
            .iter()
            .filter(|spin| !spin.status.is_terminal())
            .fold(0u64, |total, spin| {
                total.saturating_add(spin.order.total_bet())
            })
    }

    /// Balance not earmarked by outstanding spins; never negative.
    pub fn available_balance(&self) -> u64 {
        self.balance.saturating_sub(self.reserved_balance())
    }

    pub fn has_active_spin(&self) -> bool {
        self.spin_queue
            .iter()
            .any(|spin| !spin.status.is_terminal())
    }
}

/// Events the engine pushes as spins advance. Delivery order per spin is
/// deterministic: `SpinSubmitted`, then `Outcome`/`SpinFailed`, then
/// `Balance`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    SpinSubmitted {
        spin_id: u64,
        tx_id: Option<TxId>,
    },
    Outcome(SpinOutcome),
    Balance {
        balance: u64,
        available_balance: u64,
    },
    SpinFailed {
        spin_id: u64,
        expired: bool,
        reason: String,
    },
}

/// Errors returned by engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    InvalidBet(String),
    #[error("insufficient balance: total bet {required} exceeds available {available}")]
    InsufficientBalance { required: u64, available: u64 },
}

/// Why a driven spin did not complete.
struct SpinFailure {
    expired: bool,
    reason: String,
}

impl SpinFailure {
    fn failed(reason: impl Into<String>) -> Self {
        Self {
            expired: false,
            reason: reason.into(),
        }
    }

    fn expired(reason: impl Into<String>) -> Self {
        Self {
            expired: true,
            reason: reason.into(),
        }
    }
}

/// The spin lifecycle engine.
///
/// Constructed with exclusively-owned collaborators; handed to the bridge as
/// an `Arc`. The bridge (and any other caller) reads state through accessor
/// methods and never mutates it directly.
pub struct Engine<C: ChainAdapter, S: Signer> {
    config: GameConfig,
    chain: C,
    signer: S,
    state: Mutex<GameState>,
    events: mpsc::UnboundedSender<EngineEvent>,
    next_spin_id: AtomicU64,
    next_nonce: AtomicU64,
}

impl<C: ChainAdapter, S: Signer> Engine<C, S> {
    /// Validate the configuration and build an engine plus its event stream.
    pub fn new(
        config: GameConfig,
        chain: C,
        signer: S,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<EngineEvent>), ConfigError> {
        config.validate()?;
        let (events, receiver) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            config,
            chain,
            signer,
            state: Mutex::new(GameState::default()),
            events,
            next_spin_id: AtomicU64::new(1),
            next_nonce: AtomicU64::new(0),
        });
        Ok((engine, receiver))
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Current `(balance, available_balance)` snapshot from local state.
    pub async fn balances(&self) -> (u64, u64) {
        let state = self.state.lock().await;
        (state.balance, state.available_balance())
    }

    pub async fn has_active_spin(&self) -> bool {
        self.state.lock().await.has_active_spin()
    }

    /// Check bet parameters against configured bounds.
    ///
    /// The engine re-validates independently of the bridge since it may be
    /// invoked by other internal callers.
    pub fn validate_bet(&self, bet_per_line: u64, paylines: u8) -> Result<(), EngineError> {
        if paylines == 0 || paylines > self.config.max_paylines {
            return Err(EngineError::InvalidBet(format!(
                "paylines must be between 1 and {}",
                self.config.max_paylines
            )));
        }
        if bet_per_line < self.config.min_bet || bet_per_line > self.config.max_bet {
            return Err(EngineError::InvalidBet(format!(
                "bet per line must be between {} and {}",
                self.config.min_bet, self.config.max_bet
            )));
        }
        Ok(())
    }

    /// Force an authoritative balance refresh from the chain.
    ///
    /// Returns the updated `(balance, available_balance)`. Pull-style: no
    /// `Balance` event is pushed; those are reserved for spin-driven
    /// changes.
    pub async fn refresh_balance(&self) -> Result<(u64, u64), ChainError> {
        let authoritative = self.chain.balance().await?;
        let mut state = self.state.lock().await;
        state.balance = authoritative;
        Ok((state.balance, state.available_balance()))
    }

    /// Accept a spin: validate, reserve the total bet, and drive the bet
    /// through the chain asynchronously. Returns the spin id immediately;
    /// the outcome arrives later as an event.
    pub async fn spin(self: Arc<Self>, bet_per_line: u64, paylines: u8) -> Result<u64, EngineError> {
        self.validate_bet(bet_per_line, paylines)?;
        let order = BetOrder {
            bet_per_line,
            paylines,
        };

        let spin_id = self.next_spin_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut state = self.state.lock().await;
            let required = order.total_bet();
            let available = state.available_balance();
            if required > available {
                return Err(EngineError::InsufficientBalance {
                    required,
                    available,
                });
            }
            state.spin_queue.push(QueuedSpin {
                id: spin_id,
                order,
                status: SpinStatus::Queued,
                submitted_at: Instant::now(),
            });
            debug!(
                spin_id,
                total_bet = required,
                reserved = state.reserved_balance(),
                "spin queued"
            );
        }

        let engine = Arc::clone(&self);
        tokio::spawn(async move { engine.drive(spin_id, order).await });
        Ok(spin_id)
    }

    /// Transition a stale spin to EXPIRED and release its reservation.
    ///
    /// Returns false when the spin is unknown or already terminal.
    pub async fn expire_spin(&self, spin_id: u64) -> bool {
        let Some((balance, available)) = self.release_spin(spin_id, SpinStatus::Expired).await
        else {
            return false;
        };
        warn!(spin_id, "spin expired by caller");
        self.emit(EngineEvent::SpinFailed {
            spin_id,
            expired: true,
            reason: "spin expired".to_string(),
        });
        self.emit(EngineEvent::Balance {
            balance,
            available_balance: available,
        });
        true
    }

    async fn drive(self: Arc<Self>, spin_id: u64, order: BetOrder) {
        if let Err(failure) = self.drive_inner(spin_id, order).await {
            let status = if failure.expired {
                SpinStatus::Expired
            } else {
                SpinStatus::Failed
            };
            let Some((balance, available)) = self.release_spin(spin_id, status).await else {
                // Already released (e.g. expired by a caller).
                return;
            };
            warn!(
                spin_id,
                expired = failure.expired,
                reason = %failure.reason,
                "spin did not complete"
            );
            self.emit(EngineEvent::SpinFailed {
                spin_id,
                expired: failure.expired,
                reason: failure.reason,
            });
            self.emit(EngineEvent::Balance {
                balance,
                available_balance: available,
            });
        }
    }

    async fn drive_inner(&self, spin_id: u64, order: BetOrder) -> Result<(), SpinFailure> {
        // Sign and submit. No state transition until the chain acknowledges.
        let nonce = self.next_nonce.fetch_add(1, Ordering::Relaxed);
        let mut signed = self
            .signer
            .sign_transactions(vec![UnsignedBet { nonce, order }])
            .await
            .map_err(|err| SpinFailure::failed(format!("signing failed: {err}")))?;
        let bet = signed
            .pop()
            .ok_or_else(|| SpinFailure::failed("signer returned no transactions"))?;
        let submitted = self
            .chain
            .submit_bet(bet)
            .await
            .map_err(|err| SpinFailure::failed(format!("submission failed: {err}")))?;

        self.set_status(spin_id, SpinStatus::Submitted).await;
        debug!(spin_id, bet_key = %submitted.bet_key, "bet submitted");
        self.emit(EngineEvent::SpinSubmitted {
            spin_id,
            tx_id: submitted.tx_id,
        });

        // Claim the outcome within the configured window; elapse is the
        // system's only timeout-driven transition.
        self.set_status(spin_id, SpinStatus::WaitingForOutcome).await;
        let raw = timeout(
            self.config.claim_window(),
            self.chain.await_outcome(submitted.bet_key),
        )
        .await
        .map_err(|_| SpinFailure::expired("claim window elapsed"))?
        .map_err(|err| SpinFailure::failed(format!("claim failed: {err}")))?;

        // Reconstruct and evaluate locally; the chain only reports the raw
        // randomness and the post-spin balance.
        let tops = generate_reel_tops(&raw.block_seed, &raw.bet_key, &self.config.strips);
        let grid = generate_grid(&tops, &self.config.strips, self.config.layout)
            .ok_or_else(|| SpinFailure::failed("grid reconstruction failed for configured layout"))?;
        let active = order.paylines as usize;
        let lines = evaluate_paylines(
            &grid,
            &self.config.paylines[..active],
            &self.config.paytable,
            order.bet_per_line,
        );
        let payout = total_payout(&lines);
        let outcome = SpinOutcome {
            spin_id,
            grid,
            winning_lines: lines,
            total_payout: payout,
            bet_per_line: order.bet_per_line,
            paylines: order.paylines,
            block_number: raw.block_number,
            block_seed: raw.block_seed,
            bet_key: raw.bet_key,
        };

        // Settle: adopt the authoritative post-spin balance and prune the
        // spin, releasing its reservation.
        let (balance, available) = {
            let mut state = self.state.lock().await;
            let Some(position) = state
                .spin_queue
                .iter()
                .position(|spin| spin.id == spin_id && !spin.status.is_terminal())
            else {
                debug!(spin_id, "outcome arrived for a released spin; discarding");
                return Ok(());
            };
            state.spin_queue.remove(position);
            state.balance = raw.post_balance;
            (state.balance, state.available_balance())
        };
        debug!(spin_id, payout, balance, "spin completed");
        self.emit(EngineEvent::Outcome(outcome));
        self.emit(EngineEvent::Balance {
            balance,
            available_balance: available,
        });
        Ok(())
    }

    async fn set_status(&self, spin_id: u64, status: SpinStatus) {
        let mut state = self.state.lock().await;
        if let Some(spin) = state
            .spin_queue
            .iter_mut()
            .find(|spin| spin.id == spin_id && !spin.status.is_terminal())
        {
            spin.status = status;
        }
    }

    /// Remove a non-terminal spin from the queue, releasing its reservation.
    /// Returns the post-release `(balance, available_balance)`.
    async fn release_spin(&self, spin_id: u64, status: SpinStatus) -> Option<(u64, u64)> {
        debug_assert!(status.is_terminal());
        let mut state = self.state.lock().await;
        let position = state
            .spin_queue
            .iter()
            .position(|spin| spin.id == spin_id && !spin.status.is_terminal())?;
        state.spin_queue.remove(position);
        Some((state.balance, state.available_balance()))
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            debug!("engine event receiver dropped");
        }
    }
}
