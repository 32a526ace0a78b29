//! Per-surface protocol session.
//!
//! One [`Session`] mediates between one untrusted game surface and one
//! engine instance. It is the sole writer of outbound events and the only
//! path by which surface input reaches the engine; the surface can never
//! invoke anything except through the validated message contract.
//!
//! Inbound handling is strictly ordered for spin requests: initialization,
//! rate limit, bet bounds, balance, then the single-flight policy. The first
//! failing check wins and nothing after it runs, so a rejected request never
//! mutates state.

use commonware_codec::ReadExt;
use reelgate_engine::{ChainAdapter, Engine, EngineError, EngineEvent, Signer};
use reelgate_types::protocol::{ConfigSummary, ErrorCode, Event, Outcome, Request};
use reelgate_types::SpinOutcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A protocol session bound to one game surface.
pub struct Session<C: ChainAdapter, S: Signer> {
    engine: Arc<Engine<C, S>>,
    outbound: mpsc::UnboundedSender<Event>,
    /// When set, inbound frames from any other origin are rejected before
    /// validation.
    trusted_origin: Option<String>,
    cooldown: Duration,
    initialized: bool,
    last_accepted_spin: Option<Instant>,
}

impl<C: ChainAdapter, S: Signer> Session<C, S> {
    /// Bind a session to an engine and its event stream.
    ///
    /// Spawns the forwarding task that converts engine events into protocol
    /// pushes; the returned receiver carries everything destined for the
    /// surface.
    pub fn new(
        engine: Arc<Engine<C, S>>,
        engine_events: mpsc::UnboundedReceiver<EngineEvent>,
        trusted_origin: Option<String>,
    ) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (outbound, receiver) = mpsc::unbounded_channel();
        let cooldown = engine.config().spin_cooldown();
        tokio::spawn(forward_engine_events(engine_events, outbound.clone()));
        (
            Self {
                engine,
                outbound,
                trusted_origin,
                cooldown,
                initialized: false,
                last_accepted_spin: None,
            },
            receiver,
        )
    }

    /// Establish the session: bind the engine and push the initial state
    /// (configuration plus balance).
    ///
    /// Idempotent; calling again re-sends the current state.
    pub async fn initialize(&mut self) {
        if self.initialized {
            debug!("session already initialized; re-sending state");
        }
        self.push(Event::Config(ConfigSummary::from(self.engine.config())));
        let (balance, available) = match self.engine.refresh_balance().await {
            Ok(balances) => balances,
            Err(err) => {
                // Balance display degrades to the last-known figure rather
                // than failing initialization.
                warn!(error = %err, "initial balance refresh failed; using cached");
                self.engine.balances().await
            }
        };
        self.push(Event::BalanceUpdate {
            balance,
            available_balance: available,
        });
        self.initialized = true;
    }

    /// Handle one raw inbound frame from the surface.
    ///
    /// Origin (when configured) is checked before anything else; then the
    /// frame must decode to a known request shape in full, with no trailing
    /// bytes, before any field is trusted.
    pub async fn handle_frame(&mut self, origin: Option<&str>, frame: &[u8]) {
        if let Some(trusted) = self.trusted_origin.as_deref() {
            if origin != Some(trusted) {
                warn!(?origin, "dropping frame from unauthorized origin");
                self.push(Event::error(
                    ErrorCode::UnauthorizedOrigin,
                    "origin not allowed",
                    None,
                ));
                return;
            }
        }

        let mut reader = frame;
        let request = match Request::read(&mut reader) {
            Ok(request) if reader.is_empty() => request,
            _ => {
                self.push(Event::error(
                    ErrorCode::InvalidMessage,
                    "unrecognized or malformed message",
                    None,
                ));
                return;
            }
        };
        self.handle_request(request).await;
    }

    /// Dispatch a validated request.
    pub async fn handle_request(&mut self, request: Request) {
        match request {
            Request::Init { contract_id } => {
                if let Some(contract_id) = contract_id {
                    if contract_id != self.engine.config().contract_id {
                        self.push(Event::error(
                            ErrorCode::InitFailed,
                            format!("unknown contract: {contract_id}"),
                            None,
                        ));
                        return;
                    }
                }
                self.initialize().await;
            }
            Request::SpinRequest {
                paylines,
                bet_per_line,
                request_id,
            } => {
                self.handle_spin(paylines, bet_per_line, request_id).await;
            }
            Request::GetBalance => {
                let (balance, available) = match self.engine.refresh_balance().await {
                    Ok(balances) => balances,
                    Err(err) => {
                        // Never hard-fail a balance request.
                        warn!(error = %err, "balance refresh failed; serving cached");
                        self.engine.balances().await
                    }
                };
                self.push(Event::BalanceResponse {
                    balance,
                    available_balance: available,
                });
            }
            Request::GetConfig => {
                self.push(Event::Config(ConfigSummary::from(self.engine.config())));
            }
        }
    }

    /// Ordered spin-request checks; the first failure short-circuits.
    async fn handle_spin(&mut self, paylines: u8, bet_per_line: u64, request_id: Option<u64>) {
        if !self.initialized {
            self.push(Event::error(
                ErrorCode::NotInitialized,
                "session not initialized",
                request_id,
            ));
            return;
        }

        if let Some(last) = self.last_accepted_spin {
            if last.elapsed() < self.cooldown {
                self.push(Event::error(
                    ErrorCode::RateLimit,
                    format!(
                        "at most one spin per {}ms",
                        self.cooldown.as_millis()
                    ),
                    request_id,
                ));
                return;
            }
        }

        if let Err(err) = self.engine.validate_bet(bet_per_line, paylines) {
            self.push(Event::error(
                ErrorCode::InvalidRequest,
                err.to_string(),
                request_id,
            ));
            return;
        }

        let total_bet = bet_per_line.saturating_mul(paylines as u64);
        let (_, available) = self.engine.balances().await;
        if total_bet > available {
            self.push(Event::error(
                ErrorCode::InsufficientBalance,
                format!("total bet {total_bet} exceeds available balance {available}"),
                request_id,
            ));
            return;
        }

        // Single spin in flight per surface; the engine's queue may hold
        // more, but not through this boundary.
        if self.engine.has_active_spin().await {
            self.push(Event::error(
                ErrorCode::AlreadySpinning,
                "a spin is already in flight",
                request_id,
            ));
            return;
        }

        match self.engine.clone().spin(bet_per_line, paylines).await {
            Ok(spin_id) => {
                self.last_accepted_spin = Some(Instant::now());
                debug!(spin_id, total_bet, "spin accepted");
            }
            // The engine re-validates independently; mirror its verdicts.
            Err(EngineError::InvalidBet(message)) => {
                self.push(Event::error(ErrorCode::InvalidRequest, message, request_id));
            }
            Err(EngineError::InsufficientBalance {
                required,
                available,
            }) => {
                self.push(Event::error(
                    ErrorCode::InsufficientBalance,
                    format!("total bet {required} exceeds available balance {available}"),
                    request_id,
                ));
            }
            Err(err) => {
                self.push(Event::error(
                    ErrorCode::MessageHandlerError,
                    err.to_string(),
                    request_id,
                ));
            }
        }
    }

    fn push(&self, event: Event) {
        if self.outbound.send(event).is_err() {
            debug!("outbound receiver dropped");
        }
    }
}

/// Convert engine events into protocol pushes.
async fn forward_engine_events(
    mut engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    outbound: mpsc::UnboundedSender<Event>,
) {
    while let Some(event) = engine_events.recv().await {
        let event = match event {
            EngineEvent::SpinSubmitted { spin_id, tx_id } => {
                Event::SpinSubmitted { spin_id, tx_id }
            }
            EngineEvent::Outcome(outcome) => Event::Outcome(outcome_push(outcome)),
            EngineEvent::Balance {
                balance,
                available_balance,
            } => Event::BalanceUpdate {
                balance,
                available_balance,
            },
            EngineEvent::SpinFailed { reason, .. } => {
                Event::error(ErrorCode::SpinFailed, reason, None)
            }
        };
        if outbound.send(event).is_err() {
            break;
        }
    }
}

fn outcome_push(outcome: SpinOutcome) -> Outcome {
    let winnings = outcome.total_payout;
    let is_win = outcome.is_win();
    let win_level = outcome.win_level();
    let total_bet = outcome.total_bet();
    Outcome {
        spin_id: outcome.spin_id,
        grid: outcome.grid,
        winnings,
        is_win,
        winning_lines: outcome.winning_lines,
        win_level,
        bet_per_line: outcome.bet_per_line,
        paylines: outcome.paylines,
        total_bet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::Encode;
    use reelgate_engine::mocks::{SimChain, SimSigner};
    use reelgate_types::GameConfig;

    const STARTING_BALANCE: u64 = 1_000;

    fn build(
        starting_balance: u64,
        trusted_origin: Option<&str>,
    ) -> (
        Session<SimChain, SimSigner>,
        mpsc::UnboundedReceiver<Event>,
        SimChain,
    ) {
        let config = GameConfig::standard();
        let chain = SimChain::new(config.clone(), starting_balance, 42);
        let signer = SimSigner::new(7);
        let (engine, engine_events) = Engine::new(config, chain.clone(), signer).unwrap();
        let (session, outbound) = Session::new(
            engine,
            engine_events,
            trusted_origin.map(str::to_string),
        );
        (session, outbound, chain)
    }

    async fn next_event(outbound: &mut mpsc::UnboundedReceiver<Event>) -> Event {
        outbound.recv().await.expect("outbound closed")
    }

    async fn expect_error(outbound: &mut mpsc::UnboundedReceiver<Event>, code: ErrorCode) {
        let Event::Error {
            code: actual,
            recoverable,
            ..
        } = next_event(outbound).await
        else {
            panic!("expected error event");
        };
        assert_eq!(actual, code);
        assert_eq!(recoverable, code.recoverable());
    }

    async fn initialized_session(
        starting_balance: u64,
    ) -> (
        Session<SimChain, SimSigner>,
        mpsc::UnboundedReceiver<Event>,
        SimChain,
    ) {
        let (mut session, mut outbound, chain) = build(starting_balance, None);
        session.initialize().await;
        let Event::Config(_) = next_event(&mut outbound).await else {
            panic!("expected config push");
        };
        let Event::BalanceUpdate { balance, .. } = next_event(&mut outbound).await else {
            panic!("expected balance push");
        };
        assert_eq!(balance, starting_balance);
        (session, outbound, chain)
    }

    #[tokio::test]
    async fn test_initialize_pushes_config_and_balance() {
        let (_session, _outbound, _chain) = initialized_session(STARTING_BALANCE).await;
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let (mut session, mut outbound, _) = initialized_session(STARTING_BALANCE).await;
        // Second INIT re-sends current state, nothing else.
        session
            .handle_request(Request::Init { contract_id: None })
            .await;
        assert!(matches!(next_event(&mut outbound).await, Event::Config(_)));
        assert!(matches!(
            next_event(&mut outbound).await,
            Event::BalanceUpdate { .. }
        ));
    }

    #[tokio::test]
    async fn test_init_rejects_unknown_contract() {
        let (mut session, mut outbound, _) = build(STARTING_BALANCE, None);
        session
            .handle_request(Request::Init {
                contract_id: Some("other.contract".to_string()),
            })
            .await;
        expect_error(&mut outbound, ErrorCode::InitFailed).await;
    }

    #[tokio::test]
    async fn test_spin_before_init_rejected() {
        let (mut session, mut outbound, chain) = build(STARTING_BALANCE, None);
        session
            .handle_request(Request::SpinRequest {
                paylines: 9,
                bet_per_line: 10,
                request_id: Some(1),
            })
            .await;
        expect_error(&mut outbound, ErrorCode::NotInitialized).await;
        assert_eq!(chain.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_spin_flows_through_to_outcome() {
        let (mut session, mut outbound, _) = initialized_session(STARTING_BALANCE).await;
        session
            .handle_request(Request::SpinRequest {
                paylines: 9,
                bet_per_line: 10,
                request_id: None,
            })
            .await;

        let Event::SpinSubmitted { tx_id, .. } = next_event(&mut outbound).await else {
            panic!("expected SpinSubmitted");
        };
        assert!(tx_id.is_some());
        let Event::Outcome(outcome) = next_event(&mut outbound).await else {
            panic!("expected Outcome");
        };
        assert_eq!(outcome.total_bet, 90);
        assert_eq!(outcome.is_win, outcome.winnings > 0);
        assert!(matches!(
            next_event(&mut outbound).await,
            Event::BalanceUpdate { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_one_acceptance_per_window() {
        let (mut session, mut outbound, chain) = initialized_session(STARTING_BALANCE).await;

        let spin = Request::SpinRequest {
            paylines: 1,
            bet_per_line: 1,
            request_id: None,
        };
        session.handle_request(spin.clone()).await;
        // Drain the accepted spin to terminal state.
        loop {
            if matches!(next_event(&mut outbound).await, Event::BalanceUpdate { .. }) {
                break;
            }
        }

        // Inside the cooldown window: rejected, chain untouched.
        let submissions = chain.submission_count();
        session.handle_request(spin.clone()).await;
        expect_error(&mut outbound, ErrorCode::RateLimit).await;
        assert_eq!(chain.submission_count(), submissions);

        // After the window: accepted again.
        tokio::time::advance(Duration::from_millis(1_001)).await;
        session.handle_request(spin).await;
        assert!(matches!(
            next_event(&mut outbound).await,
            Event::SpinSubmitted { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_spin_in_flight() {
        let (mut session, mut outbound, chain) = initialized_session(STARTING_BALANCE).await;
        chain.stall_claims(true);

        session
            .handle_request(Request::SpinRequest {
                paylines: 1,
                bet_per_line: 1,
                request_id: None,
            })
            .await;
        assert!(matches!(
            next_event(&mut outbound).await,
            Event::SpinSubmitted { .. }
        ));

        // Outside the cooldown window but still in flight.
        tokio::time::advance(Duration::from_millis(1_001)).await;
        session
            .handle_request(Request::SpinRequest {
                paylines: 1,
                bet_per_line: 1,
                request_id: Some(2),
            })
            .await;
        expect_error(&mut outbound, ErrorCode::AlreadySpinning).await;
        assert_eq!(chain.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_bounds_rejected_before_chain() {
        let (mut session, mut outbound, chain) = initialized_session(STARTING_BALANCE).await;
        session
            .handle_request(Request::SpinRequest {
                paylines: 10, // max is 9
                bet_per_line: 1,
                request_id: None,
            })
            .await;
        expect_error(&mut outbound, ErrorCode::InvalidRequest).await;
        assert_eq!(chain.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_balance_rejected_before_chain() {
        let (mut session, mut outbound, chain) = initialized_session(50).await;
        session
            .handle_request(Request::SpinRequest {
                paylines: 9,
                bet_per_line: 10,
                request_id: None,
            })
            .await;
        expect_error(&mut outbound, ErrorCode::InsufficientBalance).await;
        assert_eq!(chain.submission_count(), 0);
        assert_eq!(chain.balance_snapshot(), 50);
    }

    #[tokio::test]
    async fn test_get_balance_degrades_to_cached() {
        let (mut session, mut outbound, chain) = initialized_session(STARTING_BALANCE).await;

        // A dead chain must not fail the request.
        chain.fail_balance_reads(true);
        session.handle_request(Request::GetBalance).await;
        let Event::BalanceResponse { balance, .. } = next_event(&mut outbound).await else {
            panic!("expected BalanceResponse");
        };
        assert_eq!(balance, STARTING_BALANCE);
    }

    #[tokio::test]
    async fn test_get_config_needs_no_chain() {
        let (mut session, mut outbound, _) = build(STARTING_BALANCE, None);
        session.handle_request(Request::GetConfig).await;
        let Event::Config(summary) = next_event(&mut outbound).await else {
            panic!("expected Config");
        };
        assert_eq!(summary.max_paylines, 9);
    }

    #[tokio::test]
    async fn test_malformed_frame_rejected() {
        let (mut session, mut outbound, _) = initialized_session(STARTING_BALANCE).await;

        // Unknown tag.
        session.handle_frame(None, &[0xFF]).await;
        expect_error(&mut outbound, ErrorCode::InvalidMessage).await;

        // Trailing garbage after a valid request.
        let mut frame = Request::GetConfig.encode().to_vec();
        frame.push(0);
        session.handle_frame(None, &frame).await;
        expect_error(&mut outbound, ErrorCode::InvalidMessage).await;

        // Truncated request.
        let frame = Request::SpinRequest {
            paylines: 1,
            bet_per_line: 1,
            request_id: None,
        }
        .encode();
        session.handle_frame(None, &frame[..frame.len() - 1]).await;
        expect_error(&mut outbound, ErrorCode::InvalidMessage).await;
    }

    #[tokio::test]
    async fn test_unauthorized_origin_dropped_before_validation() {
        let (mut session, mut outbound, chain) =
            build(STARTING_BALANCE, Some("https://game.example"));

        let frame = Request::GetConfig.encode();
        session.handle_frame(Some("https://evil.example"), &frame[..]).await;
        expect_error(&mut outbound, ErrorCode::UnauthorizedOrigin).await;

        session.handle_frame(None, &frame[..]).await;
        expect_error(&mut outbound, ErrorCode::UnauthorizedOrigin).await;

        // The trusted origin passes through to normal handling.
        session
            .handle_frame(Some("https://game.example"), &frame[..])
            .await;
        assert!(matches!(next_event(&mut outbound).await, Event::Config(_)));
        assert_eq!(chain.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_spin_failure_surfaces_as_recoverable_error() {
        let (mut session, mut outbound, chain) = initialized_session(STARTING_BALANCE).await;
        chain.fail_submissions(true);

        session
            .handle_request(Request::SpinRequest {
                paylines: 1,
                bet_per_line: 1,
                request_id: None,
            })
            .await;
        expect_error(&mut outbound, ErrorCode::SpinFailed).await;
        assert!(matches!(
            next_event(&mut outbound).await,
            Event::BalanceUpdate { .. }
        ));
    }
}
