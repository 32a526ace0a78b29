//! WebSocket service binding for the bridge.
//!
//! Each connection is one sandboxed game surface: the upgrade is gated by
//! HTTP Origin validation and a connection limit, then the socket gets its
//! own engine instance and protocol session. Outbound pushes flow through a
//! bounded writer with a send timeout so one stuck client cannot wedge the
//! service.

use crate::session::Session;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State as AxumState,
    },
    http::{header::ORIGIN, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use commonware_codec::Encode;
use futures::{SinkExt, StreamExt};
use reelgate_engine::{ChainAdapter, Engine, Signer};
use reelgate_types::protocol::ConfigSummary;
use reelgate_types::GameConfig;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Service-level settings, separate from the game configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceConfig {
    /// Origins allowed to connect. Empty allows any origin; `*` is explicit
    /// wildcard. Exactly one entry additionally pins the per-session trusted
    /// origin, so frames from anywhere else are rejected at the protocol
    /// layer too.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Whether to accept connections without an Origin header (non-browser
    /// clients).
    #[serde(default = "default_allow_no_origin")]
    pub allow_no_origin: bool,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_ws_send_timeout_ms")]
    pub ws_send_timeout_ms: u64,
}

fn default_allow_no_origin() -> bool {
    true
}

fn default_max_connections() -> usize {
    256
}

fn default_ws_send_timeout_ms() -> u64 {
    2_000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_no_origin: default_allow_no_origin(),
            max_connections: default_max_connections(),
            ws_send_timeout_ms: default_ws_send_timeout_ms(),
        }
    }
}

impl ServiceConfig {
    /// The single trusted origin, when exactly one non-wildcard origin is
    /// configured.
    pub fn single_trusted_origin(&self) -> Option<String> {
        match self.allowed_origins.as_slice() {
            [origin] if origin != "*" => Some(origin.clone()),
            _ => None,
        }
    }
}

/// Validate the HTTP Origin header against the configured allow-list.
///
/// Returns the origin (if any) for session-level enforcement, or `Err` when
/// the connection must be refused.
fn validate_origin(headers: &HeaderMap, config: &ServiceConfig) -> Result<Option<String>, ()> {
    let origin = match headers.get(ORIGIN) {
        Some(value) => match value.to_str() {
            Ok(origin) => origin.to_string(),
            Err(_) => {
                warn!("invalid Origin header encoding");
                return Err(());
            }
        },
        None => {
            if config.allow_no_origin {
                debug!("no Origin header; allowing non-browser client");
                return Ok(None);
            }
            warn!("connection rejected: missing Origin header");
            return Err(());
        }
    };

    if config.allowed_origins.is_empty()
        || config.allowed_origins.iter().any(|allowed| allowed == "*")
        || config.allowed_origins.iter().any(|allowed| *allowed == origin)
    {
        debug!(%origin, "origin validated");
        return Ok(Some(origin));
    }

    warn!(%origin, "origin rejected");
    Err(())
}

struct ConnectionGuard {
    active: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    fn try_acquire(active: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        let mut current = active.load(Ordering::SeqCst);
        loop {
            if current >= max {
                return None;
            }
            match active.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    return Some(Self {
                        active: Arc::clone(active),
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The bridge service: one engine per connected surface, collaborators built
/// by the injected factory.
pub struct Service<F> {
    config: Arc<ServiceConfig>,
    game: Arc<GameConfig>,
    factory: F,
    active: Arc<AtomicUsize>,
}

impl<F> Clone for Service<F>
where
    F: Clone,
{
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            game: Arc::clone(&self.game),
            factory: self.factory.clone(),
            active: Arc::clone(&self.active),
        }
    }
}

impl<C, S, F> Service<F>
where
    C: ChainAdapter,
    S: Signer,
    F: Fn() -> (C, S) + Clone + Send + Sync + 'static,
{
    pub fn new(config: ServiceConfig, game: GameConfig, factory: F) -> Self {
        Self {
            config: Arc::new(config),
            game: Arc::new(game),
            factory,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn router(&self) -> Router {
        let cors = if self.config.allowed_origins.is_empty()
            || self.config.allowed_origins.iter().any(|o| o == "*")
        {
            CorsLayer::new().allow_origin(AllowOrigin::any())
        } else {
            let origins = self
                .config
                .allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(%origin, "invalid origin in allow-list");
                        None
                    }
                })
                .collect::<Vec<_>>();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        };

        let summary = ConfigSummary::from(&*self.game);
        Router::new()
            .route("/game", get(game_ws::<C, S, F>))
            .route("/healthz", get(|| async { "OK" }))
            .route(
                "/config",
                get(move || {
                    let summary = summary.clone();
                    async move { Json(summary) }
                }),
            )
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }
}

async fn game_ws<C, S, F>(
    AxumState(service): AxumState<Service<F>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse
where
    C: ChainAdapter,
    S: Signer,
    F: Fn() -> (C, S) + Clone + Send + Sync + 'static,
{
    let origin = match validate_origin(&headers, &service.config) {
        Ok(origin) => origin,
        Err(()) => return (StatusCode::FORBIDDEN, "Origin not allowed").into_response(),
    };

    let Some(guard) = ConnectionGuard::try_acquire(&service.active, service.config.max_connections)
    else {
        return (StatusCode::TOO_MANY_REQUESTS, "connection limit reached").into_response();
    };

    ws.on_upgrade(move |socket| handle_game_ws(socket, service, origin, guard))
        .into_response()
}

async fn handle_game_ws<C, S, F>(
    socket: WebSocket,
    service: Service<F>,
    origin: Option<String>,
    _guard: ConnectionGuard,
) where
    C: ChainAdapter,
    S: Signer,
    F: Fn() -> (C, S) + Clone + Send + Sync + 'static,
{
    info!(?origin, "game surface connected");
    let (chain, signer) = (service.factory)();
    let (engine, engine_events) = match Engine::new((*service.game).clone(), chain, signer) {
        Ok(built) => built,
        Err(err) => {
            // The configuration is validated at startup, so this indicates a
            // deployment fault; nothing useful can be served.
            warn!(error = %err, "engine construction failed");
            return;
        }
    };
    let (mut session, mut outbound) = Session::new(
        engine,
        engine_events,
        service.config.single_trusted_origin(),
    );

    let send_timeout = Duration::from_millis(service.config.ws_send_timeout_ms);
    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Binary(frame))) => {
                        session.handle_frame(origin.as_deref(), &frame).await;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Text(_))) => {
                        // The protocol is binary-only; a text frame cannot be
                        // a valid message.
                        session.handle_frame(origin.as_deref(), &[]).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!("surface closed connection");
                        break;
                    }
                    Some(Err(err)) => {
                        debug!(error = %err, "websocket error");
                        break;
                    }
                    None => break,
                }
            }
            event = outbound.recv() => {
                let Some(event) = event else { break };
                let frame = event.encode().to_vec();
                match timeout(send_timeout, sink.send(Message::Binary(frame))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => {
                        debug!("surface disconnected during send");
                        break;
                    }
                    Err(_) => {
                        warn!("websocket send timed out, closing connection");
                        break;
                    }
                }
            }
        }
    }
    let _ = sink.close().await;
    info!(?origin, "game surface disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_origin(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ORIGIN, HeaderValue::from_str(origin).unwrap());
        headers
    }

    #[test]
    fn test_origin_allowed_by_default() {
        let config = ServiceConfig::default();
        assert_eq!(
            validate_origin(&headers_with_origin("https://game.example"), &config),
            Ok(Some("https://game.example".to_string()))
        );
        assert_eq!(validate_origin(&HeaderMap::new(), &config), Ok(None));
    }

    #[test]
    fn test_origin_allow_list_enforced() {
        let config = ServiceConfig {
            allowed_origins: vec!["https://game.example".to_string()],
            ..Default::default()
        };
        assert!(validate_origin(&headers_with_origin("https://game.example"), &config).is_ok());
        assert!(validate_origin(&headers_with_origin("https://evil.example"), &config).is_err());
    }

    #[test]
    fn test_origin_wildcard() {
        let config = ServiceConfig {
            allowed_origins: vec!["*".to_string()],
            ..Default::default()
        };
        assert!(validate_origin(&headers_with_origin("https://anywhere.example"), &config).is_ok());
    }

    #[test]
    fn test_missing_origin_rejected_when_required() {
        let config = ServiceConfig {
            allow_no_origin: false,
            ..Default::default()
        };
        assert!(validate_origin(&HeaderMap::new(), &config).is_err());
    }

    #[test]
    fn test_single_trusted_origin() {
        let one = ServiceConfig {
            allowed_origins: vec!["https://game.example".to_string()],
            ..Default::default()
        };
        assert_eq!(
            one.single_trusted_origin(),
            Some("https://game.example".to_string())
        );

        let many = ServiceConfig {
            allowed_origins: vec!["https://a.example".to_string(), "https://b.example".to_string()],
            ..Default::default()
        };
        assert_eq!(many.single_trusted_origin(), None);

        let wildcard = ServiceConfig {
            allowed_origins: vec!["*".to_string()],
            ..Default::default()
        };
        assert_eq!(wildcard.single_trusted_origin(), None);
    }

    #[test]
    fn test_connection_guard_limits_and_releases() {
        let active = Arc::new(AtomicUsize::new(0));
        let first = ConnectionGuard::try_acquire(&active, 2).unwrap();
        let _second = ConnectionGuard::try_acquire(&active, 2).unwrap();
        assert!(ConnectionGuard::try_acquire(&active, 2).is_none());

        drop(first);
        assert!(ConnectionGuard::try_acquire(&active, 2).is_some());
    }
}
