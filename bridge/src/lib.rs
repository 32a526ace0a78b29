//! Reelgate message bridge.
//!
//! The sole mediator between untrusted, sandboxed game surfaces and the
//! wallet-holding engine. [`session::Session`] implements the validated
//! message contract for one surface; [`ws::Service`] binds sessions to a
//! WebSocket endpoint with origin validation and connection limits.
//!
//! Side effects across the trust boundary are strictly one-directional: the
//! bridge reads engine state and invokes engine operations; the surface can
//! only speak the message protocol.

pub mod session;
pub mod ws;

pub use session::Session;
pub use ws::{Service, ServiceConfig};
