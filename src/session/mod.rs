//! Persistent channel protocol.
//!
//! # Data Flow
//! ```text
//! text frame
//!     → message.rs (decode envelope, validate per type)
//!     → state.rs (auth gate, dispatch through the proxy)
//!     → Outcome (reply / silent / close) handed back to the transport
//! ```
//!
//! The transport (`http::websocket`) owns the socket; this module never
//! touches it, so every transition can be driven directly in tests.

pub mod message;
pub mod state;

pub use state::{AuthState, Outcome, Session, SessionId, SessionSettings};
