//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware layers)
//!     → cors.rs (pre-flight short-circuit, CORS headers)
//!     → handlers.rs | validate.rs | websocket.rs
//!     → proxy dispatch core, or forward.rs for pass-through routes
//!     → response.rs (JSON bodies, error mapping)
//!     → Send to client
//! ```

pub mod cors;
pub mod forward;
pub mod handlers;
pub mod request;
pub mod response;
pub mod server;
pub mod validate;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
