//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → forwarder.rs (resolve label → origin, dispatch, redirect hops)
//!     → transport.rs (one outbound hop, redirects never auto-followed)
//!     → response.rs (copy headers, stream body)
//!     → Send to client
//! ```

pub mod forwarder;
pub mod request;
pub mod response;
pub mod server;
pub mod transport;

pub use forwarder::{ForwardError, Forwarder, ProxiedRequest};
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
pub use transport::{ReqwestTransport, Transport, TransportError};
