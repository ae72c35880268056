//! Rewriting of origin URLs into the proxy's public form.
//!
//! # Data Flow
//! ```text
//! absolute origin URL (redirect Location, auth realm)
//!     → Origin::from_url
//!     → AddressingStrategy::encode → Label
//!     → domain.rs: "<scheme>://<label>.<proxy-domain>[:port]<path>?<query>"
//! ```
//!
//! # Design Decisions
//! - Fail open: any failure keeps the original value and the response flows on
//! - Path, query and fragment of the original URL are carried over untouched

pub mod auth;
pub mod domain;

pub use auth::AuthChallengeRewriter;
pub use domain::PublicDomain;
