//! Subdomain reverse proxy library.
//!
//! Each origin server is addressed by a DNS label under the proxy's own
//! domain: a request for `<label>.<proxy-domain>/path` is forwarded to the
//! origin the label encodes. Redirects and Bearer auth challenges are
//! rewritten so clients keep talking to the proxy domain only.

pub mod addressing;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rewrite;

pub use addressing::{AddressingStrategy, HostCodec, Label, MappingStore, Origin};
pub use config::schema::ProxyConfig;
pub use http::{Forwarder, HttpServer};
pub use lifecycle::Shutdown;
pub use rewrite::{AuthChallengeRewriter, PublicDomain};
