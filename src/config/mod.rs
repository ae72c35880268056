//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → passed by value into the forwarder, strategy and server at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; nothing reads it from ambient state
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    AddressingConfig, DomainConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    RedirectConfig, Strategy, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
