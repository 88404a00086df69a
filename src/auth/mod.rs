//! Authentication
//!
//! SASL negotiation framing (Thrift SASL transport) and the PLAIN mechanism.
//! The keys below are read from the authentication configuration map passed
//! to [`Connection::connect`](crate::Connection::connect).

pub mod plain;
pub mod sasl;

pub use plain::{PlainClient, PlainError};
pub use sasl::{NegotiationStatus, SaslMechanism};

/// Selects the SASL transport and names the mechanism
pub const MECHANISM_KEY: &str = "mechanismName";

/// Service name entry, injected whenever SASL is selected
pub const SERVICE_KEY: &str = "service";

/// Fixed service identifier of the Impala daemon
pub const SERVICE_NAME: &str = "impala";

/// Authentication identity
pub const USERNAME_KEY: &str = "username";

/// Password for PLAIN
pub const PASSWORD_KEY: &str = "password";

/// Optional identity to act as
pub const AUTHORIZATION_ID_KEY: &str = "authorizationId";
