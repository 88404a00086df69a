//! Connection management
//!
//! This module handles:
//! * Transport establishment (buffered or SASL-authenticated TCP)
//! * Session lifecycle (connect, submit, cancel, close)
//! * State machine enforcement

mod config;
mod conn;
mod sasl;
mod state;
mod transport;

pub use config::{
    ConnectionConfig, ConnectionConfigBuilder, Options, DEFAULT_BUFFER_CAPACITY,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT,
};
pub use conn::Connection;
pub use sasl::{SaslTransport, MAX_FRAME_LENGTH};
pub use state::ConnectionState;
pub use transport::{Transport, TransportMode};
