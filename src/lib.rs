//! impala-wire: async client for the Impala Beeswax query protocol
//!
//! The crate speaks the legacy submit-poll-fetch-close protocol over Thrift's
//! binary encoding. A [`Connection`] owns one transport (buffered, or SASL
//! authenticated) and at most one outstanding query handle. Submitting a query
//! hands back a [`RowSet`] that polls the query state and fetches row batches.
//!
//! ```no_run
//! # async fn example() -> impala_wire::Result<()> {
//! use impala_wire::{Connection, Options};
//! use std::collections::HashMap;
//!
//! let mut conn = Connection::connect("localhost", 21000, Options::DEFAULT, HashMap::new()).await?;
//!
//! let mut rows = conn.submit("SELECT 1").await?;
//! while let Some(row) = rows.next().await? {
//!     println!("{:?}", row.values());
//! }
//!
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod stream;

pub use client::ImpalaClient;
pub use connection::{Connection, ConnectionConfig, ConnectionState, Options, TransportMode};
pub use error::{Error, Result};
pub use protocol::{QueryHandle, QueryState};
pub use stream::{Row, RowSet};
