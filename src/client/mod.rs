//! RPC client facade
//!
//! Binds an opened [`Transport`](crate::connection::Transport) to the Thrift
//! binary protocol and exposes the remote operations as typed async methods.

mod impala_client;

pub use impala_client::ImpalaClient;
