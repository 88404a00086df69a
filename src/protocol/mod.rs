//! Beeswax / ImpalaService wire protocol
//!
//! Thrift strict binary encoding of the calls this client issues
//! (`query`, `get_state`, `fetch`, `close`, `get_log`, `Cancel`) and their
//! replies. Both directions are implemented so the codec can also drive a
//! scripted server.

pub mod constants;
pub mod decode;
pub mod encode;
pub mod message;

pub use decode::{decode_call, decode_reply};
pub use encode::{encode_call, encode_reply};
pub use message::{
    ApplicationException, BeeswaxException, Call, CallEnvelope, Method, Query, QueryHandle,
    QueryState, RemoteError, Reply, ReplyEnvelope, Results, TStatus,
};
