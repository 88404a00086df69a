//! Thrift binary protocol constants

/// Strict binary protocol version marker (high 16 bits of the header word)
pub const VERSION_1: u32 = 0x8001_0000;

/// Mask selecting the version bits of the header word
pub const VERSION_MASK: u32 = 0xffff_0000;

/// Mask selecting the message type of the header word
pub const TYPE_MASK: u32 = 0x0000_00ff;

/// Upper bound on a single string/binary payload (256 MB).
///
/// Length fields above this are rejected before allocation so a corrupted
/// or hostile reply cannot trigger a huge buffer.
pub const MAX_STRING_LENGTH: usize = 256 * 1024 * 1024;

/// Upper bound on list/set/map element counts
pub const MAX_CONTAINER_SIZE: usize = 64 * 1024 * 1024;

/// Maximum nesting depth accepted when skipping unknown fields
pub const MAX_SKIP_DEPTH: usize = 64;

/// Message types
pub mod message_type {
    /// Request
    pub const CALL: u8 = 1;

    /// Successful or declared-exception response
    pub const REPLY: u8 = 2;

    /// TApplicationException response
    pub const EXCEPTION: u8 = 3;

    /// One-way request (no response)
    pub const ONEWAY: u8 = 4;
}

/// Field type ids
pub mod ttype {
    /// End of struct
    pub const STOP: u8 = 0;
    /// Void
    pub const VOID: u8 = 1;
    /// Boolean
    pub const BOOL: u8 = 2;
    /// Signed byte
    pub const BYTE: u8 = 3;
    /// 64-bit float
    pub const DOUBLE: u8 = 4;
    /// 16-bit int
    pub const I16: u8 = 6;
    /// 32-bit int
    pub const I32: u8 = 8;
    /// 64-bit int
    pub const I64: u8 = 10;
    /// String / binary
    pub const STRING: u8 = 11;
    /// Struct
    pub const STRUCT: u8 = 12;
    /// Map
    pub const MAP: u8 = 13;
    /// Set
    pub const SET: u8 = 14;
    /// List
    pub const LIST: u8 = 15;
}

/// Remote method names (BeeswaxService and ImpalaService)
pub mod method {
    /// BeeswaxService.query
    pub const QUERY: &str = "query";
    /// BeeswaxService.get_state
    pub const GET_STATE: &str = "get_state";
    /// BeeswaxService.fetch
    pub const FETCH: &str = "fetch";
    /// BeeswaxService.close
    pub const CLOSE: &str = "close";
    /// BeeswaxService.get_log
    pub const GET_LOG: &str = "get_log";
    /// ImpalaService.Cancel
    pub const CANCEL: &str = "Cancel";
}

/// TStatus codes
pub mod status_code {
    /// Success
    pub const OK: i32 = 0;
}
