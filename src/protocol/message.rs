//! Protocol message types

use super::constants::{method, status_code};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque server-issued token identifying one submitted query
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryHandle {
    /// Query id
    pub id: String,
    /// Log context, used with `get_log`
    pub log_context: String,
}

impl fmt::Display for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Beeswax query submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// SQL text
    pub query: String,
    /// Server-side configuration overlay (`key=value` entries)
    pub configuration: Vec<String>,
    /// User to run the query as
    pub hadoop_user: Option<String>,
}

/// Server-side query state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryState {
    /// Created
    Created,
    /// Initialized
    Initialized,
    /// Planned
    Compiled,
    /// Executing
    Running,
    /// Results ready (terminal)
    Finished,
    /// Failed (terminal)
    Exception,
}

impl QueryState {
    /// Map the wire enum value
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Created),
            1 => Some(Self::Initialized),
            2 => Some(Self::Compiled),
            3 => Some(Self::Running),
            4 => Some(Self::Finished),
            5 => Some(Self::Exception),
            _ => None,
        }
    }

    /// Wire enum value
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Created => 0,
            Self::Initialized => 1,
            Self::Compiled => 2,
            Self::Running => 3,
            Self::Finished => 4,
            Self::Exception => 5,
        }
    }

    /// Whether polling can stop
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Exception)
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Initialized => write!(f, "initialized"),
            Self::Compiled => write!(f, "compiled"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
            Self::Exception => write!(f, "exception"),
        }
    }
}

/// One fetched batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Results {
    /// False when the server has no rows ready yet
    pub ready: bool,
    /// Column labels
    pub columns: Vec<String>,
    /// Tab-separated text rows
    pub data: Vec<String>,
    /// Index of the first row in this batch
    pub start_row: i64,
    /// More rows remain after this batch
    pub has_more: bool,
}

/// Server status returned by `Cancel`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TStatus {
    /// 0 = OK
    pub status_code: i32,
    /// Error messages
    pub error_msgs: Vec<String>,
}

impl TStatus {
    /// Whether the status reports success
    pub fn is_ok(&self) -> bool {
        self.status_code == status_code::OK
    }
}

impl fmt::Display for TStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}", self.status_code)?;
        if !self.error_msgs.is_empty() {
            write!(f, ": {}", self.error_msgs.join("; "))?;
        }
        Ok(())
    }
}

/// Declared exception raised by Beeswax calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeeswaxException {
    /// Human-readable message
    pub message: String,
    /// Log context
    pub log_context: String,
    /// Handle of the query concerned, if any
    pub handle: Option<QueryHandle>,
    /// Error code
    pub error_code: Option<i32>,
    /// SQLSTATE
    pub sql_state: Option<String>,
}

impl fmt::Display for BeeswaxException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref state) = self.sql_state {
            write!(f, " (SQLSTATE {})", state)?;
        }
        Ok(())
    }
}

/// Thrift TApplicationException
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationException {
    /// Message
    pub message: String,
    /// Exception kind (1 = unknown method, 6 = internal error, ...)
    pub kind: i32,
}

impl fmt::Display for ApplicationException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (kind {})", self.message, self.kind)
    }
}

/// Remote method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Submit a query
    Query,
    /// Poll query state
    GetState,
    /// Fetch a batch
    Fetch,
    /// Release a finished query
    Close,
    /// Read the query log
    GetLog,
    /// Cancel a running query
    Cancel,
}

impl Method {
    /// Wire name
    pub fn name(self) -> &'static str {
        match self {
            Self::Query => method::QUERY,
            Self::GetState => method::GET_STATE,
            Self::Fetch => method::FETCH,
            Self::Close => method::CLOSE,
            Self::GetLog => method::GET_LOG,
            Self::Cancel => method::CANCEL,
        }
    }

    /// Look up by wire name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            method::QUERY => Some(Self::Query),
            method::GET_STATE => Some(Self::GetState),
            method::FETCH => Some(Self::Fetch),
            method::CLOSE => Some(Self::Close),
            method::GET_LOG => Some(Self::GetLog),
            method::CANCEL => Some(Self::Cancel),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Call (client → server)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `query(1: Query)`
    Query(Query),

    /// `get_state(1: QueryHandle)`
    GetState(QueryHandle),

    /// `fetch(1: QueryHandle, 2: bool, 3: i32)`
    Fetch {
        /// Query handle
        handle: QueryHandle,
        /// Restart from the first row
        start_over: bool,
        /// Rows requested
        fetch_size: i32,
    },

    /// `close(1: QueryHandle)`
    Close(QueryHandle),

    /// `get_log(1: string)`
    GetLog(String),

    /// `Cancel(1: QueryHandle)`
    Cancel(QueryHandle),
}

impl Call {
    /// Method invoked by this call
    pub fn method(&self) -> Method {
        match self {
            Call::Query(_) => Method::Query,
            Call::GetState(_) => Method::GetState,
            Call::Fetch { .. } => Method::Fetch,
            Call::Close(_) => Method::Close,
            Call::GetLog(_) => Method::GetLog,
            Call::Cancel(_) => Method::Cancel,
        }
    }
}

/// Successful reply (server → client)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Handle for the submitted query
    Query(QueryHandle),
    /// Current state
    GetState(QueryState),
    /// Row batch
    Fetch(Results),
    /// Void
    Close,
    /// Log text
    GetLog(String),
    /// Cancel status
    Cancel(TStatus),
}

impl Reply {
    /// Method this reply answers
    pub fn method(&self) -> Method {
        match self {
            Reply::Query(_) => Method::Query,
            Reply::GetState(_) => Method::GetState,
            Reply::Fetch(_) => Method::Fetch,
            Reply::Close => Method::Close,
            Reply::GetLog(_) => Method::GetLog,
            Reply::Cancel(_) => Method::Cancel,
        }
    }
}

/// Failure reported by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Declared BeeswaxException
    Beeswax(BeeswaxException),
    /// Declared QueryNotFoundException
    QueryNotFound,
    /// Undeclared failure (EXCEPTION message)
    Application(ApplicationException),
}

impl From<RemoteError> for crate::Error {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Beeswax(e) => crate::Error::Beeswax(e),
            RemoteError::QueryNotFound => crate::Error::QueryNotFound,
            RemoteError::Application(e) => crate::Error::Application(e),
        }
    }
}

/// Decoded call with its sequence id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEnvelope {
    /// Sequence id
    pub seqid: i32,
    /// Call
    pub call: Call,
}

/// Decoded reply with its sequence id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
    /// Method answered
    pub method: Method,
    /// Sequence id
    pub seqid: i32,
    /// Outcome
    pub outcome: Result<Reply, RemoteError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_state_wire_values() {
        for value in 0..=5 {
            let state = QueryState::from_i32(value).unwrap();
            assert_eq!(state.as_i32(), value);
        }
        assert_eq!(QueryState::from_i32(6), None);
        assert!(QueryState::Finished.is_terminal());
        assert!(QueryState::Exception.is_terminal());
        assert!(!QueryState::Running.is_terminal());
    }

    #[test]
    fn test_method_names() {
        assert_eq!(Method::Cancel.name(), "Cancel");
        assert_eq!(Method::from_name("get_state"), Some(Method::GetState));
        assert_eq!(Method::from_name("ExecuteStatement"), None);
    }

    #[test]
    fn test_tstatus_display() {
        let status = TStatus {
            status_code: 1,
            error_msgs: vec!["Invalid query handle".into()],
        };
        assert!(!status.is_ok());
        assert_eq!(status.to_string(), "code 1: Invalid query handle");
    }
}
