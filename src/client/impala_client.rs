//! ImpalaClient implementation

use crate::connection::{Transport, TransportMode};
use crate::protocol::{
    decode_reply, encode_call, Call, Method, Query, QueryHandle, QueryState, Reply, Results,
    TStatus,
};
use crate::{Error, Result};
use bytes::{Buf, BytesMut};
use std::future::Future;
use std::io;
use std::time::{Duration, Instant};

/// Initial read buffer capacity
const READ_BUFFER_CAPACITY: usize = 64 * 1024;

/// Typed RPC client over one opened transport
///
/// Issues one request and waits for its reply; holds no query state. The
/// caller owns sequencing: calls take `&mut self`.
///
/// A call that does not end with its own reply fully read (I/O error,
/// timeout, dropped future, mismatched reply) poisons the client: the
/// request/reply pairing on the wire is lost, so every later call fails.
#[derive(Debug)]
pub struct ImpalaClient {
    transport: Transport,
    read_buf: BytesMut,
    seqid: i32,
    io_timeout: Option<Duration>,
    in_flight: bool,
}

impl ImpalaClient {
    /// Bind an opened transport
    pub fn new(transport: Transport, io_timeout: Option<Duration>) -> Self {
        Self {
            transport,
            read_buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            seqid: 0,
            io_timeout,
            in_flight: false,
        }
    }

    /// Whether an earlier call left the stream out of sync
    pub fn is_poisoned(&self) -> bool {
        self.in_flight
    }

    /// Mode of the underlying transport
    pub fn transport_mode(&self) -> &TransportMode {
        self.transport.mode()
    }

    /// Submit a query, returning its handle
    pub async fn query(&mut self, query: &Query) -> Result<QueryHandle> {
        match self.call(Call::Query(query.clone())).await? {
            Reply::Query(handle) => Ok(handle),
            other => Err(unexpected(Method::Query, &other)),
        }
    }

    /// Current state of a query
    pub async fn get_state(&mut self, handle: &QueryHandle) -> Result<QueryState> {
        match self.call(Call::GetState(handle.clone())).await? {
            Reply::GetState(state) => Ok(state),
            other => Err(unexpected(Method::GetState, &other)),
        }
    }

    /// Fetch up to `fetch_size` rows
    pub async fn fetch(
        &mut self,
        handle: &QueryHandle,
        start_over: bool,
        fetch_size: i32,
    ) -> Result<Results> {
        let call = Call::Fetch {
            handle: handle.clone(),
            start_over,
            fetch_size,
        };
        match self.call(call).await? {
            Reply::Fetch(results) => Ok(results),
            other => Err(unexpected(Method::Fetch, &other)),
        }
    }

    /// Release a query's server-side resources
    pub async fn close_query(&mut self, handle: &QueryHandle) -> Result<()> {
        match self.call(Call::Close(handle.clone())).await? {
            Reply::Close => Ok(()),
            other => Err(unexpected(Method::Close, &other)),
        }
    }

    /// Server-side log for a query's log context
    pub async fn get_log(&mut self, log_context: &str) -> Result<String> {
        match self.call(Call::GetLog(log_context.to_string())).await? {
            Reply::GetLog(log) => Ok(log),
            other => Err(unexpected(Method::GetLog, &other)),
        }
    }

    /// Cancel a running query
    ///
    /// A non-OK status is returned as `Error::Status`.
    pub async fn cancel(&mut self, handle: &QueryHandle) -> Result<TStatus> {
        match self.call(Call::Cancel(handle.clone())).await? {
            Reply::Cancel(status) if status.is_ok() => Ok(status),
            Reply::Cancel(status) => Err(Error::Status(status)),
            other => Err(unexpected(Method::Cancel, &other)),
        }
    }

    /// Shutdown the transport
    pub async fn shutdown(mut self) -> Result<()> {
        self.transport.shutdown().await
    }

    /// Send one call and wait for its reply
    async fn call(&mut self, call: Call) -> Result<Reply> {
        let method = call.method();
        let start = Instant::now();

        let result = self.round_trip(call).await;

        crate::metrics::histograms::rpc_duration(
            method.name(),
            start.elapsed().as_millis() as u64,
        );
        if let Err(ref e) = result {
            tracing::debug!(method = %method, error = %e, "rpc failed");
            crate::metrics::counters::rpc_error(method.name(), e.category());
        }
        result
    }

    async fn round_trip(&mut self, call: Call) -> Result<Reply> {
        if self.in_flight {
            return Err(Error::Protocol(
                "transport out of sync: an earlier call did not complete".into(),
            ));
        }

        let method = call.method();
        self.seqid = self.seqid.wrapping_add(1);
        let seqid = self.seqid;

        let buf = encode_call(&call, seqid)?;

        // Cleared only once the matching reply has been consumed
        self.in_flight = true;
        let io_timeout = self.io_timeout;
        let transport = &mut self.transport;
        with_timeout(io_timeout, async {
            transport.write_all(&buf).await?;
            transport.flush().await
        })
        .await?;

        let reply = self.receive_reply().await?;
        if reply.method != method {
            return Err(Error::Protocol(format!(
                "received {} reply while awaiting {}",
                reply.method, method
            )));
        }
        if reply.seqid != seqid {
            return Err(Error::Protocol(format!(
                "out-of-order reply: seqid {} while awaiting {}",
                reply.seqid, seqid
            )));
        }

        self.in_flight = false;
        reply.outcome.map_err(Error::from)
    }

    /// Receive a reply
    async fn receive_reply(&mut self) -> Result<crate::protocol::ReplyEnvelope> {
        loop {
            if !self.read_buf.is_empty() {
                match decode_reply(&self.read_buf) {
                    Ok((reply, consumed)) => {
                        self.read_buf.advance(consumed);
                        return Ok(reply);
                    }
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
                    Err(e) => return Err(Error::Protocol(e.to_string())),
                }
            }

            // Need more data
            self.read_buf.reserve(READ_BUFFER_CAPACITY);
            let read_buf = &mut self.read_buf;
            let transport = &mut self.transport;
            let n = with_timeout(self.io_timeout, transport.read_buf(read_buf)).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }
}

fn unexpected(method: Method, reply: &Reply) -> Error {
    Error::Protocol(format!(
        "{} call answered with a {} reply",
        method,
        reply.method()
    ))
}

/// Bound a socket operation by the configured I/O timeout
async fn with_timeout<F, T>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("socket operation timed out after {:?}", limit),
            ))),
        },
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let err = with_timeout(Some(Duration::from_millis(10)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, Error>(())
        })
        .await
        .unwrap_err();

        match err {
            Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_with_timeout_none_waits() {
        let value = with_timeout(None, async { Ok::<_, Error>(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_unexpected_reply_message() {
        let err = unexpected(Method::Fetch, &Reply::Close);
        assert_eq!(
            err.to_string(),
            "protocol error: fetch call answered with a close reply"
        );
    }
}
