//! Scripted in-process Beeswax server
//!
//! Serves exactly one connection. Every decoded call is recorded and handed
//! to the test's handler, which decides the reply.

#![allow(dead_code)]

use bytes::{Buf, BytesMut};
use impala_wire::auth::sasl::{read_negotiation, write_negotiation};
use impala_wire::auth::NegotiationStatus;
use impala_wire::protocol::{
    decode_call, encode_reply, Call, Method, QueryHandle, QueryState, RemoteError, Reply,
    ReplyEnvelope, Results, TStatus,
};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// How the server treats one call
pub enum Response {
    /// Send this outcome back
    Reply(Result<Reply, RemoteError>),
    /// Send this outcome back after a pause
    Delayed(Duration, Result<Reply, RemoteError>),
    /// Never answer; keep reading
    Hang,
}

impl Response {
    pub fn ok(reply: Reply) -> Self {
        Response::Reply(Ok(reply))
    }

    pub fn err(err: RemoteError) -> Self {
        Response::Reply(Err(err))
    }

    pub fn late(delay: Duration, reply: Reply) -> Self {
        Response::Delayed(delay, Ok(reply))
    }
}

/// Server-side handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAuth {
    /// Plain buffered stream
    None,
    /// SASL negotiation, completing when `accept` is true
    Sasl { accept: bool },
}

/// Message sent with a rejected SASL negotiation
pub const REJECTION_MESSAGE: &str = "Error validating the login";

pub struct MockServer {
    pub port: u16,
    calls: Arc<Mutex<Vec<Call>>>,
    sasl: Arc<Mutex<Option<(String, Vec<u8>)>>>,
    closed: Option<oneshot::Receiver<()>>,
}

impl MockServer {
    /// Start a server answering through `handler`
    pub async fn start<F>(auth: ServerAuth, handler: F) -> Self
    where
        F: FnMut(&Call) -> Response + Send + 'static,
    {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sasl = Arc::new(Mutex::new(None));
        let (closed_tx, closed_rx) = oneshot::channel();

        let task_calls = Arc::clone(&calls);
        let task_sasl = Arc::clone(&sasl);
        tokio::spawn(async move {
            let (socket, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            let _ = serve(socket, auth, handler, task_calls, task_sasl).await;
            let _ = closed_tx.send(());
        });

        Self {
            port,
            calls,
            sasl,
            closed: Some(closed_rx),
        }
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Methods received so far, in order
    pub fn methods(&self) -> Vec<Method> {
        self.calls().iter().map(Call::method).collect()
    }

    /// Mechanism and initial response of the SASL exchange
    pub fn sasl_exchange(&self) -> Option<(String, Vec<u8>)> {
        self.sasl.lock().unwrap().clone()
    }

    /// Wait until the client side of the connection went away
    pub async fn wait_closed(&mut self) -> bool {
        match self.closed.take() {
            Some(rx) => tokio::time::timeout(Duration::from_secs(5), rx)
                .await
                .map(|r| r.is_ok())
                .unwrap_or(false),
            None => true,
        }
    }
}

async fn serve<F>(
    mut socket: TcpStream,
    auth: ServerAuth,
    mut handler: F,
    calls: Arc<Mutex<Vec<Call>>>,
    sasl: Arc<Mutex<Option<(String, Vec<u8>)>>>,
) -> io::Result<()>
where
    F: FnMut(&Call) -> Response,
{
    let framed = match auth {
        ServerAuth::None => false,
        ServerAuth::Sasl { accept } => {
            let (_, mechanism) = read_negotiation(&mut socket).await.map_err(to_io)?;
            let (_, initial) = read_negotiation(&mut socket).await.map_err(to_io)?;
            *sasl.lock().unwrap() =
                Some((String::from_utf8_lossy(&mechanism).into_owned(), initial));

            if !accept {
                write_negotiation(&mut socket, NegotiationStatus::Bad, REJECTION_MESSAGE.as_bytes())
                    .await
                    .map_err(to_io)?;
                // Wait for the client to hang up
                let mut rest = Vec::new();
                socket.read_to_end(&mut rest).await?;
                return Ok(());
            }
            write_negotiation(&mut socket, NegotiationStatus::Complete, b"")
                .await
                .map_err(to_io)?;
            true
        }
    };

    let mut buf = BytesMut::with_capacity(4096);
    loop {
        let envelope = loop {
            if !buf.is_empty() {
                match decode_call(&buf) {
                    Ok((envelope, consumed)) => {
                        buf.advance(consumed);
                        break envelope;
                    }
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
                    Err(e) => return Err(e),
                }
            }
            let n = if framed {
                read_frame(&mut socket, &mut buf).await?
            } else {
                socket.read_buf(&mut buf).await?
            };
            if n == 0 {
                return Ok(());
            }
        };

        let method = envelope.call.method();
        calls.lock().unwrap().push(envelope.call.clone());

        let outcome = match handler(&envelope.call) {
            Response::Reply(outcome) => outcome,
            Response::Delayed(delay, outcome) => {
                tokio::time::sleep(delay).await;
                outcome
            }
            Response::Hang => continue,
        };
        let reply = encode_reply(&ReplyEnvelope {
            method,
            seqid: envelope.seqid,
            outcome,
        })?;

        if framed {
            socket.write_u32(reply.len() as u32).await?;
        }
        socket.write_all(&reply).await?;
        socket.flush().await?;
    }
}

async fn read_frame(socket: &mut TcpStream, buf: &mut BytesMut) -> io::Result<usize> {
    let len = match socket.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut payload = vec![0u8; len];
    socket.read_exact(&mut payload).await?;
    buf.extend_from_slice(&payload);
    Ok(len.max(1))
}

fn to_io(err: impala_wire::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

/// Route library logs to the test output (`RUST_LOG=impala_wire=debug`)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A query handle with matching log context
pub fn handle(id: &str) -> QueryHandle {
    QueryHandle {
        id: id.to_string(),
        log_context: format!("ctx-{}", id),
    }
}

/// A ready batch of tab-separated rows
pub fn batch(columns: &[&str], rows: &[&str], start_row: i64, has_more: bool) -> Results {
    Results {
        ready: true,
        columns: columns.iter().map(|c| c.to_string()).collect(),
        data: rows.iter().map(|r| r.to_string()).collect(),
        start_row,
        has_more,
    }
}

/// OK cancel status
pub fn status_ok() -> TStatus {
    TStatus::default()
}

/// Handler for the common submit/cancel/poll/fetch/close flow
pub fn happy_path(id: &'static str) -> impl FnMut(&Call) -> Response + Send + 'static {
    move |call| match call {
        Call::Query(_) => Response::ok(Reply::Query(handle(id))),
        Call::GetState(_) => Response::ok(Reply::GetState(QueryState::Finished)),
        Call::Fetch { .. } => Response::ok(Reply::Fetch(batch(&["x"], &["1"], 0, false))),
        Call::Close(_) => Response::ok(Reply::Close),
        Call::GetLog(_) => Response::ok(Reply::GetLog(String::new())),
        Call::Cancel(_) => Response::ok(Reply::Cancel(status_ok())),
    }
}

/// A local port with nothing listening on it
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}
