//! Query session

use super::config::{ConnectionConfig, Options};
use super::state::ConnectionState;
use super::transport::{Transport, TransportMode};
use crate::client::ImpalaClient;
use crate::protocol::{Query, QueryHandle};
use crate::stream::RowSet;
use crate::{Error, Result};
use std::collections::HashMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Session over one transport, tracking at most one outstanding query
///
/// Operations take `&mut self`; a session is used from one owner at a time.
/// [`close`](Connection::close) is idempotent and must be called to cancel an
/// outstanding query server-side. Dropping the session only closes the socket.
#[derive(Debug)]
pub struct Connection {
    client: Option<ImpalaClient>,
    handle: Option<QueryHandle>,
    options: Options,
    state: ConnectionState,
    mode: TransportMode,
    hadoop_user: Option<String>,
}

impl Connection {
    /// Connect with the default transport configuration
    ///
    /// The presence of `mechanismName` in `auth` selects a SASL transport,
    /// otherwise the connection is an unauthenticated buffered stream.
    pub async fn connect(
        host: &str,
        port: u16,
        options: Options,
        auth: HashMap<String, String>,
    ) -> Result<Self> {
        Self::connect_with_config(host, port, options, auth, &ConnectionConfig::default()).await
    }

    /// Connect with explicit timeouts and buffer sizing
    ///
    /// Either a usable session or an error is returned; a socket that fails
    /// the handshake is closed before the error is surfaced.
    pub async fn connect_with_config(
        host: &str,
        port: u16,
        options: Options,
        mut auth: HashMap<String, String>,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        options.validate()?;
        let mode = TransportMode::from_auth_config(&mut auth, config.buffer_capacity)?;
        let span = tracing::info_span!("connect", host = %host, port, mode = %mode);

        async move {
            let start = Instant::now();
            let label = mode.label();

            let transport = match Transport::open(host, port, mode.clone(), &auth, config).await {
                Ok(transport) => transport,
                Err(e) => {
                    tracing::debug!(error = %e, "connect failed");
                    crate::metrics::counters::connection_failed(e.category());
                    return Err(e);
                }
            };

            let mut state = ConnectionState::Disconnected;
            state.transition(ConnectionState::Idle)?;

            crate::metrics::counters::connection_opened(label);
            crate::metrics::histograms::connect_duration(
                label,
                start.elapsed().as_millis() as u64,
            );
            tracing::info!("connection established");

            Ok(Self {
                client: Some(ImpalaClient::new(transport, config.io_timeout)),
                handle: None,
                options,
                state,
                mode,
                hadoop_user: config.hadoop_user.clone(),
            })
        }
        .instrument(span)
        .await
    }

    /// Get current session state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the transport is still held
    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    /// Handle of the outstanding query, if any
    pub fn active_handle(&self) -> Option<&QueryHandle> {
        self.handle.as_ref()
    }

    /// Mode the transport was opened with
    pub fn transport_mode(&self) -> &TransportMode {
        &self.mode
    }

    /// Polling options handed to cursors
    pub fn options(&self) -> Options {
        self.options
    }

    /// Submit a query
    ///
    /// Sends `query` with an empty configuration overlay and returns a cursor
    /// over its results. Rejected with [`Error::ConnectionBusy`] while another
    /// query handle is outstanding.
    pub async fn submit(&mut self, query: &str) -> Result<RowSet<'_>> {
        self.submit_with_cancel(query, &CancellationToken::new()).await
    }

    /// Submit a query, giving up when `cancel` fires
    ///
    /// Cancellation returns [`Error::Cancelled`] without cancelling the query
    /// server-side. If the request was already on the wire the session becomes
    /// [`ConnectionState::Broken`] and can only be closed.
    pub async fn submit_with_cancel(
        &mut self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<RowSet<'_>> {
        ensure_can_submit(self.state, self.handle.as_ref())?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let request = Query {
            query: query.to_string(),
            configuration: Vec::new(),
            hadoop_user: self.hadoop_user.clone(),
        };
        let client = self.client.as_mut().ok_or(Error::ConnectionClosed)?;

        let outcome = async {
            tokio::select! {
                _ = cancel.cancelled() => None,
                result = client.query(&request) => Some(result),
            }
        }
        .instrument(tracing::debug_span!("submit", query = %query))
        .await;

        let handle = match outcome {
            Some(Ok(handle)) => handle,
            Some(Err(e)) => {
                self.sync_state();
                return Err(e);
            }
            None => {
                tracing::warn!("submit cancelled with the request in flight, session unusable");
                self.state.transition(ConnectionState::Broken)?;
                return Err(Error::Cancelled);
            }
        };

        tracing::debug!(handle = %handle, "query submitted");
        crate::metrics::counters::query_submitted();
        self.state.transition(ConnectionState::QueryActive)?;
        self.handle = Some(handle.clone());

        Ok(RowSet::new(self, handle))
    }

    /// Cancel the outstanding query
    ///
    /// No-op when no query is outstanding. On failure the handle stays set so
    /// the call can be retried.
    pub async fn cancel(&mut self) -> Result<()> {
        let Some(handle) = self.handle.clone() else {
            return Ok(());
        };
        let client = self.client.as_mut().ok_or(Error::ConnectionClosed)?;

        match client.cancel(&handle).await {
            Ok(_) => {
                crate::metrics::counters::cancel("ok");
                tracing::debug!(handle = %handle, "query cancelled");
                self.release_handle();
                Ok(())
            }
            Err(e) => {
                crate::metrics::counters::cancel("error");
                tracing::warn!(handle = %handle, error = %e, "cancel failed");
                self.sync_state();
                Err(e)
            }
        }
    }

    /// Close the session
    ///
    /// Cancels any outstanding query first; if that cancel fails the error is
    /// returned and the transport stays open. Calling `close` on a closed
    /// session is a no-op.
    ///
    /// A [`Broken`](ConnectionState::Broken) session cannot talk to the server
    /// any more, so its transport is released without a cancel.
    pub async fn close(&mut self) -> Result<()> {
        if self.client.is_none() {
            return Ok(());
        }

        let span = tracing::info_span!("close", mode = %self.mode);
        async {
            if self.state == ConnectionState::Broken {
                if let Some(handle) = self.handle.take() {
                    tracing::warn!(handle = %handle, "abandoning query on a broken session");
                }
            } else {
                self.cancel().await?;
            }

            if let Some(client) = self.client.take() {
                if let Err(e) = client.shutdown().await {
                    tracing::debug!(error = %e, "transport shutdown failed");
                }
            }
            self.state.transition(ConnectionState::Closed)?;
            tracing::info!("connection closed");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// RPC client for a cursor
    pub(crate) fn client_mut(&mut self) -> Result<&mut ImpalaClient> {
        self.client.as_mut().ok_or(Error::ConnectionClosed)
    }

    /// Mark the session broken if a failed call left the client out of sync
    pub(crate) fn sync_state(&mut self) {
        let poisoned = self.client.as_ref().is_some_and(ImpalaClient::is_poisoned);
        if poisoned && self.state.can_transition_to(ConnectionState::Broken) {
            tracing::warn!(state = %self.state, "transport out of sync, session unusable");
            self.state = ConnectionState::Broken;
        }
    }

    /// Drop the outstanding handle once it has been released server-side
    pub(crate) fn release_handle(&mut self) {
        if self.handle.take().is_some() && self.state == ConnectionState::QueryActive {
            self.state = ConnectionState::Idle;
        }
    }
}

/// Check that a new query may be submitted
fn ensure_can_submit(state: ConnectionState, handle: Option<&QueryHandle>) -> Result<()> {
    match (state, handle) {
        (ConnectionState::Idle, None) => Ok(()),
        (ConnectionState::Disconnected | ConnectionState::Closed, _) => {
            Err(Error::ConnectionClosed)
        }
        (_, Some(handle)) => Err(Error::ConnectionBusy(format!(
            "query {} is still outstanding",
            handle
        ))),
        (state, None) => Err(Error::InvalidState {
            expected: ConnectionState::Idle.to_string(),
            actual: state.to_string(),
        }),
    }
}
