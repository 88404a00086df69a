//! RowSet implementation

use crate::connection::{Connection, Options};
use crate::metrics::labels::{STATUS_FAILED, STATUS_FINISHED};
use crate::protocol::{QueryHandle, QueryState};
use crate::{Error, Result};
use futures::stream::{self, Stream};
use std::collections::VecDeque;
use std::time::Instant;

/// Field separator of Beeswax text rows
const FIELD_SEPARATOR: char = '\t';

/// One result row
///
/// Fields are the server's text rendering; no type conversion is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    values: Vec<String>,
}

impl Row {
    /// Split a tab-separated text row
    pub fn from_text(line: &str) -> Self {
        Self {
            values: line.split(FIELD_SEPARATOR).map(str::to_string).collect(),
        }
    }

    /// Field values in column order
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Field at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no fields
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take ownership of the field values
    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

/// Cursor over one submitted query
///
/// Mutably borrows its session, so the session cannot issue other calls while
/// the cursor is alive. Reading to the end closes the query server-side and
/// clears the session's handle. A cursor dropped early leaves the handle on the
/// session, where [`Connection::close`] or [`Connection::cancel`] releases it.
#[derive(Debug)]
pub struct RowSet<'a> {
    conn: &'a mut Connection,
    handle: QueryHandle,
    options: Options,
    columns: Vec<String>,
    buffer: VecDeque<Row>,
    finished: bool,
    exhausted: bool,
}

impl<'a> RowSet<'a> {
    pub(crate) fn new(conn: &'a mut Connection, handle: QueryHandle) -> Self {
        let options = conn.options();
        Self {
            conn,
            handle,
            options,
            columns: Vec::new(),
            buffer: VecDeque::new(),
            finished: false,
            exhausted: false,
        }
    }

    /// Handle of the query this cursor reads
    pub fn handle(&self) -> &QueryHandle {
        &self.handle
    }

    /// Polling options in effect
    pub fn options(&self) -> Options {
        self.options
    }

    /// Column labels, empty until the first batch arrived
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether every row has been fetched
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Poll the query state until it finishes
    ///
    /// A query ending in EXCEPTION is closed server-side and reported as
    /// [`Error::QueryFailed`] carrying the server log.
    pub async fn wait(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        if self.exhausted {
            return Err(Error::InvalidState {
                expected: "query running or finished".into(),
                actual: "query released".into(),
            });
        }

        let start = Instant::now();
        loop {
            let polled = self.conn.client_mut()?.get_state(&self.handle).await;
            let state = self.checked(polled)?;
            tracing::trace!(handle = %self.handle, state = %state, "polled query state");

            match state {
                QueryState::Finished => {
                    self.finished = true;
                    crate::metrics::histograms::query_wait_duration(
                        start.elapsed().as_millis() as u64,
                    );
                    return Ok(());
                }
                QueryState::Exception => return Err(self.fail().await),
                _ => tokio::time::sleep(self.options.poll_interval()).await,
            }
        }
    }

    /// Fetch the next batch of up to `batch_size` rows
    ///
    /// Returns `None` once the result set is exhausted.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Row>>> {
        if !self.buffer.is_empty() {
            return Ok(Some(self.buffer.drain(..).collect()));
        }
        if self.exhausted {
            return Ok(None);
        }
        self.wait().await?;

        loop {
            let fetch_size = self.options.fetch_size();
            let fetched = self
                .conn
                .client_mut()?
                .fetch(&self.handle, false, fetch_size)
                .await;
            let results = self.checked(fetched)?;

            if !results.ready {
                tokio::time::sleep(self.options.poll_interval()).await;
                continue;
            }
            if self.columns.is_empty() {
                self.columns = results.columns;
            }

            let rows: Vec<Row> = results.data.iter().map(|line| Row::from_text(line)).collect();
            crate::metrics::counters::rows_fetched(rows.len() as u64);
            tracing::debug!(
                handle = %self.handle,
                start_row = results.start_row,
                rows = rows.len(),
                has_more = results.has_more,
                "fetched batch"
            );

            if !results.has_more {
                self.finish().await;
            }

            if !rows.is_empty() {
                return Ok(Some(rows));
            }
            if self.exhausted {
                return Ok(None);
            }
        }
    }

    /// Next row, `None` at the end of the result set
    pub async fn next(&mut self) -> Result<Option<Row>> {
        if self.buffer.is_empty() {
            match self.next_batch().await? {
                Some(rows) => self.buffer.extend(rows),
                None => return Ok(None),
            }
        }
        Ok(self.buffer.pop_front())
    }

    /// Read every remaining row
    pub async fn collect_rows(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            rows.extend(batch);
        }
        Ok(rows)
    }

    /// Adapt the cursor into a `Stream` of rows
    pub fn into_stream(self) -> impl Stream<Item = Result<Row>> + 'a {
        stream::try_unfold(self, |mut rows| async move {
            Ok(rows.next().await?.map(|row| (row, rows)))
        })
    }

    /// Pass a call result through, breaking the session if the call desynced it
    fn checked<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.conn.sync_state();
        }
        result
    }

    /// Release the query after the last batch
    ///
    /// A failed close leaves the handle on the session so that closing the
    /// session cancels it.
    async fn finish(&mut self) {
        self.exhausted = true;
        let closed = match self.conn.client_mut() {
            Ok(client) => client.close_query(&self.handle).await,
            Err(e) => Err(e),
        };

        match closed {
            Ok(()) => {
                self.conn.release_handle();
                crate::metrics::counters::query_completed(STATUS_FINISHED);
                tracing::debug!(handle = %self.handle, "query closed");
            }
            Err(e) => {
                tracing::warn!(handle = %self.handle, error = %e, "failed to close finished query");
                self.conn.sync_state();
            }
        }
    }

    /// Collect the server log and release a failed query
    async fn fail(&mut self) -> Error {
        self.exhausted = true;
        crate::metrics::counters::query_completed(STATUS_FAILED);

        let client = match self.conn.client_mut() {
            Ok(client) => client,
            Err(e) => return e,
        };

        let log = match client.get_log(&self.handle.log_context).await {
            Ok(log) => log,
            Err(e) => {
                tracing::debug!(handle = %self.handle, error = %e, "failed to read query log");
                String::new()
            }
        };

        match client.close_query(&self.handle).await {
            Ok(()) => self.conn.release_handle(),
            Err(e) => {
                tracing::warn!(handle = %self.handle, error = %e, "failed to close failed query");
                self.conn.sync_state();
            }
        }

        let log = log.trim();
        if log.is_empty() {
            Error::QueryFailed(format!("query {} failed without a server log", self.handle))
        } else {
            Error::QueryFailed(log.to_string())
        }
    }
}
