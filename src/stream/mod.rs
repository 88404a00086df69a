//! Result cursor
//!
//! A [`RowSet`] is built from a session, a query handle, and the session's
//! polling options. It waits for the query to finish, then fetches batches
//! until the server reports no more rows.

mod row_set;

pub use row_set::{Row, RowSet};
