//! Submit one query and print its rows
//!
//! ```bash
//! RUST_LOG=impala_wire=debug cargo run --example submit_query -- localhost 21000 "SELECT 1"
//! ```
//!
//! Set `IMPALA_USER` (and optionally `IMPALA_PASSWORD`) to authenticate with
//! SASL PLAIN.

use impala_wire::{Connection, Options};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port: u16 = args.next().as_deref().unwrap_or("21000").parse()?;
    let sql = args.next().unwrap_or_else(|| "SELECT version()".to_string());

    let mut auth = HashMap::new();
    if let Ok(user) = std::env::var("IMPALA_USER") {
        auth.insert("mechanismName".to_string(), "PLAIN".to_string());
        auth.insert("username".to_string(), user);
        if let Ok(password) = std::env::var("IMPALA_PASSWORD") {
            auth.insert("password".to_string(), password);
        }
    }

    let mut conn = Connection::connect(&host, port, Options::new(0.2, 1_000)?, auth).await?;
    println!("connected ({})", conn.transport_mode());

    let mut rows = conn.submit(&sql).await?;
    let mut count = 0usize;
    while let Some(row) = rows.next().await? {
        if count == 0 {
            println!("{}", rows.columns().join("\t"));
        }
        println!("{}", row.values().join("\t"));
        count += 1;
    }
    println!("({} rows)", count);

    conn.close().await?;
    Ok(())
}
