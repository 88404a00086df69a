//! Transport establishment (buffered vs SASL-authenticated TCP)

use super::config::ConnectionConfig;
use super::sasl::SaslTransport;
use crate::auth::{self, SaslMechanism};
use crate::{Error, Result};
use bytes::BytesMut;
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

/// Transport mode, decided once at connect time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMode {
    /// Unauthenticated, buffered byte stream
    Buffered {
        /// Read and write buffer capacity in bytes
        capacity: usize,
    },
    /// SASL-negotiated framed stream
    Sasl {
        /// Negotiated mechanism
        mechanism: SaslMechanism,
        /// Service identifier
        service: String,
    },
}

impl TransportMode {
    /// Select the mode from the authentication configuration
    ///
    /// The presence of `mechanismName` selects SASL; in that case the fixed
    /// service identifier is written into `config` under `service`.
    pub fn from_auth_config(
        config: &mut HashMap<String, String>,
        buffer_capacity: usize,
    ) -> Result<Self> {
        let Some(name) = config.get(auth::MECHANISM_KEY) else {
            return Ok(TransportMode::Buffered {
                capacity: buffer_capacity,
            });
        };
        let mechanism: SaslMechanism = name.parse()?;

        config.insert(auth::SERVICE_KEY.to_string(), auth::SERVICE_NAME.to_string());
        Ok(TransportMode::Sasl {
            mechanism,
            service: auth::SERVICE_NAME.to_string(),
        })
    }

    /// Whether the transport authenticates
    pub fn is_authenticated(&self) -> bool {
        matches!(self, TransportMode::Sasl { .. })
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            TransportMode::Buffered { .. } => crate::metrics::labels::MODE_BUFFERED,
            TransportMode::Sasl { .. } => crate::metrics::labels::MODE_SASL,
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportMode::Buffered { capacity } => write!(f, "buffered({} bytes)", capacity),
            TransportMode::Sasl { mechanism, service } => {
                write!(f, "sasl({}, service={})", mechanism, service)
            }
        }
    }
}

#[derive(Debug)]
enum Stream {
    Buffered(BufStream<TcpStream>),
    Sasl(SaslTransport<TcpStream>),
}

/// Opened, ready-to-use byte stream carrying RPC traffic
#[derive(Debug)]
pub struct Transport {
    stream: Stream,
    mode: TransportMode,
}

impl Transport {
    /// Open a TCP socket bounded by `timeout`
    pub async fn connect_socket(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
        let socket = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::ConnectTimeout {
                    addr: format!("{}:{}", host, port),
                    timeout,
                })
            }
        };
        socket.set_nodelay(true)?;
        tracing::debug!(host, port, "socket connected");
        Ok(socket)
    }

    /// Connect and perform the handshake for `mode`
    ///
    /// Either returns an opened transport or an error; a socket whose
    /// handshake fails is dropped (closed) before returning.
    pub async fn open(
        host: &str,
        port: u16,
        mode: TransportMode,
        auth_config: &HashMap<String, String>,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        let socket = Self::connect_socket(host, port, config.connect_timeout).await?;

        let stream = match &mode {
            TransportMode::Buffered { capacity } => {
                Stream::Buffered(BufStream::with_capacity(*capacity, *capacity, socket))
            }
            TransportMode::Sasl { mechanism, .. } => {
                let mechanism = *mechanism;
                crate::metrics::counters::auth_attempted(mechanism.name());
                let negotiation = SaslTransport::negotiate(socket, mechanism, auth_config);
                let negotiated = match config.io_timeout {
                    Some(limit) => match tokio::time::timeout(limit, negotiation).await {
                        Ok(result) => result,
                        Err(_) => Err(Error::Authentication(format!(
                            "SASL negotiation timed out after {:?}",
                            limit
                        ))),
                    },
                    None => negotiation.await,
                };
                // The socket is up; anything going wrong now is a handshake failure
                let negotiated = negotiated.map_err(|e| match e {
                    Error::Io(e) => Error::Authentication(format!(
                        "SASL negotiation interrupted: {}",
                        e
                    )),
                    other => other,
                });
                match negotiated {
                    Ok(transport) => {
                        crate::metrics::counters::auth_successful(mechanism.name());
                        Stream::Sasl(transport)
                    }
                    Err(e) => {
                        crate::metrics::counters::auth_failed(mechanism.name(), e.category());
                        return Err(e);
                    }
                }
            }
        };

        Ok(Self { stream, mode })
    }

    /// Mode this transport was opened with
    pub fn mode(&self) -> &TransportMode {
        &self.mode
    }

    /// Write bytes to the transport
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        match &mut self.stream {
            Stream::Buffered(stream) => stream.write_all(buf).await?,
            Stream::Sasl(transport) => transport.write_all(buf).await?,
        }
        Ok(())
    }

    /// Flush the transport
    pub async fn flush(&mut self) -> Result<()> {
        match &mut self.stream {
            Stream::Buffered(stream) => stream.flush().await?,
            Stream::Sasl(transport) => transport.flush().await?,
        }
        Ok(())
    }

    /// Read bytes into buffer
    pub async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let n = match &mut self.stream {
            Stream::Buffered(stream) => stream.read_buf(buf).await?,
            Stream::Sasl(transport) => transport.read_buf(buf).await?,
        };
        Ok(n)
    }

    /// Shutdown the transport
    pub async fn shutdown(&mut self) -> Result<()> {
        match &mut self.stream {
            Stream::Buffered(stream) => stream.shutdown().await?,
            Stream::Sasl(transport) => transport.shutdown().await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_without_mechanism_is_buffered() {
        let mut config = HashMap::new();
        let mode = TransportMode::from_auth_config(&mut config, 1024).unwrap();

        assert_eq!(mode, TransportMode::Buffered { capacity: 1024 });
        assert!(!mode.is_authenticated());
        assert!(config.is_empty());
    }

    #[test]
    fn test_mode_with_mechanism_injects_service() {
        let mut config = HashMap::new();
        config.insert("mechanismName".to_string(), "PLAIN".to_string());
        config.insert("service".to_string(), "hive".to_string());

        let mode = TransportMode::from_auth_config(&mut config, 1024).unwrap();

        assert_eq!(
            mode,
            TransportMode::Sasl {
                mechanism: SaslMechanism::Plain,
                service: "impala".to_string(),
            }
        );
        assert_eq!(config.get("service"), Some(&"impala".to_string()));
    }

    #[test]
    fn test_mode_with_unsupported_mechanism() {
        let mut config = HashMap::new();
        config.insert("mechanismName".to_string(), "GSSAPI".to_string());

        let err = TransportMode::from_auth_config(&mut config, 1024).unwrap_err();
        assert!(err.is_authentication());
    }

    fn plain_auth() -> HashMap<String, String> {
        let mut auth = HashMap::new();
        auth.insert("username".to_string(), "alice".to_string());
        auth
    }

    fn sasl_mode() -> TransportMode {
        TransportMode::Sasl {
            mechanism: SaslMechanism::Plain,
            service: "impala".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sasl_peer_hangup_is_authentication_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let err = Transport::open(
            "127.0.0.1",
            port,
            sasl_mode(),
            &plain_auth(),
            &ConnectionConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(err.is_authentication(), "unexpected error: {:?}", err);
        assert!(!err.is_connectivity());
    }

    #[tokio::test]
    async fn test_sasl_negotiation_timeout_is_authentication_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            // accept and stay silent
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(socket);
        });

        let config = ConnectionConfig::builder()
            .io_timeout(Some(Duration::from_millis(100)))
            .build();
        let err = Transport::open("127.0.0.1", port, sasl_mode(), &plain_auth(), &config)
            .await
            .unwrap_err();
        assert!(err.is_authentication(), "unexpected error: {:?}", err);
        assert!(err.to_string().contains("timed out"));
        server.abort();
    }

    #[tokio::test]
    async fn test_tcp_connect_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = Transport::connect_socket("127.0.0.1", port, Duration::from_secs(1)).await;
        assert!(result.unwrap_err().is_connectivity());
    }
}
