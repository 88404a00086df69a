//! Thrift SASL negotiation framing
//!
//! Negotiation messages are `[status: u8][length: u32 BE][payload]`. The
//! client opens with START carrying the mechanism name, then OK carrying
//! the mechanism's initial response. The server answers OK (challenge),
//! COMPLETE, or BAD/ERROR with a human-readable reason.

use super::plain::PlainClient;
use crate::{Error, Result};
use bytes::{BufMut, BytesMut};
use std::collections::HashMap;
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest negotiation payload accepted from the server (1 MB)
pub const MAX_NEGOTIATION_PAYLOAD: usize = 1024 * 1024;

/// Negotiation status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStatus {
    /// Client opens negotiation with the mechanism name
    Start,
    /// Exchange continues
    Ok,
    /// Peer rejected the exchange
    Bad,
    /// Peer hit an internal error
    Error,
    /// Negotiation succeeded
    Complete,
}

impl NegotiationStatus {
    /// Parse a wire status byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Start),
            2 => Some(Self::Ok),
            3 => Some(Self::Bad),
            4 => Some(Self::Error),
            5 => Some(Self::Complete),
            _ => None,
        }
    }

    /// Wire status byte
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Start => 1,
            Self::Ok => 2,
            Self::Bad => 3,
            Self::Error => 4,
            Self::Complete => 5,
        }
    }
}

impl fmt::Display for NegotiationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::Ok => write!(f, "OK"),
            Self::Bad => write!(f, "BAD"),
            Self::Error => write!(f, "ERROR"),
            Self::Complete => write!(f, "COMPLETE"),
        }
    }
}

/// SASL mechanism supported by this client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaslMechanism {
    /// RFC 4616 PLAIN (LDAP-backed Impala)
    Plain,
}

impl SaslMechanism {
    /// Mechanism name sent in the START message
    pub fn name(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
        }
    }
}

impl fmt::Display for SaslMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for SaslMechanism {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("PLAIN") {
            Ok(Self::Plain)
        } else {
            Err(Error::Authentication(format!(
                "unsupported SASL mechanism '{}': expected PLAIN",
                s
            )))
        }
    }
}

/// Build the mechanism client from the authentication configuration
///
/// `username` falls back to the local OS user; `password` defaults to empty.
pub fn mechanism_client(
    mechanism: SaslMechanism,
    config: &HashMap<String, String>,
) -> PlainClient {
    match mechanism {
        SaslMechanism::Plain => {
            let username = config
                .get(super::USERNAME_KEY)
                .cloned()
                .unwrap_or_else(whoami::username);
            let password = config.get(super::PASSWORD_KEY).cloned().unwrap_or_default();
            let client = PlainClient::new(username, password);
            match config.get(super::AUTHORIZATION_ID_KEY) {
                Some(authzid) => client.authorization_id(authzid.clone()),
                None => client,
            }
        }
    }
}

/// Encode a negotiation message
pub fn encode_negotiation(status: NegotiationStatus, payload: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(5 + payload.len());
    buf.put_u8(status.as_u8());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf
}

/// Write one negotiation message and flush
pub async fn write_negotiation<S>(
    stream: &mut S,
    status: NegotiationStatus,
    payload: &[u8],
) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&encode_negotiation(status, payload)).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one negotiation message
pub async fn read_negotiation<S>(stream: &mut S) -> Result<(NegotiationStatus, Vec<u8>)>
where
    S: AsyncRead + Unpin,
{
    let raw = stream.read_u8().await?;
    let status = NegotiationStatus::from_u8(raw).ok_or_else(|| {
        Error::Protocol(format!("invalid SASL negotiation status byte: {}", raw))
    })?;

    let len = stream.read_u32().await? as usize;
    if len > MAX_NEGOTIATION_PAYLOAD {
        return Err(Error::Protocol(format!(
            "SASL negotiation payload of {} bytes exceeds maximum allowed {}",
            len, MAX_NEGOTIATION_PAYLOAD
        )));
    }

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok((status, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_start_message() {
        let buf = encode_negotiation(NegotiationStatus::Start, b"PLAIN");
        assert_eq!(&buf[..], &[1, 0, 0, 0, 5, b'P', b'L', b'A', b'I', b'N']);
    }

    #[test]
    fn test_mechanism_parse_case_insensitive() {
        assert_eq!("plain".parse::<SaslMechanism>().unwrap(), SaslMechanism::Plain);
        assert_eq!("PLAIN".parse::<SaslMechanism>().unwrap(), SaslMechanism::Plain);
    }

    #[test]
    fn test_unsupported_mechanism() {
        let err = "GSSAPI".parse::<SaslMechanism>().unwrap_err();
        assert!(err.is_authentication());
        assert!(err.to_string().contains("GSSAPI"));
    }

    #[test]
    fn test_mechanism_client_uses_configured_credentials() {
        let mut config = HashMap::new();
        config.insert("username".to_string(), "etl".to_string());
        config.insert("password".to_string(), "pw".to_string());

        let client = mechanism_client(SaslMechanism::Plain, &config);
        assert_eq!(client.initial_response().unwrap(), b"\0etl\0pw");
    }

    #[test]
    fn test_mechanism_client_defaults_to_os_user() {
        let client = mechanism_client(SaslMechanism::Plain, &HashMap::new());
        assert_eq!(client.username(), whoami::username());
    }

    #[tokio::test]
    async fn test_read_negotiation_complete() {
        let mut mock = tokio_test::io::Builder::new()
            .read(&[5, 0, 0, 0, 0])
            .build();

        let (status, payload) = read_negotiation(&mut mock).await.unwrap();
        assert_eq!(status, NegotiationStatus::Complete);
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_read_negotiation_rejects_bad_status_byte() {
        let mut mock = tokio_test::io::Builder::new().read(&[9]).build();

        let err = read_negotiation(&mut mock).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_read_negotiation_rejects_oversized_payload() {
        let mut mock = tokio_test::io::Builder::new()
            .read(&[2, 0xFF, 0xFF, 0xFF, 0xFF])
            .build();

        let err = read_negotiation(&mut mock).await.unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }
}
