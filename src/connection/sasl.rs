//! SASL-authenticated transport
//!
//! After negotiation every flush emits one `[length: u32 BE][payload]` frame
//! and reads unwrap frames back into a plain byte stream. PLAIN negotiates
//! no security layer, so payloads are not wrapped.
//!
//! Frame position is tracked on the transport itself, so a read dropped at
//! any await point resumes where it stopped.

use crate::auth::sasl::{mechanism_client, read_negotiation, write_negotiation};
use crate::auth::{NegotiationStatus, SaslMechanism};
use crate::{Error, Result};
use bytes::BytesMut;
use std::collections::HashMap;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest data frame accepted from the server (256 MB)
pub const MAX_FRAME_LENGTH: usize = 256 * 1024 * 1024;

/// Byte stream framed by the Thrift SASL transport
pub struct SaslTransport<S> {
    stream: S,
    mechanism: SaslMechanism,
    write_buf: BytesMut,
    header: [u8; 4],
    header_filled: usize,
    frame_remaining: usize,
}

impl<S> std::fmt::Debug for SaslTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaslTransport")
            .field("mechanism", &self.mechanism)
            .field("pending_write", &self.write_buf.len())
            .field("frame_remaining", &self.frame_remaining)
            .finish()
    }
}

impl<S> SaslTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the client side of the negotiation over `stream`
    ///
    /// On failure `stream` is dropped, closing the socket.
    pub async fn negotiate(
        mut stream: S,
        mechanism: SaslMechanism,
        config: &HashMap<String, String>,
    ) -> Result<Self> {
        let client = mechanism_client(mechanism, config);
        let initial = client
            .initial_response()
            .map_err(|e| Error::Authentication(e.to_string()))?;

        tracing::debug!(
            mechanism = %mechanism,
            user = client.username(),
            "starting SASL negotiation"
        );
        write_negotiation(&mut stream, NegotiationStatus::Start, mechanism.name().as_bytes())
            .await?;
        write_negotiation(&mut stream, NegotiationStatus::Ok, &initial).await?;

        loop {
            let (status, payload) = read_negotiation(&mut stream).await?;
            match status {
                NegotiationStatus::Complete => break,
                NegotiationStatus::Ok => {
                    let response = client
                        .evaluate_challenge(&payload)
                        .map_err(|e| Error::Authentication(e.to_string()))?;
                    write_negotiation(&mut stream, NegotiationStatus::Ok, &response).await?;
                }
                NegotiationStatus::Bad | NegotiationStatus::Error => {
                    return Err(Error::Authentication(format!(
                        "server rejected SASL negotiation ({}): {}",
                        status,
                        String::from_utf8_lossy(&payload)
                    )));
                }
                NegotiationStatus::Start => {
                    return Err(Error::Protocol(
                        "unexpected START message from server during SASL negotiation".into(),
                    ));
                }
            }
        }

        tracing::debug!(mechanism = %mechanism, "SASL negotiation complete");
        Ok(Self {
            stream,
            mechanism,
            write_buf: BytesMut::new(),
            header: [0; 4],
            header_filled: 0,
            frame_remaining: 0,
        })
    }

    /// Negotiated mechanism
    pub fn mechanism(&self) -> SaslMechanism {
        self.mechanism
    }

    /// Queue bytes for the next frame
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.write_buf.extend_from_slice(buf);
        Ok(())
    }

    /// Emit queued bytes as one frame
    pub async fn flush(&mut self) -> Result<()> {
        if !self.write_buf.is_empty() {
            let len = u32::try_from(self.write_buf.len()).map_err(|_| {
                Error::Protocol(format!(
                    "frame of {} bytes exceeds u32 length prefix",
                    self.write_buf.len()
                ))
            })?;
            self.stream.write_all(&len.to_be_bytes()).await?;
            self.stream.write_all(&self.write_buf).await?;
            self.write_buf.clear();
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Read payload bytes of the current frame into `buf`
    ///
    /// May return part of a frame. Returns 0 when the peer closed the stream
    /// at a frame boundary. Cancel safe: no bytes are lost if the future is
    /// dropped before completion.
    pub async fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        while self.frame_remaining == 0 {
            while self.header_filled < self.header.len() {
                let n = self.stream.read(&mut self.header[self.header_filled..]).await?;
                if n == 0 {
                    if self.header_filled == 0 {
                        return Ok(0);
                    }
                    return Err(truncated("frame header"));
                }
                self.header_filled += n;
            }
            self.header_filled = 0;

            let len = u32::from_be_bytes(self.header) as usize;
            if len > MAX_FRAME_LENGTH {
                return Err(Error::Protocol(format!(
                    "SASL frame length {} exceeds maximum allowed {}",
                    len, MAX_FRAME_LENGTH
                )));
            }
            // empty frames carry nothing
            self.frame_remaining = len;
        }

        let n = (&mut self.stream)
            .take(self.frame_remaining as u64)
            .read_buf(buf)
            .await?;
        if n == 0 {
            return Err(truncated("frame payload"));
        }
        self.frame_remaining -= n;
        Ok(n)
    }

    /// Shutdown the underlying stream
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

fn truncated(what: &str) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("connection closed inside a SASL {}", what),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::sasl::encode_negotiation;

    fn plain_config() -> HashMap<String, String> {
        let mut config = HashMap::new();
        config.insert("username".to_string(), "alice".to_string());
        config.insert("password".to_string(), "secret".to_string());
        config
    }

    #[tokio::test]
    async fn test_negotiate_plain_complete() {
        let mock = tokio_test::io::Builder::new()
            .write(&encode_negotiation(NegotiationStatus::Start, b"PLAIN"))
            .write(&encode_negotiation(NegotiationStatus::Ok, b"\0alice\0secret"))
            .read(&encode_negotiation(NegotiationStatus::Complete, b""))
            .build();

        let transport = SaslTransport::negotiate(mock, SaslMechanism::Plain, &plain_config())
            .await
            .unwrap();
        assert_eq!(transport.mechanism(), SaslMechanism::Plain);
    }

    #[tokio::test]
    async fn test_negotiate_rejected_surfaces_server_message() {
        let mock = tokio_test::io::Builder::new()
            .write(&encode_negotiation(NegotiationStatus::Start, b"PLAIN"))
            .write(&encode_negotiation(NegotiationStatus::Ok, b"\0alice\0secret"))
            .read(&encode_negotiation(
                NegotiationStatus::Bad,
                b"Error validating LDAP user",
            ))
            .build();

        let err = SaslTransport::negotiate(mock, SaslMechanism::Plain, &plain_config())
            .await
            .unwrap_err();
        assert!(err.is_authentication());
        assert!(err.to_string().contains("Error validating LDAP user"));
    }

    #[tokio::test]
    async fn test_negotiate_rejects_challenge_for_plain() {
        let mock = tokio_test::io::Builder::new()
            .write(&encode_negotiation(NegotiationStatus::Start, b"PLAIN"))
            .write(&encode_negotiation(NegotiationStatus::Ok, b"\0alice\0secret"))
            .read(&encode_negotiation(NegotiationStatus::Ok, b"challenge"))
            .build();

        let err = SaslTransport::negotiate(mock, SaslMechanism::Plain, &plain_config())
            .await
            .unwrap_err();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn test_frames_writes_and_reads() {
        let mock = tokio_test::io::Builder::new()
            .write(&encode_negotiation(NegotiationStatus::Start, b"PLAIN"))
            .write(&encode_negotiation(NegotiationStatus::Ok, b"\0alice\0secret"))
            .read(&encode_negotiation(NegotiationStatus::Complete, b""))
            // one frame for two queued writes
            .write(&[0, 0, 0, 5])
            .write(b"hello")
            // empty frame is skipped
            .read(&[0, 0, 0, 0])
            .read(&[0, 0, 0, 3])
            .read(b"abc")
            .build();

        let mut transport = SaslTransport::negotiate(mock, SaslMechanism::Plain, &plain_config())
            .await
            .unwrap();

        transport.write_all(b"hel").await.unwrap();
        transport.write_all(b"lo").await.unwrap();
        transport.flush().await.unwrap();

        let mut buf = BytesMut::new();
        let n = transport.read_buf(&mut buf).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..], b"abc");
    }

    #[tokio::test]
    async fn test_read_rejects_oversized_frame() {
        let mock = tokio_test::io::Builder::new()
            .write(&encode_negotiation(NegotiationStatus::Start, b"PLAIN"))
            .write(&encode_negotiation(NegotiationStatus::Ok, b"\0alice\0secret"))
            .read(&encode_negotiation(NegotiationStatus::Complete, b""))
            .read(&[0x7F, 0xFF, 0xFF, 0xFF])
            .build();

        let mut transport = SaslTransport::negotiate(mock, SaslMechanism::Plain, &plain_config())
            .await
            .unwrap();

        let mut buf = BytesMut::new();
        let err = transport.read_buf(&mut buf).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_read_resumes_after_cancelled_header() {
        let mock = tokio_test::io::Builder::new()
            .write(&encode_negotiation(NegotiationStatus::Start, b"PLAIN"))
            .write(&encode_negotiation(NegotiationStatus::Ok, b"\0alice\0secret"))
            .read(&encode_negotiation(NegotiationStatus::Complete, b""))
            // length prefix split across a stall
            .read(&[0, 0])
            .wait(std::time::Duration::from_millis(200))
            .read(&[0, 6])
            .read(b"abcdef")
            .build();

        let mut transport = SaslTransport::negotiate(mock, SaslMechanism::Plain, &plain_config())
            .await
            .unwrap();

        let mut buf = BytesMut::new();
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            transport.read_buf(&mut buf),
        )
        .await;
        assert!(timed_out.is_err());
        assert!(buf.is_empty());

        let mut total = 0;
        while total < 6 {
            total += transport.read_buf(&mut buf).await.unwrap();
        }
        assert_eq!(&buf[..], b"abcdef");
    }

    #[tokio::test]
    async fn test_read_resumes_after_cancelled_payload() {
        let mock = tokio_test::io::Builder::new()
            .write(&encode_negotiation(NegotiationStatus::Start, b"PLAIN"))
            .write(&encode_negotiation(NegotiationStatus::Ok, b"\0alice\0secret"))
            .read(&encode_negotiation(NegotiationStatus::Complete, b""))
            .read(&[0, 0, 0, 6])
            .read(b"abc")
            .wait(std::time::Duration::from_millis(200))
            .read(b"def")
            .read(&[0, 0, 0, 1])
            .read(b"g")
            .build();

        let mut transport = SaslTransport::negotiate(mock, SaslMechanism::Plain, &plain_config())
            .await
            .unwrap();

        let mut buf = BytesMut::new();
        assert_eq!(transport.read_buf(&mut buf).await.unwrap(), 3);

        // stalls mid-frame
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            transport.read_buf(&mut buf),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(&buf[..], b"abc");

        assert_eq!(transport.read_buf(&mut buf).await.unwrap(), 3);
        assert_eq!(transport.read_buf(&mut buf).await.unwrap(), 1);
        assert_eq!(&buf[..], b"abcdefg");
    }

    #[tokio::test]
    async fn test_eof_inside_frame_is_error() {
        let mock = tokio_test::io::Builder::new()
            .write(&encode_negotiation(NegotiationStatus::Start, b"PLAIN"))
            .write(&encode_negotiation(NegotiationStatus::Ok, b"\0alice\0secret"))
            .read(&encode_negotiation(NegotiationStatus::Complete, b""))
            .read(&[0, 0, 0, 4])
            .read(b"ab")
            .build();

        let mut transport = SaslTransport::negotiate(mock, SaslMechanism::Plain, &plain_config())
            .await
            .unwrap();

        let mut buf = BytesMut::new();
        assert_eq!(transport.read_buf(&mut buf).await.unwrap(), 2);
        let err = transport.read_buf(&mut buf).await.unwrap_err();
        assert!(err.is_connectivity());
    }
}
