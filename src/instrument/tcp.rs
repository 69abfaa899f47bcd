//! Raw-socket SCPI transport.
//!
//! The bench instruments are LXI devices reachable as plain TCP sockets
//! (`<ip>:5025`), so the transport is a buffered `TcpStream`. Every
//! transaction is bounded by a per-session timeout; an unresponsive
//! instrument surfaces as [`BenchError::Timeout`] instead of hanging the
//! sweep.

use crate::error::{BenchError, BenchResult};
use crate::instrument::ScpiSession;
use async_trait::async_trait;
use log::debug;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

pub struct TcpSession {
    stream: BufStream<TcpStream>,
    address: String,
    timeout: Duration,
}

impl TcpSession {
    /// Connect to an instrument at `address` (e.g. "169.254.7.109:5025").
    pub async fn connect(address: &str, timeout: Duration) -> BenchResult<Self> {
        let stream = bound(timeout, TcpStream::connect(address))
            .await?
            .map_err(|e| BenchError::Instrument(format!("connect to {address}: {e}")))?;
        debug!("connected SCPI session to {}", address);
        Ok(Self {
            stream: BufStream::new(stream),
            address: address.to_string(),
            timeout,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn comm_err(&self, err: std::io::Error) -> BenchError {
        BenchError::Instrument(format!("{}: {}", self.address, err))
    }

    async fn write_line(&mut self, command: &str) -> BenchResult<()> {
        let io = async {
            self.stream.write_all(command.as_bytes()).await?;
            self.stream.write_all(b"\n").await?;
            self.stream.flush().await
        };
        bound(self.timeout, io)
            .await?
            .map_err(|e| BenchError::Instrument(format!("{command:?}: {e}")))
    }

    /// Read one definite-length binary block (`#<d><len><payload>\n`) or, if
    /// the response does not start with `#`, one newline-terminated line. The
    /// returned bytes include the block header and trailing terminator so the
    /// decoder sees the message exactly as the instrument framed it.
    async fn read_message(&mut self) -> BenchResult<Vec<u8>> {
        let mut first = [0u8; 1];
        self.stream
            .read_exact(&mut first)
            .await
            .map_err(|e| self_err(&self.address, e))?;

        let mut message = vec![first[0]];
        if first[0] == b'#' {
            let mut digit = [0u8; 1];
            self.stream
                .read_exact(&mut digit)
                .await
                .map_err(|e| self_err(&self.address, e))?;
            message.push(digit[0]);

            let ndigits = (digit[0] as char)
                .to_digit(10)
                .ok_or_else(|| {
                    BenchError::Instrument(format!(
                        "{}: malformed block header digit {:?}",
                        self.address, digit[0] as char
                    ))
                })? as usize;

            let mut len_field = vec![0u8; ndigits];
            self.stream
                .read_exact(&mut len_field)
                .await
                .map_err(|e| self_err(&self.address, e))?;
            message.extend_from_slice(&len_field);

            let payload_len = std::str::from_utf8(&len_field)
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| {
                    BenchError::Instrument(format!(
                        "{}: malformed block length field {:?}",
                        self.address, len_field
                    ))
                })?;

            let start = message.len();
            message.resize(start + payload_len + 1, 0);
            self.stream
                .read_exact(&mut message[start..])
                .await
                .map_err(|e| self_err(&self.address, e))?;
        } else {
            let mut rest = Vec::new();
            self.stream
                .read_until(b'\n', &mut rest)
                .await
                .map_err(|e| self_err(&self.address, e))?;
            message.extend_from_slice(&rest);
        }
        Ok(message)
    }
}

fn self_err(address: &str, err: std::io::Error) -> BenchError {
    BenchError::Instrument(format!("{address}: {err}"))
}

async fn bound<F, T>(timeout: Duration, fut: F) -> BenchResult<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| BenchError::Timeout(timeout))
}

#[async_trait]
impl ScpiSession for TcpSession {
    async fn write(&mut self, command: &str) -> BenchResult<()> {
        self.write_line(command).await
    }

    async fn query(&mut self, command: &str) -> BenchResult<String> {
        self.write_line(command).await?;
        let io = async {
            let mut line = String::new();
            self.stream.read_line(&mut line).await.map(|_| line)
        };
        let line = bound(self.timeout, io)
            .await?
            .map_err(|e| self.comm_err(e))?;
        Ok(line.trim().to_string())
    }

    async fn read_raw(&mut self) -> BenchResult<Vec<u8>> {
        let timeout = self.timeout;
        let fut = self.read_message();
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| BenchError::Timeout(timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn fixture(respond_with: Vec<u8>) -> (TcpSession, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut received = vec![0u8; 128];
            let n = sock.read(&mut received).await.unwrap();
            received.truncate(n);
            sock.write_all(&respond_with).await.unwrap();
            received
        });

        let session = TcpSession::connect(&addr.to_string(), Duration::from_secs(2))
            .await
            .unwrap();
        (session, server)
    }

    #[tokio::test]
    async fn query_round_trip() {
        let (mut session, server) = fixture(b"TEKTRONIX,MSO44B\n".to_vec()).await;
        let idn = session.query("*IDN?").await.unwrap();
        assert_eq!(idn, "TEKTRONIX,MSO44B");
        assert_eq!(server.await.unwrap(), b"*IDN?\n");
    }

    #[tokio::test]
    async fn read_raw_parses_definite_length_block() {
        // #14 + 4 payload bytes + newline terminator
        let mut wire = b"#14".to_vec();
        wire.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        wire.push(b'\n');

        let (mut session, _server) = fixture(wire.clone()).await;
        session.write(":CURVE?").await.unwrap();
        let raw = session.read_raw().await.unwrap();
        assert_eq!(raw, wire);
    }

    #[tokio::test]
    async fn unresponsive_instrument_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _keepalive = tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let mut session = TcpSession::connect(&addr.to_string(), Duration::from_millis(50))
            .await
            .unwrap();
        let err = session.query("*IDN?").await.unwrap_err();
        assert!(matches!(err, BenchError::Timeout(_)));
    }
}
