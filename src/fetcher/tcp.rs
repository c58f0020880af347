//! Plain TCP program fetcher.
//!
//! Protocol: write the command line, then read until the controller closes
//! the socket. Controllers that keep the socket open are handled by the read
//! deadline: whatever arrived before it elapsed is the program.

use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use super::{FetcherFactory, ProgramFetcher};
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

/// Read buffer size per socket read.
const READ_CHUNK: usize = 4096;

/// Fetcher bound to a single device socket.
#[derive(Debug, Clone)]
pub struct TcpProgramFetcher {
    address: String,
    port: u64,
    connect_timeout: Duration,
    read_timeout: Duration,
    max_response_bytes: usize,
}

impl TcpProgramFetcher {
    pub fn new(
        address: &str,
        port: u64,
        connect_timeout: Duration,
        read_timeout: Duration,
        max_response_bytes: usize,
    ) -> Self {
        Self {
            address: address.to_string(),
            port,
            connect_timeout,
            read_timeout,
            max_response_bytes,
        }
    }

    /// `host:port` form accepted by `TcpStream::connect`, bracketing IPv6
    /// literals.
    pub fn target(&self) -> String {
        match self.address.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.port),
            _ => format!("{}:{}", self.address, self.port),
        }
    }

    async fn connect(&self, target: &str) -> Result<TcpStream> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(RelayError::Connect {
                target: target.to_string(),
                source,
            }),
            Err(_) => Err(RelayError::Timeout {
                stage: "connect",
                secs: self.connect_timeout.as_secs_f64(),
            }),
        }
    }
}

#[async_trait]
impl ProgramFetcher for TcpProgramFetcher {
    async fn send_command(&self, command: &str) -> Result<String> {
        if self.address.trim().is_empty() {
            return Err(RelayError::InvalidTarget("empty device address".into()));
        }
        if u16::try_from(self.port).is_err() {
            return Err(RelayError::InvalidTarget(format!(
                "port out of range: {}",
                self.port
            )));
        }
        let target = self.target();
        let mut stream = self.connect(&target).await?;
        debug!(target = %target, "Connected, sending command");

        stream.write_all(command.as_bytes()).await?;
        stream.flush().await?;

        let mut buf = Vec::new();
        let outcome = tokio::time::timeout(
            self.read_timeout,
            read_until_closed(&mut stream, &mut buf, self.max_response_bytes),
        )
        .await;

        match outcome {
            Ok(result) => result?,
            Err(_) if !buf.is_empty() => {
                debug!(
                    target = %target,
                    bytes = buf.len(),
                    "Read deadline reached with data, treating as complete"
                );
            }
            Err(_) => {
                return Err(RelayError::Timeout {
                    stage: "read",
                    secs: self.read_timeout.as_secs_f64(),
                })
            }
        }

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Append everything the peer sends to `buf` until EOF.
async fn read_until_closed(stream: &mut TcpStream, buf: &mut Vec<u8>, max: usize) -> Result<()> {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        if buf.len() + n > max {
            return Err(RelayError::Protocol(format!(
                "program exceeded max size ({} bytes)",
                max
            )));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Builds [`TcpProgramFetcher`]s sharing one set of timeouts and limits.
#[derive(Debug, Clone)]
pub struct TcpFetcherFactory {
    connect_timeout: Duration,
    read_timeout: Duration,
    max_response_bytes: usize,
}

impl TcpFetcherFactory {
    pub fn new(connect_timeout: Duration, read_timeout: Duration, max_response_bytes: usize) -> Self {
        Self {
            connect_timeout,
            read_timeout,
            max_response_bytes,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.connect_timeout(),
            config.read_timeout(),
            config.max_response_bytes,
        )
    }
}

impl FetcherFactory for TcpFetcherFactory {
    fn fetcher(&self, port: u64, address: &str) -> Box<dyn ProgramFetcher> {
        Box::new(TcpProgramFetcher::new(
            address,
            port,
            self.connect_timeout,
            self.read_timeout,
            self.max_response_bytes,
        ))
    }
}
