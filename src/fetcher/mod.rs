//! Device program fetching.
//!
//! A [`ProgramFetcher`] is bound to one `(port, address)` pair and exchanges
//! a single command for the device's program text. The gateway obtains a
//! fresh fetcher per request from a [`FetcherFactory`], which is the seam
//! tests use to substitute fake devices.

pub mod tcp;

use async_trait::async_trait;

use crate::error::Result;

pub use tcp::{TcpFetcherFactory, TcpProgramFetcher};

/// Sends a command to one device and returns its raw text reply.
///
/// Every connection, protocol, or remote failure is returned as an error
/// with a descriptive message; implementations must bound their own latency.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgramFetcher: Send + Sync {
    async fn send_command(&self, command: &str) -> Result<String>;
}

/// Builds a [`ProgramFetcher`] bound to a device.
pub trait FetcherFactory: Send + Sync {
    fn fetcher(&self, port: u64, address: &str) -> Box<dyn ProgramFetcher>;
}

/// Factory whose fetchers all return one canned reply.
#[cfg(test)]
pub(crate) struct StaticFactory(pub std::result::Result<&'static str, &'static str>);

#[cfg(test)]
struct StaticFetcher(std::result::Result<&'static str, &'static str>);

#[cfg(test)]
#[async_trait]
impl ProgramFetcher for StaticFetcher {
    async fn send_command(&self, _command: &str) -> Result<String> {
        self.0
            .map(str::to_string)
            .map_err(|msg| crate::error::RelayError::Protocol(msg.to_string()))
    }
}

#[cfg(test)]
impl FetcherFactory for StaticFactory {
    fn fetcher(&self, _port: u64, _address: &str) -> Box<dyn ProgramFetcher> {
        Box::new(StaticFetcher(self.0))
    }
}
