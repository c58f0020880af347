//! Program relay: serves the program loaded on a robot controller as JSON.
//!
//! A request for `(port, address)` is answered from a short-lived cache or by
//! asking the controller for its program over a plain socket, splitting the
//! text into header and body, and encoding the result.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod gateway;
pub mod logging;
pub mod program;

pub use cache::{CacheKey, CacheStats, ResponseCache};
pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use fetcher::{FetcherFactory, ProgramFetcher, TcpFetcherFactory, TcpProgramFetcher};
pub use gateway::{FetchResult, ProgramGateway};
pub use program::{encode, parse, ParsedProgram, ResultPayload};
