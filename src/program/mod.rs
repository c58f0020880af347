//! Program text handling: header/body split and the JSON result payload.

pub mod encoder;
pub mod parser;

pub use encoder::{encode, ResultPayload};
pub use parser::{parse, ParsedProgram, HEADER_BEGIN, HEADER_END};
