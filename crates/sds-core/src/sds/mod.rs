//! Safety data sheet field extraction.

pub mod assembler;
mod parser;
pub mod rules;

pub use assembler::{assemble, RecordOverrides};
pub use parser::{ParsedSds, SdsParser};
