//! The local IRC hop: RFC 1459 message parsing and line framing.

pub mod codec;
pub mod message;
