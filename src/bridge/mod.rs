//! The bridge core: one engine per IRC connection, one acceptor per process.

pub mod engine;
pub mod server;
