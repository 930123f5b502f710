//! Wire types and packet primitives for SSH-2.0 (RFC 4253/4252/4254) and
//! the EXT_INFO/strict-KEX extensions. No I/O, no cryptography — this
//! crate only knows how to turn bytes into typed messages and back.

pub mod arch;
pub mod auth;
pub mod connect;
mod error;
pub mod kex;
pub mod message;
pub mod transport;

pub use error::ProtoError;
