//! The SSH binary packet protocol: version banner exchange, framed
//! encrypt/MAC/compress packet I/O, and the collaborator traits
//! (`Cipher`/`Mac`/`Compressor`) the framing consumes without knowing any
//! concrete algorithm.

pub mod banner;
pub mod crypto;
mod error;
pub mod framing;

pub use error::TransportError;
