//! Request signing, endpoint isolation, and the transport seam (C1, C2).
//!
//! Everything downstream of "bytes on the wire" — the gRPC channel, the
//! protobuf codec — is out of scope; `Transport` is the boundary this crate
//! owns and `mq-producer` drives.

pub mod isolation;
pub mod signer;
pub mod transport;

pub use isolation::IsolationRegistry;
pub use signer::{Metadata, Signer};
pub use transport::{Transport, TransportError};
