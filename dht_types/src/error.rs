use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("bincode (de)serialization failed: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("unsupported protocol version: server {server:?}, peer {peer:?}")]
    IncompatibleVersion { server: crate::envelope::Version, peer: crate::envelope::Version },
    #[error("message of {actual} bytes exceeds the {limit} byte cap")]
    MessageTooLarge { actual: u64, limit: u64 },
    #[error("stream did not start with the expected magic bytes")]
    BadMagicBytes,
}
