use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to {addr}: {source}")]
    Connect { addr: std::net::SocketAddr, source: std::io::Error },
    #[error("io error talking to peer: {0}")]
    Io(#[from] std::io::Error),
    #[error("(de)serialization failed: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("rpc timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("peer returned an error: {0}")]
    Remote(String),
}
