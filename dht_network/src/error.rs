use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("no node with id {0} in the registry")]
    UnknownNode(String),
    #[error("registry is empty, nothing to bootstrap from")]
    Empty,
    #[error("invalid bind address {0}")]
    InvalidAddress(String),
    #[error(transparent)]
    Chord(#[from] dht_chord::ChordError),
    #[error(transparent)]
    Pastry(#[from] dht_pastry::PastryError),
    #[error(transparent)]
    Client(#[from] dht_client::ClientError),
}
