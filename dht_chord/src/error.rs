use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChordError {
    #[error("no successor known yet; node has not joined a ring")]
    NotJoined,
    #[error("rpc to {0} failed: {1}")]
    Unreachable(String, String),
    #[error("unexpected response from peer: {0}")]
    UnexpectedResponse(String),
    #[error("data plane error: {0}")]
    Node(#[from] dht_node::NodeError),
}
