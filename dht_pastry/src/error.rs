use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PastryError {
    #[error("no live routing path to {0}")]
    NoRoute(String),
    #[error("rpc to {0} failed: {1}")]
    Unreachable(String, String),
    #[error("unexpected response from peer: {0}")]
    UnexpectedResponse(String),
    #[error("data plane error: {0}")]
    Node(#[from] dht_node::NodeError),
}
