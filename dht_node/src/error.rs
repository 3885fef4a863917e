use thiserror::Error;

/// The five abstract error kinds every overlay maps its concrete failures
/// onto: routing forwards `NotOwner`, replication swallows `Unreachable`
/// (non-fatal, per the spec's replication contract), maintenance logs and
/// self-corrects `Invariant`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("no record with id {0} on this node")]
    NotFound(String),
    #[error("this node does not own id {0}")]
    NotOwner(String),
    #[error("rpc to {0} failed: {1}")]
    Unreachable(String, String),
    #[error("conflicting operation: {0}")]
    Conflict(String),
    #[error("invariant violated: {0}")]
    Invariant(String),
}
