pub mod client_ops;
pub mod dispatch;
pub mod error;
pub mod membership;
pub mod routing;
pub mod state;

pub use dispatch::PastryDispatcher;
pub use error::PastryError;
pub use routing::closer_abs_hex;
pub use state::{PastryNode, B, COLUMNS, LEAF_SIZE, NEIGHBORHOOD_SIZE, R};

use dht_types::NodeHandle;
use dht_utils::CommandLineConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use task_manager::TaskManager;

/// Starts a Pastry node at `position` in synthetic proximity space: binds its
/// listener, then either joins through `bootstrap` or becomes a singleton
/// overlay. Unlike Chord, Pastry has no periodic stabilizer — routing state
/// heals reactively on a failed hop (see `routing::forward`) and on the
/// `NODE_LEAVE` broadcast the network issues when a node departs.
pub async fn start(
    id: dht_types::NodeId,
    host: &str,
    port: u16,
    position: f64,
    bootstrap: Option<NodeHandle>,
    config: &CommandLineConfig,
    task_manager: &TaskManager,
) -> Result<Arc<PastryNode>, PastryError> {
    let rpc_timeout = (config.rpc_timeout_ms > 0).then(|| Duration::from_millis(config.rpc_timeout_ms));
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|_| PastryError::UnexpectedResponse(format!("invalid bind address {host}:{port}")))?;

    let node = Arc::new(PastryNode::new(id, addr, position, rpc_timeout));
    let dispatcher = Arc::new(PastryDispatcher(node.clone()));
    dht_node::server::serve(host, port, dispatcher, config, task_manager)
        .await
        .map_err(|error| PastryError::Unreachable(addr.to_string(), error.to_string()))?;

    if let Some(bootstrap) = bootstrap {
        node.join(bootstrap).await?;
    }
    Ok(node)
}
