pub mod client_ops;
pub mod dispatch;
pub mod error;
pub mod maintenance;
pub mod membership;
pub mod routing;
pub mod state;

pub use dispatch::ChordDispatcher;
pub use error::ChordError;
pub use state::{ChordNode, M, S};

use dht_types::NodeHandle;
use dht_utils::CommandLineConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use task_manager::TaskManager;

/// Starts a Chord node: binds its listener at `host:port`, joins the ring
/// through `bootstrap` (or becomes a singleton ring when `bootstrap` is
/// `None`), and spawns the two recurring maintenance ticks. Mirrors the
/// overlay-agnostic accept loop in `dht_node::server::serve`, parameterized
/// here with the Chord dispatch table.
pub async fn start(
    id: dht_types::NodeId,
    host: &str,
    port: u16,
    bootstrap: Option<NodeHandle>,
    config: &CommandLineConfig,
    task_manager: &TaskManager,
) -> Result<Arc<ChordNode>, ChordError> {
    let rpc_timeout = (config.rpc_timeout_ms > 0).then(|| Duration::from_millis(config.rpc_timeout_ms));
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|_| ChordError::UnexpectedResponse(format!("invalid bind address {host}:{port}")))?;

    let node = Arc::new(ChordNode::new(id, addr, rpc_timeout));
    let dispatcher = Arc::new(ChordDispatcher(node.clone()));
    dht_node::server::serve(host, port, dispatcher, config, task_manager)
        .await
        .map_err(|error| ChordError::Unreachable(addr.to_string(), error.to_string()))?;

    match bootstrap {
        Some(bootstrap) => node.join(bootstrap).await?,
        None => {
            node.set_first_successor(node.handle()).await;
        }
    }
    node.spawn_maintenance(task_manager).await;
    Ok(node)
}
