use async_trait::async_trait;
use dht_types::{Request, Response};
use dht_utils::client::{ClientHandler, ConnectedClient};
use dht_utils::{CommandLineConfig, DhtProtocol};
use std::fmt::Debug;
use std::io::Result as IoResult;
use std::net::SocketAddr;
use std::sync::Arc;
use task_manager::TaskManager;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Semaphore};

/// The full RPC dispatch table a node exposes, implemented once per overlay
/// (`dht_chord`, `dht_pastry`). Each owns a [`crate::DataPlane`] internally
/// and delegates the data-plane variants to it, matching the rest itself.
#[async_trait]
pub trait Dispatcher: Send + Sync + Debug {
    async fn dispatch(&self, request: Request) -> Response;
}

#[derive(Debug)]
pub struct NodeTask<D> {
    reader: Arc<Mutex<BufReader<TcpStream>>>,
    connected_client: ConnectedClient,
    maximum_message_size: u64,
    dispatcher: Arc<D>,
}

#[async_trait]
impl<D: Dispatcher + 'static> DhtProtocol for NodeTask<D> {
    fn connected_client(&self) -> &ConnectedClient {
        &self.connected_client
    }

    fn maximum_message_size(&self) -> u64 {
        self.maximum_message_size
    }

    fn reader(&self) -> Arc<Mutex<BufReader<TcpStream>>> {
        self.reader.clone()
    }

    async fn handle(&self, request: Request) -> Response {
        self.dispatcher.dispatch(request).await
    }
}

/// Binds a node's loopback listener and spawns the accept loop onto
/// `task_manager`, gated by a semaphore so at most `worker_pool_size`
/// connections are served concurrently - the cooperative pool the spec
/// requires. Returns the bound address immediately; accepting happens in
/// the background task.
pub async fn serve<D: Dispatcher + 'static>(
    host: &str,
    port: u16,
    dispatcher: Arc<D>,
    config: &CommandLineConfig,
    task_manager: &TaskManager,
) -> IoResult<SocketAddr> {
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    let local_addr = listener.local_addr()?;
    let client_handler = Arc::new(ClientHandler::new(config.maximum_clients));
    let maximum_message_size = config.message_size as u64;
    let worker_pool_size = config.worker_pool_size();
    let task_name = format!("node-accept-loop-{local_addr}");

    task_manager
        .spawn_task_loop(
            move |guard| async move {
                let permits = Arc::new(Semaphore::new(worker_pool_size));
                loop {
                    tokio::select! {
                        _ = guard.is_cancelled() => {
                            tracing::info!(%local_addr, "accept loop shutting down");
                            break;
                        }
                        accepted = listener.accept() => {
                            let (stream, peer_addr) = match accepted {
                                Ok(pair) => pair,
                                Err(error) => {
                                    tracing::error!(%error, "accept failed");
                                    continue;
                                }
                            };
                            let Some(connected_client) = client_handler.connect(peer_addr) else {
                                continue;
                            };
                            let permits = permits.clone();
                            let client_handler = client_handler.clone();
                            let dispatcher = dispatcher.clone();
                            tokio::spawn(async move {
                                let Ok(_permit) = permits.acquire_owned().await else {
                                    return;
                                };
                                let task = NodeTask {
                                    reader: Arc::new(Mutex::new(BufReader::new(stream))),
                                    connected_client: connected_client.clone(),
                                    maximum_message_size,
                                    dispatcher,
                                };
                                while dht_utils::TaskState::Continue == task.process().await {}
                                client_handler.disconnect(&connected_client);
                            });
                        }
                    }
                }
            },
            task_name,
        )
        .await;

    Ok(local_addr)
}
