use dht_types::envelope::{MAGIC_BYTES, VERSION, VERSION_LENGTH};
use dht_types::{Request, Response, Version, WireEnvelope};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};

use crate::client::ConnectedClient;

pub const LENGTH_HEADER_SIZE: usize = dht_types::envelope::LENGTH_HEADER_SIZE;
pub const MAX_MESSAGE_BYTES: u64 = dht_types::envelope::MAX_MESSAGE_BYTES;

/// Whether a worker should keep serving its connection or drop it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Continue,
    Break,
}

/// One cycle of the request/response protocol shared by every node, whether
/// it is dispatching a data operation or a ring-maintenance RPC. Each worker
/// in the `dht_node` accept pool drives one connection through `process`
/// until it returns `TaskState::Break`.
#[async_trait::async_trait]
pub trait DhtProtocol: Send + Sync + Debug {
    fn connected_client(&self) -> &ConnectedClient;
    fn maximum_message_size(&self) -> u64 {
        MAX_MESSAGE_BYTES
    }
    fn reader(&self) -> Arc<Mutex<BufReader<TcpStream>>>;

    fn prefix_log(&self, message: impl std::fmt::Display + Send) -> String {
        format!("client [{}]: {}", self.connected_client().address, message)
    }

    async fn process(&self) -> TaskState {
        let mut magic_bytes_buf = [0u8; MAGIC_BYTES.len()];
        let mut version_buf = [0u8; VERSION_LENGTH];
        let mut length_buf = [0u8; LENGTH_HEADER_SIZE];
        let reader = self.reader();
        let mut reader = reader.lock().await;

        match reader.read_exact(&mut magic_bytes_buf).await {
            Err(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                tracing::debug!("{}", self.prefix_log("peer hung up"));
                TaskState::Break
            }
            Err(e) => {
                tracing::error!("{}", self.prefix_log(format!("read error: {e}")));
                TaskState::Break
            }
            Ok(_) => {
                if magic_bytes_buf != MAGIC_BYTES {
                    return self.handle_error(reader, "invalid magic bytes", false).await;
                }
                if let Err(e) = reader.read_exact(&mut version_buf).await {
                    return self.handle_error(reader, format!("could not read version: {e}"), false).await;
                }
                let version = match Version::from_bytes(&version_buf) {
                    Ok(v) => v,
                    Err(e) => return self.handle_error(reader, format!("bad version: {e}"), false).await,
                };
                if !VERSION.is_compatible(&version) {
                    return self
                        .handle_error(reader, format!("incompatible version {version:?}"), false)
                        .await;
                }
                if let Err(e) = reader.read_exact(&mut length_buf).await {
                    return self.handle_error(reader, format!("could not read length: {e}"), false).await;
                }
                let data_length = u64::from_le_bytes(length_buf);
                if data_length > self.maximum_message_size() {
                    return self
                        .handle_error(
                            reader,
                            format!("message of {data_length} bytes exceeds {} byte cap", self.maximum_message_size()),
                            true,
                        )
                        .await;
                }
                let mut data: Vec<_> = match fallible_collections::FallibleVec::try_with_capacity(data_length as usize) {
                    Ok(v) => v,
                    Err(e) => return self.handle_error(reader, format!("allocation failed: {e:?}"), true).await,
                };
                if data.try_resize(data_length as usize, 0u8).is_err() {
                    return self.handle_error(reader, "resize failed", true).await;
                }
                if let Err(e) = reader.read_exact(&mut data).await {
                    return self.handle_error(reader, format!("could not read body: {e}"), false).await;
                }
                match Request::from_payload(&data) {
                    Ok(request) => {
                        tracing::debug!("{}", self.prefix_log(format!("request {request:?}")));
                        let response = self.handle(request).await;
                        if let Ok(frame) = response.to_frame() {
                            if let Err(e) = reader.get_mut().write_all(&frame).await {
                                tracing::error!("{}", self.prefix_log(format!("write error: {e}")));
                                return TaskState::Break;
                            }
                        }
                        TaskState::Continue
                    }
                    Err(e) => self.handle_error(reader, format!("could not deserialize request: {e}"), true).await,
                }
            }
        }
    }

    async fn handle_error(
        &self,
        mut reader: MutexGuard<'_, BufReader<TcpStream>>,
        error: impl ToString + Send,
        respond_with_error: bool,
    ) -> TaskState {
        let error = self.prefix_log(error.to_string());
        tracing::error!("{error}");
        if respond_with_error {
            if let Ok(frame) = Response::from_error(error).to_frame() {
                if let Err(e) = reader.get_mut().write_all(&frame).await {
                    tracing::error!("could not write error response: {e}");
                }
            }
        }
        TaskState::Break
    }

    async fn handle(&self, request: Request) -> Response;
}
