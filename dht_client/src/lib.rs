pub mod error;

pub use error::ClientError;

use dht_types::envelope::{LENGTH_HEADER_SIZE, MAGIC_BYTES, VERSION};
use dht_types::{Request, Response, WireEnvelope};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Sends one request to `addr` over a brand new TCP connection and returns
/// the decoded response. No connection pooling or multiplexing: every RPC,
/// whether a ring-maintenance call or a data operation, pays for its own
/// connect/handshake/close, matching the overlay's cooperative concurrency
/// model where a worker blocks on exactly one outstanding RPC at a time.
pub async fn send_request(
    addr: SocketAddr,
    request: &Request,
    rpc_timeout: Option<Duration>,
) -> Result<Response, ClientError> {
    let call = call(addr, request);
    match rpc_timeout {
        Some(duration) => timeout(duration, call)
            .await
            .map_err(|_| ClientError::Timeout(duration))?,
        None => call.await,
    }
}

async fn call(addr: SocketAddr, request: &Request) -> Result<Response, ClientError> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|source| ClientError::Connect { addr, source })?;

    let version_bytes = VERSION.to_bytes()?;
    let frame = request.to_frame()?;
    let mut buffer = Vec::with_capacity(MAGIC_BYTES.len() + version_bytes.len() + frame.len());
    buffer.extend(MAGIC_BYTES);
    buffer.extend(version_bytes);
    buffer.extend(frame);
    stream.write_all(&buffer).await?;

    let mut length_buf = [0u8; LENGTH_HEADER_SIZE];
    stream.read_exact(&mut length_buf).await?;
    let data_length = u64::from_le_bytes(length_buf);
    let mut payload = vec![0u8; data_length as usize];
    stream.read_exact(&mut payload).await?;

    let response = Response::from_payload(&payload)?;
    if let Response::Error(message) = &response {
        return Err(ClientError::Remote(message.clone()));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dht_types::NodeId;
    use tokio::io::AsyncReadExt as _;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn round_trips_a_find_successor_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut magic = [0u8; MAGIC_BYTES.len()];
            socket.read_exact(&mut magic).await.unwrap();
            assert_eq!(magic, MAGIC_BYTES);
            let mut version_buf = [0u8; dht_types::envelope::VERSION_LENGTH];
            socket.read_exact(&mut version_buf).await.unwrap();
            let mut length_buf = [0u8; LENGTH_HEADER_SIZE];
            socket.read_exact(&mut length_buf).await.unwrap();
            let len = u64::from_le_bytes(length_buf) as usize;
            let mut payload = vec![0u8; len];
            socket.read_exact(&mut payload).await.unwrap();
            let request = Request::from_payload(&payload).unwrap();
            assert!(matches!(request, Request::FindSuccessor { .. }));

            let response = Response::Node(dht_types::NodeHandle {
                id: NodeId::from_u16(0x1234),
                addr,
            });
            let frame = response.to_frame().unwrap();
            socket.write_all(&frame).await.unwrap();
        });

        let request = Request::FindSuccessor { id: NodeId::from_u16(0x1234) };
        let response = send_request(addr, &request, None).await.unwrap();
        match response {
            Response::Node(handle) => assert_eq!(handle.id, NodeId::from_u16(0x1234)),
            other => panic!("unexpected response: {other:?}"),
        }
        server.await.unwrap();
    }
}
