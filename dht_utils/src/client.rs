use flurry::HashSet as ConcurrentHashSet;
use std::net::SocketAddr;
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectedClient {
    pub address: String,
    pub time_connected: String,
}

/// Tracks live connections to a node's accept loop and enforces the
/// configured connection cap.
#[derive(Debug)]
pub struct ClientHandler {
    clients: ConcurrentHashSet<ConnectedClient>,
    maximum_clients: usize,
}

impl ClientHandler {
    pub fn new(maximum_clients: usize) -> Self {
        Self {
            clients: ConcurrentHashSet::with_capacity(maximum_clients),
            maximum_clients,
        }
    }

    pub fn connect(&self, addr: SocketAddr) -> Option<ConnectedClient> {
        let pinned = self.clients.pin();
        if pinned.len() >= self.maximum_clients {
            tracing::warn!("maximum clients ({}) reached, rejecting {addr}", self.maximum_clients);
            return None;
        }
        let client = ConnectedClient {
            address: format!("{addr}"),
            time_connected: format!("{:?}", SystemTime::now()),
        };
        pinned.insert(client.clone());
        Some(client)
    }

    pub fn disconnect(&self, client: &ConnectedClient) {
        self.clients.pin().remove(client);
    }

    pub fn connected_count(&self) -> usize {
        self.clients.pin().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_past_the_configured_cap() {
        let handler = ClientHandler::new(1);
        let a: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let b: SocketAddr = "127.0.0.1:9002".parse().unwrap();
        assert!(handler.connect(a).is_some());
        assert!(handler.connect(b).is_none());
    }
}
