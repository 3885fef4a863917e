pub mod cli;
pub mod client;
pub mod protocol;

pub use cli::CommandLineConfig;
pub use client::{ClientHandler, ConnectedClient};
pub use protocol::{DhtProtocol, TaskState};
