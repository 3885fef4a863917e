use clap::Args;

/// CLI flags shared by every node process, regardless of which overlay it runs.
#[derive(Args, Debug, Clone)]
pub struct CommandLineConfig {
    /// Host nodes bind their loopback listeners to.
    #[arg(long, default_value_t = String::from("127.0.0.1"))]
    pub host: String,

    /// Caps message size, defaults to 1MiB.
    #[arg(long, default_value_t = 1_048_576)]
    pub message_size: usize,

    /// Log level passed to the tracing subscriber.
    #[arg(long, default_value_t = String::from("info"))]
    pub log_level: String,

    /// Maximum concurrent client connections per node.
    #[arg(long, default_value_t = 1000)]
    pub maximum_clients: usize,

    /// Worker pool size per node, capped at 10 per the overlay's concurrency model.
    #[arg(long, default_value_t = 10)]
    pub worker_pool_size: usize,

    /// Optional timeout, in milliseconds, applied to outbound RPCs.
    #[arg(long, default_value_t = 2000)]
    pub rpc_timeout_ms: u64,
}

impl Default for CommandLineConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            message_size: 1_048_576,
            log_level: String::from("info"),
            maximum_clients: 1000,
            worker_pool_size: 10,
            rpc_timeout_ms: 2000,
        }
    }
}

impl CommandLineConfig {
    pub fn worker_pool_size(&self) -> usize {
        self.worker_pool_size.min(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_pool_size_is_capped_at_ten() {
        let mut config = CommandLineConfig::default();
        config.worker_pool_size = 50;
        assert_eq!(config.worker_pool_size(), 10);
    }
}
