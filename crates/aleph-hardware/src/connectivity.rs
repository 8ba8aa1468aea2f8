use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::ConnectivityCheck;

/// Reachability probe that opens a TCP connection to `host:port`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectivityCheck;

#[async_trait]
impl ConnectivityCheck for TcpConnectivityCheck {
    async fn is_reachable(&self, endpoint: &str, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, TcpStream::connect(endpoint)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(endpoint, error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                debug!(endpoint, ?timeout, "Connectivity probe timed out");
                false
            }
        }
    }
}
