use crate::config::Config;
use crate::connection::health::{ChannelHealthChecker, DelayHealthChecker};
use crate::connection::pool::ConnectionPools;
use crate::errors::RntbdError;
use crate::request::{RntbdRequestArgs, StoreResponse};
use log::debug;
use std::net::SocketAddr;
use std::sync::Arc;

pub type RntbdResult<T> = Result<T, RntbdError>;

/// Client facade: pooled RNTBD connections per physical endpoint.
///
/// Routing, retries, authorization signing and session consistency are
/// the caller's concern; this type submits one request to one endpoint
/// and hands back the [`StoreResponse`].
pub struct RntbdClient {
    connection_pools: Arc<ConnectionPools>,
}

impl RntbdClient {
    /// Initializes the client with the default channel health checker.
    pub fn new(config: Config) -> RntbdResult<Self> {
        RntbdClient::with_health_checker(config, Arc::new(DelayHealthChecker::default()))
    }

    pub fn with_health_checker(
        config: Config,
        health_checker: Arc<dyn ChannelHealthChecker>,
    ) -> RntbdResult<Self> {
        let config = Arc::new(config);
        let connection_pools = Arc::new(ConnectionPools::new(config, health_checker));
        Ok(RntbdClient { connection_pools })
    }

    /// Submits one request to the addressed endpoint and awaits its
    /// response.
    pub async fn request(
        &self,
        addr: SocketAddr,
        args: RntbdRequestArgs,
    ) -> RntbdResult<StoreResponse> {
        debug!("Submitting {:?} to {}", args.operation_type(), addr);
        let pool = self.connection_pools.get(addr).await?;
        let connection = pool.get().await?;
        connection.submit(args).await
    }
}
