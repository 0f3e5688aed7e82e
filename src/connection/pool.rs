use crate::config::Config;
use crate::connection::health::ChannelHealthChecker;
use crate::connection::{Connection, ConnectionResult};
use crate::errors::ConnectionError;
use async_trait::async_trait;
use bb8::{ErrorSink, Pool, RunError};
use log::{debug, error};
use std::collections::HashMap;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One bb8 pool per physical endpoint, created on first use.
#[derive(Debug, new)]
pub struct ConnectionPools {
    config: Arc<Config>,
    health_checker: Arc<dyn ChannelHealthChecker>,
    #[new(default)]
    pools: RwLock<HashMap<SocketAddr, Arc<Pool<ConnectionManager>>>>,
    #[new(default)]
    connection_pools_logger: ConnectionPoolsLogger,
}

impl ConnectionPools {
    pub async fn get(
        &self,
        addr: SocketAddr,
    ) -> Result<Arc<Pool<ConnectionManager>>, RunError<ConnectionError>> {
        if let Some(pool) = self.pools.read().await.get(&addr) {
            return Ok(pool.clone());
        }
        self.create_pool(addr).await
    }

    async fn create_pool(
        &self,
        addr: SocketAddr,
    ) -> Result<Arc<Pool<ConnectionManager>>, RunError<ConnectionError>> {
        debug!("Creating connection pool for '{}'", addr);
        let mut pools = self.pools.write().await;
        if let Some(pool) = pools.get(&addr) {
            return Ok(pool.clone());
        }
        let pool = Arc::new(
            Pool::builder()
                .max_lifetime(self.config.lifetime)
                .max_size(self.config.max_connections)
                .test_on_check_out(self.config.test_connection)
                .error_sink(self.connection_pools_logger.boxed_clone())
                .build(ConnectionManager {
                    addr,
                    config: self.config.clone(),
                    health_checker: self.health_checker.clone(),
                })
                .await?,
        );
        pools.insert(addr, pool.clone());
        Ok(pool)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ConnectionPoolsLogger;

impl<E> ErrorSink<E> for ConnectionPoolsLogger
where
    E: Debug,
{
    fn sink(&self, error: E) {
        error!("Connection error {:?}", error)
    }

    fn boxed_clone(&self) -> Box<dyn ErrorSink<E>> {
        Box::new(*self)
    }
}

pub struct ConnectionManager {
    addr: SocketAddr,
    config: Arc<Config>,
    health_checker: Arc<dyn ChannelHealthChecker>,
}

#[async_trait]
impl bb8::ManageConnection for ConnectionManager {
    type Connection = Connection;
    type Error = ConnectionError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        Connection::connect(self.addr, self.config.clone(), self.health_checker.clone()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        verify(conn).await
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

async fn verify(connection: &Connection) -> ConnectionResult<()> {
    if connection.is_healthy().await {
        Ok(())
    } else {
        Err(ConnectionError::Unhealthy)
    }
}
