//! Service-authenticated Bolt connection pool.
//!
//! Connections are dialed lazily, handshaked, and authenticated once with
//! the service identity; per-request identity is layered on top through
//! impersonation, never through re-authentication. A semaphore bounds the
//! total number of live connections; idle connections are RESET before
//! reuse and dropped when the reset fails.

use std::sync::{Arc, Mutex};

use boltr::client::BoltConnection;
use boltr::types::{BoltDict, BoltValue};
use tokio::net::lookup_host;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::errors::GatewayError;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// `host:port` of the Bolt endpoint.
    pub address: String,
    pub username: String,
    pub password: String,
    pub max_connections: usize,
}

pub struct ConnectionPool {
    config: PoolConfig,
    idle: Mutex<Vec<BoltConnection>>,
    permits: Arc<Semaphore>,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Arc<Self> {
        let permits = Arc::new(Semaphore::new(config.max_connections.max(1)));
        Arc::new(ConnectionPool {
            config,
            idle: Mutex::new(Vec::new()),
            permits,
        })
    }

    /// Borrows a connection, dialing a new one when the idle list is empty.
    /// Waits when all `max_connections` are in use.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConnection, GatewayError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| GatewayError::Transport("connection pool closed".into()))?;

        // Reuse an idle connection if one survives a RESET.
        loop {
            let candidate = self.idle.lock().expect("pool lock").pop();
            let Some(mut conn) = candidate else { break };
            match conn.reset().await {
                Ok(()) => {
                    return Ok(PooledConnection {
                        pool: Arc::clone(self),
                        conn: Some(conn),
                        broken: false,
                        _permit: permit,
                    });
                }
                Err(e) => {
                    log::debug!("dropping stale bolt connection: {}", e);
                }
            }
        }

        let conn = self.dial().await?;
        Ok(PooledConnection {
            pool: Arc::clone(self),
            conn: Some(conn),
            broken: false,
            _permit: permit,
        })
    }

    async fn dial(&self) -> Result<BoltConnection, GatewayError> {
        let mut addrs = lookup_host(self.config.address.as_str())
            .await
            .map_err(|e| GatewayError::Transport(format!("resolving {}: {}", self.config.address, e)))?;
        let addr = addrs.next().ok_or_else(|| {
            GatewayError::Transport(format!("no address for {}", self.config.address))
        })?;

        let mut conn = BoltConnection::connect(addr)
            .await
            .map_err(GatewayError::from_bolt)?;

        let extra = BoltDict::from([(
            "user_agent".to_string(),
            BoltValue::String(format!("boltgate/{}", env!("CARGO_PKG_VERSION"))),
        )]);
        conn.hello(extra).await.map_err(GatewayError::from_bolt)?;
        conn.logon("basic", Some(&self.config.username), Some(&self.config.password))
            .await
            .map_err(GatewayError::from_bolt)?;

        log::debug!(
            "opened bolt connection to {} (protocol {:?})",
            self.config.address,
            conn.version()
        );
        Ok(conn)
    }

    fn release(&self, conn: BoltConnection) {
        self.idle.lock().expect("pool lock").push(conn);
    }

    /// Dials and immediately releases one connection; used by the startup
    /// connectivity check.
    pub async fn verify_connectivity(self: &Arc<Self>) -> Result<(), GatewayError> {
        let _conn = self.acquire().await?;
        Ok(())
    }
}

/// A borrowed connection. Returns itself to the pool on drop unless marked
/// broken, so release happens on every exit path.
pub struct PooledConnection {
    pool: Arc<ConnectionPool>,
    conn: Option<BoltConnection>,
    broken: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    pub fn conn(&mut self) -> &mut BoltConnection {
        self.conn.as_mut().expect("connection taken")
    }

    /// Prevents the connection from re-entering the pool; used after
    /// transport-level failures where the stream state is unknown.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.broken {
                log::debug!("discarding broken bolt connection");
            } else {
                self.pool.release(conn);
            }
        }
    }
}
