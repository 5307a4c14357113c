//! Per-peer client pool: a fixed-size free list behind a semaphore.
//! Clients are built lazily on first use and returned on drop.

use std::io;
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::client::PeerClient;

const POOL_SIZE: usize = 4;

pub struct PeerPool {
    addr: String,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<PeerClient>>,
}

impl PeerPool {
    pub fn new(addr: String) -> PeerPool {
        PeerPool {
            addr,
            permits: Arc::new(Semaphore::new(POOL_SIZE)),
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Borrow a client, connecting a fresh one when the free list is
    /// empty. The permit bounds concurrent borrowers to the pool size.
    pub async fn acquire(self: &Arc<PeerPool>) -> io::Result<PooledClient> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "peer pool closed"))?;
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();
        let client = match reused {
            Some(client) => client,
            None => PeerClient::connect(&self.addr).await?,
        };
        Ok(PooledClient {
            client: Some(client),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }
}

pub struct PooledClient {
    client: Option<PeerClient>,
    pool: Arc<PeerPool>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledClient {
    type Target = PeerClient;

    fn deref(&self) -> &PeerClient {
        self.client.as_ref().expect("client taken before drop")
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool
                .idle
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(client);
        }
    }
}
