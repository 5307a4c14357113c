//! Cluster mode: route keys to their owning peer by consistent hashing,
//! relay commands over pooled pipelined clients, and keep everything else
//! local.

mod client;
mod pool;
mod router;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::Config;
use crate::connection::ClientConn;
use crate::database::{key_str, DataServer, StandaloneServer};
use crate::hashring::HashRing;
use crate::resp::Reply;

use pool::PeerPool;
use router::{route_for, Route};

pub use client::PeerClient;

/// Appended to broadcast commands when they are relayed to a peer.
const BROADCAST_MARKER: &[u8] = b"local";

pub struct ClusterServer {
    self_addr: String,
    nodes: Vec<String>,
    ring: HashRing,
    pools: HashMap<String, Arc<PeerPool>>,
    local: StandaloneServer,
}

impl ClusterServer {
    pub async fn new(cfg: &Config) -> anyhow::Result<ClusterServer> {
        let local = StandaloneServer::new(cfg).await?;

        let mut nodes = cfg.peers.clone();
        nodes.push(cfg.self_addr.clone());
        let mut ring = HashRing::new();
        ring.add_nodes(&nodes);

        let pools = cfg
            .peers
            .iter()
            .map(|peer| (peer.clone(), Arc::new(PeerPool::new(peer.clone()))))
            .collect();

        info!(self_addr = %cfg.self_addr, peers = cfg.peers.len(), "cluster mode enabled");
        Ok(ClusterServer {
            self_addr: cfg.self_addr.clone(),
            nodes,
            ring,
            pools,
            local,
        })
    }

    fn owner_of(&self, key: &[u8]) -> String {
        self.ring
            .node_for(&key_str(key))
            .unwrap_or(&self.self_addr)
            .to_string()
    }

    /// Execute on `peer`: locally when the peer is this node, otherwise
    /// through a pooled client, selecting the connection's database first.
    /// The peer's reply comes back verbatim.
    async fn relay(&self, peer: &str, conn: &ClientConn, cmdline: &[Vec<u8>]) -> Reply {
        if peer == self.self_addr {
            return self.local.exec(conn, cmdline).await;
        }
        let Some(pool) = self.pools.get(peer) else {
            return Reply::err("peer not found");
        };
        let client = match pool.acquire().await {
            Ok(client) => client,
            Err(err) => return Reply::err(err.to_string()),
        };
        client
            .send(vec![
                b"SELECT".to_vec(),
                conn.selected_db().to_string().into_bytes(),
            ])
            .await;
        client.send(cmdline.to_vec()).await
    }

    async fn broadcast(&self, conn: &ClientConn, cmdline: &[Vec<u8>]) -> Vec<Reply> {
        let mut replies = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            replies.push(self.relay(node, conn, cmdline).await);
        }
        replies
    }

    async fn exec_keyed(&self, conn: &ClientConn, name: &str, cmdline: &[Vec<u8>]) -> Reply {
        if cmdline.len() < 2 {
            return Reply::arg_num_err(name);
        }
        let owner = self.owner_of(&cmdline[1]);
        self.relay(&owner, conn, cmdline).await
    }

    async fn exec_same_shard(&self, conn: &ClientConn, name: &str, cmdline: &[Vec<u8>]) -> Reply {
        if cmdline.len() < 2 {
            return Reply::arg_num_err(name);
        }
        let owner = self.owner_of(&cmdline[1]);
        for key in &cmdline[2..] {
            if self.owner_of(key) != owner {
                return Reply::err("source and destination keys are on different nodes");
            }
        }
        self.relay(&owner, conn, cmdline).await
    }

    async fn exec_broadcast(&self, conn: &ClientConn, cmdline: &[Vec<u8>]) -> Reply {
        // remote copies carry a trailing marker so the receiving node runs
        // the command locally instead of broadcasting it again
        let mut relayed = cmdline.to_vec();
        relayed.push(BROADCAST_MARKER.to_vec());

        let mut replies = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if node == &self.self_addr {
                replies.push(self.local.exec(conn, cmdline).await);
            } else {
                replies.push(self.relay(node, conn, &relayed).await);
            }
        }
        for reply in replies {
            if reply.is_error() {
                return reply;
            }
        }
        Reply::Ok
    }

    /// Group the key arguments by owner, run one sub-command per owner and
    /// sum the integer replies; errors surface after every group ran.
    async fn exec_multi_key(&self, conn: &ClientConn, name: &str, cmdline: &[Vec<u8>]) -> Reply {
        if cmdline.len() < 2 {
            return Reply::arg_num_err(name);
        }

        let mut grouped: HashMap<String, Vec<Vec<u8>>> = HashMap::new();
        for key in &cmdline[1..] {
            grouped
                .entry(self.owner_of(key))
                .or_default()
                .push(key.clone());
        }

        let mut total = 0i64;
        let mut first_error: Option<String> = None;
        for (owner, keys) in grouped {
            let mut sub = Vec::with_capacity(keys.len() + 1);
            sub.push(cmdline[0].clone());
            sub.extend(keys);
            match self.relay(&owner, conn, &sub).await {
                Reply::Integer(n) => total += n,
                reply if reply.is_error() => {
                    if first_error.is_none() {
                        first_error = reply.error_text().map(str::to_string);
                    }
                }
                _ => {
                    if first_error.is_none() {
                        first_error = Some("unexpected reply type from peer".to_string());
                    }
                }
            }
        }

        match first_error {
            Some(err) => Reply::err(format!("error occurs during multi-key {name}: {err}")),
            None => Reply::Integer(total),
        }
    }
}

#[async_trait]
impl DataServer for ClusterServer {
    async fn exec(&self, conn: &ClientConn, cmdline: &[Vec<u8>]) -> Reply {
        let Some(name_bytes) = cmdline.first() else {
            return Reply::err("empty command");
        };
        let name = String::from_utf8_lossy(name_bytes).to_lowercase();
        match route_for(&name) {
            None => Reply::unknown_cmd(&name),
            Some(Route::LocalOnly) => self.local.exec(conn, cmdline).await,
            Some(Route::Keyed) => self.exec_keyed(conn, &name, cmdline).await,
            Some(Route::SameShard) => self.exec_same_shard(conn, &name, cmdline).await,
            Some(Route::Broadcast) => {
                if cmdline.last().is_some_and(|arg| arg.as_slice() == BROADCAST_MARKER) {
                    self.local.exec(conn, &cmdline[..cmdline.len() - 1]).await
                } else {
                    self.exec_broadcast(conn, cmdline).await
                }
            }
            Some(Route::MultiKey) => self.exec_multi_key(conn, &name, cmdline).await,
        }
    }

    fn after_client_close(&self, conn: &ClientConn) {
        self.local.after_client_close(conn);
    }

    async fn close(&self) {
        self.local.close().await;
    }
}
