//! Per-client connection state and the connection read loop.
//!
//! A [`ClientConn`] owns the write half of the socket behind a mutex, a
//! wait counter for in-flight replies (drained on close) and the selected
//! database index. AOF replay uses a synthetic connection with no socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::database::DataServer;
use crate::parser::parse_stream;
use crate::resp::Reply;

/// Counts outstanding work and lets a closer wait, with a deadline, until
/// the count drains to zero.
pub struct WaitCounter {
    count: AtomicUsize,
    notify: Notify,
}

impl Default for WaitCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitCounter {
    pub fn new() -> Self {
        WaitCounter {
            count: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    pub fn add(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn done(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.notify.notify_waiters();
        }
    }

    /// Wait until the count reaches zero; returns false on deadline.
    pub async fn wait_timeout(&self, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        loop {
            let notified = self.notify.notified();
            if self.count.load(Ordering::Acquire) == 0 {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if timeout(deadline - now, notified).await.is_err() {
                return self.count.load(Ordering::Acquire) == 0;
            }
        }
    }
}

pub struct ClientConn {
    writer: Option<Mutex<OwnedWriteHalf>>,
    waiting_reply: WaitCounter,
    selected_db: AtomicUsize,
}

impl ClientConn {
    pub fn new(writer: OwnedWriteHalf) -> Self {
        ClientConn {
            writer: Some(Mutex::new(writer)),
            waiting_reply: WaitCounter::new(),
            selected_db: AtomicUsize::new(0),
        }
    }

    /// A connection with no socket, used to replay the AOF.
    pub fn fake() -> Self {
        ClientConn {
            writer: None,
            waiting_reply: WaitCounter::new(),
            selected_db: AtomicUsize::new(0),
        }
    }

    pub fn selected_db(&self) -> usize {
        self.selected_db.load(Ordering::Acquire)
    }

    pub fn select_db(&self, index: usize) {
        self.selected_db.store(index, Ordering::Release);
    }

    /// Write a reply under the connection's write mutex. Empty payloads
    /// (no-reply) are a no-op.
    pub async fn write(&self, data: &[u8]) -> std::io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let Some(writer) = &self.writer else {
            return Ok(());
        };
        self.waiting_reply.add();
        let mut guard = writer.lock().await;
        let result = guard.write_all(data).await;
        drop(guard);
        self.waiting_reply.done();
        result
    }

    /// Drain in-flight replies, bounded by `dur`.
    pub async fn drain(&self, dur: Duration) -> bool {
        self.waiting_reply.wait_timeout(dur).await
    }

    /// Shut the write half down, unblocking the peer's read loop.
    pub async fn close(&self) {
        if let Some(writer) = &self.writer {
            let _ = writer.lock().await.shutdown().await;
        }
    }
}

/// The set of live connections, iterated on server shutdown.
#[derive(Default)]
pub struct ConnSet {
    conns: StdMutex<HashMap<u64, Arc<ClientConn>>>,
    next_id: AtomicU64,
}

impl ConnSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, conn: Arc<ClientConn>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::AcqRel);
        self.conns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, conn);
        id
    }

    pub fn remove(&self, id: u64) {
        self.conns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&id);
    }

    pub fn snapshot(&self) -> Vec<Arc<ClientConn>> {
        self.conns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.conns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

const CLOSE_DRAIN: Duration = Duration::from_secs(10);

/// Serve one accepted socket until it closes: stream-parse frames,
/// dispatch each multi-bulk as a command, and write the replies back in
/// order.
pub async fn handle_connection(
    stream: TcpStream,
    server: Arc<dyn DataServer>,
    live: Arc<ConnSet>,
) {
    let peer = stream.peer_addr().ok();
    let (read_half, write_half) = stream.into_split();
    let conn = Arc::new(ClientConn::new(write_half));
    let id = live.insert(Arc::clone(&conn));

    let mut frames = parse_stream(read_half);
    while let Some(payload) = frames.recv().await {
        match payload {
            Err(err) if err.is_terminal() => {
                debug!(?peer, %err, "client disconnected");
                break;
            }
            Err(err) => {
                let reply = Reply::err(err.to_string());
                if conn.write(&reply.to_bytes()).await.is_err() {
                    break;
                }
            }
            Ok(frame) => {
                let Some(cmdline) = frame.into_cmdline() else {
                    warn!(?peer, "ignoring non-multi-bulk frame");
                    continue;
                };
                if cmdline.is_empty() {
                    continue;
                }
                let reply = server.exec(&conn, &cmdline).await;
                if conn.write(&reply.to_bytes()).await.is_err() {
                    break;
                }
            }
        }
    }

    live.remove(id);
    server.after_client_close(&conn);
    conn.drain(CLOSE_DRAIN).await;
    conn.close().await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{ClientConn, ConnSet, WaitCounter};

    #[tokio::test]
    async fn test_wait_counter_drains() {
        let counter = Arc::new(WaitCounter::new());
        counter.add();
        counter.add();

        let waiter = Arc::clone(&counter);
        let handle = tokio::spawn(async move {
            waiter.wait_timeout(Duration::from_secs(5)).await
        });

        counter.done();
        counter.done();
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_counter_times_out() {
        let counter = WaitCounter::new();
        counter.add();
        assert!(!counter.wait_timeout(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_fake_conn_selects_db() {
        let conn = ClientConn::fake();
        assert_eq!(conn.selected_db(), 0);
        conn.select_db(3);
        assert_eq!(conn.selected_db(), 3);
        // writes to a fake connection are no-ops
        conn.write(b"+OK\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_conn_set() {
        let set = ConnSet::new();
        let id = set.insert(Arc::new(ClientConn::fake()));
        assert_eq!(set.len(), 1);
        set.remove(id);
        assert!(set.is_empty());
    }
}
