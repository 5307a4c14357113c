//! Pipelined RESP client for peer nodes.
//!
//! A client runs two cooperating tasks: a send task draining a request
//! queue into the socket, and a receive task pairing parsed frames with
//! pending requests in strict FIFO order. A heartbeat PING every ten
//! seconds keeps the connection alive; a failed write triggers up to
//! three reconnect-and-resend cycles before the request is failed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::database::CmdLine;
use crate::parser::parse_stream;
use crate::resp::Reply;

const REQUEST_QUEUE: usize = 256;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
const RECONNECT_ATTEMPTS: usize = 3;

struct PeerRequest {
    args: CmdLine,
    reply_tx: oneshot::Sender<Reply>,
}

type Pending = Arc<Mutex<VecDeque<oneshot::Sender<Reply>>>>;

pub struct PeerClient {
    req_tx: mpsc::Sender<PeerRequest>,
}

impl PeerClient {
    pub async fn connect(addr: &str) -> std::io::Result<PeerClient> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();

        let pending: Pending = Arc::new(Mutex::new(VecDeque::new()));
        tokio::spawn(receive_loop(read_half, Arc::clone(&pending)));

        let (req_tx, req_rx) = mpsc::channel(REQUEST_QUEUE);
        tokio::spawn(send_loop(addr.to_string(), write_half, req_rx, pending));
        tokio::spawn(heartbeat_loop(req_tx.downgrade()));

        Ok(PeerClient { req_tx })
    }

    /// Send one command and wait for its reply, bounded by the per-request
    /// timeout; the connection survives a timed-out request.
    pub async fn send(&self, args: CmdLine) -> Reply {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .req_tx
            .send(PeerRequest { args, reply_tx })
            .await
            .is_err()
        {
            return Reply::err("peer client closed");
        }
        match timeout(REQUEST_TIMEOUT, reply_rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Reply::err("peer connection lost"),
            Err(_) => Reply::err("timeout"),
        }
    }
}

async fn send_loop(
    addr: String,
    mut writer: OwnedWriteHalf,
    mut req_rx: mpsc::Receiver<PeerRequest>,
    pending: Pending,
) {
    while let Some(request) = req_rx.recv().await {
        let bytes = Reply::multi(request.args).to_bytes();
        // FIFO pairing requires the reply slot to be queued before the
        // peer can possibly answer
        pending.lock().await.push_back(request.reply_tx);

        let mut result = writer.write_all(&bytes).await;
        let mut attempts = 0;
        while result.is_err() && attempts < RECONNECT_ATTEMPTS {
            attempts += 1;
            debug!(%addr, attempts, "reconnecting to peer");
            match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    let (read_half, write_half) = stream.into_split();
                    writer = write_half;
                    tokio::spawn(receive_loop(read_half, Arc::clone(&pending)));
                    result = writer.write_all(&bytes).await;
                }
                Err(err) => {
                    warn!(%addr, %err, "peer reconnect failed");
                }
            }
        }

        if result.is_err() {
            // the send task is the only producer, so the back entry is ours
            if let Some(reply_tx) = pending.lock().await.pop_back() {
                let _ = reply_tx.send(Reply::err("peer connection lost"));
            }
        }
    }
}

async fn receive_loop(read_half: OwnedReadHalf, pending: Pending) {
    let mut frames = parse_stream(read_half);
    while let Some(payload) = frames.recv().await {
        match payload {
            Ok(reply) => {
                if let Some(reply_tx) = pending.lock().await.pop_front() {
                    let _ = reply_tx.send(reply);
                }
            }
            Err(err) if err.is_terminal() => break,
            Err(err) => {
                if let Some(reply_tx) = pending.lock().await.pop_front() {
                    let _ = reply_tx.send(Reply::err(err.to_string()));
                }
            }
        }
    }
}

/// PING the peer periodically. Holding only a weak sender lets the client
/// (and with it the send loop) shut down by being dropped.
async fn heartbeat_loop(req_tx: mpsc::WeakSender<PeerRequest>) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(tx) = req_tx.upgrade() else {
            return;
        };
        let (reply_tx, _reply_rx) = oneshot::channel();
        if tx
            .send(PeerRequest {
                args: vec![b"PING".to_vec()],
                reply_tx,
            })
            .await
            .is_err()
        {
            return;
        }
    }
}
