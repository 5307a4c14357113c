//! Append-only-file persistence.
//!
//! Mutating commands are enqueued as `(db_index, command line)` on a
//! bounded channel after they have executed; a single background worker
//! drains the queue and appends RESP multi-bulk frames to the log file,
//! emitting a `SELECT n` frame whenever the database index changes. The
//! log is a commit log: replaying it from byte zero on an empty server
//! reconstructs the state at the last append. Writes go to the OS with no
//! explicit fsync; that loss window is the durability contract.

use std::io;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::connection::ClientConn;
use crate::database::{CmdLine, DataServer};
use crate::parser::parse_stream;
use crate::resp::Reply;

const AOF_QUEUE_SIZE: usize = 1 << 16;

struct AofPayload {
    db_index: usize,
    cmdline: CmdLine,
}

pub struct AofHandler {
    tx: mpsc::Sender<AofPayload>,
    filename: String,
}

impl AofHandler {
    /// Open the log file (append, create if missing) and start the writer
    /// task. The file stays open until the process exits.
    pub async fn new(filename: &str) -> io::Result<AofHandler> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(filename)
            .await?;
        let (tx, rx) = mpsc::channel(AOF_QUEUE_SIZE);
        tokio::spawn(write_loop(file, rx));
        Ok(AofHandler {
            tx,
            filename: filename.to_string(),
        })
    }

    /// A mutation sink for one database. Enqueueing never suspends; a full
    /// queue is treated like any other append failure and the record is
    /// dropped with a warning, leaving the in-memory state authoritative.
    pub fn sink_for(&self, db_index: usize) -> Box<dyn Fn(CmdLine) + Send + Sync> {
        let tx = self.tx.clone();
        Box::new(move |cmdline| {
            if let Err(err) = tx.try_send(AofPayload { db_index, cmdline }) {
                warn!(%err, "dropping AOF record");
            }
        })
    }

    /// Replay the log against `server` through a synthetic connection.
    /// Must run before the mutation sinks are installed, so replayed
    /// commands are not appended again.
    pub async fn load(&self, server: &dyn DataServer) {
        let file = match File::open(&self.filename).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return,
            Err(err) => {
                error!(%err, file = %self.filename, "cannot open AOF file");
                return;
            }
        };

        let conn = ClientConn::fake();
        let mut frames = parse_stream(file);
        let mut replayed = 0u64;
        while let Some(payload) = frames.recv().await {
            match payload {
                Err(err) if err.is_terminal() => break,
                Err(err) => {
                    warn!(%err, "skipping malformed AOF frame");
                }
                Ok(frame) => {
                    let Some(cmdline) = frame.into_cmdline() else {
                        warn!("skipping non-command AOF frame");
                        continue;
                    };
                    if cmdline.is_empty() {
                        continue;
                    }
                    let reply = server.exec(&conn, &cmdline).await;
                    if reply.is_error() {
                        warn!(reply = ?reply.error_text(), "AOF command failed during replay");
                    } else {
                        replayed += 1;
                    }
                }
            }
        }
        info!(file = %self.filename, replayed, "AOF replay finished");
    }
}

async fn write_loop(mut file: File, mut rx: mpsc::Receiver<AofPayload>) {
    // None forces a SELECT before the first command, so appends to a log
    // whose tail left a different database selected stay correct.
    let mut current_db: Option<usize> = None;
    while let Some(payload) = rx.recv().await {
        if current_db != Some(payload.db_index) {
            current_db = Some(payload.db_index);
            let select = Reply::multi(vec![
                b"SELECT".to_vec(),
                payload.db_index.to_string().into_bytes(),
            ]);
            if let Err(err) = file.write_all(&select.to_bytes()).await {
                error!(%err, "AOF write failed");
                continue;
            }
        }
        let frame = Reply::multi(payload.cmdline);
        if let Err(err) = file.write_all(&frame.to_bytes()).await {
            error!(%err, "AOF write failed");
        }
    }
}
