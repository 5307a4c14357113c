//! The standalone multi-database container.
//!
//! Owns the fixed array of databases and dispatches on the connection's
//! selected index. SELECT is handled here because it mutates the
//! connection, not a database. Executor panics are trapped at this
//! boundary and converted into an error reply so a bad command cannot
//! take the server down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use super::{parse_i64, DataServer, Db};
use crate::aof::AofHandler;
use crate::config::Config;
use crate::connection::ClientConn;
use crate::resp::Reply;

const DEFAULT_DATABASES: usize = 16;

pub struct StandaloneServer {
    dbs: Vec<Arc<Db>>,
    aof: Option<AofHandler>,
}

impl StandaloneServer {
    /// Build the database array and, when enabled, replay and wire the
    /// AOF pipeline. Sinks are installed only after replay so replayed
    /// commands do not append themselves again.
    pub async fn new(cfg: &Config) -> anyhow::Result<StandaloneServer> {
        let mut server = StandaloneServer::in_memory(cfg.databases);
        if cfg.append_only {
            let handler = AofHandler::new(&cfg.append_filename).await?;
            handler.load(&server).await;
            for db in &server.dbs {
                db.set_aof_sink(handler.sink_for(db.index));
            }
            server.aof = Some(handler);
        }
        Ok(server)
    }

    /// A purely in-memory container, also used as the cluster's local
    /// store and in tests.
    pub fn in_memory(databases: usize) -> StandaloneServer {
        let count = if databases == 0 {
            DEFAULT_DATABASES
        } else {
            databases
        };
        let dbs = (0..count).map(|index| Arc::new(Db::new(index))).collect();
        StandaloneServer { dbs, aof: None }
    }

    pub fn database_count(&self) -> usize {
        self.dbs.len()
    }

    fn exec_select(&self, conn: &ClientConn, args: &[Vec<u8>]) -> Reply {
        let Some(index) = parse_i64(&args[0]) else {
            return Reply::err("invalid DB index");
        };
        if index < 0 || index as usize >= self.dbs.len() {
            return Reply::err("DB index is out of range");
        }
        conn.select_db(index as usize);
        Reply::Ok
    }
}

#[async_trait]
impl DataServer for StandaloneServer {
    async fn exec(&self, conn: &ClientConn, cmdline: &[Vec<u8>]) -> Reply {
        let Some(name_bytes) = cmdline.first() else {
            return Reply::err("empty command");
        };
        let name = String::from_utf8_lossy(name_bytes).to_lowercase();
        if name == "select" {
            if cmdline.len() != 2 {
                return Reply::arg_num_err("select");
            }
            return self.exec_select(conn, &cmdline[1..]);
        }

        let Some(db) = self.dbs.get(conn.selected_db()) else {
            return Reply::err("DB index is out of range");
        };
        match catch_unwind(AssertUnwindSafe(|| db.exec(cmdline))) {
            Ok(reply) => reply,
            Err(_) => {
                error!(command = %name, "executor panicked");
                Reply::unknown_cmd(&name)
            }
        }
    }

    fn after_client_close(&self, _conn: &ClientConn) {}

    async fn close(&self) {
        // the AOF writer ends once every sink is gone; the file handle is
        // released with the process
        if self.aof.is_some() {
            tracing::info!("closing database");
        }
    }
}
