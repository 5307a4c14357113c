//! Shared helpers for the integration tests.

// not every test crate uses every helper
#![allow(dead_code)]

use rudis::connection::ClientConn;
use rudis::database::{DataServer, StandaloneServer};
use rudis::resp::Reply;

/// Test environment: an in-memory multi-database server and one synthetic
/// connection.
pub struct TestEnv {
    pub server: StandaloneServer,
    pub conn: ClientConn,
}

impl TestEnv {
    pub fn new() -> Self {
        TestEnv {
            server: StandaloneServer::in_memory(16),
            conn: ClientConn::fake(),
        }
    }

    pub async fn exec(&self, parts: &[&str]) -> Reply {
        self.server.exec(&self.conn, &cmd(parts)).await
    }

    /// Execute a command and assert the exact reply bytes.
    pub async fn exec_expect(&self, parts: &[&str], expected: &[u8]) {
        let reply = self.exec(parts).await;
        assert_eq!(
            reply.to_bytes(),
            expected,
            "command {:?} replied {:?}",
            parts,
            String::from_utf8_lossy(&reply.to_bytes())
        );
    }
}

pub fn cmd(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}

/// Expected wire form of a multi-bulk of plain strings.
pub fn bulk_array(items: &[&str]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", items.len()).into_bytes();
    for item in items {
        out.extend_from_slice(format!("${}\r\n{}\r\n", item.len(), item).as_bytes());
    }
    out
}

/// Expected wire form of a bulk string.
pub fn bulk(item: &str) -> Vec<u8> {
    format!("${}\r\n{}\r\n", item.len(), item).into_bytes()
}
