//! AOF persistence: write-behind logging and boot-time replay.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::cmd;
use rudis::config::Config;
use rudis::connection::ClientConn;
use rudis::database::{DataServer, StandaloneServer};

static NEXT_FILE: AtomicUsize = AtomicUsize::new(0);

fn aof_config() -> (Config, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!(
        "rudis-aof-test-{}-{}.aof",
        std::process::id(),
        NEXT_FILE.fetch_add(1, Ordering::Relaxed)
    ));
    let _ = std::fs::remove_file(&path);
    let mut cfg = Config::default();
    cfg.append_only = true;
    cfg.append_filename = path.to_string_lossy().into_owned();
    (cfg, path)
}

/// Give the background writer a moment to drain the queue.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}

async fn exec(server: &StandaloneServer, conn: &ClientConn, parts: &[&str]) -> Vec<u8> {
    server.exec(conn, &cmd(parts)).await.to_bytes()
}

#[tokio::test]
async fn test_replay_reconstructs_state() {
    let (cfg, path) = aof_config();

    {
        let server = StandaloneServer::new(&cfg).await.unwrap();
        let conn = ClientConn::fake();
        exec(&server, &conn, &["SET", "name", "rudis"]).await;
        exec(&server, &conn, &["RPUSH", "list", "a", "b", "c"]).await;
        exec(&server, &conn, &["HMSET", "h", "f1", "v1", "f2", "v2"]).await;
        exec(&server, &conn, &["SADD", "s", "1", "2", "hello"]).await;
        exec(&server, &conn, &["ZADD", "z", "1", "a", "2", "b", "1", "c"]).await;
        exec(&server, &conn, &["SET", "x", "1"]).await;
        exec(&server, &conn, &["SET", "x", "2"]).await;
        exec(&server, &conn, &["DEL", "x"]).await;
        exec(&server, &conn, &["LPOP", "list"]).await;
        settle().await;
    }

    let restored = StandaloneServer::new(&cfg).await.unwrap();
    let conn = ClientConn::fake();

    assert_eq!(exec(&restored, &conn, &["GET", "name"]).await, b"$5\r\nrudis\r\n");
    assert_eq!(
        exec(&restored, &conn, &["LRANGE", "list", "0", "-1"]).await,
        b"*2\r\n$1\r\nb\r\n$1\r\nc\r\n"
    );
    assert_eq!(
        exec(&restored, &conn, &["HMGET", "h", "f1", "f2"]).await,
        b"*2\r\n$2\r\nv1\r\n$2\r\nv2\r\n"
    );
    assert_eq!(exec(&restored, &conn, &["SCARD", "s"]).await, b":3\r\n");
    assert_eq!(
        exec(&restored, &conn, &["ZRANGE", "z", "0", "-1", "WITHSCORES"]).await,
        b"*6\r\n$1\r\na\r\n$1\r\n1\r\n$1\r\nc\r\n$1\r\n1\r\n$1\r\nb\r\n$1\r\n2\r\n"
    );
    assert_eq!(exec(&restored, &conn, &["EXISTS", "x"]).await, b":0\r\n");

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_replay_preserves_database_index() {
    let (cfg, path) = aof_config();

    {
        let server = StandaloneServer::new(&cfg).await.unwrap();
        let conn = ClientConn::fake();
        exec(&server, &conn, &["SET", "k", "zero"]).await;
        exec(&server, &conn, &["SELECT", "2"]).await;
        exec(&server, &conn, &["SET", "k", "two"]).await;
        settle().await;
    }

    let restored = StandaloneServer::new(&cfg).await.unwrap();
    let conn = ClientConn::fake();
    assert_eq!(exec(&restored, &conn, &["GET", "k"]).await, b"$4\r\nzero\r\n");
    exec(&restored, &conn, &["SELECT", "2"]).await;
    assert_eq!(exec(&restored, &conn, &["GET", "k"]).await, b"$3\r\ntwo\r\n");
    exec(&restored, &conn, &["SELECT", "1"]).await;
    assert_eq!(exec(&restored, &conn, &["EXISTS", "k"]).await, b":0\r\n");

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_spop_replays_deterministically() {
    let (cfg, path) = aof_config();

    let survivors = {
        let server = StandaloneServer::new(&cfg).await.unwrap();
        let conn = ClientConn::fake();
        exec(&server, &conn, &["SADD", "s", "a", "b", "c", "d", "e"]).await;
        exec(&server, &conn, &["SPOP", "s", "2"]).await;
        let survivors = exec(&server, &conn, &["SMEMBERS", "s"]).await;
        settle().await;
        survivors
    };

    let restored = StandaloneServer::new(&cfg).await.unwrap();
    let conn = ClientConn::fake();
    assert_eq!(exec(&restored, &conn, &["SCARD", "s"]).await, b":3\r\n");
    assert_eq!(exec(&restored, &conn, &["SMEMBERS", "s"]).await, survivors);

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_malformed_frame_is_skipped() {
    let (cfg, path) = aof_config();

    {
        let server = StandaloneServer::new(&cfg).await.unwrap();
        let conn = ClientConn::fake();
        exec(&server, &conn, &["SET", "before", "1"]).await;
        settle().await;
    }

    // corrupt the log, then append another valid frame by hand
    {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"!garbage line\r\n").unwrap();
        file.write_all(b"*3\r\n$3\r\nSET\r\n$5\r\nafter\r\n$1\r\n2\r\n")
            .unwrap();
    }

    let restored = StandaloneServer::new(&cfg).await.unwrap();
    let conn = ClientConn::fake();
    assert_eq!(exec(&restored, &conn, &["GET", "before"]).await, b"$1\r\n1\r\n");
    assert_eq!(exec(&restored, &conn, &["GET", "after"]).await, b"$1\r\n2\r\n");

    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_read_only_commands_are_not_logged() {
    let (cfg, path) = aof_config();

    {
        let server = StandaloneServer::new(&cfg).await.unwrap();
        let conn = ClientConn::fake();
        exec(&server, &conn, &["SET", "k", "v"]).await;
        exec(&server, &conn, &["GET", "k"]).await;
        exec(&server, &conn, &["STRLEN", "k"]).await;
        exec(&server, &conn, &["EXISTS", "k"]).await;
        settle().await;
    }

    let contents = std::fs::read(&path).unwrap();
    let text = String::from_utf8_lossy(&contents);
    assert!(text.contains("SET"));
    assert!(!text.contains("GET"));
    assert!(!text.contains("STRLEN"));
    assert!(!text.contains("EXISTS"));

    let _ = std::fs::remove_file(path);
}
