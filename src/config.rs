//! Line-oriented configuration file parsing.
//!
//! Each non-comment line is `key value`, split on the first whitespace.
//! Unknown keys and malformed values are ignored so an old config file
//! never stops the server from booting.

use std::io;
use std::path::Path;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub append_only: bool,
    pub append_filename: String,
    pub max_clients: usize,
    pub databases: usize,
    /// Reserved for client authentication.
    pub requirepass: String,
    pub peers: Vec<String>,
    pub self_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: "127.0.0.1".to_string(),
            port: 6379,
            append_only: false,
            append_filename: "appendonly.aof".to_string(),
            max_clients: 0,
            databases: 16,
            requirepass: String::new(),
            peers: Vec::new(),
            self_addr: String::new(),
        }
    }
}

impl Config {
    pub fn parse(src: &str) -> Config {
        let mut config = Config::default();
        for line in src.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(pivot) = line.find(char::is_whitespace) else {
                continue;
            };
            let key = line[..pivot].to_lowercase();
            let value = line[pivot + 1..].trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "bind" => config.bind = value.to_string(),
                "port" => match value.parse() {
                    Ok(port) => config.port = port,
                    Err(_) => warn!(value, "ignoring invalid port"),
                },
                "append_only" => config.append_only = value == "yes",
                "append_filename" => config.append_filename = value.to_string(),
                "max_clients" => match value.parse() {
                    Ok(n) => config.max_clients = n,
                    Err(_) => warn!(value, "ignoring invalid max_clients"),
                },
                "databases" => match value.parse() {
                    Ok(n) => config.databases = n,
                    Err(_) => warn!(value, "ignoring invalid databases"),
                },
                "requirepass" => config.requirepass = value.to_string(),
                "peers" => {
                    config.peers = value
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "self" => config.self_addr = value.to_string(),
                _ => {}
            }
        }
        config
    }

    pub fn load(path: &Path) -> io::Result<Config> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Config::parse(&contents))
    }

    /// Cluster mode is on when both this node's address and at least one
    /// peer are configured.
    pub fn is_cluster(&self) -> bool {
        !self.self_addr.is_empty() && !self.peers.is_empty()
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
