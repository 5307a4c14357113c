use std::path::Path;

use tracing::warn;

use rudis::config::Config;
use rudis::server;

const DEFAULT_CONFIG_FILE: &str = "redis.conf";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    let config = match Config::load(Path::new(&path)) {
        Ok(config) => config,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path, "config file not found, using defaults");
            Config::default()
        }
        Err(err) => return Err(err.into()),
    };

    server::serve(config).await
}
