//! TCP accept loop and graceful shutdown.
//!
//! One task per accepted connection; SIGINT, SIGTERM, SIGHUP and SIGQUIT
//! all initiate shutdown: stop accepting, close every live connection
//! (each drains its in-flight replies first), then close the database.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info};

use crate::cluster::ClusterServer;
use crate::config::Config;
use crate::connection::{handle_connection, ConnSet};
use crate::database::{DataServer, StandaloneServer};

pub async fn serve(cfg: Config) -> anyhow::Result<()> {
    let server: Arc<dyn DataServer> = if cfg.is_cluster() {
        Arc::new(ClusterServer::new(&cfg).await?)
    } else {
        Arc::new(StandaloneServer::new(&cfg).await?)
    };

    let listener = TcpListener::bind(cfg.listen_addr()).await?;
    info!(addr = %cfg.listen_addr(), "listening");

    let live = Arc::new(ConnSet::new());
    let closing = Arc::new(AtomicBool::new(false));

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigquit = signal(SignalKind::quit())?;

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        if closing.load(Ordering::Acquire) {
                            continue;
                        }
                        debug!(%peer, "accepted connection");
                        tokio::spawn(handle_connection(
                            stream,
                            Arc::clone(&server),
                            Arc::clone(&live),
                        ));
                    }
                    Err(err) => error!(%err, "accept error"),
                }
            }
            _ = sigint.recv() => { info!("received SIGINT"); break; }
            _ = sigterm.recv() => { info!("received SIGTERM"); break; }
            _ = sighup.recv() => { info!("received SIGHUP"); break; }
            _ = sigquit.recv() => { info!("received SIGQUIT"); break; }
        }
    }

    drop(listener);
    shutdown(&server, &live, &closing).await;
    Ok(())
}

async fn shutdown(server: &Arc<dyn DataServer>, live: &Arc<ConnSet>, closing: &AtomicBool) {
    info!("shutting down");
    closing.store(true, Ordering::Release);
    for conn in live.snapshot() {
        conn.drain(Duration::from_secs(10)).await;
        conn.close().await;
    }
    server.close().await;
}
