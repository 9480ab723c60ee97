use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::{
    net::{TcpListener, TcpStream},
    select,
};
use tracing::{info, warn};

use crate::{
    codec::{LineCodec, ObfuscationCodec},
    config::ServerConfig,
    registry::Registry,
    router::Router,
    session,
};

/// Owns the listening socket and spawns one task per accepted connection.
pub struct Server {
    listener: TcpListener,
    router: Router,
    codec: Arc<dyn LineCodec>,
}

impl Server {
    pub fn new(listener: TcpListener, codec: Arc<dyn LineCodec>) -> Self {
        Self {
            listener,
            router: Router::new(Registry::new()),
            codec,
        }
    }

    /// Binds the configured address with the obfuscation codec keyed from `config`.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.listen)
            .await
            .with_context(|| format!("failed to bind {}", config.listen))?;
        Ok(Self::new(
            listener,
            Arc::new(ObfuscationCodec::new(config.key.clone())),
        ))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Registry {
        self.router.registry().clone()
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// # Errors
    /// A failed `accept` is treated as a listener failure and ends the loop.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Server {
            listener,
            router,
            codec,
        } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("relay shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    let (stream, peer) = accept_result.context("failed to accept connection")?;
                    spawn_session(stream, peer, &router, &codec);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn spawn_session(
    stream: TcpStream,
    peer: SocketAddr,
    router: &Router,
    codec: &Arc<dyn LineCodec>,
) {
    let router = router.clone();
    let codec = Arc::clone(codec);
    tokio::spawn(async move {
        if let Err(err) = session::run(stream, router, codec).await {
            warn!(peer = %peer, error = ?err, "client connection closed with error");
        }
    });
}
