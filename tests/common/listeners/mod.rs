use anyhow::Result;
use ferry::{
    config::{ClientConfig, ServerConfig},
    http::FerryHttpProxy,
    server::FerryServer,
};
use log::debug;
use std::{future::Future, net::SocketAddr};
use tokio::task::{yield_now, JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

pub mod tcp_echo_server;

#[allow(unused_macros)]
macro_rules! cancel_listener {
    ($l:expr) => {
        $l.cancel().await.expect("Failed to cancel async task");
    };
}

#[allow(unused_imports)]
pub(crate) use cancel_listener;

pub trait AsyncListener {
    fn name(&self) -> &'static str;

    fn listen(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn run(self) -> impl Future<Output = AsyncListenerTask> + Send
    where
        Self: Send + Sized + 'static,
    {
        AsyncListenerTask::spawn(self)
    }
}

pub struct AsyncListenerTask {
    handle: JoinHandle<()>,
    token: CancellationToken,
}

impl AsyncListenerTask {
    /// Spawn listener through tokio::spawn with graceful cancellation ability.
    async fn spawn<T>(mut listener: T) -> AsyncListenerTask
    where
        T: AsyncListener + Send + 'static,
    {
        let token = CancellationToken::new();
        let token_clone = token.clone();

        let failure_msg = format!("[AsyncListenerTask] Failure occured while running {} listener", listener.name());

        let handle = tokio::spawn(async move {
            tokio::select! {
                res = listener.listen() => res.expect(&failure_msg),
                _ = token_clone.cancelled() => {
                    debug!(
                        "[AsyncListenerTask] {} listener has been cancelled. Shutting down the task ...",
                        listener.name()
                    );
                }
            }
        });

        yield_now().await;

        AsyncListenerTask { handle, token }
    }

    /// Cancel task and wait for it's termination.
    pub async fn cancel(self) -> Result<(), JoinError> {
        self.token.cancel();
        self.handle.await
    }
}

/*
 * Ferry SOCKS5 server listener
 */

pub struct FerryServerListener {
    server: FerryServer,
}

impl FerryServerListener {
    pub fn new(config: ServerConfig) -> FerryServerListener {
        FerryServerListener {
            server: FerryServer::new(config),
        }
    }
}

impl AsyncListener for FerryServerListener {
    fn listen(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.server.run()
    }

    fn name(&self) -> &'static str {
        "Ferry SOCKS5 server"
    }
}

/*
 * Ferry HTTP proxy listener
 */

pub struct FerryHttpProxyListener {
    proxy: FerryHttpProxy,
}

impl FerryHttpProxyListener {
    pub fn new(bind_addr: SocketAddr, client_config: ClientConfig) -> FerryHttpProxyListener {
        FerryHttpProxyListener {
            proxy: FerryHttpProxy::new(bind_addr, client_config),
        }
    }
}

impl AsyncListener for FerryHttpProxyListener {
    fn listen(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.proxy.run()
    }

    fn name(&self) -> &'static str {
        "Ferry HTTP proxy"
    }
}
