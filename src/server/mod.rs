use crate::{
    common::{
        logging,
        net::tcp::{connection::FerryTcpConnection, listener::FerryTcpListener},
    },
    config::ServerConfig,
    server::{registry::ConnectionRegistry, session::FerrySocks5Session},
};
use anyhow::Result;
use async_listen::is_transient_error;
use log::{error, info, warn};
use std::{sync::Arc, time::Duration};
use tokio::{signal, time::sleep};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

pub mod registry;
pub mod session;

/// SOCKS5 server endpoint.
///
/// Accepts inbound TCP connections and runs one [`FerrySocks5Session`]
/// per connection in its own task. The stop signal (Ctrl+C or [`FerryServer::stop`])
/// closes the listener and forces every live session down.
pub struct FerryServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,
    task_tracker: TaskTracker,
    task_cancellation_token: CancellationToken,
}

impl FerryServer {
    /// Delay after non-transient TCP acception failure, e.g.
    /// handle resource exhaustion errors.
    const DELAY_AFTER_ERROR_MILLIS: u64 = 500;

    pub fn new(config: ServerConfig) -> FerryServer {
        FerryServer {
            config,
            registry: Arc::new(ConnectionRegistry::new()),
            task_tracker: TaskTracker::new(),
            task_cancellation_token: CancellationToken::new(),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let tcp_listener = FerryTcpListener::bind(self.config.bind_addr()).await?;
        info!("SOCKS5 server is listening on {}", self.config.bind_addr());

        loop {
            tokio::select! {
                accepted = tcp_listener.accept() => match accepted {
                    Ok(conn) => self.on_tcp_connection_established(conn),
                    Err(err) => self.on_tcp_acception_error(err).await,
                },
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C. Gracefully tearing down ...");
                    break
                },
                _ = self.task_cancellation_token.cancelled() => {
                    info!("Received stop signal. Gracefully tearing down ...");
                    break
                }
            }
        }

        self.on_shutdown_requested();
        self.task_tracker.wait().await;

        Ok(())
    }

    /// Fires the stop signal. The accept loop exits, no new session is
    /// admitted and every live session observes termination.
    pub fn stop(&self) {
        self.task_cancellation_token.cancel();
    }

    pub fn get_registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    fn on_tcp_connection_established(&self, conn: FerryTcpConnection) {
        // Track the connection so that shutdown can force it closed,
        // and run the session in a separate task.
        let (conn_id, conn_token) = self
            .registry
            .register(conn.peer_addr(), self.task_cancellation_token.child_token());

        logging::log_conn_opened!(conn_id);

        let registry = Arc::clone(&self.registry);
        let session = FerrySocks5Session::new(conn, conn_id, self.config.clone());

        self.task_tracker.spawn(async move {
            tokio::select! {
                res = session.handle() => {
                    logging::log_conn_closed!(conn_id, res);
                },
                _ = conn_token.cancelled() => {
                    logging::log_conn_canceled!(conn_id);
                }
            }
            registry.unregister(conn_id);
        });
    }

    async fn on_tcp_acception_error(&self, err: anyhow::Error) {
        logging::log_accept_error!(err);

        if let Some(err) = err.downcast_ref::<std::io::Error>() {
            if !is_transient_error(err) {
                // Perform sleep after non-transient errors
                sleep(Duration::from_millis(FerryServer::DELAY_AFTER_ERROR_MILLIS)).await;
            }
        }
    }

    fn on_shutdown_requested(&self) {
        self.task_tracker.close();
        self.registry.close_all();
        self.task_cancellation_token.cancel();
    }
}
