use crate::{
    client::FerryUpstreamClient,
    common::{
        logging,
        net::{
            tcp::{connection::FerryTcpConnection, listener::FerryTcpListener},
            Address,
        },
    },
    config::ClientConfig,
    http::translator::HttpRequestHead,
    io::tunnel::FerryTunnel,
};
use anyhow::Result;
use async_listen::is_transient_error;
use human_bytes::human_bytes;
use log::{error, info, warn};
use std::{net::SocketAddr, time::Duration};
use tokio::{io::AsyncWriteExt, signal, time::sleep};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

pub mod translator;

const CONNECT_ESTABLISHED_RESPONSE: &[u8] = b"HTTP/1.1 200 Connection established\r\n\r\n";
/// Upstream failure reuses the success phrase with a 5xx status. Peers of
/// this proxy expect this exact byte pattern, keep it verbatim.
const CONNECT_FAILED_RESPONSE: &[u8] = b"HTTP/1.1 502 Connection established\r\n\r\n";

/// Local HTTP forward-proxy endpoint.
///
/// Accepts plain HTTP/1.x connections, rewrites each request into a SOCKS5
/// CONNECT session against the remote server and splices both streams.
pub struct FerryHttpProxy {
    bind_addr: SocketAddr,
    client_config: ClientConfig,
    task_tracker: TaskTracker,
    task_cancellation_token: CancellationToken,
}

impl FerryHttpProxy {
    /// Delay after non-transient TCP acception failure, e.g.
    /// handle resource exhaustion errors.
    const DELAY_AFTER_ERROR_MILLIS: u64 = 500;

    pub fn new(bind_addr: SocketAddr, client_config: ClientConfig) -> FerryHttpProxy {
        FerryHttpProxy {
            bind_addr,
            client_config,
            task_tracker: TaskTracker::new(),
            task_cancellation_token: CancellationToken::new(),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let tcp_listener = FerryTcpListener::bind(self.bind_addr).await?;
        info!(
            "HTTP proxy is listening on {}, upstream SOCKS5 server is {}:{}",
            self.bind_addr,
            self.client_config.upstream_addr(),
            self.client_config.upstream_port()
        );

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

        self.task_tracker.close();
        self.task_cancellation_token.cancel();
        self.task_tracker.wait().await;

        Ok(())
    }

    /// Fires the stop signal. Per-connection tasks observe it through
    /// their cancellation tokens and tear their relays down.
    pub fn stop(&self) {
        self.task_cancellation_token.cancel();
    }

    fn on_tcp_connection_established(&self, conn: FerryTcpConnection) {
        let conn_peer_addr = conn.peer_addr();
        logging::log_conn_opened!(conn_peer_addr);

        let conn_token = self.task_cancellation_token.child_token();
        let client_config = self.client_config.clone();

        self.task_tracker.spawn(async move {
            tokio::select! {
                res = FerryHttpProxy::handle_connection(conn, client_config) => {
                    logging::log_conn_closed!(conn_peer_addr, res);
                },
                _ = conn_token.cancelled() => {
                    logging::log_conn_canceled!(conn_peer_addr);
                }
            }
        });
    }

    async fn on_tcp_acception_error(&self, err: anyhow::Error) {
        logging::log_accept_error!(err);

        if let Some(err) = err.downcast_ref::<std::io::Error>() {
            if !is_transient_error(err) {
                // Perform sleep after non-transient errors
                sleep(Duration::from_millis(FerryHttpProxy::DELAY_AFTER_ERROR_MILLIS)).await;
            }
        }
    }

    /// Translates one inbound HTTP connection into an upstream SOCKS5
    /// session and relays until either side ends.
    async fn handle_connection(mut conn: FerryTcpConnection, client_config: ClientConfig) -> Result<()> {
        let conn_peer_addr = conn.peer_addr();
        let inbound_stream = conn.stream_mut();

        let head = HttpRequestHead::read_from(inbound_stream).await?;
        let destination = head.destination()?;
        let target = Address::DomainName(destination.host, destination.port);

        info!("HTTP {} from peer {} to {}", head.method(), conn_peer_addr, target);

        let upstream_client = FerryUpstreamClient::new(client_config);

        let mut upstream_stream = if head.is_connect() {
            // The client sends no payload before the status line, hence
            // the prelude is discarded.
            match upstream_client.open(target.clone()).await {
                Ok(upstream_stream) => {
                    inbound_stream.write_all(CONNECT_ESTABLISHED_RESPONSE).await?;
                    upstream_stream
                }
                Err(err) => {
                    inbound_stream.write_all(CONNECT_FAILED_RESPONSE).await?;
                    return Err(err);
                }
            }
        } else {
            // Plain HTTP: the origin observes the inbound request head
            // byte-for-byte, absolute URI request line included.
            let mut upstream_stream = upstream_client.open(target.clone()).await?;
            upstream_stream.write_all(head.prelude()).await?;
            upstream_stream
        };

        let mut tunnel = FerryTunnel::new(inbound_stream, &mut upstream_stream);

        logging::log_tunnel_opened!(conn_peer_addr, target);

        let outcome = tunnel.run().await;
        logging::log_tunnel_closed!(conn_peer_addr, target, outcome);

        Ok(())
    }
}
