use crate::{
    common::{
        error::FerryError,
        net::{tcp, Address},
        AuthMethod,
    },
    config::ClientConfig,
    io::{FerryRead, FerryWrite},
    proto::socks5::{
        request::{HandshakeRequest, PasswordAuthRequest, RelayRequest},
        response::{HandshakeResponse, PasswordAuthResponse, RelayResponse},
        Command, ReplyStatus,
    },
};
use anyhow::{ensure, Result};
use log::debug;
use std::collections::HashSet;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

/// Outbound half of the tunnel: a SOCKS5 client session towards the
/// remote server.
///
/// One instance holds the immutable upstream settings and opens any number
/// of independent sessions, one per proxied request.
pub struct FerryUpstreamClient {
    config: ClientConfig,
}

impl FerryUpstreamClient {
    pub fn new(config: ClientConfig) -> FerryUpstreamClient {
        FerryUpstreamClient { config }
    }

    /// Opens a tunnel to `target` through the upstream SOCKS5 server.
    ///
    /// Dials the upstream, then runs greeting, authentication and CONNECT
    /// strictly in order. On success the returned stream is a transparent
    /// pipe to the target; on any failure the upstream stream is torn down.
    pub async fn open(&self, target: Address) -> Result<TcpStream> {
        let upstream_addr = Address::DomainName(self.config.upstream_addr().to_string(), self.config.upstream_port());

        debug!("Opening upstream SOCKS5 session through {} to {}", upstream_addr, target);
        let mut stream = tcp::establish_tcp_connection(&upstream_addr, None).await?;

        match self.negotiate(&mut stream, target).await {
            Ok(()) => Ok(stream),
            Err(err) => {
                // Dropping the stream tears the upstream TCP connection down.
                drop(stream);
                Err(err)
            }
        }
    }

    async fn negotiate<S>(&self, stream: &mut S, target: Address) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let configured_method = self.config.auth_method();

        // Greeting: offer exactly the configured method.
        HandshakeRequest::new(HashSet::from([configured_method]))
            .write_to(stream)
            .await?;

        let handshake = HandshakeResponse::read_from(stream).await?;
        ensure!(
            handshake.selected_method() == Some(configured_method),
            FerryError::UpstreamAuthMethodRejected
        );

        // Sub-negotiation, only for username/password.
        if configured_method == AuthMethod::Password {
            PasswordAuthRequest::new(self.config.username(), self.config.password())
                .write_to(stream)
                .await?;

            let auth = PasswordAuthResponse::read_from(stream).await?;
            ensure!(auth.success(), FerryError::UpstreamAuthFailed);
        }

        // CONNECT. Bound address fields of the reply are ignored.
        RelayRequest::new(Command::Connect, target).write_to(stream).await?;

        let reply = RelayResponse::read_from(stream).await?;
        ensure!(
            reply.status() == ReplyStatus::Succeeded,
            FerryError::UpstreamConnectRejected(reply.status().as_u8())
        );

        Ok(())
    }
}
