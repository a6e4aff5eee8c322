use crate::{
    auth::FerryAuthenticator,
    common::{
        error::{FerryError, Unsupported},
        logging,
        net::{
            tcp::{self, connection::FerryTcpConnection},
            Address,
        },
        AuthMethod,
    },
    config::ServerConfig,
    io::{tunnel::FerryTunnel, FerryRead, FerryWrite},
    proto::socks5::{
        request::{HandshakeRequest, PasswordAuthRequest, RelayRequest},
        response::{HandshakeResponse, PasswordAuthResponse, RelayResponse},
        Command,
    },
    server::registry::ConnectionId,
};
use anyhow::{anyhow, bail, Result};
use human_bytes::human_bytes;
use log::{debug, error, info, warn};
use std::net::SocketAddr;

/// Per-accepted-connection SOCKS5 state machine.
///
/// Runs greeting, authentication and command phases in order, then hands
/// both streams to the tunnel. Any failure terminates the session; the
/// inbound stream is closed when the session is dropped.
pub struct FerrySocks5Session {
    conn: FerryTcpConnection,
    conn_id: ConnectionId,
    config: ServerConfig,
    authenticator: FerryAuthenticator,
}

impl FerrySocks5Session {
    pub fn new(conn: FerryTcpConnection, conn_id: ConnectionId, config: ServerConfig) -> FerrySocks5Session {
        let authenticator = FerryAuthenticator::new(&config);
        FerrySocks5Session {
            conn,
            conn_id,
            config,
            authenticator,
        }
    }

    pub async fn handle(mut self) -> Result<()> {
        // Complete handshake process and pick the authentication method.
        self.process_handshake().await?;
        // Verify client credentials with the negotiated method.
        self.process_authentication().await?;
        // Receive and process relay request, handle SOCKS5 command
        // and establish the tunnel "client <-- ferry --> target".
        self.process_relay_request().await
    }

    /// Handshaking with SOCKS5 client.
    /// Afterwards, authenticator contains the negotiated method.
    async fn process_handshake(&mut self) -> Result<()> {
        let request = HandshakeRequest::read_from(self.conn.stream_mut()).await?;

        // Prepare builder for the response on handshake request.
        let mut response_builder = HandshakeResponse::builder();

        match self.authenticator.select_auth_method(request.auth_methods()) {
            Some(method) => {
                debug!("[{}] selected authentication method {:?}", self.conn_id, method);
                // Respond to the client with selected method.
                response_builder.with_auth_method(method);
                response_builder.build().write_to(self.conn.stream_mut()).await
            }
            None => {
                debug!("[{}] no acceptable authentication method offered", self.conn_id);
                response_builder.with_no_acceptable_method();
                response_builder.build().write_to(self.conn.stream_mut()).await?;
                bail!(FerryError::NoAcceptableAuthMethod)
            }
        }
    }

    /// Username/password sub-negotiation (RFC 1929). A no-op when the
    /// negotiated method does not require credentials.
    async fn process_authentication(&mut self) -> Result<()> {
        match self.authenticator.current_method() {
            Some(AuthMethod::Password) => {
                let request = PasswordAuthRequest::read_from(self.conn.stream_mut()).await?;

                if !self.authenticator.verify_credentials(request.username(), request.password()) {
                    PasswordAuthResponse::new(false).write_to(self.conn.stream_mut()).await?;
                    bail!(FerryError::BadCredentials)
                }

                debug!("[{}] client authenticated", self.conn_id);
                PasswordAuthResponse::new(true).write_to(self.conn.stream_mut()).await
            }
            _ => Ok(()),
        }
    }

    /// Handling SOCKS5 command which comes in relay request from client.
    async fn process_relay_request(&mut self) -> Result<()> {
        let request = RelayRequest::read_from(self.conn.stream_mut()).await?;
        let command = request.command();

        // Bail out and notify client if command isn't supported
        if command != Command::Connect {
            return self
                .on_relay_request_handling_error(anyhow!(FerryError::Unsupported(Unsupported::Socks5Command(command))), &request)
                .await;
        }

        self.process_connect(request).await
    }

    /// CONNECT handler: dials the destination within the configured
    /// timeout, replies, then relays until either side ends.
    async fn process_connect(&mut self, request: RelayRequest) -> Result<()> {
        let conn_id = self.conn_id;
        let address = request.target_addr().clone();

        // IPv6 targets are turned down before any outbound socket is opened.
        if let Address::SocketAddress(SocketAddr::V6(_)) = address {
            return self
                .on_relay_request_handling_error(anyhow!(FerryError::Unsupported(Unsupported::IPv6Address)), &request)
                .await;
        }

        info!("[{}] CONNECT to {}", conn_id, address);

        // Create TCP stream with the endpoint
        let mut outbound_stream = match tcp::establish_tcp_connection(&address, Some(self.config.connect_timeout())).await {
            Ok(outbound_stream) => {
                // On success, respond to relay request with success
                let response = RelayResponse::builder().with_success().with_bound_address(address.clone()).build();
                response.write_to(self.conn.stream_mut()).await?;

                outbound_stream
            }
            Err(err) => return self.on_relay_request_handling_error(err, &request).await,
        };

        // Relay between the following TCP streams:
        // - L2R: client <--> proxy
        // - R2L: target <--> proxy
        let inbound_stream = self.conn.stream_mut();
        let mut tunnel = FerryTunnel::new(inbound_stream, &mut outbound_stream);

        logging::log_tunnel_opened!(conn_id, address);

        // Start data relaying
        let outcome = tunnel.run().await;
        logging::log_tunnel_closed!(conn_id, address, outcome);

        Ok(())
    }

    /// Command phase failures are answered with a reply whose address
    /// fields echo the request, then the session ends.
    async fn on_relay_request_handling_error(&mut self, err: anyhow::Error, request: &RelayRequest) -> Result<()> {
        let err_msg = err.to_string();
        let response = RelayResponse::builder()
            .with_err(err)
            .with_bound_address(request.target_addr().clone())
            .build();

        logging::log_request_rejected!(self.conn_id, request, response, err_msg);
        response.write_to(self.conn.stream_mut()).await
    }
}
