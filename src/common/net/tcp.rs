use super::Address;
use anyhow::Result;
use log::{debug, trace};
use socket2::{SockRef, TcpKeepalive};
use std::time::Duration;
use tokio::{net::TcpStream, time::timeout};

/// Different TCP connection options.
///
/// **Fields**:
/// * ```keep_alive``` - setting for TCP keepalive procedure
///
///
pub struct TcpConnectionOptions {
    keep_alive: Option<TcpKeepalive>,
}

impl TcpConnectionOptions {
    pub fn new() -> TcpConnectionOptions {
        TcpConnectionOptions { keep_alive: None }
    }

    pub fn set_keepalive(&mut self, keep_alive: TcpKeepalive) -> &mut TcpConnectionOptions {
        debug_assert!(self.keep_alive.is_none(), "should be unset");
        self.keep_alive = Some(keep_alive);
        self
    }

    pub fn apply_to(&self, tcp_stream: &mut TcpStream) -> Result<()> {
        let tcp_sock_ref = SockRef::from(&tcp_stream);

        if let Some(keep_alive) = &self.keep_alive {
            tcp_sock_ref.set_tcp_keepalive(keep_alive)?;
        }

        Ok(())
    }
}

impl Default for TcpConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Establish TCP connection with passed ```endpoint```.
///
/// Input ```tcp_opts``` are applied to created TCP socket right after stream creation.
/// When ```connect_timeout``` is set, both name resolution and connection establishment
/// must fit in it, otherwise dial fails with ```io::ErrorKind::TimedOut```.
pub async fn establish_tcp_connection_with_opts(
    endpoint: &Address,
    tcp_opts: &TcpConnectionOptions,
    connect_timeout: Option<Duration>,
) -> Result<TcpStream> {
    let dial = async {
        // Resolve endpoint address.
        trace!("Endpoint address {} resolution: ... ", endpoint);
        let resolved = endpoint.to_socket_addr().await?;
        trace!("Endpoint address {} resolution: SUCCESS with {}", endpoint, resolved);

        // Establish TCP connection with the endpoint.
        debug!("TCP connection establishment with the endpoint {}: ... ", endpoint);
        let tcp_stream = TcpStream::connect(resolved).await.map_err(anyhow::Error::from)?;
        debug!("TCP connection establishment with the endpoint {}: SUCCESS", endpoint);

        Ok(tcp_stream)
    };

    let mut tcp_stream = match connect_timeout {
        Some(bound) => timeout(bound, dial)
            .await
            .unwrap_or_else(|_| Err(anyhow::Error::from(std::io::Error::from(std::io::ErrorKind::TimedOut))))?,
        None => dial.await?,
    };

    // Apply passed options to created TCP stream.
    tcp_opts.apply_to(&mut tcp_stream)?;

    Ok(tcp_stream)
}

/// Establish TCP connection with passed ```endpoint``` with default options.
pub async fn establish_tcp_connection(endpoint: &Address, connect_timeout: Option<Duration>) -> Result<TcpStream> {
    // Create TCP options.
    let mut tcp_opts = TcpConnectionOptions::new();
    tcp_opts.set_keepalive(
        TcpKeepalive::new()
            .with_time(Duration::from_secs(150))    // 2.5 min
            .with_interval(Duration::from_secs(30)) // 30 sec
            .with_retries(5),
    );

    // Establish TCP connection with the target endpoint.
    establish_tcp_connection_with_opts(endpoint, &tcp_opts, connect_timeout).await
}

pub mod listener {

    use super::connection::FerryTcpConnection;
    use crate::common::net::resolve_sockaddr;
    use anyhow::Result;
    use socket2::{Domain, Socket, Type};
    use std::net::SocketAddr;
    use tokio::net::{TcpListener, ToSocketAddrs};

    const TCP_LISTEN_BACKLOG: i32 = 1024;

    /// Custom implementation of TCP listener.
    pub struct FerryTcpListener {
        inner: TcpListener,
    }

    impl FerryTcpListener {
        /// Binds TCP listener to passed `addr`.
        pub async fn bind(addr: impl ToSocketAddrs) -> Result<FerryTcpListener> {
            let bind_addr = resolve_sockaddr(addr).await?;

            // Create TCP socket
            let socket = Socket::new(Domain::for_address(bind_addr), Type::STREAM, None)?;

            // Bind TCP socket and mark it ready to accept incoming connections
            socket.bind(&bind_addr.into())?;
            socket.listen(TCP_LISTEN_BACKLOG)?;

            // Set TCP options
            socket.set_nonblocking(true)?;

            // Create tokio TCP listener from TCP socket
            let inner: TcpListener = TcpListener::from_std(socket.into())?;

            Ok(FerryTcpListener { inner })
        }

        /// Accept incoming TCP connection.
        pub async fn accept(&self) -> Result<FerryTcpConnection> {
            let (tcp_stream, _) = self.inner.accept().await?;
            FerryTcpConnection::new(tcp_stream)
        }

        /// Returns local address that this listener is binded to.
        pub fn local_addr(&self) -> SocketAddr {
            self.inner.local_addr().expect("listener doesn't have local address")
        }
    }
}

pub mod connection {

    use anyhow::Result;
    use std::net::SocketAddr;
    use tokio::net::TcpStream;

    pub struct FerryTcpConnection {
        stream: TcpStream,
        /// Remote address that this connection is connected to
        peer_addr: SocketAddr,
        /// Local address that this connection is bound to
        local_addr: SocketAddr,
    }

    impl FerryTcpConnection {
        pub fn new(stream: TcpStream) -> Result<FerryTcpConnection> {
            Ok(FerryTcpConnection {
                peer_addr: stream.peer_addr()?,
                local_addr: stream.local_addr()?,
                stream,
            })
        }

        pub fn peer_addr(&self) -> SocketAddr {
            self.peer_addr
        }

        pub fn local_addr(&self) -> SocketAddr {
            self.local_addr
        }

        pub fn stream_mut(&mut self) -> &mut TcpStream {
            &mut self.stream
        }
    }

}
