use crate::common::AuthMethod;
use anyhow::{ensure, Result};
use clap::Parser;
use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

pub const LOG4RS_CONFIG_FILE_PATH: &str = "log4rs.yaml";

/// Timeout applied to outbound CONNECT dials unless overridden.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[clap(about = "SOCKS5 server endpoint of the ferry tunnel", version)]
pub struct ServerArgs {
    /// IPv4 to listen on
    #[clap(short, long, default_value = "0.0.0.0")]
    listen: Ipv4Addr,

    /// TCP port to listen on
    #[clap(short, long, default_value_t = 1080)]
    port: u16,

    /// Username expected by username/password authentication
    #[clap(short, long, default_value = "admin")]
    user: String,

    /// Password expected by username/password authentication
    #[clap(long, default_value = "admin")]
    pass: String,
}

impl ServerArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::with_password_auth(SocketAddr::from((self.listen, self.port)), &self.user, &self.pass)
    }
}

#[derive(Parser, Debug)]
#[clap(about = "Local HTTP proxy endpoint of the ferry tunnel", version)]
pub struct HttpProxyArgs {
    /// IPv4 for the HTTP proxy to listen on
    #[clap(long, default_value = "0.0.0.0")]
    http: Ipv4Addr,

    /// TCP port for the HTTP proxy to listen on
    #[clap(long, default_value_t = 18080)]
    port: u16,

    /// Remote SOCKS5 server address
    #[clap(long, default_value = "127.0.0.1")]
    remote_addr: String,

    /// Remote SOCKS5 server port
    #[clap(long, default_value_t = 1080)]
    remote_port: u16,

    /// Username passed to the remote SOCKS5 server
    #[clap(long, default_value = "")]
    username: String,

    /// Password passed to the remote SOCKS5 server
    #[clap(long, default_value = "")]
    password: String,

    /// Authentication method constant per RFC 1928
    #[clap(long, default_value_t = 0x02)]
    auth_method: u8,
}

impl HttpProxyArgs {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((self.http, self.port))
    }

    /// Validates upstream fields and assembles the client configuration.
    pub fn client_config(&self) -> Result<ClientConfig> {
        ensure!(!self.remote_addr.is_empty(), "remote server address is empty");
        ensure!(self.remote_port != 0, "remote server port is empty");
        ensure!(!self.username.is_empty(), "remote server username is empty");
        ensure!(!self.password.is_empty(), "remote server password is empty");

        let auth_method = AuthMethod::from_socks5_const(self.auth_method)?;
        ensure!(
            matches!(auth_method, AuthMethod::None | AuthMethod::Password),
            "authentication method {auth_method:?} is not supported by the upstream client"
        );

        Ok(ClientConfig {
            upstream_addr: self.remote_addr.clone(),
            upstream_port: self.remote_port,
            username: self.username.clone(),
            password: self.password.clone(),
            auth_method,
        })
    }
}

/// Immutable per-instance settings of the SOCKS5 server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    bind_addr: SocketAddr,
    auth_method: AuthMethod,
    username: String,
    password: String,
    connect_timeout: Duration,
}

impl ServerConfig {
    pub fn with_password_auth(bind_addr: SocketAddr, username: &str, password: &str) -> ServerConfig {
        ServerConfig {
            bind_addr,
            auth_method: AuthMethod::Password,
            username: username.to_string(),
            password: password.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_no_auth(bind_addr: SocketAddr) -> ServerConfig {
        ServerConfig {
            bind_addr,
            auth_method: AuthMethod::None,
            username: String::new(),
            password: String::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn set_connect_timeout(mut self, connect_timeout: Duration) -> ServerConfig {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    pub fn auth_method(&self) -> AuthMethod {
        self.auth_method
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

/// Immutable per-instance settings of the upstream SOCKS5 client.
/// Holders may open any number of independent upstream sessions from it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    upstream_addr: String,
    upstream_port: u16,
    username: String,
    password: String,
    auth_method: AuthMethod,
}

impl ClientConfig {
    pub fn new(upstream_addr: &str, upstream_port: u16, username: &str, password: &str, auth_method: AuthMethod) -> ClientConfig {
        ClientConfig {
            upstream_addr: upstream_addr.to_string(),
            upstream_port,
            username: username.to_string(),
            password: password.to_string(),
            auth_method,
        }
    }

    pub fn upstream_addr(&self) -> &str {
        &self.upstream_addr
    }

    pub fn upstream_port(&self) -> u16 {
        self.upstream_port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn auth_method(&self) -> AuthMethod {
        self.auth_method
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_args(username: &str, password: &str, auth_method: u8) -> HttpProxyArgs {
        HttpProxyArgs {
            http: Ipv4Addr::UNSPECIFIED,
            port: 18080,
            remote_addr: "127.0.0.1".to_string(),
            remote_port: 1080,
            username: username.to_string(),
            password: password.to_string(),
            auth_method,
        }
    }

    #[test]
    fn accepts_complete_upstream_config() {
        let config = http_args("admin", "admin", 0x02).client_config().expect("Expect valid config");

        assert_eq!("127.0.0.1", config.upstream_addr());
        assert_eq!(1080, config.upstream_port());
        assert_eq!(AuthMethod::Password, config.auth_method());
    }

    #[test]
    fn rejects_empty_upstream_fields() {
        assert!(http_args("", "admin", 0x02).client_config().is_err());
        assert!(http_args("admin", "", 0x02).client_config().is_err());
    }

    #[test]
    fn rejects_unknown_auth_method() {
        assert!(http_args("admin", "admin", 0x55).client_config().is_err());
        // GSSAPI is a valid constant the upstream client cannot negotiate.
        assert!(http_args("admin", "admin", 0x01).client_config().is_err());
    }
}
