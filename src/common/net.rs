use crate::common::error::FerryError;
use anyhow::{anyhow, Result};
use bytes::BufMut;
use std::{
    fmt::Display,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
};
use tokio::{
    io::AsyncReadExt,
    net::{lookup_host, ToSocketAddrs},
};

pub mod tcp;

macro_rules! ipv4_socket_address {
    ($ipv4:expr, $port:expr) => {
        Address::SocketAddress(SocketAddr::V4(SocketAddrV4::new($ipv4, $port)))
    };
}

macro_rules! ipv6_socket_address {
    ($ipv6:expr, $port:expr) => {
        Address::SocketAddress(SocketAddr::V6(SocketAddrV6::new($ipv6, $port, 0, 0)))
    };
}

pub(crate) use ipv4_socket_address;
pub(crate) use ipv6_socket_address;

#[rustfmt::skip]
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Address {
    SocketAddress(SocketAddr),
    DomainName(String, u16)
}

impl Address {
    pub async fn to_socket_addr(&self) -> Result<SocketAddr> {
        match self {
            Address::SocketAddress(sock_addr) => Ok(*sock_addr),
            Address::DomainName(hostname, port) => {
                // Resolve by means of builtin tokio DNS resolver
                let resolved_names = lookup_host(format!("{hostname:}:{port:}")).await?;
                // Take first found
                resolved_names
                    .into_iter()
                    .nth(0)
                    .ok_or(anyhow!(FerryError::UnresolvedDomainName(hostname.to_string())))
            }
        }
    }

    pub async fn read_ipv4<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<Address> {
        let ipv4 = Ipv4Addr::from(stream.read_u32().await?);
        let port = stream.read_u16().await?;

        Ok(ipv4_socket_address!(ipv4, port))
    }

    pub async fn read_ipv6<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<Address> {
        let ipv6 = Ipv6Addr::from(stream.read_u128().await?);
        let port = stream.read_u16().await?;

        Ok(ipv6_socket_address!(ipv6, port))
    }

    pub async fn read_domain_name<T: AsyncReadExt + Unpin>(stream: &mut T, len: u8) -> Result<Address> {
        let mut buf = vec![0u8; len as usize];
        stream.read_exact(&mut buf).await?;

        let name = String::from_utf8(buf).map_err(FerryError::DomainNameDecodingFailed)?;
        let port = stream.read_u16().await?;

        Ok(Address::DomainName(name, port))
    }

    pub fn write_ipv4<T: BufMut>(bytes: &mut T, ipv4_addr: &SocketAddrV4) {
        bytes.put_slice(&ipv4_addr.ip().octets());
        bytes.put_u16(ipv4_addr.port());
    }

    pub fn write_ipv6<T: BufMut>(bytes: &mut T, ipv6_addr: &SocketAddrV6) {
        bytes.put_slice(&ipv6_addr.ip().octets());
        bytes.put_u16(ipv6_addr.port());
    }

    pub fn write_domain_name<T: BufMut>(bytes: &mut T, name: &str, port: u16) {
        debug_assert!(name.len() <= u8::MAX as usize, "domain name must fit the length octet");
        bytes.put_u8(name.len() as u8);
        bytes.put_slice(name.as_bytes());
        bytes.put_u16(port);
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::SocketAddress(sock) => write!(f, "{sock:}"),
            Address::DomainName(name, port) => write!(f, "{name:}:{port:}"),
        }
    }
}

/// Resolves bind address of a listener.
pub async fn resolve_sockaddr(addr: impl ToSocketAddrs) -> Result<SocketAddr> {
    lookup_host(addr)
        .await?
        .next()
        .ok_or(anyhow!("unable to resolve listener bind address"))
}
