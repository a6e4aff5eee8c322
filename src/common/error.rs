use crate::proto::socks5::Command;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FerryError {
    #[error("data has incorrect / corrupted field: {0}")]
    DataError(InvalidValue),
    #[error("failed UTF-8 decoding of domain name: {0}")]
    DomainNameDecodingFailed(std::string::FromUtf8Error),
    #[error("{0} is not supported")]
    Unsupported(Unsupported),
    #[error("unable to resolve domain name {0}")]
    UnresolvedDomainName(String),
    #[error("client has not offered the required authentication method")]
    NoAcceptableAuthMethod,
    #[error("username or password mismatch")]
    BadCredentials,
    #[error("malformed HTTP request: {0}")]
    BadHttpRequest(String),
    #[error("upstream rejected the proposed authentication method")]
    UpstreamAuthMethodRejected,
    #[error("upstream rejected passed credentials")]
    UpstreamAuthFailed,
    #[error("upstream rejected CONNECT with reply {0:#02x}")]
    UpstreamConnectRejected(u8),
}

#[derive(Error, Debug, PartialEq)]
pub enum InvalidValue {
    #[error("invalid 'reserved' value {0:#02x}")]
    ReservedValue(u8),
    #[error("invalid type of network address {0:#02x}")]
    AddressType(u8),
    #[error("invalid version of protocol {0:#02x}")]
    ProtocolVersion(u8),
    #[error("invalid version of auth sub-negotiation {0:#02x}")]
    SubnegotiationVersion(u8),
    #[error("invalid authenticaton method {0:#02x}")]
    AuthMethod(u8),
    #[error("invalid number of offered auth methods {0}")]
    AuthMethodCount(u8),
    #[error("invalid SOCKS command {0:#02x}")]
    SocksCommand(u8),
}

#[derive(Error, Debug, PartialEq)]
pub enum Unsupported {
    #[error("SOCKS5 command {0:?}")]
    Socks5Command(Command),
    #[error("IPv6 address type")]
    IPv6Address,
}
