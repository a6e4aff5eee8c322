use super::{consts, Address, ReplyStatus};
use crate::{
    common::{
        error::{FerryError, InvalidValue},
        AuthMethod,
    },
    io::{FerryRead, FerryWrite},
};
use anyhow::{ensure, Result};
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

// The server selects from one of the methods given in METHODS, and
// sends a METHOD selection message:
// +----+--------+
// |VER | METHOD |
// +----+--------+
// | 1  |   1    |
// +----+--------+

#[derive(Debug, PartialEq)]
pub struct HandshakeResponse {
    selected_method: Option<AuthMethod>,
}

impl HandshakeResponse {
    pub fn builder() -> HandshakeResponseBuilder {
        HandshakeResponseBuilder { selected_method: None }
    }

    pub fn selected_method(&self) -> Option<AuthMethod> {
        self.selected_method
    }
}

impl FerryWrite for HandshakeResponse {
    async fn write_to<T: AsyncWriteExt + Unpin>(&self, stream: &mut T) -> Result<()> {
        let method = self
            .selected_method
            .map_or_else(|| consts::auth::SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE, |m| m as u8);
        let response: [u8; 2] = [consts::SOCKS5_VERSION, method];
        stream.write_all(&response).await?;
        Ok(())
    }
}

impl FerryRead for HandshakeResponse {
    async fn read_from<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<Self>
    where
        Self: std::marker::Sized,
    {
        let mut response: [u8; 2] = [0, 0];
        stream.read_exact(&mut response).await?;

        let (version, method) = (response[0], response[1]);
        ensure!(
            version == consts::SOCKS5_VERSION,
            FerryError::DataError(InvalidValue::ProtocolVersion(version))
        );

        let selected_method = match method {
            consts::auth::SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE => None,
            value => Some(AuthMethod::from_socks5_const(value)?),
        };

        Ok(HandshakeResponse { selected_method })
    }
}

pub struct HandshakeResponseBuilder {
    selected_method: Option<AuthMethod>,
}

impl HandshakeResponseBuilder {
    pub fn with_auth_method(&mut self, method: AuthMethod) -> &mut HandshakeResponseBuilder {
        self.selected_method = Some(method);
        self
    }

    pub fn with_no_acceptable_method(&mut self) -> &mut HandshakeResponseBuilder {
        self.selected_method = None;
        self
    }

    pub fn build(&self) -> HandshakeResponse {
        HandshakeResponse {
            selected_method: self.selected_method,
        }
    }
}

// The server verifies supplied username/password and returns
// the sub-negotiation outcome (RFC 1929):
// +----+--------+
// |VER | STATUS |
// +----+--------+
// | 1  |   1    |
// +----+--------+

#[derive(Debug, PartialEq)]
pub struct PasswordAuthResponse {
    success: bool,
}

impl PasswordAuthResponse {
    pub fn new(success: bool) -> PasswordAuthResponse {
        PasswordAuthResponse { success }
    }

    pub fn success(&self) -> bool {
        self.success
    }
}

impl FerryWrite for PasswordAuthResponse {
    async fn write_to<T: AsyncWriteExt + Unpin>(&self, stream: &mut T) -> Result<()> {
        let status = if self.success {
            consts::auth::SOCKS5_AUTH_STATUS_SUCCEEDED
        } else {
            consts::auth::SOCKS5_AUTH_STATUS_FAILED
        };
        let response: [u8; 2] = [consts::SOCKS5_SUBNEGOTIATION_VERSION, status];
        stream.write_all(&response).await?;
        Ok(())
    }
}

impl FerryRead for PasswordAuthResponse {
    async fn read_from<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<Self>
    where
        Self: std::marker::Sized,
    {
        let mut response: [u8; 2] = [0, 0];
        stream.read_exact(&mut response).await?;

        let (version, status) = (response[0], response[1]);
        ensure!(
            version == consts::SOCKS5_SUBNEGOTIATION_VERSION,
            FerryError::DataError(InvalidValue::SubnegotiationVersion(version))
        );

        // Any non-zero status denotes failure.
        Ok(PasswordAuthResponse {
            success: status == consts::auth::SOCKS5_AUTH_STATUS_SUCCEEDED,
        })
    }
}

// The server evaluates the relay request, and returns a reply formed as follows:
// +----+-----+-------+------+----------+----------+
// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
// +----+-----+-------+------+----------+----------+
// | 1  |  1  | X'00' |  1   | Variable |    2     |
// +----+-----+-------+------+----------+----------+

#[derive(Debug)]
pub struct RelayResponse {
    bound_addr: Address,
    status: ReplyStatus,
}

impl RelayResponse {
    pub fn builder() -> RelayResponseBuilder {
        RelayResponseBuilder {
            bound_addr: None,
            status: None,
        }
    }

    pub fn status(&self) -> ReplyStatus {
        self.status
    }

    pub fn bound_addr(&self) -> &Address {
        &self.bound_addr
    }
}

impl FerryWrite for RelayResponse {
    async fn write_to<T: AsyncWriteExt + Unpin>(&self, stream: &mut T) -> Result<()> {
        let mut bytes = BytesMut::new();
        bytes.put_slice(&[consts::SOCKS5_VERSION, self.status.as_u8(), 0x00]);
        self.bound_addr.write_to(&mut bytes);
        stream.write_all(&bytes).await?;
        Ok(())
    }
}

impl FerryRead for RelayResponse {
    async fn read_from<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<Self>
    where
        Self: std::marker::Sized,
    {
        let mut header: [u8; 3] = [0, 0, 0];
        stream.read_exact(&mut header).await?;

        let (version, reply, _reserved) = (header[0], header[1], header[2]);
        ensure!(
            version == consts::SOCKS5_VERSION,
            FerryError::DataError(InvalidValue::ProtocolVersion(version))
        );

        let status = ReplyStatus::from_u8(reply);
        let bound_addr = Address::read_from(stream).await?;

        Ok(RelayResponse { bound_addr, status })
    }
}

pub struct RelayResponseBuilder {
    bound_addr: Option<Address>,
    status: Option<ReplyStatus>,
}

impl RelayResponseBuilder {
    pub fn with_success(&mut self) -> &mut RelayResponseBuilder {
        self.status = Some(ReplyStatus::Succeeded);
        self
    }

    pub fn with_err(&mut self, err: anyhow::Error) -> &mut RelayResponseBuilder {
        self.status = Some(ReplyStatus::from(err));
        self
    }

    pub fn with_bound_address(&mut self, bound_addr: Address) -> &mut RelayResponseBuilder {
        self.bound_addr = Some(bound_addr);
        self
    }

    pub fn build(&self) -> RelayResponse {
        RelayResponse {
            bound_addr: self.bound_addr.clone().expect("Bound address expected"),
            status: self.status.expect("Reply status expected"),
        }
    }
}
