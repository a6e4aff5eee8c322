use super::{consts, Address, Command};
use crate::{
    common::{
        error::{FerryError, InvalidValue},
        AuthMethod,
    },
    io::{FerryRead, FerryWrite},
};
use anyhow::{ensure, Result};
use bytes::{BufMut, BytesMut};
use std::collections::HashSet;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

// The client connects to the server, and sends a
// version identifier/method selection message:
// +----+----------+----------+
// |VER | NMETHODS | METHODS  |
// +----+----------+----------+
// | 1  |    1     | 1 to 255 |
// +----+----------+----------+

#[derive(Debug)]
pub struct HandshakeRequest {
    auth_methods: HashSet<AuthMethod>,
}

impl HandshakeRequest {
    pub fn new(auth_methods: HashSet<AuthMethod>) -> HandshakeRequest {
        HandshakeRequest { auth_methods }
    }

    pub fn auth_methods(&self) -> &HashSet<AuthMethod> {
        &self.auth_methods
    }
}

impl FerryRead for HandshakeRequest {
    async fn read_from<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<Self>
    where
        Self: std::marker::Sized,
    {
        let mut header: [u8; 2] = [0, 0];
        stream.read_exact(&mut header).await?;

        let (version, nmethods) = (header[0], header[1]);

        // Bail out if version is not supported.
        ensure!(
            version == consts::SOCKS5_VERSION,
            FerryError::DataError(InvalidValue::ProtocolVersion(version))
        );
        // A greeting that offers nothing is malformed.
        ensure!(nmethods >= 1, FerryError::DataError(InvalidValue::AuthMethodCount(nmethods)));

        let mut methods = vec![0; nmethods.into()];
        stream.read_exact(&mut methods).await?;

        // Methods unknown to this implementation are silently dropped,
        // they can never match the configured one anyway.
        let auth_methods = methods
            .iter()
            .filter_map(|&m| AuthMethod::from_socks5_const(m).ok())
            .collect::<HashSet<AuthMethod>>();

        Ok(HandshakeRequest { auth_methods })
    }
}

impl FerryWrite for HandshakeRequest {
    async fn write_to<T: AsyncWriteExt + Unpin>(&self, stream: &mut T) -> Result<()> {
        let mut bytes = BytesMut::new();
        bytes.put_u8(consts::SOCKS5_VERSION);
        bytes.put_u8(self.auth_methods.len() as u8);
        for method in &self.auth_methods {
            bytes.put_u8(*method as u8);
        }
        stream.write_all(&bytes).await?;
        Ok(())
    }
}

// Once the username/password method has been selected, the client
// sends the sub-negotiation request (RFC 1929):
// +----+------+----------+------+----------+
// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
// +----+------+----------+------+----------+
// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
// +----+------+----------+------+----------+

#[derive(Debug)]
pub struct PasswordAuthRequest {
    username: Vec<u8>,
    password: Vec<u8>,
}

impl PasswordAuthRequest {
    pub fn new(username: &str, password: &str) -> PasswordAuthRequest {
        PasswordAuthRequest {
            username: username.as_bytes().to_vec(),
            password: password.as_bytes().to_vec(),
        }
    }

    pub fn username(&self) -> &[u8] {
        &self.username
    }

    pub fn password(&self) -> &[u8] {
        &self.password
    }
}

impl FerryRead for PasswordAuthRequest {
    async fn read_from<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<Self>
    where
        Self: std::marker::Sized,
    {
        let version = stream.read_u8().await?;
        ensure!(
            version == consts::SOCKS5_SUBNEGOTIATION_VERSION,
            FerryError::DataError(InvalidValue::SubnegotiationVersion(version))
        );

        let ulen = stream.read_u8().await?;
        let mut username = vec![0; ulen.into()];
        stream.read_exact(&mut username).await?;

        let plen = stream.read_u8().await?;
        let mut password = vec![0; plen.into()];
        stream.read_exact(&mut password).await?;

        Ok(PasswordAuthRequest { username, password })
    }
}

impl FerryWrite for PasswordAuthRequest {
    async fn write_to<T: AsyncWriteExt + Unpin>(&self, stream: &mut T) -> Result<()> {
        ensure!(self.username.len() <= u8::MAX as usize, "username must fit the length octet");
        ensure!(self.password.len() <= u8::MAX as usize, "password must fit the length octet");

        let mut bytes = BytesMut::new();
        bytes.put_u8(consts::SOCKS5_SUBNEGOTIATION_VERSION);
        bytes.put_u8(self.username.len() as u8);
        bytes.put_slice(&self.username);
        bytes.put_u8(self.password.len() as u8);
        bytes.put_slice(&self.password);
        stream.write_all(&bytes).await?;
        Ok(())
    }
}

// The SOCKS request information is sent by the client as
// soon as it has established a connection to the SOCKS
// server, and completed the authentication negotiations.
// +----+-----+-------+------+----------+----------+
// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
// +----+-----+-------+------+----------+----------+
// | 1  |  1  | X'00' |  1   | Variable |    2     |
// +----+-----+-------+------+----------+----------+

#[derive(Debug)]
pub struct RelayRequest {
    command: Command,
    target_addr: Address,
}

impl RelayRequest {
    pub fn new(command: Command, target_addr: Address) -> RelayRequest {
        RelayRequest { command, target_addr }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn target_addr(&self) -> &Address {
        &self.target_addr
    }
}

impl FerryRead for RelayRequest {
    async fn read_from<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<RelayRequest> {
        let mut buff: [u8; 3] = [0, 0, 0];
        stream.read_exact(&mut buff).await?;

        let (version, cmd, reserved) = (buff[0], buff[1], buff[2]);

        ensure!(
            version == consts::SOCKS5_VERSION,
            FerryError::DataError(InvalidValue::ProtocolVersion(version))
        );
        ensure!(reserved == 0x00, FerryError::DataError(InvalidValue::ReservedValue(reserved)));

        let command = Command::try_from(cmd)?;
        let target_addr = Address::read_from(stream).await?;

        Ok(RelayRequest { command, target_addr })
    }
}

impl FerryWrite for RelayRequest {
    async fn write_to<T: AsyncWriteExt + Unpin>(&self, stream: &mut T) -> Result<()> {
        let mut bytes = BytesMut::new();
        bytes.put_slice(&[consts::SOCKS5_VERSION, self.command as u8, 0x00]);
        self.target_addr.write_to(&mut bytes);
        stream.write_all(&bytes).await?;
        Ok(())
    }
}
