use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub mod tunnel;

/// Wire message that can be decoded from a stream.
///
/// Every SOCKS5 message implements both [`FerryRead`] and [`FerryWrite`]:
/// the server reads what the upstream client writes and vice versa.
pub trait FerryRead {
    async fn read_from<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<Self>
    where
        Self: std::marker::Sized;
}

/// Wire message that can be encoded onto a stream.
pub trait FerryWrite {
    async fn write_to<T: AsyncWriteExt + Unpin>(&self, stream: &mut T) -> Result<()>;
}
