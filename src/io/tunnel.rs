use anyhow::Result;
use tokio::io::{copy_bidirectional, AsyncRead, AsyncWrite};

/// Bidirectional relay between two streams.
///
/// Copies both directions concurrently until either one observes EOF or
/// fails, then closes both streams and reports per-direction byte counts.
pub struct FerryTunnel<'a, X, Y>
where
    X: AsyncRead + AsyncWrite + Unpin,
    Y: AsyncRead + AsyncWrite + Unpin,
{
    l2r: &'a mut X,
    r2l: &'a mut Y,
}

impl<'a, X, Y> FerryTunnel<'a, X, Y>
where
    X: AsyncRead + AsyncWrite + Unpin,
    Y: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(l2r: &'a mut X, r2l: &'a mut Y) -> FerryTunnel<'a, X, Y> {
        FerryTunnel { l2r, r2l }
    }

    pub async fn run(&mut self) -> Result<(u64, u64)> {
        copy_bidirectional(self.l2r, self.r2l).await.map_err(anyhow::Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn relays_both_directions_and_stops_on_eof() {
        let (mut left_near, mut left_far) = duplex(64);
        let (mut right_near, mut right_far) = duplex(64);

        let tunnel = tokio::spawn(async move {
            let mut tunnel = FerryTunnel::new(&mut left_far, &mut right_near);
            tunnel.run().await.expect("Expect gracefully finished tunnel")
        });

        left_near.write_all(b"ping").await.unwrap();

        let mut buff = [0u8; 4];
        right_far.read_exact(&mut buff).await.unwrap();
        assert_eq!(b"ping", &buff);

        right_far.write_all(b"pong").await.unwrap();
        left_near.read_exact(&mut buff).await.unwrap();
        assert_eq!(b"pong", &buff);

        // EOF on both ends terminates the relay.
        drop(left_near);
        drop(right_far);

        let (l2r, r2l) = tunnel.await.unwrap();
        assert_eq!((4, 4), (l2r, r2l));
    }
}
