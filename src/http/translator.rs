use crate::common::error::FerryError;
use anyhow::{bail, Result};
use bytes::BytesMut;
use tokio::io::AsyncReadExt;

/// Upper bound on the inbound request head. Anything larger is treated
/// as a malformed request.
const MAX_REQUEST_HEAD_BYTES: usize = 8 * 1024;

/// Request head terminator per HTTP/1.x.
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

const READ_CHUNK_BYTES: usize = 64;

/// Parsed head of an inbound HTTP/1.x request.
///
/// Everything consumed off the stream while looking for the terminator,
/// including any bytes past it, is tracked as the prelude. The prelude is
/// forwarded to the upstream verbatim for plain HTTP requests and
/// discarded for CONNECT.
#[derive(Debug)]
pub struct HttpRequestHead {
    method: String,
    target: String,
    prelude: BytesMut,
}

/// Destination extracted from the request line.
#[derive(Debug, PartialEq)]
pub struct HttpDestination {
    pub host: String,
    pub port: u16,
}

impl HttpRequestHead {
    /// Reads the inbound stream until `CRLF CRLF` shows up and parses the
    /// request line. Early close and oversized heads are errors.
    pub async fn read_from<T: AsyncReadExt + Unpin>(stream: &mut T) -> Result<HttpRequestHead> {
        let mut buffer = BytesMut::with_capacity(READ_CHUNK_BYTES);
        let mut chunk = [0u8; READ_CHUNK_BYTES];

        while find_terminator(&buffer).is_none() {
            if buffer.len() > MAX_REQUEST_HEAD_BYTES {
                bail!(FerryError::BadHttpRequest("request head is too large".to_string()))
            }

            match stream.read(&mut chunk).await? {
                0 => bail!(FerryError::BadHttpRequest(
                    "connection closed before end of request head".to_string()
                )),
                n => buffer.extend_from_slice(&chunk[..n]),
            }
        }

        HttpRequestHead::parse(buffer)
    }

    fn parse(prelude: BytesMut) -> Result<HttpRequestHead> {
        let head_end = find_terminator(&prelude).expect("terminator is present in a complete head");

        let head = std::str::from_utf8(&prelude[..head_end])
            .map_err(|_| FerryError::BadHttpRequest("request head is not valid UTF-8".to_string()))?;
        let request_line = head.split("\r\n").next().unwrap_or_default();

        // METHOD SP REQUEST-TARGET SP VERSION
        let mut parts = request_line.split(' ').filter(|part| !part.is_empty());
        let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(target), Some(version), None) => (method, target, version),
            _ => bail!(FerryError::BadHttpRequest(format!("malformed request line '{request_line}'"))),
        };

        if version != "HTTP/1.1" && version != "HTTP/1.0" {
            bail!(FerryError::BadHttpRequest(format!("unsupported version '{version}'")))
        }

        Ok(HttpRequestHead {
            method: method.to_string(),
            target: target.to_string(),
            prelude,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn is_connect(&self) -> bool {
        self.method == "CONNECT"
    }

    /// Raw bytes consumed off the inbound stream, request line included.
    pub fn prelude(&self) -> &[u8] {
        &self.prelude
    }

    /// Extracts the upstream destination.
    ///
    /// CONNECT carries `host:port`; every other method carries an absolute
    /// URI whose authority names the origin, port defaulting to 80.
    pub fn destination(&self) -> Result<HttpDestination> {
        let authority = if self.is_connect() {
            self.target.as_str()
        } else {
            let Some((_scheme, rest)) = self.target.split_once("://") else {
                bail!(FerryError::BadHttpRequest(format!(
                    "request target '{}' is not an absolute URI",
                    self.target
                )))
            };
            rest.split(|c| c == '/' || c == '?').next().unwrap_or_default()
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| FerryError::BadHttpRequest(format!("invalid port in '{authority}'")))?;
                (host, port)
            }
            None if self.is_connect() => bail!(FerryError::BadHttpRequest(format!("CONNECT target '{authority}' has no port"))),
            None => (authority, 80),
        };

        if host.is_empty() || host.len() > u8::MAX as usize {
            bail!(FerryError::BadHttpRequest(format!("invalid host in '{authority}'")))
        }

        Ok(HttpDestination {
            host: host.to_string(),
            port,
        })
    }
}

fn find_terminator(buffer: &[u8]) -> Option<usize> {
    buffer.windows(HEAD_TERMINATOR.len()).position(|window| window == HEAD_TERMINATOR)
}
