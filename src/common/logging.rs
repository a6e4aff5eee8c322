// Lifecycle events, one line each. `$conn` is whatever identifies the
// connection: the registry `ConnectionId` on the SOCKS5 side, the peer
// address on the HTTP side.

macro_rules! log_conn_opened {
    ($conn:expr) => {
        info!("[{}] connection opened", $conn)
    };
}

// Single terminal event per connection, success and failure folded into
// the session outcome.
macro_rules! log_conn_closed {
    ($conn:expr, $outcome:expr) => {
        match &$outcome {
            Ok(()) => info!("[{}] connection closed", $conn),
            Err(err) => error!("[{}] connection closed, reason: '{:#}'", $conn, err),
        }
    };
}

macro_rules! log_conn_canceled {
    ($conn:expr) => {
        info!("[{}] connection canceled by shutdown", $conn)
    };
}

macro_rules! log_accept_error {
    ($err:expr) => {
        warn!("failed to accept connection: '{}'", $err)
    };
}

pub(crate) use log_accept_error;
pub(crate) use log_conn_canceled;
pub(crate) use log_conn_closed;
pub(crate) use log_conn_opened;

// Tunnel events, keyed like the connection events and carrying the
// relay outcome with its per-direction byte counters.

macro_rules! log_tunnel_opened {
    ($conn:expr, $target:expr) => {
        info!("[{}] tunnel opened to {}", $conn, $target)
    };
}

macro_rules! log_tunnel_closed {
    ($conn:expr, $target:expr, $outcome:expr) => {
        match &$outcome {
            Ok((l2r, r2l)) => info!(
                "[{}] tunnel to {} closed, {} out / {} back",
                $conn,
                $target,
                human_bytes(*l2r as f64),
                human_bytes(*r2l as f64)
            ),
            Err(err) => error!("[{}] tunnel to {} closed, reason: '{}'", $conn, $target, err),
        }
    };
}

pub(crate) use log_tunnel_closed;
pub(crate) use log_tunnel_opened;

// Command phase. A rejected client request is answered and logged, it is
// not a server failure.

macro_rules! log_request_rejected {
    ($conn:expr, $req:expr, $resp:expr, $reason:expr) => {
        warn!("[{}] rejected request {:?} with {:?}, reason: '{}'", $conn, $req, $resp, $reason)
    };
}

pub(crate) use log_request_rejected;
