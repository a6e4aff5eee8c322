use async_socks5::Auth;
use log::LevelFilter;
use log4rs_test_utils::test_logging::init_logging_once_for;
use reqwest::Proxy;
use std::{
    net::SocketAddr,
    sync::atomic::{AtomicUsize, Ordering},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use utils::assertions::assert_eq_vectors;

pub mod listeners;

pub fn init_logging() {
    init_logging_once_for(None, LevelFilter::Debug, "{h({({l}):5.5})} [{M}] {f}:{L}: {m}{n}");
}

pub fn next_available_address() -> SocketAddr {
    static PORT: AtomicUsize = AtomicUsize::new(32000);

    format!("127.0.0.1:{}", PORT.fetch_add(1, Ordering::AcqRel)).parse().unwrap()
}

#[allow(dead_code)]
pub fn socks5_proxy_with_auth(addr: SocketAddr, username: &str, password: &str) -> Proxy {
    Proxy::http(format!("socks5://{username}:{password}@{addr}")).unwrap()
}

#[allow(dead_code)]
pub fn http_proxy(addr: SocketAddr) -> Proxy {
    Proxy::http(format!("http://{}", addr)).unwrap()
}

/// Establish connection with passed <code>endpoint</code> through <code>socks5_proxy</code>. Then send
/// data and expect it to be fully returned by the endpoint.
#[allow(dead_code)]
pub async fn ping_pong_data_through_socks5(endpoint: SocketAddr, socks5_proxy: SocketAddr, auth: Option<Auth>) {
    // Create TCP stream.
    let mut socks5_stream = TcpStream::connect(socks5_proxy)
        .await
        .expect("Expect successful TCP connection established with proxy");

    // Establish SOCKS5 connection over TCP stream.
    async_socks5::connect(&mut socks5_stream, endpoint, auth)
        .await
        .expect("Expect successfully established SOCKS5 connection");

    // Write generated buffer.
    let write_buff = utils::generate_data(1024);
    socks5_stream.write_all(&write_buff).await.expect("Expect all data to be written");

    // Expect it to be fully received back.
    let mut read_buff = vec![0u8; 1024];
    socks5_stream.read_exact(&mut read_buff).await.expect("Expect all data to be read");

    // Shutdown write direction.
    socks5_stream.shutdown().await.expect("Expect successful TCP stream shutdown");

    // Check that written and read data are equal.
    assert_eq_vectors(&write_buff, &read_buff);
}

pub mod utils {

    use rand::Rng;

    pub mod assertions {

        use std::fmt::Debug;

        pub fn assert_eq_vectors<T: Eq + Debug>(expected: &[T], actual: &[T]) {
            let matching = expected
                .iter()
                .zip(actual)
                .filter(|&(r, w)| {
                    assert_eq!(r, w);
                    r == w
                })
                .count();

            assert_eq!(expected.len(), matching, "whole buffers (write & read) should be equal");
        }
    }

    pub mod http {

        use reqwest::{Client, ClientBuilder, Proxy};

        #[allow(dead_code)]
        pub fn create_http_client() -> Client {
            construct_http_client(None)
        }

        pub fn create_http_client_with_proxy(proxy: Proxy) -> Client {
            construct_http_client(Some(proxy))
        }

        fn construct_http_client(proxy: Option<Proxy>) -> Client {
            let mut builder = ClientBuilder::new();

            if let Some(p) = proxy {
                builder = builder.proxy(p);
            }

            builder.build().expect("Unable to build HTTP client")
        }
    }

    pub fn generate_data(len: usize) -> Vec<u8> {
        let v = vec![0u8; len];
        let mut rng = rand::thread_rng();

        v.iter().map(|_| rng.gen::<u8>()).collect()
    }
}
