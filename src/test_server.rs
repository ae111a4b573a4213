//! Minimal HTTP/1.1 server on localhost for tests that talk to the network.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

/// The single response served for every request
pub struct CannedResponse {
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Send `Content-Length`; without it the body ends when the connection closes
    pub content_length: bool,
}

/// Serve `response` on a random local port until the test runtime stops
pub async fn serve(response: CannedResponse) -> std::io::Result<Url> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let response = std::sync::Arc::new(response);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_err() {
                    return;
                }

                let mut head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nConnection: close\r\n",
                    response.content_type
                );
                if response.content_length {
                    head.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
                }
                head.push_str("\r\n");

                // The client hangs up early on purpose in the size tests
                if socket.write_all(head.as_bytes()).await.is_ok() {
                    let _ = socket.write_all(&response.body).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    Url::parse(&format!("http://{addr}/media"))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
}

/// Reads the request head and its `Content-Length` body
async fn read_request(socket: &mut tokio::net::TcpStream) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut buf).await? {
            0 => return Err(std::io::ErrorKind::UnexpectedEof.into()),
            n => request.extend_from_slice(&buf[..n]),
        }
    };

    let head = String::from_utf8_lossy(&request[..head_end]).to_ascii_lowercase();
    let body_len = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while request.len() < head_end + body_len {
        match socket.read(&mut buf).await? {
            0 => break,
            n => request.extend_from_slice(&buf[..n]),
        }
    }
    Ok(())
}

/// Client that never goes through a proxy from the environment
pub fn local_client() -> reqwest::Client {
    match reqwest::Client::builder().no_proxy().build() {
        Ok(client) => client,
        Err(e) => panic!("cannot build test client: {e}"),
    }
}
