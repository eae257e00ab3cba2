use bytes::Bytes;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Request line of a request received by [`TestHttpServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedRequest {
    pub method: String,
    /// Path and query string.
    pub target: String,
}

/// Response served by [`TestHttpServer`].
///
/// Bodies are always sent with chunked transfer encoding, one HTTP chunk per configured chunk,
/// so a client observes them arriving separately.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: u16,
    headers: Vec<(String, String)>,
    chunks: Vec<Bytes>,
    chunk_delay: Duration,
    truncated: bool,
}

impl TestResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            chunks: Vec::new(),
            chunk_delay: Duration::ZERO,
            truncated: false,
        }
    }

    /// `200 OK` with a JSON body.
    pub fn json(body: &str) -> Self {
        Self::new(200)
            .with_header("Content-Type", "application/json")
            .with_chunks([body.to_string()])
    }

    /// Response with `status` and a plain text body.
    pub fn text(status: u16, body: &str) -> Self {
        Self::new(status)
            .with_header("Content-Type", "text/plain")
            .with_chunks([body.to_string()])
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_chunks<I, B>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    /// Waits `delay` before sending every chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Closes the connection after the chunks without terminating the body.
    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }
}

type Handler = dyn Fn(&ReceivedRequest) -> TestResponse + Send + Sync;

/// Minimal HTTP/1.1 server on a local port answering every request through a handler.
///
/// Each connection serves a single request and is then closed. The server stops when dropped.
pub struct TestHttpServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
    task: JoinHandle<()>,
}

impl TestHttpServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&ReceivedRequest) -> TestResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test http server");
        let addr = listener
            .local_addr()
            .expect("failed to read test http server address");

        let handler: Arc<Handler> = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn({
            let requests = requests.clone();
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let handler = handler.clone();
                    let requests = requests.clone();
                    tokio::spawn(async move {
                        let _ = serve(socket, handler.as_ref(), &requests).await;
                    });
                }
            }
        });

        Self {
            addr,
            requests,
            task,
        }
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    mut socket: TcpStream,
    handler: &Handler,
    requests: &Mutex<Vec<ReceivedRequest>>,
) -> io::Result<()> {
    let Some(request) = read_request(&mut socket).await? else {
        return Ok(());
    };

    if let Ok(mut requests) = requests.lock() {
        requests.push(request.clone());
    }

    let response = handler(&request);
    write_response(&mut socket, response).await
}

async fn read_request(socket: &mut TcpStream) -> io::Result<Option<ReceivedRequest>> {
    let mut received = Vec::new();
    let mut buf = [0u8; 1024];

    let head_len = loop {
        if let Some(position) = received.windows(4).position(|window| window == b"\r\n\r\n") {
            break position + 4;
        }

        let read = socket.read(&mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        received.extend_from_slice(&buf[..read]);
    };

    let head = String::from_utf8_lossy(&received[..head_len]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    // Drain the body so closing the socket does not reset the connection.
    let mut body_read = received.len() - head_len;
    while body_read < content_length {
        let read = socket.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        body_read += read;
    }

    Ok(Some(ReceivedRequest { method, target }))
}

async fn write_response(socket: &mut TcpStream, response: TestResponse) -> io::Result<()> {
    let reason = match response.status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };

    let mut head = format!(
        "HTTP/1.1 {} {reason}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n",
        response.status
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");

    socket.write_all(head.as_bytes()).await?;
    socket.flush().await?;

    for chunk in response.chunks {
        if !response.chunk_delay.is_zero() {
            tokio::time::sleep(response.chunk_delay).await;
        }
        if chunk.is_empty() {
            continue;
        }

        socket
            .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
            .await?;
        socket.write_all(&chunk).await?;
        socket.write_all(b"\r\n").await?;
        socket.flush().await?;
    }

    if !response.truncated {
        socket.write_all(b"0\r\n\r\n").await?;
    }

    socket.shutdown().await
}
