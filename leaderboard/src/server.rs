//! Minimal HTTP/1.1 listener for [`Service`].
//!
//! One worker thread per connection, one request per connection
//! (`Connection: close`). Only the request line and headers are read;
//! request bodies are ignored.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::service::{self, Request, Response, Service, ServiceError, CORS_HEADERS};

/// Connection limits.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Time allowed for the client to deliver its request head
    pub read_timeout: Duration,
    /// Time a single write may block while the client is not reading
    pub write_timeout: Duration,
    /// Maximum size of request line plus headers
    pub max_header_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            max_header_bytes: 8 * 1024,
        }
    }
}

#[derive(Debug)]
enum HeadError {
    TooLarge,
    TimedOut,
    Malformed(String),
    Io(io::Error),
}

impl From<io::Error> for HeadError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::InvalidData => {
                HeadError::Malformed("request head is not valid UTF-8".to_string())
            }
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => HeadError::TimedOut,
            _ => HeadError::Io(e),
        }
    }
}

/// Read the request line and headers, returning `(method, target)`.
fn read_head<R: BufRead>(reader: &mut R, max: usize) -> Result<(String, String), HeadError> {
    let mut total = 0usize;
    let mut request_line: Option<String> = None;

    loop {
        let mut line = String::new();
        let budget = (max - total + 1) as u64;
        let n = reader.by_ref().take(budget).read_line(&mut line)?;
        total += n;
        if total > max {
            return Err(HeadError::TooLarge);
        }
        if n == 0 {
            // EOF before the blank line that ends the head.
            return match request_line {
                Some(_) => Err(HeadError::Malformed("truncated request head".to_string())),
                None => Err(HeadError::Malformed("empty request".to_string())),
            };
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if request_line.is_none() {
            request_line = Some(line.to_string());
            continue;
        }
        if line.is_empty() {
            break;
        }
    }

    let request_line = request_line.unwrap_or_default();
    let mut parts = request_line.split_ascii_whitespace();
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(version), None) if version.starts_with("HTTP/") => {
            Ok((method.to_string(), target.to_string()))
        }
        _ => Err(HeadError::Malformed(format!("bad request line '{request_line}'"))),
    }
}

fn write_response<W: Write>(w: &mut W, resp: &Response) -> io::Result<()> {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n",
        resp.status,
        service::reason(resp.status),
        resp.content_type,
        resp.body.len()
    );
    for (name, value) in CORS_HEADERS {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("Connection: close\r\n\r\n");

    w.write_all(head.as_bytes())?;
    w.write_all(resp.body.as_bytes())?;
    w.flush()
}

fn plain(status: u16, body: &str) -> Response {
    Response {
        status,
        content_type: "text/plain; charset=utf-8",
        body: body.to_string(),
    }
}

fn handle_connection(
    stream: TcpStream,
    service: &Service,
    config: &ServerConfig,
) -> io::Result<()> {
    stream.set_read_timeout(Some(config.read_timeout))?;
    stream.set_write_timeout(Some(config.write_timeout))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    let resp = match read_head(&mut reader, config.max_header_bytes) {
        Ok((method, target)) => match Request::new(&method, &target) {
            Ok(req) => service.handle(&req),
            Err(err) => Response::from_error(&err),
        },
        Err(HeadError::TooLarge) => plain(431, "Request header too large\n"),
        Err(HeadError::TimedOut) => plain(408, "Request timed out\n"),
        Err(HeadError::Malformed(msg)) => Response::from_error(&ServiceError::BadRequest(msg)),
        Err(HeadError::Io(e)) => return Err(e),
    };

    write_response(&mut writer, &resp)
}

/// Accepts connections and answers them from a [`Service`].
pub struct Server {
    listener: TcpListener,
    service: Service,
    config: ServerConfig,
}

impl Server {
    /// Bind to `addr`. Port 0 picks a free port; see [`Server::local_addr`].
    pub fn bind(
        addr: impl ToSocketAddrs,
        service: Service,
        config: ServerConfig,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            service,
            config,
        })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the listener fails.
    pub fn serve(self) -> io::Result<()> {
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let service = self.service.clone();
            let config = self.config.clone();
            let spawned = thread::Builder::new()
                .name("rank-conn".to_string())
                .spawn(move || {
                    let peer = stream.peer_addr().ok();
                    if let Err(e) = handle_connection(stream, &service, &config) {
                        debug!("Connection {:?} ended with error: {}", peer, e);
                    }
                });
            if let Err(e) = spawned {
                warn!("Failed to spawn connection worker: {}", e);
            }
        }
        Ok(())
    }
}
