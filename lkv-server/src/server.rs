//! # Line-Protocol TCP Server
//!
//! Accept connections, split `\n`-terminated requests out of a streaming
//! buffer, and dispatch each through a handler table.
//!
//! ## Design Principles
//!
//! 1. **Immutable Table**: Handlers are registered before serving; the table
//!    is shared read-only across connection tasks.
//! 2. **Fail-Open Requests**: A handler error becomes a response line; only
//!    transport failure ends a connection.
//! 3. **Sequential per Connection**: One task per connection, requests
//!    answered in arrival order; connections run concurrently.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use lkv_common::{CacheError, CacheResult, Request};

/// A registered request handler. The returned string is written back with a
/// `\r\n` terminator; an error's message is written the same way.
pub type Handler = Box<dyn Fn(&Request) -> CacheResult<String> + Send + Sync>;

/// TCP server speaking the line protocol.
///
/// The registration key `"default"` names the fallback handler for methods
/// absent from the table; the name itself is rejected as a request method.
pub struct LineServer {
    handlers: HashMap<String, Handler>,
}

impl LineServer {
    /// Creates a server with an empty handler table.
    pub fn new() -> Self {
        LineServer {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for a method, replacing any previous one.
    pub fn set_handler(&mut self, method: impl Into<String>, handler: Handler) {
        self.handlers.insert(method.into(), handler);
    }

    /// Resolves the handler for one request and runs it.
    ///
    /// Exact matches win; otherwise the `"default"` registration serves the
    /// request, if present.
    pub fn handle_request(&self, request: &Request) -> CacheResult<String> {
        if request.method == "default" {
            return Err(CacheError::UnknownMethod);
        }
        let handler = self
            .handlers
            .get(&request.method)
            .or_else(|| self.handlers.get("default"))
            .ok_or(CacheError::UnknownMethod)?;
        handler(request)
    }

    /// Binds the listener and serves connections until the listener fails.
    pub async fn listen_and_serve(self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "listening");
        let server = Arc::new(self);

        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(%peer, "connection accepted");
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                if let Err(err) = handle_connection(stream, server).await {
                    warn!(%peer, error = %err, "connection closed on i/o error");
                }
            });
        }
    }
}

/// Serves one connection until EOF or an I/O failure.
pub async fn handle_connection(
    stream: TcpStream,
    server: Arc<LineServer>,
) -> std::io::Result<()> {
    let mut stream = stream;
    let mut buffer = BytesMut::with_capacity(8 * 1024);

    loop {
        let bytes = stream.read_buf(&mut buffer).await?;
        if bytes == 0 {
            // EOF; a partial trailing line is dropped.
            break;
        }

        while let Some(line) = split_line(&mut buffer) {
            let request = Request::parse(&line);
            if request.method.is_empty() {
                stream.write_all(b"\r\n").await?;
                continue;
            }
            let mut reply = match server.handle_request(&request) {
                Ok(response) => response,
                Err(err) => err.to_string(),
            };
            reply.push_str("\r\n");
            stream.write_all(reply.as_bytes()).await?;
        }
    }

    Ok(())
}

/// Splits the next `\n`-terminated line off the buffer, stripping the
/// terminator and an optional preceding `\r`.
fn split_line(buffer: &mut BytesMut) -> Option<String> {
    let pos = buffer.iter().position(|&b| b == b'\n')?;
    let mut line = buffer.split_to(pos + 1);
    line.truncate(line.len() - 1);
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo() -> Handler {
        Box::new(|request: &Request| {
            let mut line = request.method.clone();
            for arg in &request.args {
                line.push(' ');
                line.push_str(arg);
            }
            Ok(line)
        })
    }

    #[test]
    fn exact_match_wins_over_default() {
        let mut server = LineServer::new();
        server.set_handler("PING", Box::new(|_| Ok("PONG".to_string())));
        server.set_handler("default", echo());

        let reply = server.handle_request(&Request::new("PING", &[])).unwrap();
        assert_eq!(reply, "PONG");
        let reply = server
            .handle_request(&Request::new("OTHER", &["x"]))
            .unwrap();
        assert_eq!(reply, "OTHER x");
    }

    #[test]
    fn unknown_method_without_default_is_rejected() {
        let mut server = LineServer::new();
        server.set_handler("PING", Box::new(|_| Ok("PONG".to_string())));

        let err = server
            .handle_request(&Request::new("NOSUCH", &[]))
            .unwrap_err();
        assert_eq!(err.to_string(), "method does not exist");
    }

    #[test]
    fn default_is_a_reserved_method_name() {
        let mut server = LineServer::new();
        server.set_handler("default", echo());

        let err = server
            .handle_request(&Request::new("default", &[]))
            .unwrap_err();
        assert_eq!(err.to_string(), "method does not exist");
    }

    #[test]
    fn split_line_strips_framing_and_keeps_the_rest() {
        let mut buffer = BytesMut::from(&b"GET key\r\nNEXT"[..]);
        assert_eq!(split_line(&mut buffer).unwrap(), "GET key");
        // The partial second request stays buffered.
        assert!(split_line(&mut buffer).is_none());
        assert_eq!(&buffer[..], b"NEXT");

        let mut bare = BytesMut::from(&b"PING\n"[..]);
        assert_eq!(split_line(&mut bare).unwrap(), "PING");

        let mut empty = BytesMut::from(&b"\r\n"[..]);
        assert_eq!(split_line(&mut empty).unwrap(), "");
    }
}
