//! # LineKV Blocking Client
//!
//! A thin synchronous client for the line protocol: one persistent TCP
//! connection, one request line out, one `\r\n`-terminated reply back. The
//! protocol does not mark error replies, so every command returns the raw
//! response text and callers interpret it.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};

use lkv_common::Request;

/// Blocking client over a single cache connection.
pub struct CacheClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl CacheClient {
    /// Connects to a cache server.
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(CacheClient {
            reader,
            writer: stream,
        })
    }

    /// Sends one command and returns the raw response text.
    pub fn request(&mut self, method: &str, args: &[&str]) -> io::Result<String> {
        let line = Request::new(method, args).encode();
        self.writer.write_all(line.as_bytes())?;
        self.read_reply()
    }

    /// Reads one reply, which ends at the first `\r\n`. Embedded bare `\n`
    /// bytes belong to multi-line payloads (KEYS, range pops).
    fn read_reply(&mut self) -> io::Result<String> {
        let mut buf = Vec::new();
        loop {
            let bytes = self.reader.read_until(b'\n', &mut buf)?;
            if bytes == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed mid-reply",
                ));
            }
            if buf.ends_with(b"\r\n") {
                buf.truncate(buf.len() - 2);
                break;
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Lists keys matching a glob pattern.
    pub fn keys(&mut self, pattern: &str) -> io::Result<String> {
        self.request("KEYS", &[pattern])
    }

    /// Deletes keys, returning the deleted count.
    pub fn del(&mut self, keys: &[&str]) -> io::Result<String> {
        self.request("DEL", keys)
    }

    /// Fetches a scalar value.
    pub fn get(&mut self, key: &str) -> io::Result<String> {
        self.request("GET", &[key])
    }

    /// Stores a scalar value.
    pub fn set(&mut self, key: &str, value: &str) -> io::Result<String> {
        self.request("SET", &[key, value])
    }

    /// Stores a scalar value with an expiration in seconds.
    pub fn set_ex(&mut self, key: &str, value: &str, seconds: i64) -> io::Result<String> {
        let seconds = seconds.to_string();
        self.request("SET", &[key, value, "EX", &seconds])
    }

    /// Arms, re-arms, or cancels (seconds = 0) a key's expiration.
    pub fn expire(&mut self, key: &str, seconds: i64) -> io::Result<String> {
        let seconds = seconds.to_string();
        self.request("EXPIRE", &[key, &seconds])
    }

    /// Writes field/value pairs into a map key.
    pub fn hset(&mut self, key: &str, pairs: &[(&str, &str)]) -> io::Result<String> {
        let mut args = vec![key];
        for &(field, value) in pairs {
            args.push(field);
            args.push(value);
        }
        self.request("HSET", &args)
    }

    /// Fetches one field of a map key.
    pub fn hget(&mut self, key: &str, field: &str) -> io::Result<String> {
        self.request("HGET", &[key, field])
    }

    /// Pushes elements onto the front of a list.
    pub fn lpush(&mut self, key: &str, elements: &[&str]) -> io::Result<String> {
        let mut args = vec![key];
        args.extend_from_slice(elements);
        self.request("LPUSH", &args)
    }

    /// Pushes elements onto the back of a list.
    pub fn rpush(&mut self, key: &str, elements: &[&str]) -> io::Result<String> {
        let mut args = vec![key];
        args.extend_from_slice(elements);
        self.request("RPUSH", &args)
    }

    /// Pops the head element.
    pub fn lpop(&mut self, key: &str) -> io::Result<String> {
        self.request("LPOP", &[key])
    }

    /// Pops up to `count` elements from the head.
    pub fn lpop_count(&mut self, key: &str, count: i64) -> io::Result<String> {
        let count = count.to_string();
        self.request("LPOP", &[key, &count])
    }

    /// Pops the inclusive `[start, end]` span from the head side.
    pub fn lpop_span(&mut self, key: &str, start: i64, end: i64) -> io::Result<String> {
        let (start, end) = (start.to_string(), end.to_string());
        self.request("LPOP", &[key, &start, &end])
    }

    /// Pops the tail element.
    pub fn rpop(&mut self, key: &str) -> io::Result<String> {
        self.request("RPOP", &[key])
    }

    /// Pops up to `count` elements from the tail.
    pub fn rpop_count(&mut self, key: &str, count: i64) -> io::Result<String> {
        let count = count.to_string();
        self.request("RPOP", &[key, &count])
    }

    /// Pops the inclusive `[start, end]` span from the tail side.
    pub fn rpop_span(&mut self, key: &str, start: i64, end: i64) -> io::Result<String> {
        let (start, end) = (start.to_string(), end.to_string());
        self.request("RPOP", &[key, &start, &end])
    }

    /// Replaces the element at a (possibly negative) index.
    pub fn lset(&mut self, key: &str, index: i64, element: &str) -> io::Result<String> {
        let index = index.to_string();
        self.request("LSET", &[key, &index, element])
    }

    /// Fetches the element at a (possibly negative) index.
    pub fn lget(&mut self, key: &str, index: i64) -> io::Result<String> {
        let index = index.to_string();
        self.request("LGET", &[key, &index])
    }

    /// Snapshots the full server state under a name.
    pub fn save(&mut self, name: &str) -> io::Result<String> {
        self.request("SAVE", &[name])
    }

    /// Replaces the server state from a named snapshot.
    pub fn load(&mut self, name: &str) -> io::Result<String> {
        self.request("LOAD", &[name])
    }
}
