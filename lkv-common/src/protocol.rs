//! # Line Protocol Request Model
//!
//! One request per line: `METHOD [arg1 [arg2 ...]]\r\n`, separated by single
//! spaces. Arguments are unquoted and cannot embed spaces or CRLF; that
//! keeps parsing a straight split with no escape handling.

/// A parsed request: the method name and its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub args: Vec<String>,
}

impl Request {
    /// Builds a request from a method and argument slice.
    pub fn new(method: impl Into<String>, args: &[&str]) -> Self {
        Request {
            method: method.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// Parses a request line with the framing (`\r\n`) already stripped.
    ///
    /// Spaces around the whole line are trimmed, then the line is split on
    /// single spaces. Consecutive separators produce empty arguments; an
    /// all-space line yields an empty method. Parsing itself never fails.
    pub fn parse(line: &str) -> Request {
        let trimmed = line.trim_matches(' ');
        let mut parts = trimmed.split(' ');
        let method = parts.next().unwrap_or("").to_string();
        let args = parts.map(str::to_string).collect();
        Request { method, args }
    }

    /// Renders the request as a wire line, including the `\r\n` terminator.
    pub fn encode(&self) -> String {
        let mut line = self.method.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line.push_str("\r\n");
        line
    }
}
