//! Blocking client
//!
//! Connects to a NestKV server over its Unix socket, performs the
//! handshake, and speaks the line grammar. Used by the CLI binary and the
//! integration tests.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

use crate::error::{NestError, Result};
use crate::protocol::{parse_handle, parse_response, Response};

/// A blocking connection to a NestKV server
pub struct Client {
    reader: BufReader<UnixStream>,
    writer: BufWriter<UnixStream>,
    handle: u32,
}

impl Client {
    /// Connect and perform the `HELLO {pid}` handshake
    pub fn connect(socket_path: &Path, pid: u32) -> Result<Self> {
        let stream = UnixStream::connect(socket_path).map_err(|e| {
            NestError::Network(format!("failed to connect {}: {e}", socket_path.display()))
        })?;
        let read_stream = stream.try_clone()?;

        let mut client = Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            handle: 0,
        };

        let reply = client.round_trip(format!("HELLO {{{pid}}}\n").into_bytes())?;
        client.handle = parse_handle(&reply)?;
        Ok(client)
    }

    /// The handle the server assigned at handshake time
    pub fn handle(&self) -> u32 {
        self.handle
    }

    /// `GET {key}`
    pub fn get(&mut self, key: &[u8]) -> Result<Response> {
        self.request(b"GET", key, None)
    }

    /// `PUT {key} {value}` (upsert)
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<Response> {
        self.request(b"PUT", key, Some(value))
    }

    /// `POST {key} {value}` (create-only)
    pub fn post(&mut self, key: &[u8], value: &[u8]) -> Result<Response> {
        self.request(b"POST", key, Some(value))
    }

    /// `DELETE {key}`
    pub fn delete(&mut self, key: &[u8]) -> Result<Response> {
        self.request(b"DELETE", key, None)
    }

    /// `PAUSE {handle}`
    pub fn pause(&mut self, handle: u32) -> Result<Response> {
        self.control("PAUSE", handle)
    }

    /// `RESUME {handle}`
    pub fn resume(&mut self, handle: u32) -> Result<Response> {
        self.control("RESUME", handle)
    }

    /// `TERMINATE {handle}`
    pub fn terminate(&mut self, handle: u32) -> Result<Response> {
        self.control("TERMINATE", handle)
    }

    /// Send a raw line (terminator appended) and parse the reply
    ///
    /// Lets tests exercise the server's handling of malformed requests.
    pub fn send_raw(&mut self, line: &[u8]) -> Result<Response> {
        let mut framed = line.to_vec();
        framed.push(b'\n');
        let reply = self.round_trip(framed)?;
        parse_response(&reply)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn request(&mut self, verb: &[u8], key: &[u8], value: Option<&[u8]>) -> Result<Response> {
        let mut line = Vec::with_capacity(verb.len() + key.len() + 8);
        line.extend_from_slice(verb);
        line.extend_from_slice(b" {");
        line.extend_from_slice(key);
        line.push(b'}');
        if let Some(value) = value {
            line.extend_from_slice(b" {");
            line.extend_from_slice(value);
            line.push(b'}');
        }
        line.push(b'\n');

        let reply = self.round_trip(line)?;
        parse_response(&reply)
    }

    fn control(&mut self, verb: &str, handle: u32) -> Result<Response> {
        let line = format!("{verb} {{{handle}}}\n");
        let reply = self.round_trip(line.into_bytes())?;
        parse_response(&reply)
    }

    /// Write one line, read one line
    fn round_trip(&mut self, line: Vec<u8>) -> Result<Vec<u8>> {
        self.writer.write_all(&line)?;
        self.writer.flush()?;

        let mut reply = Vec::new();
        let n = self.reader.read_until(b'\n', &mut reply)?;
        if n == 0 {
            return Err(NestError::Network("server closed the connection".to_string()));
        }
        Ok(reply)
    }
}
