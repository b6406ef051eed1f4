//! Line grammar parser
//!
//! Decoding functions for the textual request grammar, the handshake line,
//! and (for the client side) response lines. All functions take a single
//! line with the terminator already stripped.

use bytes::Bytes;

use crate::error::{NestError, Result};

use super::{Command, Control, Request, Response};

/// Parse a request line into a data or control request
pub fn parse_request(line: &[u8]) -> Result<Request> {
    let stripped = strip_terminator(line);
    let (verb, rest) = split_verb(stripped);

    match verb {
        b"PAUSE" | b"RESUME" | b"TERMINATE" => {
            let handle = parse_key_only(rest)
                .and_then(|h| std::str::from_utf8(&h).ok().and_then(|s| s.parse::<u32>().ok()))
                .ok_or_else(|| {
                    NestError::Protocol(format!(
                        "invalid request. control format: {} {{handle}} (braces required)",
                        String::from_utf8_lossy(verb)
                    ))
                })?;
            Ok(Request::Control(match verb {
                b"PAUSE" => Control::Pause(handle),
                b"RESUME" => Control::Resume(handle),
                _ => Control::Terminate(handle),
            }))
        }
        _ => parse_command(stripped).map(Request::Data),
    }
}

/// Parse a request line into a data command
pub fn parse_command(line: &[u8]) -> Result<Command> {
    let line = strip_terminator(line);
    let (verb, rest) = split_verb(line);

    match verb {
        b"PUT" => {
            let (key, value) = parse_key_value(rest).ok_or_else(|| usage("PUT", true))?;
            Ok(Command::Put { key, value })
        }
        b"GET" => {
            let key = parse_key_only(rest).ok_or_else(|| usage("GET", false))?;
            Ok(Command::Get { key })
        }
        b"POST" => {
            let (key, value) = parse_key_value(rest).ok_or_else(|| usage("POST", true))?;
            Ok(Command::Post { key, value })
        }
        b"DELETE" => {
            let key = parse_key_only(rest).ok_or_else(|| usage("DELETE", false))?;
            Ok(Command::Delete { key })
        }
        _ => Err(NestError::Protocol(format!(
            "unknown command verb: {}",
            String::from_utf8_lossy(verb)
        ))),
    }
}

/// Parse the connection handshake line `HELLO {pid}`
pub fn parse_handshake(line: &[u8]) -> Result<u32> {
    let line = strip_terminator(line);
    let (verb, rest) = split_verb(line);

    if verb != b"HELLO" {
        return Err(NestError::Protocol(
            "handshake format: HELLO {pid} (braces required)".to_string(),
        ));
    }

    let (pid, rest) = take_braced(rest).ok_or_else(|| {
        NestError::Protocol("handshake format: HELLO {pid} (braces required)".to_string())
    })?;
    if !rest.is_empty() {
        return Err(NestError::Protocol(
            "handshake format: HELLO {pid} (braces required)".to_string(),
        ));
    }

    std::str::from_utf8(&pid)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| NestError::Protocol("handshake pid must be an integer".to_string()))
}

/// Encode the handshake reply carrying the assigned handle
pub fn encode_handle(handle: u32) -> Vec<u8> {
    format!("HANDLE {{{handle}}}\n").into_bytes()
}

/// Parse the handshake reply `HANDLE {n}` (client side)
pub fn parse_handle(line: &[u8]) -> Result<u32> {
    let line = strip_terminator(line);
    let (verb, rest) = split_verb(line);

    if verb != b"HANDLE" {
        return Err(NestError::Protocol(format!(
            "expected HANDLE reply, got: {}",
            String::from_utf8_lossy(line)
        )));
    }

    let (handle, _) = take_braced(rest)
        .ok_or_else(|| NestError::Protocol("malformed HANDLE reply".to_string()))?;
    std::str::from_utf8(&handle)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| NestError::Protocol("HANDLE value must be an integer".to_string()))
}

/// Parse a response line (client side)
pub fn parse_response(line: &[u8]) -> Result<Response> {
    let line = strip_terminator(line);

    if line == b"OK" {
        return Ok(Response::ok());
    }
    if line == b"NOT_FOUND" {
        return Ok(Response::not_found());
    }
    if let Some(rest) = line.strip_prefix(b"OK ") {
        let (payload, _) = take_braced(rest)
            .ok_or_else(|| NestError::Protocol("malformed OK payload".to_string()))?;
        return Ok(Response::ok_with(payload));
    }
    if let Some(rest) = line.strip_prefix(b"ERROR ") {
        let (message, _) = take_braced(rest)
            .ok_or_else(|| NestError::Protocol("malformed ERROR payload".to_string()))?;
        return Ok(Response::error(String::from_utf8_lossy(&message)));
    }

    Err(NestError::Protocol(format!(
        "unrecognized response line: {}",
        String::from_utf8_lossy(line)
    )))
}

// =============================================================================
// Grammar helpers
// =============================================================================

/// Drop a trailing `\n` or `\r\n`
fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Split the verb off at the first space
fn split_verb(line: &[u8]) -> (&[u8], &[u8]) {
    match line.iter().position(|&b| b == b' ') {
        Some(i) => (&line[..i], &line[i + 1..]),
        None => (line, &line[line.len()..]),
    }
}

/// Take a non-empty `{...}` field off the front of the input
///
/// The field bytes may not contain `}`; the closing brace is the only
/// delimiter the grammar knows.
fn take_braced(input: &[u8]) -> Option<(Bytes, &[u8])> {
    if input.first() != Some(&b'{') {
        return None;
    }
    let close = input.iter().position(|&b| b == b'}')?;
    if close == 1 {
        // empty field
        return None;
    }
    Some((
        Bytes::copy_from_slice(&input[1..close]),
        &input[close + 1..],
    ))
}

/// `{key}` and nothing else
fn parse_key_only(input: &[u8]) -> Option<Bytes> {
    let (key, rest) = take_braced(input)?;
    if !rest.is_empty() {
        return None;
    }
    Some(key)
}

/// `{key} {value}` and nothing else
fn parse_key_value(input: &[u8]) -> Option<(Bytes, Bytes)> {
    let (key, rest) = take_braced(input)?;
    let rest = rest.strip_prefix(b" ")?;
    let (value, rest) = take_braced(rest)?;
    if !rest.is_empty() {
        return None;
    }
    Some((key, value))
}

fn usage(verb: &str, with_value: bool) -> NestError {
    let shape = if with_value {
        format!("{verb} {{key}} {{value}}")
    } else {
        format!("{verb} {{key}}")
    };
    NestError::Protocol(format!(
        "invalid request. {verb} request format: {shape} (braces required)"
    ))
}
