//! Minimal HTTP/1.1 server with Range and multipart/byteranges support for
//! integration tests.
//!
//! Serves a single static body. A request with one range gets a plain 206;
//! a request with several ranges gets a 206 multipart/byteranges body.
//! Options inject the server misbehaviors the vector read core has to
//! survive: ignoring Range altogether, answering 206 with only the first
//! range and no MIME framing, and lying in a part's Content-Range.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

const BOUNDARY: &str = "d1e8ab7cafe0";

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If true, multi-range requests get a 206 carrying only the first
    /// range, raw, with no multipart framing (object-store quirk).
    pub broken_multirange: bool,
    /// If true, the second part of a multipart answer reports a
    /// Content-Range shifted by 5 bytes.
    pub lie_on_second_part: bool,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            broken_multirange: false,
            lie_on_second_part: false,
        }
    }
}

/// Starts a server in a background thread serving `body`. Returns the base
/// URL (e.g. "http://127.0.0.1:12345/"). The server runs until the process
/// exits.
#[allow(dead_code)]
pub fn start(body: Vec<u8>) -> String {
    start_with_options(body, RangeServerOptions::default()).0
}

/// Like `start` but with configurable misbehavior; also returns a counter
/// of requests served so tests can assert how many round-trips happened.
pub fn start_with_options(
    body: Vec<u8>,
    opts: RangeServerOptions,
) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let requests = Arc::new(AtomicUsize::new(0));
    let requests_srv = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let requests = Arc::clone(&requests_srv);
            thread::spawn(move || {
                requests.fetch_add(1, Ordering::SeqCst);
                handle(stream, &body, opts);
            });
        }
    });
    (format!("http://127.0.0.1:{}/", port), requests)
}

fn handle(mut stream: std::net::TcpStream, body: &[u8], opts: RangeServerOptions) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, ranges) = parse_request(request);
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }

    let total = body.len() as u64;
    let ranges = if opts.support_ranges { ranges } else { Vec::new() };

    if ranges.is_empty() {
        respond_full(&mut stream, body);
        return;
    }

    // clamp ranges to the resource
    let mut clamped: Vec<(u64, u64)> = Vec::new();
    for (start, end_incl) in ranges {
        if start >= total {
            let header = format!(
                "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                total
            );
            let _ = stream.write_all(header.as_bytes());
            return;
        }
        clamped.push((start, end_incl.min(total - 1)));
    }

    if clamped.len() == 1 || opts.broken_multirange {
        let (start, end_incl) = clamped[0];
        respond_single(&mut stream, body, start, end_incl);
        return;
    }
    respond_multipart(&mut stream, body, &clamped, opts.lie_on_second_part);
}

fn respond_full(stream: &mut std::net::TcpStream, body: &[u8]) {
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(body);
}

fn respond_single(stream: &mut std::net::TcpStream, body: &[u8], start: u64, end_incl: u64) {
    let slice = &body[start as usize..=end_incl as usize];
    let header = format!(
        "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n",
        slice.len(),
        start,
        end_incl,
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(slice);
}

fn respond_multipart(
    stream: &mut std::net::TcpStream,
    body: &[u8],
    ranges: &[(u64, u64)],
    lie_on_second_part: bool,
) {
    let total = body.len();
    let mut payload = Vec::new();
    for (i, &(start, end_incl)) in ranges.iter().enumerate() {
        let (mut rep_start, mut rep_end) = (start, end_incl);
        if lie_on_second_part && i == 1 {
            rep_start += 5;
            rep_end += 5;
        }
        payload.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        payload.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
        payload.extend_from_slice(
            format!("Content-Range: bytes {}-{}/{}\r\n", rep_start, rep_end, total).as_bytes(),
        );
        payload.extend_from_slice(b"\r\n");
        payload.extend_from_slice(&body[start as usize..=end_incl as usize]);
        payload.extend_from_slice(b"\r\n");
    }
    payload.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let header = format!(
        "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Type: multipart/byteranges; boundary={}\r\nConnection: close\r\n\r\n",
        payload.len(),
        BOUNDARY
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&payload);
}

/// Returns (method, ranges) where ranges are the `(start, end_inclusive)`
/// pairs of a `Range: bytes=a-b,c-d,…` header.
fn parse_request(request: &str) -> (&str, Vec<(u64, u64)>) {
    let mut method = "";
    let mut ranges = Vec::new();
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if let Some(list) = value.strip_prefix("bytes=") {
                    for part in list.split(',') {
                        if let Some((a, b)) = part.trim().split_once('-') {
                            if let (Ok(start), Ok(end)) =
                                (a.trim().parse::<u64>(), b.trim().parse::<u64>())
                            {
                                ranges.push((start, end));
                            }
                        }
                    }
                }
            }
        }
    }
    (method, ranges)
}
