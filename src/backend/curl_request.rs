//! Curl-backed implementation of the HTTP capability.
//!
//! The core pulls response bytes, while curl pushes them into callbacks;
//! the two meet in a buffering `Handler` driven by the multi interface.
//! When the buffer runs full the write callback parks the transfer with
//! `WriteError::Pause` and the next read unpauses it, so a slow consumer
//! never forces the whole body into memory.

use std::collections::VecDeque;
use std::str;
use std::time::Duration;

use curl::easy::{Easy2, Handler, List, WriteError};
use curl::multi::{Easy2Handle, Multi};

use crate::error::VecError;
use crate::request::{HttpClient, HttpRequest, RequestParams};

/// Stop accepting body bytes once this much is buffered.
const HIGH_WATER: usize = 256 * 1024;
/// Resume the transfer once the buffer drains below this.
const LOW_WATER: usize = 64 * 1024;

/// Collects response headers and buffers body bytes.
#[derive(Default)]
struct Collector {
    headers: Vec<String>,
    headers_done: bool,
    body: VecDeque<u8>,
    paused: bool,
}

impl Handler for Collector {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            // Redirect-safe: curl emits one header block per hop. Clear on
            // each HTTP status line so only the final response's headers
            // are kept.
            if line.starts_with("HTTP/") {
                self.headers.clear();
                self.headers_done = false;
            }
            if line.is_empty() {
                self.headers_done = !self.headers.is_empty();
            } else {
                self.headers.push(line.to_string());
            }
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if self.body.len() >= HIGH_WATER {
            self.paused = true;
            return Err(WriteError::Pause);
        }
        self.body.extend(data);
        Ok(data.len())
    }
}

/// One curl-driven GET. Created by [`CurlClient::get`], performed lazily by
/// `begin`, released by `end` or drop.
pub struct CurlRequest {
    multi: Multi,
    pending: Option<Easy2<Collector>>,
    handle: Option<Easy2Handle<Collector>>,
    /// Transfer finished; no more body bytes will arrive.
    finished: bool,
    /// Transfer failed; surfaced once the buffered bytes run out.
    failed: Option<curl::Error>,
    status: u32,
    answer_headers: Vec<String>,
}

impl CurlRequest {
    fn new(easy: Easy2<Collector>) -> Self {
        Self {
            multi: Multi::new(),
            pending: Some(easy),
            handle: None,
            finished: false,
            failed: None,
            status: 0,
            answer_headers: Vec::new(),
        }
    }

    /// Drive the transfer one step: perform, reap completion messages, and
    /// wait briefly when nothing is ready yet.
    fn pump(&mut self) -> Result<(), VecError> {
        let handle = match self.handle.as_ref() {
            Some(h) => h,
            None => return Ok(()),
        };

        let running = self
            .multi
            .perform()
            .map_err(|e| VecError::Transport(format!("curl multi perform: {}", e)))?;

        let mut done: Option<Result<(), curl::Error>> = None;
        self.multi.messages(|msg| {
            if let Some(res) = msg.result_for2(handle) {
                done = Some(res);
            }
        });
        match done {
            Some(Ok(())) => self.finished = true,
            Some(Err(e)) => {
                self.finished = true;
                self.failed = Some(e);
            }
            // no running transfers left means the one transfer is done even
            // if its message was already reaped
            None if running == 0 => self.finished = true,
            None => {}
        }

        // block until socket activity (or a short timeout) when nothing is
        // buffered yet; callers unpause a parked transfer before pumping
        let starved = self
            .handle
            .as_ref()
            .expect("handle present")
            .get_ref()
            .body
            .is_empty();
        if running > 0 && !self.finished && starved {
            self.multi
                .wait(&mut [], Duration::from_millis(100))
                .map_err(|e| VecError::Transport(format!("curl multi wait: {}", e)))?;
        }
        Ok(())
    }

    fn unpause_if_drained(&mut self) -> Result<(), VecError> {
        let handle = match self.handle.as_mut() {
            Some(h) => h,
            None => return Ok(()),
        };
        if handle.get_ref().paused && handle.get_ref().body.len() < LOW_WATER {
            handle.unpause_write().map_err(VecError::Curl)?;
            handle.get_mut().paused = false;
        }
        Ok(())
    }
}

impl HttpRequest for CurlRequest {
    fn begin(&mut self) -> Result<(), VecError> {
        let easy = self
            .pending
            .take()
            .ok_or_else(|| VecError::Transport("request already begun".into()))?;
        let handle = self
            .multi
            .add2(easy)
            .map_err(|e| VecError::Transport(format!("curl multi add: {}", e)))?;
        self.handle = Some(handle);

        loop {
            self.pump()?;
            let headers_done = self
                .handle
                .as_ref()
                .expect("handle present")
                .get_ref()
                .headers_done;
            if headers_done || self.finished {
                break;
            }
        }
        if let Some(e) = self.failed.take() {
            return Err(VecError::Curl(e));
        }

        let collector = self.handle.as_ref().expect("handle present").get_ref();
        self.answer_headers = collector.headers.clone();
        self.status = parse_status_line(&self.answer_headers);
        tracing::trace!("request began with status {}", self.status);
        Ok(())
    }

    fn status(&self) -> u32 {
        self.status
    }

    fn answer_size(&self) -> Option<u64> {
        self.answer_header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }

    fn answer_header(&self, name: &str) -> Option<String> {
        for line in &self.answer_headers {
            if let Some((k, v)) = line.split_once(':') {
                if k.trim().eq_ignore_ascii_case(name) {
                    return Some(v.trim().to_string());
                }
            }
        }
        None
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, VecError> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let available = match self.handle.as_ref() {
                Some(h) => h.get_ref().body.len(),
                None => return Ok(0),
            };
            if available > 0 {
                let n = buf.len().min(available);
                {
                    let c = self.handle.as_mut().expect("handle present").get_mut();
                    for (dst, b) in buf[..n].iter_mut().zip(c.body.drain(..n)) {
                        *dst = b;
                    }
                }
                self.unpause_if_drained()?;
                return Ok(n);
            }
            if let Some(e) = self.failed.take() {
                return Err(VecError::Curl(e));
            }
            if self.finished {
                return Ok(0);
            }
            // nothing buffered but the transfer may be parked on a full
            // buffer from before the last drain
            self.unpause_if_drained()?;
            self.pump()?;
        }
    }

    fn end(&mut self) -> Result<(), VecError> {
        if let Some(handle) = self.handle.take() {
            self.multi
                .remove2(handle)
                .map_err(|e| VecError::Transport(format!("curl multi remove: {}", e)))?;
        }
        self.finished = true;
        Ok(())
    }
}

impl Drop for CurlRequest {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.multi.remove2(handle);
        }
    }
}

fn parse_status_line(headers: &[String]) -> u32 {
    headers
        .first()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap_or(0)
}

/// Issues GETs through libcurl.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurlClient;

impl HttpClient for CurlClient {
    type Request = CurlRequest;

    fn get(
        &self,
        url: &str,
        params: &RequestParams,
        extra_headers: &[(String, String)],
    ) -> Result<CurlRequest, VecError> {
        let mut easy = Easy2::new(Collector::default());
        easy.url(url).map_err(VecError::Curl)?;
        easy.follow_location(true).map_err(VecError::Curl)?;
        easy.max_redirections(params.max_redirections)
            .map_err(VecError::Curl)?;
        easy.connect_timeout(params.connect_timeout)
            .map_err(VecError::Curl)?;
        easy.low_speed_limit(params.low_speed_limit_bytes)
            .map_err(VecError::Curl)?;
        easy.low_speed_time(params.low_speed_time)
            .map_err(VecError::Curl)?;
        easy.timeout(params.timeout).map_err(VecError::Curl)?;

        let mut list = List::new();
        for (k, v) in &params.custom_headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))
                .map_err(VecError::Curl)?;
        }
        for (k, v) in extra_headers {
            list.append(&format!("{}: {}", k, v)).map_err(VecError::Curl)?;
        }
        if !params.custom_headers.is_empty() || !extra_headers.is_empty() {
            easy.http_headers(list).map_err(VecError::Curl)?;
        }

        Ok(CurlRequest::new(easy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_parsing() {
        assert_eq!(
            parse_status_line(&["HTTP/1.1 206 Partial Content".to_string()]),
            206
        );
        assert_eq!(parse_status_line(&["HTTP/2 200".to_string()]), 200);
        assert_eq!(parse_status_line(&[]), 0);
        assert_eq!(parse_status_line(&["garbage".to_string()]), 0);
    }

    #[test]
    fn collector_clears_headers_on_new_status_line() {
        let mut c = Collector::default();
        c.header(b"HTTP/1.1 302 Found\r\n");
        c.header(b"Location: http://other/\r\n");
        c.header(b"\r\n");
        assert!(c.headers_done);
        c.header(b"HTTP/1.1 206 Partial Content\r\n");
        assert!(!c.headers_done, "new hop restarts header collection");
        assert_eq!(c.headers.len(), 1);
        c.header(b"Content-Type: text/plain\r\n");
        c.header(b"\r\n");
        assert!(c.headers_done);
        assert_eq!(c.headers.len(), 2);
    }

    #[test]
    fn collector_pauses_at_high_water() {
        let mut c = Collector::default();
        let chunk = vec![0u8; HIGH_WATER];
        assert_eq!(c.write(&chunk).unwrap(), HIGH_WATER);
        assert!(matches!(c.write(b"more"), Err(_)));
        assert!(c.paused);
    }
}
