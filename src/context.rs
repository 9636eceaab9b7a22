//! Per-call context: target URL, request parameters, tuning options, and
//! the single-range fallback read.

use crate::config::VecConfig;
use crate::error::VecError;
use crate::request::{HttpClient, HttpRequest, RequestParams};

/// Scratch size for skipping body bytes on a 200 answer.
const SKIP_BLOCK: usize = 8192;

/// Everything one vectored read needs: where to read from, how to issue
/// requests, and which knobs apply. Borrowed for the duration of the call;
/// the core keeps no state between calls.
pub struct ReadContext<'a, C: HttpClient> {
    pub client: &'a C,
    pub url: &'a str,
    pub params: &'a RequestParams,
    pub config: &'a VecConfig,
}

impl<'a, C: HttpClient> ReadContext<'a, C> {
    pub fn new(
        client: &'a C,
        url: &'a str,
        params: &'a RequestParams,
        config: &'a VecConfig,
    ) -> Self {
        Self {
            client,
            url,
            params,
            config,
        }
    }

    /// Single-range read: one GET with `Range: bytes=o-e` into `buf`.
    ///
    /// A 206 answer is copied directly. A 200 answer (server ignored the
    /// range) is skipped up to `offset` and then copied. A 416 means the
    /// range starts past the end of the resource and yields 0 bytes.
    /// Returns the bytes delivered, which is short when the resource ends
    /// inside the range.
    pub fn pread(&self, buf: &mut [u8], offset: u64) -> Result<u64, VecError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let end = offset + buf.len() as u64 - 1;
        let range = [(
            String::from("Range"),
            format!("bytes={}-{}", offset, end),
        )];
        let mut req = self.client.get(self.url, self.params, &range)?;
        req.begin()?;
        let code = req.status();
        tracing::trace!("single range {}-{} answered {}", offset, end, code);
        let read = match code {
            206 => read_available(&mut req, buf)?,
            200 => {
                skip_body(&mut req, offset)?;
                read_available(&mut req, buf)?
            }
            416 => 0,
            _ => {
                let _ = req.end();
                return Err(VecError::Http(code));
            }
        };
        req.end()?;
        Ok(read)
    }

    /// Value of a `key=value` pair in the URL fragment, if present.
    pub fn fragment_param(&self, key: &str) -> Option<String> {
        fragment_param(self.url, key)
    }
}

fn read_available<R: HttpRequest>(req: &mut R, buf: &mut [u8]) -> Result<u64, VecError> {
    let mut filled = 0usize;
    while filled < buf.len() {
        let n = req.read_block(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled as u64)
}

fn skip_body<R: HttpRequest>(req: &mut R, mut remaining: u64) -> Result<(), VecError> {
    let mut scratch = [0u8; SKIP_BLOCK];
    while remaining > 0 {
        let want = scratch.len().min(remaining as usize);
        let n = req.read_block(&mut scratch[..want])?;
        if n == 0 {
            break;
        }
        remaining -= n as u64;
    }
    Ok(())
}

/// Look up a `key=value` pair in a URL's fragment, e.g.
/// `http://host/file#multirange=false`.
pub(crate) fn fragment_param(url: &str, key: &str) -> Option<String> {
    let (_, fragment) = url.split_once('#')?;
    for pair in fragment.split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            if k == key {
                return Some(v.to_string());
            }
        }
    }
    None
}
